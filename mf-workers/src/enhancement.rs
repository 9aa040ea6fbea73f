use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use mf_core::{JobId, JobType, MfError, MfResult, SessionId};
use mf_registry::model::{EnhancementItem, FeedbackEntry, JobStatus};
use mf_registry::JobRegistry;
use mf_store::ObjectStore;
use tracing::warn;

/// One photo's enhancement pass. A real vendor call would touch a
/// generative-image API per phase; this trait is the seam, so tests and
/// local dev can run the full fan-out without one.
#[async_trait]
pub trait EnhancementVendor: Send + Sync {
    /// Run every phase for one item and return the bytes of the final
    /// enhanced image plus a thumbnail. A vendor that fails mid-phase
    /// should return `Err` — the worker records that as the item's terminal
    /// error rather than retrying indefinitely.
    async fn enhance(&self, original: &[u8]) -> MfResult<(Vec<u8>, Vec<u8>)>;

    /// Re-run with free-text feedback applied on top of the previous result.
    async fn apply_feedback(&self, original: &[u8], feedback: &str) -> MfResult<(Vec<u8>, Vec<u8>)>;
}

pub struct EnhancementWorker {
    jobs: JobRegistry,
    store: Arc<dyn ObjectStore>,
    vendor: Arc<dyn EnhancementVendor>,
}

impl EnhancementWorker {
    pub fn new(jobs: JobRegistry, store: Arc<dyn ObjectStore>, vendor: Arc<dyn EnhancementVendor>) -> Self {
        Self { jobs, store, vendor }
    }

    /// Process a single item of the fan-out. The coordinator invokes this
    /// once per item; item writes are independent across indexes, so these
    /// can run concurrently without collision.
    pub async fn run_item(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        total_count: u32,
        mut item: EnhancementItem,
    ) -> MfResult<()> {
        item.phase = "phase1".to_string();
        self.write_item(session_id, job_id, &item).await?;

        let original = match self.fetch(&item.original_key).await {
            Ok(bytes) => bytes,
            Err(e) => return self.fail_item(session_id, job_id, total_count, item, e).await,
        };

        item.phase = "phase2".to_string();
        self.write_item(session_id, job_id, &item).await?;

        let (enhanced, thumb) = match self.vendor.enhance(&original).await {
            Ok(out) => out,
            Err(e) => return self.fail_item(session_id, job_id, total_count, item, e).await,
        };

        item.phase = "phase3".to_string();
        self.write_item(session_id, job_id, &item).await?;

        let enhanced_key = format!("{session_id}/enhanced/{}", item.filename);
        let enhanced_thumb_key = format!("{session_id}/enhanced/thumb-{}", item.filename);
        if let Err(e) = self.store.put(&enhanced_key, None, bytes_stream(enhanced)).await {
            return self.fail_item(session_id, job_id, total_count, item, e).await;
        }
        if let Err(e) = self.store.put(&enhanced_thumb_key, None, bytes_stream(thumb)).await {
            return self.fail_item(session_id, job_id, total_count, item, e).await;
        }

        item.enhanced_key = Some(enhanced_key);
        item.enhanced_thumb_key = Some(enhanced_thumb_key);
        item.phase = "complete".to_string();
        item.error = None;
        self.complete_item(session_id, job_id, total_count, item).await
    }

    /// Post-completion feedback round: re-run with the user's free-text
    /// edit applied, upload under the same item key, append to history.
    pub async fn apply_feedback(&self, session_id: &SessionId, job_id: &JobId, mut item: EnhancementItem, feedback: String) -> MfResult<()> {
        let original = self.fetch(&item.original_key).await?;
        let (enhanced, thumb) = self.vendor.apply_feedback(&original, &feedback).await?;

        let enhanced_key = format!("{session_id}/enhanced/{}", item.filename);
        let enhanced_thumb_key = format!("{session_id}/enhanced/thumb-{}", item.filename);
        self.store.put(&enhanced_key, None, bytes_stream(enhanced)).await?;
        self.store.put(&enhanced_thumb_key, None, bytes_stream(thumb)).await?;

        item.enhanced_key = Some(enhanced_key);
        item.enhanced_thumb_key = Some(enhanced_thumb_key);
        item.edits += 1;
        item.feedback_history.push(FeedbackEntry { feedback, applied_at: Utc::now() });
        item.phase = "feedback".to_string();
        item.error = None;
        self.write_item(session_id, job_id, &item).await
    }

    async fn fetch(&self, key: &str) -> MfResult<Vec<u8>> {
        use futures_util::StreamExt;
        let mut result = self.store.get(key, None).await?;
        let mut buf = Vec::new();
        while let Some(chunk) = result.stream.next().await {
            buf.extend_from_slice(&chunk.map_err(|e| MfError::transient(e.to_string()))?);
        }
        Ok(buf)
    }

    async fn write_item(&self, session_id: &SessionId, job_id: &JobId, item: &EnhancementItem) -> MfResult<()> {
        self.jobs
            .update_item_index(session_id, JobType::Enhancement, job_id, "items", item.index, serde_json::to_value(item)?)
            .await
    }

    async fn fail_item(&self, session_id: &SessionId, job_id: &JobId, total_count: u32, mut item: EnhancementItem, cause: MfError) -> MfResult<()> {
        item.phase = "error".to_string();
        item.error = Some(cause.client_message().to_string());
        warn!(job_id = %job_id, index = item.index, error = %cause, "enhancement item failed");
        self.complete_item(session_id, job_id, total_count, item).await
    }

    /// Siblings complete independently: write the item, bump the shared
    /// counter, and if this was the last one, conditionally close the job.
    /// A lost race on the status write is fine — the polling projection
    /// repairs it.
    async fn complete_item(&self, session_id: &SessionId, job_id: &JobId, total_count: u32, item: EnhancementItem) -> MfResult<()> {
        self.write_item(session_id, job_id, &item).await?;
        let completed = self.jobs.atomic_increment(session_id, JobType::Enhancement, job_id, "completedCount", 1).await?;
        if completed >= total_count as i64 {
            if let Ok(version) = self.jobs.row_version(session_id, JobType::Enhancement, job_id).await {
                let _ = self.jobs.update_status(session_id, JobType::Enhancement, job_id, version, JobStatus::Complete, None).await;
            }
        }
        Ok(())
    }
}

fn bytes_stream(bytes: Vec<u8>) -> mf_store::ByteStream {
    Box::pin(futures_util::stream::once(async move { Ok(bytes::Bytes::from(bytes)) }))
}

/// Deterministic stand-in for tests and local dev: "enhances" by returning
/// the original bytes unchanged as both the full image and its thumbnail.
pub struct FakeEnhancementVendor;

#[async_trait]
impl EnhancementVendor for FakeEnhancementVendor {
    async fn enhance(&self, original: &[u8]) -> MfResult<(Vec<u8>, Vec<u8>)> {
        Ok((original.to_vec(), original.to_vec()))
    }

    async fn apply_feedback(&self, original: &[u8], _feedback: &str) -> MfResult<(Vec<u8>, Vec<u8>)> {
        Ok((original.to_vec(), original.to_vec()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_core::SessionId;
    use mf_kv::MemoryKvStore;
    use mf_registry::model::{EnhancementPayload, JobPayload, JobRecord};
    use mf_store::MemoryObjectStore;

    #[tokio::test]
    async fn single_item_completion_closes_the_job() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv);
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        let session_id = SessionId::new();

        let payload = EnhancementPayload { total_count: 1, ..Default::default() };
        let record = jobs
            .create_job(JobRecord::new(session_id.clone(), JobPayload::Enhancement(payload), "initial"), None)
            .await
            .unwrap();

        store.put("s1/a.jpg", None, bytes_stream(b"hello".to_vec())).await.unwrap();
        let item = EnhancementItem::new(0, "s1/a.jpg".to_string(), "a.jpg".to_string(), "s1/a.jpg".to_string());

        let worker = EnhancementWorker::new(jobs.clone(), store, Arc::new(FakeEnhancementVendor));
        worker.run_item(&session_id, &record.id, 1, item).await.unwrap();

        let updated = jobs.get(&session_id, JobType::Enhancement, &record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Complete);
    }

    #[tokio::test]
    async fn fetch_failure_marks_the_item_errored_without_blocking_the_counter() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv);
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        let session_id = SessionId::new();

        let payload = EnhancementPayload { total_count: 1, ..Default::default() };
        let record = jobs
            .create_job(JobRecord::new(session_id.clone(), JobPayload::Enhancement(payload), "initial"), None)
            .await
            .unwrap();

        // No object uploaded at "s1/missing.jpg" — fetch fails.
        let item = EnhancementItem::new(0, "s1/missing.jpg".to_string(), "missing.jpg".to_string(), "s1/missing.jpg".to_string());

        let worker = EnhancementWorker::new(jobs.clone(), store, Arc::new(FakeEnhancementVendor));
        worker.run_item(&session_id, &record.id, 1, item).await.unwrap();

        let updated = jobs.get(&session_id, JobType::Enhancement, &record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Complete);
        let items: Vec<EnhancementItem> = jobs.get_items(&session_id, JobType::Enhancement, &record.id, "items").await.unwrap();
        assert_eq!(items[0].phase, "error");
    }
}
