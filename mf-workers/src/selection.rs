use std::sync::Arc;

use mf_core::{JobId, JobType, MfResult, SessionId};
use mf_registry::model::{FileStatus, JobPayload, JobStatus, SceneGroup, SelectionItem};
use mf_registry::{FileResultRegistry, JobRegistry};
use mf_store::SignedUrlStore;

use crate::vendor::{SelectionCandidate, VisionVendor};

const THUMBNAIL_URL_TTL_SECS: u64 = 3600;

/// `list -> pregenerate-thumbnails -> ask-vendor -> persist`. Every output
/// item carries the stable `media` index assigned here, by position among
/// the triage job's valid files, so later stages can still address the
/// original file after selection narrows the set.
pub struct SelectionWorker {
    jobs: JobRegistry,
    files: FileResultRegistry,
    store: Arc<dyn SignedUrlStore>,
    vendor: Arc<dyn VisionVendor>,
}

impl SelectionWorker {
    pub fn new(jobs: JobRegistry, files: FileResultRegistry, store: Arc<dyn SignedUrlStore>, vendor: Arc<dyn VisionVendor>) -> Self {
        Self { jobs, files, store, vendor }
    }

    pub async fn run(&self, session_id: &SessionId, job_id: &JobId, triage_job_id: &JobId) -> MfResult<()> {
        let Some(record) = self.jobs.get(session_id, JobType::Selection, job_id).await? else {
            return Ok(());
        };
        if record.status.is_terminal() {
            return Ok(());
        }

        let version = self.jobs.row_version(session_id, JobType::Selection, job_id).await?;
        if !self.jobs.update_status(session_id, JobType::Selection, job_id, version, JobStatus::Processing, None).await? {
            return Ok(());
        }

        // list
        let files = self.files.list_for_job(session_id, triage_job_id).await?;
        let valid: Vec<_> = files.into_iter().filter(|f| f.status == FileStatus::Valid).collect();

        // pregenerate-thumbnails: resolve a signed URL per file, tolerating
        // individual presign failures by skipping that candidate.
        let mut candidates = Vec::new();
        for (index, file) in valid.iter().enumerate() {
            let thumbnail_key = file.thumbnail_key.clone().unwrap_or_else(|| file.original_key.clone());
            if let Ok(thumbnail_url) = self.store.sign_get(&thumbnail_key, THUMBNAIL_URL_TTL_SECS).await {
                candidates.push(SelectionCandidate { media_index: index, filename: file.filename.clone(), thumbnail_url });
            }
        }
        let max_index = valid.len();

        // ask-vendor, tolerant parse: any index outside the valid range is dropped.
        let verdict = self.vendor.rank_selection(&candidates).await.unwrap_or_default();
        let in_range = |i: &usize| *i < max_index;

        let selected: Vec<SelectionItem> = verdict
            .selected
            .into_iter()
            .filter(|i| in_range(i))
            .map(|i| SelectionItem { media_index: i, filename: valid[i].filename.clone(), reason: None })
            .collect();
        let excluded: Vec<SelectionItem> = verdict
            .excluded
            .into_iter()
            .filter(|(i, _)| in_range(i))
            .map(|(i, reason)| SelectionItem { media_index: i, filename: valid[i].filename.clone(), reason: Some(reason) })
            .collect();
        let scene_groups: Vec<SceneGroup> = verdict
            .scene_groups
            .into_iter()
            .map(|(label, indexes)| SceneGroup { label, media_indexes: indexes.into_iter().filter(|i| in_range(i)).collect() })
            .collect();

        // persist
        let version = self.jobs.row_version(session_id, JobType::Selection, job_id).await?;
        self.jobs
            .update_payload(session_id, JobType::Selection, job_id, version, move |payload| {
                if let JobPayload::Selection(p) = payload {
                    p.selected = selected;
                    p.excluded = excluded;
                    p.scene_groups = scene_groups;
                }
            })
            .await?;

        let version = self.jobs.row_version(session_id, JobType::Selection, job_id).await?;
        self.jobs.update_status(session_id, JobType::Selection, job_id, version, JobStatus::Complete, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::fakes::FakeVisionVendor;
    use mf_core::JobId;
    use mf_kv::MemoryKvStore;
    use mf_registry::model::{FileKind, FileResult, JobRecord, SelectionPayload};
    use mf_store::MemoryObjectStore;

    fn make_file(filename: &str) -> FileResult {
        FileResult {
            filename: filename.to_string(),
            status: FileStatus::Valid,
            original_key: format!("s1/{filename}"),
            processed_key: None,
            thumbnail_key: None,
            file_type: Some(FileKind::Image),
            mime_type: Some("image/jpeg".to_string()),
            file_size: 1024,
            converted: false,
            fingerprint: Some(filename.to_string()),
            metadata: Default::default(),
            error: None,
        }
    }

    #[tokio::test]
    async fn fake_vendor_selects_every_candidate() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv.clone());
        let files = FileResultRegistry::new(kv);
        let session_id = SessionId::new();

        let triage_id = JobId::new(JobType::Triage);
        files.put_if_absent(&session_id, &triage_id, &make_file("a.jpg")).await.unwrap();
        files.put_if_absent(&session_id, &triage_id, &make_file("b.jpg")).await.unwrap();

        let record = jobs
            .create_job(JobRecord::new(session_id.clone(), JobPayload::Selection(SelectionPayload::default()), "pending"), None)
            .await
            .unwrap();

        let worker = SelectionWorker::new(jobs.clone(), files, Arc::new(MemoryObjectStore::default()), Arc::new(FakeVisionVendor));
        worker.run(&session_id, &record.id, &triage_id).await.unwrap();

        let updated = jobs.get(&session_id, JobType::Selection, &record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Complete);
        if let JobPayload::Selection(p) = &updated.payload {
            assert_eq!(p.selected.len(), 2);
            assert!(p.excluded.is_empty());
        } else {
            panic!("expected selection payload");
        }
    }

    #[tokio::test]
    async fn missing_job_is_a_silent_no_op() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv.clone());
        let files = FileResultRegistry::new(kv);
        let session_id = SessionId::new();
        let missing_id = JobId::new(JobType::Selection);
        let triage_id = JobId::new(JobType::Triage);

        let worker = SelectionWorker::new(jobs, files, Arc::new(MemoryObjectStore::default()), Arc::new(FakeVisionVendor));
        assert!(worker.run(&session_id, &missing_id, &triage_id).await.is_ok());
    }
}
