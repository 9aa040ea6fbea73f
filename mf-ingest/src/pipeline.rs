use std::sync::Arc;

use mf_core::{JobId, JobType, MfError, MfResult, SessionId};
use mf_registry::model::{FileKind, FileResult, FileStatus};
use mf_registry::{FileResultRegistry, JobRegistry};
use mf_store::ObjectStore;
use tracing::warn;

use crate::analyzer::{DerivationEngine, MetadataAnalyzer};
use crate::classify::{classify_content_type, is_own_artifact};
use crate::fingerprint::fingerprint_object;

fn basename(filename: &str) -> &str {
    filename.rsplit_once('.').map(|(stem, _)| stem).unwrap_or(filename)
}

/// Runs the per-file steps described for newly-uploaded objects: route
/// filtering, cost tagging, classification, fingerprinting, dedup,
/// metadata extraction, derivation, and persistence. One instance is shared
/// across every ingest notification for a session.
pub struct IngestPipeline {
    store: Arc<dyn ObjectStore>,
    jobs: JobRegistry,
    files: FileResultRegistry,
    analyzer: Arc<dyn MetadataAnalyzer>,
    derivation: Arc<dyn DerivationEngine>,
}

impl IngestPipeline {
    pub fn new(
        store: Arc<dyn ObjectStore>,
        jobs: JobRegistry,
        files: FileResultRegistry,
        analyzer: Arc<dyn MetadataAnalyzer>,
        derivation: Arc<dyn DerivationEngine>,
    ) -> Self {
        Self { store, jobs, files, analyzer, derivation }
    }

    /// Process one "new object" notification. Never returns an error for a
    /// bad upload — invalid files are recorded as such and the triage
    /// counter still advances so fan-in terminates. Only registry/store
    /// failures while *recording* that outcome propagate.
    pub async fn process_object(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        key: &str,
        filename: &str,
        content_type: &str,
    ) -> MfResult<()> {
        if is_own_artifact(key) {
            return Ok(());
        }

        match self.try_process(session_id, job_id, key, filename, content_type).await {
            Ok(()) => Ok(()),
            Err(e) => self.record_invalid(session_id, job_id, key, filename, e).await,
        }
    }

    async fn try_process(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        key: &str,
        filename: &str,
        content_type: &str,
    ) -> MfResult<()> {
        if let Err(e) = self.store.tag(key, &[("owner".into(), session_id.to_string())]).await {
            warn!(key, error = %e, "cost tagging failed, continuing without it");
        }

        let kind = classify_content_type(content_type)
            .ok_or_else(|| MfError::validation(format!("unsupported content type: {content_type}")))?;

        let head = self.store.head(key).await?;
        let fingerprint = fingerprint_object(self.store.as_ref(), key, head.size_bytes).await?;

        if let Some(existing_filename) = self.jobs.get_fingerprint_mapping(session_id, job_id, &fingerprint).await? {
            return self.reuse_existing(session_id, job_id, key, filename, kind, head.size_bytes, &fingerprint, &existing_filename).await;
        }

        let get_result = self.store.get(key, None).await?;
        let bytes = crate::fingerprint_bytes(get_result).await?;

        let metadata = self.analyzer.analyze(&bytes, content_type).await.unwrap_or_default();
        let derivation = self.derivation.derive(&bytes, content_type).await.unwrap_or_default();

        let base = basename(filename);
        let thumbnail_key = match &derivation.thumbnail {
            Some(bytes) => {
                let tkey = format!("{session_id}/thumbnails/{base}.jpg");
                self.store.put(&tkey, Some("image/jpeg"), crate::bytes_stream(bytes.clone())).await?;
                Some(tkey)
            }
            None => None,
        };

        let processed_key = match &derivation.transcoded {
            Some(bytes) if kind == FileKind::Video => {
                let pkey = format!("{session_id}/processed/{base}.webm");
                self.store.put(&pkey, Some("video/webm"), crate::bytes_stream(bytes.clone())).await?;
                Some(pkey)
            }
            _ => Some(key.to_string()),
        };

        let mut meta = std::collections::BTreeMap::new();
        if let Some((lat, lon)) = metadata.gps {
            meta.insert("gps".to_string(), format!("{lat},{lon}"));
        }
        if let Some(ts) = metadata.captured_at {
            meta.insert("capturedAt".to_string(), ts.to_rfc3339());
        }
        if let Some(d) = metadata.duration_secs {
            meta.insert("durationSecs".to_string(), d.to_string());
        }
        if let Some(w) = metadata.width {
            meta.insert("width".to_string(), w.to_string());
        }
        if let Some(h) = metadata.height {
            meta.insert("height".to_string(), h.to_string());
        }

        let result = FileResult {
            filename: filename.to_string(),
            status: FileStatus::Valid,
            original_key: key.to_string(),
            processed_key,
            thumbnail_key,
            file_type: Some(kind),
            mime_type: Some(content_type.to_string()),
            file_size: head.size_bytes,
            converted: false,
            fingerprint: Some(fingerprint.clone()),
            metadata: meta,
            error: None,
        };

        self.files.put_if_absent(session_id, job_id, &result).await?;
        self.jobs.put_fingerprint_mapping(session_id, job_id, &fingerprint, filename).await?;
        self.jobs.atomic_increment(session_id, JobType::Triage, job_id, "processedCount", 1).await?;
        Ok(())
    }

    #[allow(clippy::too_many_arguments)]
    async fn reuse_existing(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        key: &str,
        filename: &str,
        kind: FileKind,
        file_size: u64,
        fingerprint: &str,
        existing_filename: &str,
    ) -> MfResult<()> {
        let existing = self
            .files
            .get(session_id, job_id, existing_filename)
            .await?
            .ok_or_else(|| MfError::corruption("fingerprint mapping points at a missing file result"))?;

        let result = FileResult {
            filename: filename.to_string(),
            status: FileStatus::Valid,
            original_key: key.to_string(),
            processed_key: existing.processed_key,
            thumbnail_key: existing.thumbnail_key,
            file_type: Some(kind),
            mime_type: existing.mime_type,
            file_size,
            converted: existing.converted,
            fingerprint: Some(fingerprint.to_string()),
            metadata: existing.metadata,
            error: None,
        };

        self.files.put_if_absent(session_id, job_id, &result).await?;
        self.jobs.atomic_increment(session_id, JobType::Triage, job_id, "processedCount", 1).await?;
        Ok(())
    }

    async fn record_invalid(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        key: &str,
        filename: &str,
        cause: MfError,
    ) -> MfResult<()> {
        let result = FileResult {
            filename: filename.to_string(),
            status: FileStatus::Invalid,
            original_key: key.to_string(),
            processed_key: None,
            thumbnail_key: None,
            file_type: None,
            mime_type: None,
            file_size: 0,
            converted: false,
            fingerprint: None,
            metadata: Default::default(),
            error: Some(cause.client_message().to_string()),
        };
        self.files.put_if_absent(session_id, job_id, &result).await?;
        self.jobs.atomic_increment(session_id, JobType::Triage, job_id, "processedCount", 1).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::analyzer::{NullAnalyzer, NullDerivationEngine};
    use mf_core::JobType;
    use mf_kv::MemoryKvStore;
    use mf_registry::model::{JobPayload, JobRecord, TriagePayload};
    use mf_store::MemoryObjectStore;

    fn pipeline() -> (IngestPipeline, Arc<dyn ObjectStore>, JobRegistry) {
        let kv = Arc::new(MemoryKvStore::new());
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        let jobs = JobRegistry::new(kv.clone());
        let files = FileResultRegistry::new(kv);
        (IngestPipeline::new(store.clone(), jobs.clone(), files, Arc::new(NullAnalyzer), Arc::new(NullDerivationEngine)), store, jobs)
    }

    #[tokio::test]
    async fn skips_own_artifact_keys_without_touching_the_counter() {
        let (pipeline, _store, jobs) = pipeline();
        let session_id = SessionId::new();
        let job_id = JobId::new(JobType::Triage);
        jobs.create_job(
            JobRecord::new(session_id.clone(), JobPayload::Triage(TriagePayload { expected_file_count: 1, ..Default::default() }), "uploading"),
            None,
        )
        .await
        .unwrap();

        pipeline
            .process_object(&session_id, &job_id, &format!("{session_id}/thumbnails/a.jpg"), "a.jpg", "image/jpeg")
            .await
            .unwrap();

        assert_eq!(jobs.get_counter(&session_id, JobType::Triage, &job_id, "processedCount").await.unwrap(), 0);
    }

    #[tokio::test]
    async fn unsupported_content_type_is_recorded_invalid_and_still_counted() {
        let (pipeline, _store, jobs) = pipeline();
        let session_id = SessionId::new();
        let job_id = JobId::new(JobType::Triage);

        pipeline
            .process_object(&session_id, &job_id, &format!("{session_id}/doc.pdf"), "doc.pdf", "application/pdf")
            .await
            .unwrap();

        assert_eq!(jobs.get_counter(&session_id, JobType::Triage, &job_id, "processedCount").await.unwrap(), 1);
    }

    #[tokio::test]
    async fn duplicate_content_reuses_existing_derivations() {
        let (pipeline, store, jobs) = pipeline();
        let session_id = SessionId::new();
        let job_id = JobId::new(JobType::Triage);

        let key_a = format!("{session_id}/a.jpg");
        store.put(&key_a, Some("image/jpeg"), crate::bytes_stream(vec![1, 2, 3, 4])).await.unwrap();
        pipeline.process_object(&session_id, &job_id, &key_a, "a.jpg", "image/jpeg").await.unwrap();

        let key_b = format!("{session_id}/b.jpg");
        store.put(&key_b, Some("image/jpeg"), crate::bytes_stream(vec![1, 2, 3, 4])).await.unwrap();
        pipeline.process_object(&session_id, &job_id, &key_b, "b.jpg", "image/jpeg").await.unwrap();

        assert_eq!(jobs.get_counter(&session_id, JobType::Triage, &job_id, "processedCount").await.unwrap(), 2);
    }
}
