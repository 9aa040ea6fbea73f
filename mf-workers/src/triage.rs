use std::sync::Arc;

use mf_core::{JobId, JobType, MfResult, SessionId};
use mf_registry::model::{FileKind, FileStatus, JobPayload, JobStatus, TriageVerdict as TriageVerdictRow};
use mf_registry::{FileResultRegistry, JobRegistry};
use mf_store::SignedUrlStore;
use tracing::warn;

use crate::vendor::{TriageCandidate, VisionVendor};

const THUMBNAIL_URL_TTL_SECS: u64 = 3600;
/// Videos shorter than this are pre-classified as discard without asking
/// the vendor — a clip this brief is almost always an accidental capture.
const MIN_VIDEO_DURATION_SECS: f64 = 2.0;

pub struct TriageWorker {
    jobs: JobRegistry,
    files: FileResultRegistry,
    store: Arc<dyn SignedUrlStore>,
    vendor: Arc<dyn VisionVendor>,
}

impl TriageWorker {
    pub fn new(jobs: JobRegistry, files: FileResultRegistry, store: Arc<dyn SignedUrlStore>, vendor: Arc<dyn VisionVendor>) -> Self {
        Self { jobs, files, store, vendor }
    }

    /// Phase 2: the coordinator calls this once ingest fan-out has reached
    /// `expectedFileCount`. Classifies every valid file as keep/discard and
    /// writes the two lists onto the job.
    pub async fn run_analysis(&self, session_id: &SessionId, job_id: &JobId) -> MfResult<()> {
        let Some(record) = self.jobs.get(session_id, JobType::Triage, job_id).await? else {
            return Ok(());
        };
        // Rule (b): idempotent retry shield.
        if record.status.is_terminal() {
            return Ok(());
        }

        let version = self.jobs.row_version(session_id, JobType::Triage, job_id).await?;
        if !self
            .jobs
            .update_status(session_id, JobType::Triage, job_id, version, JobStatus::Processing, None)
            .await?
        {
            return Ok(());
        }
        let version = self.jobs.row_version(session_id, JobType::Triage, job_id).await?;
        let _ = self.jobs.set_phase(session_id, JobType::Triage, job_id, version, "analysis").await;

        let files = self.files.list_for_job(session_id, job_id).await?;
        let valid: Vec<_> = files.into_iter().filter(|f| f.status == FileStatus::Valid).collect();

        let mut candidates = Vec::new();
        let mut precl_discard = Vec::new();
        for (index, file) in valid.iter().enumerate() {
            let is_video = file.file_type == Some(FileKind::Video);
            let duration = file.metadata.get("durationSecs").and_then(|s| s.parse::<f64>().ok());
            if is_video && duration.map(|d| d < MIN_VIDEO_DURATION_SECS).unwrap_or(false) {
                precl_discard.push(TriageVerdictRow {
                    filename: file.filename.clone(),
                    media_index: index,
                    verdict: "discard".to_string(),
                    reason: "clip is shorter than 2 seconds".to_string(),
                });
                continue;
            }
            let thumbnail_key = file.thumbnail_key.clone().unwrap_or_else(|| file.original_key.clone());
            let thumbnail_url = self.store.sign_get(&thumbnail_key, THUMBNAIL_URL_TTL_SECS).await.unwrap_or_default();
            candidates.push((
                index,
                file.filename.clone(),
                TriageCandidate { media_index: index, filename: file.filename.clone(), thumbnail_url, is_video, duration_secs: duration },
            ));
        }

        let vendor_candidates: Vec<TriageCandidate> = candidates.iter().map(|(_, _, c)| c.clone()).collect();
        let verdicts = match self.vendor.classify_triage(&vendor_candidates).await {
            Ok(v) => v,
            Err(e) => {
                warn!(job_id = %job_id, error = %e, "vision vendor call failed, defaulting every item to keep");
                Vec::new()
            }
        };

        let mut keep = Vec::new();
        let mut discard = precl_discard;
        for (index, filename, _candidate) in &candidates {
            match verdicts.iter().find(|v| v.media_index == *index) {
                Some(v) if v.verdict.eq_ignore_ascii_case("discard") => {
                    discard.push(TriageVerdictRow { filename: filename.clone(), media_index: *index, verdict: "discard".to_string(), reason: v.reason.clone() })
                }
                Some(v) => keep.push(TriageVerdictRow { filename: filename.clone(), media_index: *index, verdict: "keep".to_string(), reason: v.reason.clone() }),
                // Tie-break: missing from the vendor response defaults to keep.
                None => keep.push(TriageVerdictRow { filename: filename.clone(), media_index: *index, verdict: "keep".to_string(), reason: "Not evaluated".to_string() }),
            }
        }

        let version = self.jobs.row_version(session_id, JobType::Triage, job_id).await?;
        self.jobs
            .update_payload(session_id, JobType::Triage, job_id, version, move |payload| {
                if let JobPayload::Triage(p) = payload {
                    p.keep = keep;
                    p.discard = discard;
                }
            })
            .await?;

        let version = self.jobs.row_version(session_id, JobType::Triage, job_id).await?;
        self.jobs.update_status(session_id, JobType::Triage, job_id, version, JobStatus::Complete, None).await?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::fakes::FakeVisionVendor;
    use mf_kv::MemoryKvStore;
    use mf_registry::model::{FileResult, JobRecord, TriagePayload};
    use mf_store::MemoryObjectStore;

    fn make_file(filename: &str, duration_secs: Option<&str>) -> FileResult {
        let mut metadata = std::collections::BTreeMap::new();
        if let Some(d) = duration_secs {
            metadata.insert("durationSecs".to_string(), d.to_string());
        }
        FileResult {
            filename: filename.to_string(),
            status: FileStatus::Valid,
            original_key: format!("s1/{filename}"),
            processed_key: None,
            thumbnail_key: None,
            file_type: Some(if duration_secs.is_some() { FileKind::Video } else { FileKind::Image }),
            mime_type: Some("image/jpeg".to_string()),
            file_size: 1024,
            converted: false,
            fingerprint: Some(filename.to_string()),
            metadata,
            error: None,
        }
    }

    #[tokio::test]
    async fn short_video_is_preclassified_discard_without_asking_the_vendor() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv.clone());
        let files = FileResultRegistry::new(kv);
        let session_id = SessionId::new();

        let record = jobs
            .create_job(
                JobRecord::new(session_id.clone(), JobPayload::Triage(TriagePayload { expected_file_count: 1, ..Default::default() }), "uploading"),
                None,
            )
            .await
            .unwrap();

        files.put_if_absent(&session_id, &record.id, &make_file("clip.mp4", Some("1.0"))).await.unwrap();

        let worker = TriageWorker::new(jobs.clone(), files, Arc::new(MemoryObjectStore::default()), Arc::new(FakeVisionVendor));
        worker.run_analysis(&session_id, &record.id).await.unwrap();

        let updated = jobs.get(&session_id, JobType::Triage, &record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Complete);
        if let JobPayload::Triage(p) = &updated.payload {
            assert_eq!(p.discard.len(), 1);
            assert_eq!(p.discard[0].reason, "clip is shorter than 2 seconds");
            assert!(p.keep.is_empty());
        } else {
            panic!("expected triage payload");
        }
    }

    #[tokio::test]
    async fn vendor_keep_verdict_is_recorded() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv.clone());
        let files = FileResultRegistry::new(kv);
        let session_id = SessionId::new();

        let record = jobs
            .create_job(
                JobRecord::new(session_id.clone(), JobPayload::Triage(TriagePayload { expected_file_count: 1, ..Default::default() }), "uploading"),
                None,
            )
            .await
            .unwrap();
        files.put_if_absent(&session_id, &record.id, &make_file("a.jpg", None)).await.unwrap();

        let worker = TriageWorker::new(jobs.clone(), files, Arc::new(MemoryObjectStore::default()), Arc::new(FakeVisionVendor));
        worker.run_analysis(&session_id, &record.id).await.unwrap();

        let updated = jobs.get(&session_id, JobType::Triage, &record.id).await.unwrap().unwrap();
        if let JobPayload::Triage(p) = &updated.payload {
            assert_eq!(p.keep.len(), 1);
        } else {
            panic!("expected triage payload");
        }
    }
}
