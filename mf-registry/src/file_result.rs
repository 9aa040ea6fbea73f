use std::sync::Arc;

use chrono::Duration;
use mf_core::{JobId, MfError, MfResult, SessionId};
use mf_kv::KvStore;

use crate::model::FileResult;

const FILE_RESULT_TTL: Duration = Duration::hours(24);

fn sort_key(session_id: &SessionId, job_id: &JobId, filename: &str) -> String {
    format!("FILE#{session_id}#{job_id}#{filename}")
}

/// Per-file CRUD, one row per `(sessionId, jobId, filename)`. Backed by the
/// same KV store as jobs but modeled as its own registry since the File
/// Ingest Pipeline writes these independently of any single Job's lifetime.
#[derive(Clone)]
pub struct FileResultRegistry {
    kv: Arc<dyn KvStore>,
}

impl FileResultRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// First-write-wins: a retried ingest notification for the same
    /// filename must not overwrite an already-recorded result.
    pub async fn put_if_absent(&self, session_id: &SessionId, job_id: &JobId, result: &FileResult) -> MfResult<bool> {
        let sk = sort_key(session_id, job_id, &result.filename);
        self.kv
            .put_if_absent(session_id.as_str(), &sk, serde_json::to_value(result)?, FILE_RESULT_TTL)
            .await
    }

    pub async fn get(&self, session_id: &SessionId, job_id: &JobId, filename: &str) -> MfResult<Option<FileResult>> {
        let sk = sort_key(session_id, job_id, filename);
        let row = self.kv.get(session_id.as_str(), &sk).await?;
        row.map(|r| serde_json::from_value(r.value).map_err(MfError::from)).transpose()
    }

    pub async fn list_for_job(&self, session_id: &SessionId, job_id: &JobId) -> MfResult<Vec<FileResult>> {
        let prefix = format!("FILE#{session_id}#{job_id}#");
        let rows = self.kv.query_prefix(session_id.as_str(), &prefix).await?;
        rows.into_iter().map(|r| serde_json::from_value(r.value).map_err(MfError::from)).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{FileKind, FileStatus};
    use mf_core::JobType;
    use mf_kv::MemoryKvStore;

    fn make(filename: &str) -> FileResult {
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
            fingerprint: Some("deadbeef".to_string()),
            metadata: Default::default(),
            error: None,
        }
    }

    #[tokio::test]
    async fn filename_is_unique_per_job() {
        let registry = FileResultRegistry::new(Arc::new(MemoryKvStore::new()));
        let session_id = SessionId::new();
        let job_id = JobId::new(JobType::Triage);
        assert!(registry.put_if_absent(&session_id, &job_id, &make("a.jpg")).await.unwrap());
        assert!(!registry.put_if_absent(&session_id, &job_id, &make("a.jpg")).await.unwrap());
        assert_eq!(registry.list_for_job(&session_id, &job_id).await.unwrap().len(), 1);
    }
}
