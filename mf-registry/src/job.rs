use std::sync::Arc;

use chrono::Duration;
use mf_core::{JobId, JobType, MfError, MfResult, SessionId};
use mf_kv::KvStore;

use crate::model::{JobPayload, JobRecord, JobStatus};

/// TTL applied to every Job row. Mirrors the session TTL — a job's record
/// never outlives the session it belongs to in practice, but carries its
/// own clock so a job can be reaped independently if a rewind narrows it.
const JOB_TTL: Duration = Duration::hours(24);

fn idempotency_sort_key(job_type: JobType, idempotency_key: &str) -> String {
    format!("IDEMPOTENCY#{}#{idempotency_key}", job_type.sort_key_tag())
}

/// Typed CRUD and conditional-update wrapper over the KV store for Job
/// records. Every mutation is conditional: status transitions
/// compare-and-swap, counters are atomic adds, item writes address a
/// single list index.
#[derive(Clone)]
pub struct JobRegistry {
    kv: Arc<dyn KvStore>,
}

impl JobRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    /// Create a new Job, or return the existing one if `idempotency_key`
    /// was already used for this session and job type. This is how
    /// `POST /api/triage/init` called twice with the same body yields a
    /// single KV row.
    pub async fn create_job(&self, record: JobRecord, idempotency_key: Option<&str>) -> MfResult<JobRecord> {
        if let Some(key) = idempotency_key {
            let job_type = record.payload.job_type();
            let sk = idempotency_sort_key(job_type, key);
            let mapped = serde_json::json!({ "jobId": record.id.as_str() });
            let created = self.kv.put_if_absent(record.session_id.as_str(), &sk, mapped, JOB_TTL).await?;
            if !created {
                let row = self
                    .kv
                    .get(record.session_id.as_str(), &sk)
                    .await?
                    .ok_or_else(|| MfError::corruption("idempotency row vanished"))?;
                let existing_id = row.value["jobId"]
                    .as_str()
                    .ok_or_else(|| MfError::corruption("idempotency row missing jobId"))?;
                let existing = self
                    .get(&record.session_id, job_type, &JobId::from(existing_id))
                    .await?
                    .ok_or_else(|| MfError::corruption("idempotency row points at a missing job"))?;
                return Ok(existing);
            }
        }

        self.kv
            .put(record.session_id.as_str(), &record.id.sort_key(), serde_json::to_value(&record)?, JOB_TTL)
            .await?;
        Ok(record)
    }

    pub async fn get(&self, session_id: &SessionId, job_type: JobType, job_id: &JobId) -> MfResult<Option<JobRecord>> {
        let sk = format!("{}#{}", job_type.sort_key_tag(), job_id.as_str());
        let row = self.kv.get(session_id.as_str(), &sk).await?;
        row.map(|r| serde_json::from_value(r.value).map_err(MfError::from)).transpose()
    }

    /// The row's current optimistic-concurrency version, for callers (the
    /// polling projection's self-heal) that need to re-derive it rather
    /// than thread a raw KV version through the typed model.
    pub async fn row_version(&self, session_id: &SessionId, job_type: JobType, job_id: &JobId) -> MfResult<u64> {
        let sk = format!("{}#{}", job_type.sort_key_tag(), job_id.as_str());
        let row = self
            .kv
            .get(session_id.as_str(), &sk)
            .await?
            .ok_or_else(|| MfError::not_found(format!("job {job_id} not found")))?;
        Ok(row.version)
    }

    pub async fn query_by_type(&self, session_id: &SessionId, job_type: JobType) -> MfResult<Vec<JobRecord>> {
        let prefix = format!("{}#", job_type.sort_key_tag());
        let rows = self.kv.query_prefix(session_id.as_str(), &prefix).await?;
        rows.into_iter().map(|r| serde_json::from_value(r.value).map_err(MfError::from)).collect()
    }

    /// Conditional status transition. Fails (returns `Ok(false)`) if the
    /// job's status has moved on since the caller last read it, or if
    /// `new_status` isn't a legal forward transition from what's on file.
    pub async fn update_status(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        expected_version: u64,
        new_status: JobStatus,
        error: Option<String>,
    ) -> MfResult<bool> {
        let sk = format!("{}#{}", job_type.sort_key_tag(), job_id.as_str());
        let row = self
            .kv
            .get(session_id.as_str(), &sk)
            .await?
            .ok_or_else(|| MfError::not_found(format!("job {job_id} not found")))?;
        let mut record: JobRecord = serde_json::from_value(row.value)?;

        if record.status.is_terminal() || !record.status.can_advance_to(new_status) {
            return Ok(false);
        }
        record.status = new_status;
        record.error = error;
        self.kv
            .compare_and_swap(session_id.as_str(), &sk, expected_version, serde_json::to_value(&record)?)
            .await
    }

    /// Conditional update of the free-text `phase` field, independent of
    /// `status`. Workers use this for sub-state like `"analysis"` or
    /// `"feedback"` that doesn't correspond to a status transition.
    pub async fn set_phase(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        expected_version: u64,
        phase: &str,
    ) -> MfResult<bool> {
        let sk = format!("{}#{}", job_type.sort_key_tag(), job_id.as_str());
        let row = self
            .kv
            .get(session_id.as_str(), &sk)
            .await?
            .ok_or_else(|| MfError::not_found(format!("job {job_id} not found")))?;
        let mut record: JobRecord = serde_json::from_value(row.value)?;
        record.phase = phase.to_string();
        self.kv
            .compare_and_swap(session_id.as_str(), &sk, expected_version, serde_json::to_value(&record)?)
            .await
    }

    /// Conditional read-modify-write of the job's typed payload. Every
    /// worker that writes its job-type-specific fields (triage's
    /// `keep`/`discard`, selection's projections, a publish container id)
    /// goes through this rather than hand-rolling its own CAS loop.
    pub async fn update_payload(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        expected_version: u64,
        mutate: impl FnOnce(&mut JobPayload),
    ) -> MfResult<bool> {
        let sk = format!("{}#{}", job_type.sort_key_tag(), job_id.as_str());
        let row = self
            .kv
            .get(session_id.as_str(), &sk)
            .await?
            .ok_or_else(|| MfError::not_found(format!("job {job_id} not found")))?;
        let mut record: JobRecord = serde_json::from_value(row.value)?;
        mutate(&mut record.payload);
        self.kv
            .compare_and_swap(session_id.as_str(), &sk, expected_version, serde_json::to_value(&record)?)
            .await
    }

    /// Atomically bump a numeric counter field inside the job's payload
    /// (e.g. `processedCount`, `completedCount`).
    pub async fn atomic_increment(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        field: &str,
        delta: i64,
    ) -> MfResult<i64> {
        let sk = format!("{}#{}", job_type.sort_key_tag(), job_id.as_str());
        // The counter lives nested under `payload`; atomic_increment only
        // understands top-level fields, so counters are promoted onto a
        // sibling row keyed by the same sort key with a `#COUNTER` suffix
        // and merged back in by the projection layer on read.
        self.kv.atomic_increment(session_id.as_str(), &format!("{sk}#COUNTER"), field, delta).await
    }

    /// Read a counter field without mutating it. Used by the polling
    /// projection to compare against the job's recorded `totalCount`.
    pub async fn get_counter(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        field: &str,
    ) -> MfResult<i64> {
        let sk = format!("{}#{}#COUNTER", job_type.sort_key_tag(), job_id.as_str());
        let row = self.kv.get(session_id.as_str(), &sk).await?;
        Ok(row.and_then(|r| r.value[field].as_i64()).unwrap_or(0))
    }

    /// Write one element of a per-item list (enhancement's items, a
    /// download bundle list) by index, never touching sibling indexes. Like
    /// the counters, the list lives on a sibling `#ITEMS` row rather than
    /// nested inside `payload`, since `KvStore::update_list_index` only
    /// understands top-level array fields; `Projection` merges it back in
    /// on read.
    pub async fn update_item_index(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        list_field: &str,
        index: usize,
        item: serde_json::Value,
    ) -> MfResult<()> {
        let sk = format!("{}#{}#ITEMS", job_type.sort_key_tag(), job_id.as_str());
        self.kv.update_list_index(session_id.as_str(), &sk, list_field, index, item).await
    }

    /// Read back the full per-item list written via `update_item_index`.
    pub async fn get_items<T: serde::de::DeserializeOwned>(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        list_field: &str,
    ) -> MfResult<Vec<T>> {
        let sk = format!("{}#{}#ITEMS", job_type.sort_key_tag(), job_id.as_str());
        let row = self.kv.get(session_id.as_str(), &sk).await?;
        let items = row.and_then(|r| r.value[list_field].as_array().cloned());
        match items {
            Some(values) => values.into_iter().map(|v| serde_json::from_value(v).map_err(MfError::from)).collect(),
            None => Ok(Vec::new()),
        }
    }

    /// Delete every Job row of `job_type` for this session, including the
    /// `#COUNTER`/`#ITEMS` sibling rows (they share the job row's prefix).
    /// Used by the rewind controller's cascade; best-effort by construction
    /// since `delete_prefix` itself never fails loudly.
    pub async fn delete_all(&self, session_id: &SessionId, job_type: JobType) -> MfResult<usize> {
        let prefix = format!("{}#", job_type.sort_key_tag());
        self.kv.delete_prefix(session_id.as_str(), &prefix).await
    }

    pub async fn put_fingerprint_mapping(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        fingerprint: &str,
        filename: &str,
    ) -> MfResult<bool> {
        let sk = format!("FP#{session_id}#{job_id}#{fingerprint}");
        self.kv
            .put_if_absent(session_id.as_str(), &sk, serde_json::json!({ "filename": filename }), JOB_TTL)
            .await
    }

    pub async fn get_fingerprint_mapping(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        fingerprint: &str,
    ) -> MfResult<Option<String>> {
        let sk = format!("FP#{session_id}#{job_id}#{fingerprint}");
        let row = self.kv.get(session_id.as_str(), &sk).await?;
        Ok(row.and_then(|r| r.value["filename"].as_str().map(str::to_string)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::TriagePayload;
    use mf_kv::MemoryKvStore;

    fn registry() -> JobRegistry {
        JobRegistry::new(Arc::new(MemoryKvStore::new()))
    }

    fn new_triage_record(session_id: &SessionId) -> JobRecord {
        JobRecord::new(
            session_id.clone(),
            JobPayload::Triage(TriagePayload { expected_file_count: 2, ..Default::default() }),
            "uploading",
        )
    }

    #[tokio::test]
    async fn create_job_twice_with_same_idempotency_key_is_a_single_row() {
        let reg = registry();
        let session_id = SessionId::new();
        let first = reg.create_job(new_triage_record(&session_id), Some("init-1")).await.unwrap();
        let second = reg.create_job(new_triage_record(&session_id), Some("init-1")).await.unwrap();
        assert_eq!(first.id, second.id);
        let all = reg.query_by_type(&session_id, JobType::Triage).await.unwrap();
        assert_eq!(all.len(), 1);
    }

    #[tokio::test]
    async fn status_cannot_skip_backward_or_leave_terminal() {
        let reg = registry();
        let session_id = SessionId::new();
        let record = reg.create_job(new_triage_record(&session_id), None).await.unwrap();
        let row = reg.get(&session_id, JobType::Triage, &record.id).await.unwrap().unwrap();
        let _ = row;

        let advanced = reg
            .update_status(&session_id, JobType::Triage, &record.id, 1, JobStatus::Complete, None)
            .await
            .unwrap();
        assert!(advanced);

        let regressed = reg
            .update_status(&session_id, JobType::Triage, &record.id, 2, JobStatus::Processing, None)
            .await
            .unwrap();
        assert!(!regressed);
    }

    #[tokio::test]
    async fn fingerprint_mapping_is_write_once() {
        let reg = registry();
        let session_id = SessionId::new();
        let job_id = JobId::new(JobType::Triage);
        assert!(reg.put_fingerprint_mapping(&session_id, &job_id, "abc123", "a.jpg").await.unwrap());
        assert!(!reg.put_fingerprint_mapping(&session_id, &job_id, "abc123", "b.jpg").await.unwrap());
        assert_eq!(
            reg.get_fingerprint_mapping(&session_id, &job_id, "abc123").await.unwrap(),
            Some("a.jpg".to_string())
        );
    }
}
