use mf_core::{JobId, JobType, MfResult, SessionId};
use mf_registry::model::JobStatus;
use mf_registry::JobRegistry;
use tracing::warn;

use crate::coordinator::SharedCoordinator;
use crate::invoker::SharedInvoker;

/// Hands a freshly created Job off to whichever backend executes its kind
/// of work, and guarantees the Job record never sits behind a dispatch that
/// silently failed: if the coordinator/invoker call errors, the job is
/// rewritten to `error` with a client-safe message before the caller's
/// error propagates.
pub struct Dispatcher {
    jobs: JobRegistry,
    coordinator: SharedCoordinator,
    invoker: SharedInvoker,
}

impl Dispatcher {
    pub fn new(jobs: JobRegistry, coordinator: SharedCoordinator, invoker: SharedInvoker) -> Self {
        Self { jobs, coordinator, invoker }
    }

    /// Start a multi-stage pipeline (triage, selection, enhancement,
    /// publish) for a job that has already been written to the registry in
    /// `Pending` status.
    pub async fn dispatch_pipeline(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        row_version: u64,
        input: serde_json::Value,
    ) -> MfResult<()> {
        match self.coordinator.start_execution(job_id.as_str(), input).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail_job(session_id, job_type, job_id, row_version, &e).await;
                Err(e)
            }
        }
    }

    /// Fire a single-stage worker (download, description, an enhancement
    /// feedback round) for a job already written to the registry.
    pub async fn dispatch_worker(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        row_version: u64,
        event: serde_json::Value,
    ) -> MfResult<()> {
        match self.invoker.invoke(job_id.as_str(), event).await {
            Ok(()) => Ok(()),
            Err(e) => {
                self.fail_job(session_id, job_type, job_id, row_version, &e).await;
                Err(e)
            }
        }
    }

    async fn fail_job(
        &self,
        session_id: &SessionId,
        job_type: JobType,
        job_id: &JobId,
        row_version: u64,
        cause: &mf_core::MfError,
    ) {
        let result = self
            .jobs
            .update_status(
                session_id,
                job_type,
                job_id,
                row_version,
                JobStatus::Error,
                Some(cause.client_message().to_string()),
            )
            .await;
        if let Err(e) = result {
            warn!(job_id = %job_id, error = %e, "failed to mark job errored after a dispatch failure");
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::coordinator::{FailingCoordinator, InProcessCoordinator};
    use crate::invoker::{FailingInvoker, InProcessInvoker};
    use mf_registry::model::{JobPayload, JobRecord, TriagePayload};
    use mf_kv::MemoryKvStore;
    use std::sync::Arc;

    fn new_triage_job(session_id: &SessionId) -> JobRecord {
        JobRecord::new(
            session_id.clone(),
            JobPayload::Triage(TriagePayload { expected_file_count: 1, ..Default::default() }),
            "uploading",
        )
    }

    #[tokio::test]
    async fn dispatch_pipeline_twice_with_same_job_id_runs_once() {
        let jobs = JobRegistry::new(Arc::new(MemoryKvStore::new()));
        let session_id = SessionId::new();
        let record = jobs.create_job(new_triage_job(&session_id), None).await.unwrap();
        let version = jobs.row_version(&session_id, JobType::Triage, &record.id).await.unwrap();

        let coordinator = Arc::new(InProcessCoordinator::new());
        let dispatcher = Dispatcher::new(jobs, coordinator.clone(), Arc::new(InProcessInvoker::new()));

        dispatcher
            .dispatch_pipeline(&session_id, JobType::Triage, &record.id, version, serde_json::json!({}))
            .await
            .unwrap();
        dispatcher
            .dispatch_pipeline(&session_id, JobType::Triage, &record.id, version, serde_json::json!({}))
            .await
            .unwrap();

        assert_eq!(coordinator.execution_count(), 1);
    }

    #[tokio::test]
    async fn failed_dispatch_transitions_job_to_error() {
        let jobs = JobRegistry::new(Arc::new(MemoryKvStore::new()));
        let session_id = SessionId::new();
        let record = jobs.create_job(new_triage_job(&session_id), None).await.unwrap();
        let version = jobs.row_version(&session_id, JobType::Triage, &record.id).await.unwrap();

        let dispatcher = Dispatcher::new(jobs, Arc::new(FailingCoordinator), Arc::new(InProcessInvoker::new()));

        let err = dispatcher
            .dispatch_pipeline(&session_id, JobType::Triage, &record.id, version, serde_json::json!({}))
            .await;
        assert!(err.is_err());

        let updated = dispatcher.jobs.get(&session_id, JobType::Triage, &record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Error);
        assert!(updated.error.is_some());
    }

    #[tokio::test]
    async fn failed_worker_invocation_transitions_job_to_error() {
        let jobs = JobRegistry::new(Arc::new(MemoryKvStore::new()));
        let session_id = SessionId::new();
        let record = jobs.create_job(new_triage_job(&session_id), None).await.unwrap();
        let version = jobs.row_version(&session_id, JobType::Triage, &record.id).await.unwrap();

        let dispatcher = Dispatcher::new(jobs, Arc::new(InProcessCoordinator::new()), Arc::new(FailingInvoker));

        let err = dispatcher
            .dispatch_worker(&session_id, JobType::Triage, &record.id, version, serde_json::json!({}))
            .await;
        assert!(err.is_err());

        let updated = dispatcher.jobs.get(&session_id, JobType::Triage, &record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Error);
    }
}
