use std::sync::Arc;

use async_trait::async_trait;
use mf_core::{JobId, JobType, MfError, MfResult, SessionId};
use mf_dispatch::WorkerInvoker;
use mf_registry::model::JobPayload;
use mf_workers::{DescriptionWorker, DownloadWorker, EnhancementWorker, TriageWorker};
use tracing::error;

use crate::services::Services;

fn parse_session_id(event: &serde_json::Value) -> MfResult<SessionId> {
    let raw = event.get("sessionId").and_then(|v| v.as_str()).ok_or_else(|| MfError::dispatch("dispatch payload missing sessionId"))?;
    SessionId::parse(raw).ok_or_else(|| MfError::dispatch("dispatch payload carried a malformed sessionId"))
}

/// Fires the single-stage workers (triage finalize, download, description,
/// an enhancement feedback round) in-process, the same local-dev stand-in
/// `RealCoordinator` uses for pipelines.
pub struct RealInvoker {
    services: Arc<Services>,
}

impl RealInvoker {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    async fn invoke_triage(&self, session_id: SessionId, job_id: JobId) -> MfResult<()> {
        let worker = TriageWorker::new(
            self.services.jobs.clone(),
            self.services.files.clone(),
            self.services.signed_store.clone(),
            self.services.vision_vendor.clone(),
        );
        worker.run_analysis(&session_id, &job_id).await
    }

    async fn invoke_download(&self, session_id: SessionId, job_id: JobId, event: serde_json::Value) -> MfResult<()> {
        let label = event.get("label").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let keys: Vec<String> = event
            .get("keys")
            .and_then(|v| v.as_array())
            .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
            .unwrap_or_default();

        let worker = DownloadWorker::new(self.services.jobs.clone(), self.services.signed_store.clone());
        worker.run(&session_id, &job_id, &label, &keys).await
    }

    async fn invoke_description(&self, session_id: SessionId, job_id: JobId, event: serde_json::Value) -> MfResult<()> {
        let action = event.get("action").and_then(|v| v.as_str()).unwrap_or_default();
        let post_label = event.get("postLabel").and_then(|v| v.as_str()).unwrap_or_default().to_string();
        let worker = DescriptionWorker::new(self.services.jobs.clone(), self.services.signed_store.clone(), self.services.caption_vendor.clone());

        match action {
            "generate" => {
                let trip_context = event.get("tripContext").and_then(|v| v.as_str()).map(str::to_string);
                let thumbnail_keys: Vec<String> = event
                    .get("thumbnailKeys")
                    .and_then(|v| v.as_array())
                    .map(|arr| arr.iter().filter_map(|v| v.as_str().map(str::to_string)).collect())
                    .unwrap_or_default();
                worker.generate(&session_id, &job_id, &post_label, trip_context, &thumbnail_keys).await
            }
            "regenerate" => {
                let feedback = event.get("feedback").and_then(|v| v.as_str()).unwrap_or_default().to_string();
                worker.regenerate(&session_id, &job_id, &post_label, feedback).await
            }
            other => Err(MfError::dispatch(format!("unknown description action '{other}'"))),
        }
    }

    async fn invoke_enhancement_feedback(&self, session_id: SessionId, job_id: JobId, event: serde_json::Value) -> MfResult<()> {
        let action = event.get("action").and_then(|v| v.as_str()).unwrap_or_default();
        if action != "feedback" {
            return Err(MfError::dispatch(format!("unknown enhancement worker action '{action}'")));
        }
        let item_index = event.get("itemIndex").and_then(|v| v.as_u64()).ok_or_else(|| MfError::dispatch("enhancement feedback missing itemIndex"))? as usize;
        let feedback = event.get("feedback").and_then(|v| v.as_str()).unwrap_or_default().to_string();

        let Some(record) = self.services.jobs.get(&session_id, JobType::Enhancement, &job_id).await? else {
            return Ok(());
        };
        let item = match record.payload {
            JobPayload::Enhancement(p) => p.items.into_iter().find(|i| i.index == item_index),
            _ => None,
        };
        let Some(item) = item else {
            return Err(MfError::not_found("enhancement item index out of range"));
        };

        let worker = EnhancementWorker::new(self.services.jobs.clone(), self.services.object_store.clone(), self.services.enhancement_vendor.clone());
        worker.apply_feedback(&session_id, &job_id, item, feedback).await
    }
}

#[async_trait]
impl WorkerInvoker for RealInvoker {
    async fn invoke(&self, worker_name: &str, event: serde_json::Value) -> MfResult<()> {
        let job_id = JobId::from(worker_name);
        let session_id = parse_session_id(&event)?;

        let result = match job_id.job_type() {
            Some(JobType::Triage) => self.invoke_triage(session_id, job_id.clone()).await,
            Some(JobType::Download) => self.invoke_download(session_id, job_id.clone(), event).await,
            Some(JobType::Description) => self.invoke_description(session_id, job_id.clone(), event).await,
            Some(JobType::Enhancement) => self.invoke_enhancement_feedback(session_id, job_id.clone(), event).await,
            _ => Err(MfError::dispatch(format!("{job_id} is not a worker-dispatched job type"))),
        };
        if let Err(ref e) = result {
            error!(job_id = %job_id, error = %e, "worker invocation failed");
        }
        result
    }
}
