use std::sync::Arc;

use async_trait::async_trait;
use mf_core::{JobId, JobType, MfError, MfResult, SessionId};
use mf_dispatch::PipelineCoordinator;
use mf_registry::model::{EnhancementItem, EnhancementPayload, JobPayload};
use mf_workers::{EnhancementWorker, MediaItem, PublishWorker, SelectionWorker};
use tokio::sync::Semaphore;
use tracing::{error, warn};

use crate::services::Services;

/// Caps how many enhancement items run concurrently per job. Vendor calls are
/// the expensive part of this fan-out; unbounded `tokio::spawn` would let a
/// single large selection flood the enhancement vendor all at once.
const ENHANCEMENT_FANOUT_CONCURRENCY: usize = 10;

#[derive(serde::Deserialize)]
#[serde(rename_all = "camelCase")]
struct MediaItemInput {
    key: String,
    is_video: bool,
}

fn parse_session_id(input: &serde_json::Value) -> MfResult<SessionId> {
    let raw = input.get("sessionId").and_then(|v| v.as_str()).ok_or_else(|| MfError::dispatch("dispatch payload missing sessionId"))?;
    SessionId::parse(raw).ok_or_else(|| MfError::dispatch("dispatch payload carried a malformed sessionId"))
}

/// Starts the multi-stage pipelines (triage, selection, enhancement,
/// publish) in-process via `tokio::spawn`, the local-dev stand-in for a
/// real step-function-style orchestrator. Triage itself has no pipeline
/// step to start at init time — analysis only runs once file ingest has
/// reached its expected count or the caller explicitly finalizes, both of
/// which arrive through the `WorkerInvoker` side instead.
pub struct RealCoordinator {
    services: Arc<Services>,
}

impl RealCoordinator {
    pub fn new(services: Arc<Services>) -> Self {
        Self { services }
    }

    async fn start_selection(&self, session_id: SessionId, job_id: JobId, input: serde_json::Value) -> MfResult<()> {
        let triage_job_id = input
            .get("triageJobId")
            .and_then(|v| v.as_str())
            .map(JobId::from)
            .ok_or_else(|| MfError::dispatch("selection dispatch payload missing triageJobId"))?;

        let worker = SelectionWorker::new(
            self.services.jobs.clone(),
            self.services.files.clone(),
            self.services.signed_store.clone(),
            self.services.vision_vendor.clone(),
        );
        tokio::spawn(async move {
            if let Err(e) = worker.run(&session_id, &job_id, &triage_job_id).await {
                error!(job_id = %job_id, error = %e, "selection pipeline execution failed");
            }
        });
        Ok(())
    }

    /// Build the enhancement fan-out from the selection job's selected
    /// items and run one `run_item` per item concurrently. The selection
    /// payload only carries `(mediaIndex, filename)`, not the original
    /// object key, so the original key is rebuilt from the session and
    /// filename — a simplification of the real upload layout, documented
    /// as a follow-up rather than round-tripped through the triage job.
    async fn start_enhancement(&self, session_id: SessionId, job_id: JobId, input: serde_json::Value) -> MfResult<()> {
        let selection_job_id = input
            .get("selectionJobId")
            .and_then(|v| v.as_str())
            .map(JobId::from)
            .ok_or_else(|| MfError::dispatch("enhancement dispatch payload missing selectionJobId"))?;

        let Some(selection_record) = self.services.jobs.get(&session_id, JobType::Selection, &selection_job_id).await? else {
            return Err(MfError::dispatch("selection job referenced by enhancement dispatch no longer exists"));
        };
        let selected = match selection_record.payload {
            JobPayload::Selection(p) => p.selected,
            _ => return Err(MfError::dispatch("selectionJobId did not reference a selection job")),
        };

        let items: Vec<EnhancementItem> = selected
            .iter()
            .map(|s| {
                let original_key = format!("{session_id}/{}", s.filename);
                EnhancementItem::new(s.media_index, original_key.clone(), s.filename.clone(), original_key)
            })
            .collect();
        let total_count = items.len() as u32;

        let version = self.services.jobs.row_version(&session_id, JobType::Enhancement, &job_id).await?;
        let items_for_payload = items.clone();
        self.services
            .jobs
            .update_payload(&session_id, JobType::Enhancement, &job_id, version, move |payload| {
                if let JobPayload::Enhancement(p) = payload {
                    *p = EnhancementPayload { total_count, completed_count: 0, items: items_for_payload };
                }
            })
            .await?;

        let semaphore = Arc::new(Semaphore::new(ENHANCEMENT_FANOUT_CONCURRENCY));
        for item in items {
            let worker = EnhancementWorker::new(self.services.jobs.clone(), self.services.object_store.clone(), self.services.enhancement_vendor.clone());
            let session_id = session_id.clone();
            let job_id = job_id.clone();
            let semaphore = semaphore.clone();
            tokio::spawn(async move {
                let _permit = semaphore.acquire_owned().await.expect("semaphore never closed");
                if let Err(e) = worker.run_item(&session_id, &job_id, total_count, item).await {
                    error!(job_id = %job_id, error = %e, "enhancement item processing failed");
                }
            });
        }
        Ok(())
    }

    async fn start_publish(&self, session_id: SessionId, job_id: JobId, input: serde_json::Value) -> MfResult<()> {
        let media_input: Vec<MediaItemInput> =
            serde_json::from_value(input.get("media").cloned().unwrap_or_default()).map_err(|e| MfError::dispatch("malformed media list").with_source(e))?;
        let media: Vec<MediaItem> = media_input.into_iter().map(|m| MediaItem { key: m.key, is_video: m.is_video }).collect();

        let worker = PublishWorker::new(self.services.jobs.clone(), self.services.signed_store.clone(), self.services.publish_vendor.clone());
        tokio::spawn(async move {
            if let Err(e) = worker.run(&session_id, &job_id, media).await {
                error!(job_id = %job_id, error = %e, "publish pipeline execution failed");
            }
        });
        Ok(())
    }
}

#[async_trait]
impl PipelineCoordinator for RealCoordinator {
    async fn start_execution(&self, name: &str, input: serde_json::Value) -> MfResult<()> {
        let job_id = JobId::from(name);
        let session_id = parse_session_id(&input)?;

        match job_id.job_type() {
            Some(JobType::Triage) => {
                warn!(job_id = %job_id, "triage pipeline start is a no-op, analysis is driven by finalize/ingest fan-in");
                Ok(())
            }
            Some(JobType::Selection) => self.start_selection(session_id, job_id, input).await,
            Some(JobType::Enhancement) => self.start_enhancement(session_id, job_id, input).await,
            Some(JobType::Publish) => self.start_publish(session_id, job_id, input).await,
            _ => Err(MfError::dispatch(format!("{job_id} is not a pipeline-dispatched job type"))),
        }
    }
}
