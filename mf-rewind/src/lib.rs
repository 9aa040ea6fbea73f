//! The Rewind Controller: cascading invalidation of downstream job state
//! triggered by `POST /api/session/invalidate {fromStep}`. Job-record
//! deletion happens inline so a subsequent poll 404s immediately; deletion
//! of the larger object-store artifacts is best-effort and never blocks
//! the HTTP response — failures are logged and left to the 24-hour TTL.

use std::sync::Arc;

use mf_core::{JobType, MfResult, SessionId};
use mf_registry::JobRegistry;
use mf_store::ObjectStore;
use tracing::warn;

/// The six stages a rewind can target, in their fixed cascade order.
/// `Grouping` has no server-side Job of its own — scene grouping is part of
/// the Selection job's payload — but it still occupies a slot in the
/// ordering so `fromStep` can reference it and so the response lists it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RewindStep {
    Selection,
    Enhancement,
    Grouping,
    Download,
    Description,
    Publish,
}

const STEP_ORDER: [RewindStep; 6] = [
    RewindStep::Selection,
    RewindStep::Enhancement,
    RewindStep::Grouping,
    RewindStep::Download,
    RewindStep::Description,
    RewindStep::Publish,
];

impl RewindStep {
    pub fn parse(name: &str) -> Option<Self> {
        match name {
            "selection" => Some(Self::Selection),
            "enhancement" => Some(Self::Enhancement),
            "grouping" => Some(Self::Grouping),
            "download" => Some(Self::Download),
            "description" => Some(Self::Description),
            "publish" => Some(Self::Publish),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Selection => "selection",
            Self::Enhancement => "enhancement",
            Self::Grouping => "grouping",
            Self::Download => "download",
            Self::Description => "description",
            Self::Publish => "publish",
        }
    }

    fn job_type(self) -> Option<JobType> {
        match self {
            Self::Selection => Some(JobType::Selection),
            Self::Enhancement => Some(JobType::Enhancement),
            Self::Grouping => None,
            Self::Download => Some(JobType::Download),
            Self::Description => Some(JobType::Description),
            Self::Publish => Some(JobType::Publish),
        }
    }
}

pub struct RewindController {
    jobs: JobRegistry,
    store: Arc<dyn ObjectStore>,
}

impl RewindController {
    pub fn new(jobs: JobRegistry, store: Arc<dyn ObjectStore>) -> Self {
        Self { jobs, store }
    }

    /// Cascade-invalidate every step at or after `from_step`. Returns the
    /// `"{step}:{jobId}"` entries for the response body, in cascade order.
    /// `Grouping` always reports as `"grouping:client-only"` since it has
    /// no Job record.
    pub async fn invalidate(&self, session_id: &SessionId, from_step: RewindStep) -> MfResult<Vec<String>> {
        let start = STEP_ORDER.iter().position(|s| *s == from_step).unwrap_or(0);
        let mut invalidated = Vec::new();

        for step in &STEP_ORDER[start..] {
            match step.job_type() {
                None => invalidated.push(format!("{}:client-only", step.name())),
                Some(job_type) => {
                    let records = self.jobs.query_by_type(session_id, job_type).await?;
                    for record in &records {
                        invalidated.push(format!("{}:{}", step.name(), record.id));
                    }
                    if let Err(e) = self.jobs.delete_all(session_id, job_type).await {
                        warn!(session_id = %session_id, step = step.name(), error = %e, "job record cascade delete failed");
                    }
                }
            }
        }

        self.spawn_artifact_cleanup(session_id, from_step);
        Ok(invalidated)
    }

    /// Object-store cleanup runs detached from the request: it never gates
    /// the 200 response, and any failure is just logged, left for the
    /// 24-hour TTL to reclaim.
    fn spawn_artifact_cleanup(&self, session_id: &SessionId, from_step: RewindStep) {
        let start = STEP_ORDER.iter().position(|s| *s == from_step).unwrap_or(0);
        let steps: Vec<RewindStep> = STEP_ORDER[start..].to_vec();
        let store = self.store.clone();
        let session_id = session_id.clone();
        tokio::spawn(async move {
            for step in steps {
                let prefixes: &[&str] = match step {
                    RewindStep::Enhancement => &["enhanced/", "thumbnails/"],
                    RewindStep::Download => &["downloads/"],
                    _ => &[],
                };
                for suffix in prefixes {
                    let prefix = format!("{session_id}/{suffix}");
                    Self::delete_prefix_best_effort(store.as_ref(), &prefix).await;
                }
            }
        });
    }

    async fn delete_prefix_best_effort(store: &dyn ObjectStore, prefix: &str) {
        let heads = match store.list_prefix(prefix).await {
            Ok(heads) => heads,
            Err(e) => {
                warn!(prefix, error = %e, "rewind artifact list failed, leaving to TTL");
                return;
            }
        };
        for head in heads {
            if let Err(e) = store.delete(&head.key).await {
                warn!(key = %head.key, error = %e, "rewind artifact delete failed, leaving to TTL");
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mf_kv::MemoryKvStore;
    use mf_registry::model::{JobPayload, JobRecord, SelectionPayload};
    use mf_store::MemoryObjectStore;

    #[tokio::test]
    async fn cascade_from_enhancement_deletes_downstream_jobs_but_not_selection() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv);
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        let session_id = SessionId::new();

        let selection = jobs
            .create_job(JobRecord::new(session_id.clone(), JobPayload::Selection(SelectionPayload::default()), "pending"), None)
            .await
            .unwrap();
        let enhancement = jobs
            .create_job(
                JobRecord::new(session_id.clone(), JobPayload::Enhancement(Default::default()), "pending"),
                None,
            )
            .await
            .unwrap();

        let controller = RewindController::new(jobs.clone(), store);
        let invalidated = controller.invalidate(&session_id, RewindStep::Enhancement).await.unwrap();

        assert!(invalidated.contains(&format!("enhancement:{}", enhancement.id)));
        assert!(invalidated.contains(&"grouping:client-only".to_string()));

        let still_there = jobs.get(&session_id, JobType::Selection, &selection.id).await.unwrap();
        assert!(still_there.is_some());
        let gone = jobs.get(&session_id, JobType::Enhancement, &enhancement.id).await.unwrap();
        assert!(gone.is_none());
    }

    #[tokio::test]
    async fn full_cascade_reports_grouping_as_client_only_when_nothing_else_exists() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv);
        let store: Arc<dyn ObjectStore> = Arc::new(MemoryObjectStore::default());
        let session_id = SessionId::new();

        let controller = RewindController::new(jobs, store);
        let invalidated = controller.invalidate(&session_id, RewindStep::Selection).await.unwrap();
        assert_eq!(invalidated, vec!["grouping:client-only".to_string()]);
    }
}
