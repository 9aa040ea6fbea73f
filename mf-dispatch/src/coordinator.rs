use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use mf_core::MfResult;
use parking_lot::Mutex;

/// Hands a multi-stage job (triage, selection, enhancement, publish) off to
/// whatever runs its state machine to completion — a step-function-style
/// orchestrator in production, an in-process executor in tests.
///
/// `name` is the job id: the coordinator is expected to treat it as an
/// idempotency key, so starting the same execution twice is a no-op rather
/// than a second, competing run.
#[async_trait]
pub trait PipelineCoordinator: Send + Sync {
    async fn start_execution(&self, name: &str, input: serde_json::Value) -> MfResult<()>;
}

/// In-process fake for tests and local dev. Tracks which names have already
/// been started so a retried dispatch with the same job id is silently
/// absorbed instead of spawning a second execution.
#[derive(Default)]
pub struct InProcessCoordinator {
    started: Mutex<HashSet<String>>,
    inputs: Mutex<Vec<(String, serde_json::Value)>>,
}

impl InProcessCoordinator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn started_names(&self) -> Vec<String> {
        self.started.lock().iter().cloned().collect()
    }

    pub fn execution_count(&self) -> usize {
        self.inputs.lock().len()
    }
}

#[async_trait]
impl PipelineCoordinator for InProcessCoordinator {
    async fn start_execution(&self, name: &str, input: serde_json::Value) -> MfResult<()> {
        let mut started = self.started.lock();
        if !started.insert(name.to_string()) {
            return Ok(());
        }
        drop(started);
        self.inputs.lock().push((name.to_string(), input));
        Ok(())
    }
}

/// Coordinator fake that always fails, for exercising dispatch-failure
/// handling without a real orchestrator.
pub struct FailingCoordinator;

#[async_trait]
impl PipelineCoordinator for FailingCoordinator {
    async fn start_execution(&self, _name: &str, _input: serde_json::Value) -> MfResult<()> {
        Err(mf_core::MfError::dispatch("could not start pipeline execution"))
    }
}

pub type SharedCoordinator = Arc<dyn PipelineCoordinator>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_name_started_twice_is_one_execution() {
        let coordinator = InProcessCoordinator::new();
        coordinator.start_execution("triage-abc", serde_json::json!({"a": 1})).await.unwrap();
        coordinator.start_execution("triage-abc", serde_json::json!({"a": 2})).await.unwrap();
        assert_eq!(coordinator.execution_count(), 1);
        assert_eq!(coordinator.started_names(), vec!["triage-abc".to_string()]);
    }
}
