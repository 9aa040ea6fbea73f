use std::collections::HashSet;
use std::sync::Arc;

use async_trait::async_trait;
use mf_core::MfResult;
use parking_lot::Mutex;

/// Fire-and-forget hand-off for single-stage jobs (download, description,
/// an enhancement feedback round) that don't need a multi-step state
/// machine — just one worker invocation.
///
/// Callers key `worker_name` by job id so a retried dispatch is idempotent:
/// the worker has already been invoked for that id, so a second call is a
/// no-op.
#[async_trait]
pub trait WorkerInvoker: Send + Sync {
    async fn invoke(&self, worker_name: &str, event: serde_json::Value) -> MfResult<()>;
}

/// In-process fake for tests and local dev. Tracks which worker names have
/// already been invoked so a retried dispatch never runs the worker twice.
#[derive(Default)]
pub struct InProcessInvoker {
    invoked: Mutex<HashSet<String>>,
    events: Mutex<Vec<(String, serde_json::Value)>>,
}

impl InProcessInvoker {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn invoked_names(&self) -> Vec<String> {
        self.invoked.lock().iter().cloned().collect()
    }

    pub fn invocation_count(&self) -> usize {
        self.events.lock().len()
    }
}

#[async_trait]
impl WorkerInvoker for InProcessInvoker {
    async fn invoke(&self, worker_name: &str, event: serde_json::Value) -> MfResult<()> {
        let mut invoked = self.invoked.lock();
        if !invoked.insert(worker_name.to_string()) {
            return Ok(());
        }
        drop(invoked);
        self.events.lock().push((worker_name.to_string(), event));
        Ok(())
    }
}

/// Invoker fake that always fails, for exercising dispatch-failure handling.
pub struct FailingInvoker;

#[async_trait]
impl WorkerInvoker for FailingInvoker {
    async fn invoke(&self, _worker_name: &str, _event: serde_json::Value) -> MfResult<()> {
        Err(mf_core::MfError::dispatch("could not invoke worker"))
    }
}

pub type SharedInvoker = Arc<dyn WorkerInvoker>;

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn same_worker_name_invoked_twice_is_one_invocation() {
        let invoker = InProcessInvoker::new();
        invoker.invoke("dl-abc", serde_json::json!({"a": 1})).await.unwrap();
        invoker.invoke("dl-abc", serde_json::json!({"a": 2})).await.unwrap();
        assert_eq!(invoker.invocation_count(), 1);
        assert_eq!(invoker.invoked_names(), vec!["dl-abc".to_string()]);
    }
}
