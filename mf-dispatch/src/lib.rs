//! mf-dispatch: turns a "start this job" intent into exactly one background
//! execution. Multi-stage jobs (triage, selection, enhancement, publish) go
//! through a `PipelineCoordinator`; single-stage jobs (download,
//! description, an enhancement feedback round) go through a
//! `WorkerInvoker`. Both are keyed by job id so a retried dispatch never
//! runs the work twice, and a failed hand-off rewrites the just-created Job
//! to `error` before the caller sees the failure.

pub mod coordinator;
pub mod dispatcher;
pub mod invoker;

pub use coordinator::{FailingCoordinator, InProcessCoordinator, PipelineCoordinator, SharedCoordinator};
pub use dispatcher::Dispatcher;
pub use invoker::{FailingInvoker, InProcessInvoker, SharedInvoker, WorkerInvoker};
