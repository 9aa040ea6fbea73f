//! mf-core: framework-agnostic core for the MediaForge orchestration core.
//!
//! Provides the identifiers, structured error taxonomy, request context, and
//! env-keyed configuration shared by every other `mf-*` crate. Nothing in
//! here talks to the KV store, object store, or HTTP layer directly.

pub mod config;
pub mod ctx;
pub mod error;
pub mod ids;
pub mod time;

pub use config::MfConfig;
pub use ctx::RequestCtx;
pub use error::{ErrorKind, MfError, MfResult};
pub use ids::{JobId, JobType, SessionId};
