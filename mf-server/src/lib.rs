//! mf-server: the Axum gateway. The only component in the workspace that
//! speaks HTTP — every other crate communicates via the KV store, the
//! object store, or an invoker event. Handlers validate, bind the session
//! to its owning subject, write or read Job rows through `mf-registry`,
//! and hand off background work through `mf-dispatch`; they never import
//! `mf-workers` or `mf-ingest` directly, since what actually executes a
//! dispatched job is an external Coordinator/Invoker the gateway only
//! talks to through those two traits.

pub mod auth;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod state;
pub mod validate;

pub use error::ApiError;
pub use router::build_router;
pub use state::AppState;
