use std::sync::Arc;

use mf_auth::TokenVerifier;
use mf_dispatch::Dispatcher;
use mf_registry::{FileResultRegistry, JobRegistry, SessionRegistry};
use mf_rewind::RewindController;
use mf_store::{MultipartBroker, SignedUrlStore};

/// Everything a handler needs, threaded through as Axum shared state.
/// Assembled once at startup by `mediaforge-gateway`; nothing in here is
/// per-request.
#[derive(Clone)]
pub struct AppState {
    pub jobs: JobRegistry,
    pub sessions: SessionRegistry,
    pub files: FileResultRegistry,
    pub dispatcher: Arc<Dispatcher>,
    pub rewind: Arc<RewindController>,
    pub store: Arc<dyn SignedUrlStore>,
    pub multipart: Arc<MultipartBroker>,
    pub verifier: Arc<dyn TokenVerifier>,
    /// The edge-injected shared secret this deployment expects. `None`
    /// means it was never configured, which the secret-check middleware
    /// treats as fail-closed (every request rejected) rather than as
    /// "no check required".
    pub shared_secret: Option<String>,
    pub commit_hash: String,
    pub build_time: String,
}

impl AppState {
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        jobs: JobRegistry,
        sessions: SessionRegistry,
        files: FileResultRegistry,
        dispatcher: Arc<Dispatcher>,
        rewind: Arc<RewindController>,
        store: Arc<dyn SignedUrlStore>,
        multipart: Arc<MultipartBroker>,
        verifier: Arc<dyn TokenVerifier>,
        shared_secret: Option<String>,
        commit_hash: String,
        build_time: String,
    ) -> Self {
        Self { jobs, sessions, files, dispatcher, rewind, store, multipart, verifier, shared_secret, commit_hash, build_time }
    }
}
