mod coordinator;
mod invoker;
mod services;

use std::sync::Arc;

use anyhow::Result;
use mf_auth::{InsecureTestVerifier, JwtVerifier, TokenVerifier};
use mf_core::config::MfConfig;
use mf_dispatch::Dispatcher;
use mf_kv::MemoryKvStore;
use mf_registry::{FileResultRegistry, JobRegistry, SessionRegistry};
use mf_rewind::RewindController;
use mf_store::{MemoryObjectStore, MultipartBroker, MultipartStore, ObjectStore, SignedUrlStore};
use mf_workers::vendor::fakes::{FakeCaptionVendor, FakePublishVendor, FakeVisionVendor};
use mf_workers::FakeEnhancementVendor;

use coordinator::RealCoordinator;
use invoker::RealInvoker;
use services::Services;

fn init_tracing() {
    use tracing_subscriber::{fmt, EnvFilter};

    fmt()
        .json()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with_target(true)
        .init();
}

fn build_verifier(config: &MfConfig) -> Arc<dyn TokenVerifier> {
    match config.get("auth.hmac_secret") {
        Some(secret) if !secret.is_empty() => Arc::new(JwtVerifier::new(secret.as_bytes())),
        _ => {
            tracing::warn!("auth.hmac_secret not configured, falling back to the insecure dev-mode token verifier");
            Arc::new(InsecureTestVerifier)
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();
    let config = MfConfig::from_env();

    let kv = Arc::new(MemoryKvStore::new());
    let jobs = JobRegistry::new(kv.clone());
    let sessions = SessionRegistry::new(kv.clone());
    let files = FileResultRegistry::new(kv);

    let object_store = Arc::new(MemoryObjectStore::new());
    let signed_store: Arc<dyn SignedUrlStore> = object_store.clone();
    let multipart_store: Arc<dyn MultipartStore> = object_store.clone();
    let plain_store: Arc<dyn ObjectStore> = object_store;

    let services = Arc::new(Services {
        jobs: jobs.clone(),
        files: files.clone(),
        signed_store: signed_store.clone(),
        object_store: plain_store.clone(),
        vision_vendor: Arc::new(FakeVisionVendor),
        caption_vendor: Arc::new(FakeCaptionVendor),
        publish_vendor: Arc::new(FakePublishVendor),
        enhancement_vendor: Arc::new(FakeEnhancementVendor),
    });

    let dispatcher = Arc::new(Dispatcher::new(jobs.clone(), Arc::new(RealCoordinator::new(services.clone())), Arc::new(RealInvoker::new(services))));
    let rewind = Arc::new(RewindController::new(jobs.clone(), plain_store));
    let multipart = Arc::new(MultipartBroker::new(multipart_store));
    let verifier = build_verifier(&config);

    let shared_secret = config.get("edge.secret").map(str::to_string);
    if shared_secret.is_none() {
        tracing::warn!("edge.secret not configured, every request will be rejected fail-closed");
    }

    let commit_hash = config.get_or("build.commit", "unknown");
    let build_time = config.get_or("build.time", "unknown");

    let state = mf_server::AppState::new(jobs, sessions, files, dispatcher, rewind, signed_store, multipart, verifier, shared_secret, commit_hash, build_time);
    let router = mf_server::build_router(state);

    let host = config.get_or("http.host", "0.0.0.0");
    let port = config.get_or("http.port", "8080");
    let addr = format!("{host}:{port}");

    tracing::info!(%addr, "mediaforge-gateway listening");
    let listener = tokio::net::TcpListener::bind(&addr).await?;
    axum::serve(listener, router).await?;

    Ok(())
}
