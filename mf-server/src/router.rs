use axum::routing::{get, post};
use axum::Router;

use crate::handlers::{description, download, enhance, health, media, publish, selection, session, triage, upload};
use crate::middleware::{ensure_request_id, require_shared_secret, trace_layer};
use crate::state::AppState;

/// Builds the full route table and wraps it in request-id / trace /
/// shared-secret layering applied around every route.
pub fn build_router(state: AppState) -> Router<()> {
    let routes = Router::new()
        .route("/api/health", get(health::health))
        .route("/api/upload-url", get(upload::upload_url))
        .route("/api/upload-multipart/init", post(upload::multipart_init))
        .route("/api/upload-multipart/complete", post(upload::multipart_complete))
        .route("/api/upload-multipart/abort", post(upload::multipart_abort))
        .route("/api/triage/init", post(triage::init))
        .route("/api/triage/update-files", post(triage::update_files))
        .route("/api/triage/finalize", post(triage::finalize))
        .route("/api/triage/{id}/results", get(triage::results))
        .route("/api/triage/{id}/confirm", post(triage::confirm))
        .route("/api/selection/start", post(selection::start))
        .route("/api/selection/{id}/results", get(selection::results))
        .route("/api/enhance/start", post(enhance::start))
        .route("/api/enhance/{id}/results", get(enhance::results))
        .route("/api/enhance/{id}/feedback", post(enhance::feedback))
        .route("/api/download/start", post(download::start))
        .route("/api/download/{id}/results", get(download::results))
        .route("/api/description/generate", post(description::generate))
        .route("/api/description/{id}/results", get(description::results))
        .route("/api/description/{id}/feedback", post(description::feedback))
        .route("/api/publish/start", post(publish::start))
        .route("/api/publish/{id}/status", get(publish::status))
        .route("/api/session/invalidate", post(session::invalidate))
        .route("/api/media/thumbnail", get(media::thumbnail))
        .route("/api/media/full", get(media::full));

    routes
        .layer(axum::middleware::from_fn_with_state(state.clone(), require_shared_secret))
        .layer(axum::middleware::from_fn(ensure_request_id))
        .layer(trace_layer())
        .with_state(state)
}
