//! Request-id propagation: echo an inbound `x-request-id` or mint one,
//! and stamp it on both the request (for downstream handlers/tracing)
//! and the response. The shared-secret check guards every route behind
//! a pre-shared edge secret.

use axum::body::Body;
use axum::extract::State;
use axum::http::{HeaderName, HeaderValue, Request, StatusCode};
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde_json::json;
use tower_http::trace::TraceLayer;
use uuid::Uuid;

use crate::state::AppState;

const REQUEST_ID_HEADER: &str = "x-request-id";
const SECRET_HEADER: &str = "x-mediaforge-edge-secret";

pub async fn ensure_request_id(req: Request<Body>, next: Next) -> Response {
    let header_name = HeaderName::from_static(REQUEST_ID_HEADER);
    let mut req = req;
    let request_id = req
        .headers()
        .get(&header_name)
        .and_then(|v| v.to_str().ok())
        .map(str::to_string)
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    if let Ok(v) = HeaderValue::from_str(&request_id) {
        req.headers_mut().insert(header_name.clone(), v);
    }

    let mut res = next.run(req).await;
    if res.headers().get(&header_name).is_none() {
        if let Ok(v) = HeaderValue::from_str(&request_id) {
            res.headers_mut().insert(header_name, v);
        }
    }
    res
}

/// Fail-closed shared-secret check: every request must carry the header
/// matching the configured secret. An unconfigured secret rejects every
/// request rather than skipping the check.
pub async fn require_shared_secret(State(state): State<AppState>, req: Request<Body>, next: Next) -> Response {
    let configured = match &state.shared_secret {
        Some(s) if !s.is_empty() => s,
        _ => return (StatusCode::FORBIDDEN, Json(json!({"error": "edge secret not configured"}))).into_response(),
    };
    let presented = req.headers().get(SECRET_HEADER).and_then(|v| v.to_str().ok());
    if presented != Some(configured.as_str()) {
        return (StatusCode::FORBIDDEN, Json(json!({"error": "access denied"}))).into_response();
    }
    next.run(req).await
}

pub fn trace_layer() -> TraceLayer<tower_http::classify::SharedClassifier<tower_http::classify::ServerErrorsAsFailures>> {
    TraceLayer::new_for_http()
}
