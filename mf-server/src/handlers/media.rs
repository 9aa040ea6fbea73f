//! Unauthenticated read routes: thumbnails are served straight from the
//! object store and a "full" request just hands back a presigned GET.
//! These skip session-owner binding since they're addressed by object
//! key, not session id.

use axum::body::Body;
use axum::extract::{Query, State};
use axum::http::header;
use axum::response::{IntoResponse, Response};
use axum::Json;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;

const FULL_URL_TTL_SECS: u64 = 3600;

#[derive(Deserialize)]
pub struct KeyQuery {
    key: String,
}

pub async fn thumbnail(State(state): State<AppState>, Query(q): Query<KeyQuery>) -> ApiResult<Response> {
    let object = state.store.get(&q.key, None).await?;
    let content_type = object.content_type.clone().unwrap_or_else(|| "application/octet-stream".to_string());
    let body = Body::from_stream(object.stream);
    Ok(([(header::CONTENT_TYPE, content_type)], body).into_response())
}

pub async fn full(State(state): State<AppState>, Query(q): Query<KeyQuery>) -> ApiResult<Json<Value>> {
    let url = state.store.sign_get(&q.key, FULL_URL_TTL_SECS).await?;
    Ok(Json(json!({ "url": url })))
}
