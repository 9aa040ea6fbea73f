use axum::extract::{Query, State};
use axum::Json;
use mf_store::broker::MediaClass;
use mf_store::types::CompletedPart;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::error::ApiResult;
use crate::state::AppState;
use crate::validate::{validate_content_type, validate_filename, validate_session_id};

const UPLOAD_URL_TTL_SECS: u64 = 3600;

#[derive(Deserialize)]
pub struct UploadUrlQuery {
    session_id: String,
    filename: String,
    content_type: String,
}

pub async fn upload_url(State(state): State<AppState>, Query(q): Query<UploadUrlQuery>) -> ApiResult<Json<Value>> {
    let session_id = validate_session_id(&q.session_id)?;
    validate_filename(&q.filename)?;
    validate_content_type(&q.content_type)?;

    let key = format!("{}/{}", session_id.as_str(), q.filename);
    let upload_url = state.store.sign_put(&key, Some(&q.content_type), UPLOAD_URL_TTL_SECS).await?;
    Ok(Json(json!({ "uploadUrl": upload_url, "key": key })))
}

fn media_class_of(content_type: &str) -> MediaClass {
    if content_type.starts_with("video/") {
        MediaClass::Video
    } else {
        MediaClass::Image
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartInitBody {
    session_id: String,
    filename: String,
    content_type: String,
    file_size: u64,
    chunk_size: u64,
}

pub async fn multipart_init(State(state): State<AppState>, Json(body): Json<MultipartInitBody>) -> ApiResult<Json<Value>> {
    let session_id = validate_session_id(&body.session_id)?;
    validate_filename(&body.filename)?;
    validate_content_type(&body.content_type)?;

    let key = format!("{}/{}", session_id.as_str(), body.filename);
    let class = media_class_of(&body.content_type);
    let result = state
        .multipart
        .init(&key, Some(&body.content_type), class, body.file_size, body.chunk_size)
        .await?;
    Ok(Json(json!({
        "uploadId": result.upload_id.as_str(),
        "key": result.key,
        "partUrls": result.part_urls,
    })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CompletedPartDto {
    part_number: u32,
    etag: String,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartCompleteBody {
    session_id: String,
    key: String,
    upload_id: String,
    parts: Vec<CompletedPartDto>,
}

pub async fn multipart_complete(State(state): State<AppState>, Json(body): Json<MultipartCompleteBody>) -> ApiResult<Json<Value>> {
    let session_id = validate_session_id(&body.session_id)?;
    crate::validate::validate_object_key(&session_id, &body.key)?;

    let upload_id = mf_store::types::UploadId(body.upload_id);
    let parts = body.parts.into_iter().map(|p| CompletedPart { part_number: p.part_number, etag: p.etag }).collect();
    state.multipart.complete(&upload_id, parts).await?;
    Ok(Json(json!({ "key": body.key })))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MultipartAbortBody {
    session_id: String,
    upload_id: String,
}

pub async fn multipart_abort(State(state): State<AppState>, Json(body): Json<MultipartAbortBody>) -> ApiResult<Json<Value>> {
    validate_session_id(&body.session_id)?;
    let upload_id = mf_store::types::UploadId(body.upload_id);
    state.multipart.abort(&upload_id).await?;
    Ok(Json(json!({ "status": "aborted" })))
}
