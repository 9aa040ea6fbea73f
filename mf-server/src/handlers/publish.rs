use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mf_core::{JobId, JobType, MfError};
use mf_registry::model::{JobPayload, PublishPayload};
use mf_registry::Projection;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{bind_session, AuthSubject};
use crate::error::ApiResult;
use crate::state::AppState;
use crate::validate::validate_session_id;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MediaItemDto {
    key: String,
    is_video: bool,
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    session_id: String,
    media: Vec<MediaItemDto>,
}

pub async fn start(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Json(body): Json<StartBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;
    if body.media.is_empty() {
        return Err(MfError::validation("media must not be empty").into());
    }

    let record = mf_registry::model::JobRecord::new(session_id.clone(), JobPayload::Publish(PublishPayload::default()), "creating_containers");
    let record = state.jobs.create_job(record, None).await?;

    let media: Vec<Value> = body.media.iter().map(|m| json!({ "key": m.key, "isVideo": m.is_video })).collect();
    let version = state.jobs.row_version(&session_id, JobType::Publish, &record.id).await?;
    state
        .dispatcher
        .dispatch_pipeline(
            &session_id,
            JobType::Publish,
            &record.id,
            version,
            json!({ "sessionId": session_id.as_str(), "media": media }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "id": record.id.as_str() }))))
}

#[derive(Deserialize)]
pub struct StatusQuery {
    session_id: String,
}

pub async fn status(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Path(id): Path<String>,
    Query(q): Query<StatusQuery>,
) -> ApiResult<Json<Value>> {
    let session_id = validate_session_id(&q.session_id)?;
    bind_session(&state, &session_id, &subject).await?;
    let job_id = JobId::from(id);

    let projection = Projection::new(&state.jobs);
    let record = projection
        .load(&session_id, JobType::Publish, &job_id)
        .await?
        .ok_or_else(|| MfError::not_found("publish job not found"))?;
    Ok(Json(serde_json::to_value(&record)?))
}
