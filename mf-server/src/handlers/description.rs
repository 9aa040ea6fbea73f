use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mf_core::{JobId, JobType, MfError};
use mf_registry::model::{DescriptionPayload, JobPayload};
use mf_registry::Projection;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{bind_session, AuthSubject};
use crate::error::ApiResult;
use crate::state::AppState;
use crate::validate::validate_session_id;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GenerateBody {
    session_id: String,
    post_label: String,
    trip_context: Option<String>,
    thumbnail_keys: Vec<String>,
}

pub async fn generate(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Json(body): Json<GenerateBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;

    let record = mf_registry::model::JobRecord::new(session_id.clone(), JobPayload::Description(DescriptionPayload::default()), "pending");
    let record = state.jobs.create_job(record, None).await?;

    let version = state.jobs.row_version(&session_id, JobType::Description, &record.id).await?;
    state
        .dispatcher
        .dispatch_worker(
            &session_id,
            JobType::Description,
            &record.id,
            version,
            json!({ "sessionId": session_id.as_str(), "action": "generate", "postLabel": body.post_label, "tripContext": body.trip_context, "thumbnailKeys": body.thumbnail_keys }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "id": record.id.as_str() }))))
}

#[derive(Deserialize)]
pub struct ResultsQuery {
    session_id: String,
}

pub async fn results(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Path(id): Path<String>,
    Query(q): Query<ResultsQuery>,
) -> ApiResult<Json<Value>> {
    let session_id = validate_session_id(&q.session_id)?;
    bind_session(&state, &session_id, &subject).await?;
    let job_id = JobId::from(id);

    let projection = Projection::new(&state.jobs);
    let record = projection
        .load(&session_id, JobType::Description, &job_id)
        .await?
        .ok_or_else(|| MfError::not_found("description job not found"))?;
    Ok(Json(serde_json::to_value(&record)?))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackBody {
    session_id: String,
    post_label: String,
    feedback: String,
}

pub async fn feedback(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Path(id): Path<String>,
    Json(body): Json<FeedbackBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;
    let job_id = JobId::from(id);

    let version = state.jobs.row_version(&session_id, JobType::Description, &job_id).await?;
    state
        .dispatcher
        .dispatch_worker(
            &session_id,
            JobType::Description,
            &job_id,
            version,
            json!({ "sessionId": session_id.as_str(), "action": "regenerate", "postLabel": body.post_label, "feedback": body.feedback }),
        )
        .await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "status": "processing" }))))
}
