use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mf_core::{JobId, JobType, MfError};
use mf_registry::model::{DownloadPayload, JobPayload};
use mf_registry::Projection;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{bind_session, AuthSubject};
use crate::error::ApiResult;
use crate::state::AppState;
use crate::validate::validate_session_id;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StartBody {
    session_id: String,
    label: String,
    keys: Vec<String>,
}

pub async fn start(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Json(body): Json<StartBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;
    if body.keys.is_empty() {
        return Err(MfError::validation("keys must not be empty").into());
    }

    let record = mf_registry::model::JobRecord::new(session_id.clone(), JobPayload::Download(DownloadPayload::default()), "pending");
    let record = state.jobs.create_job(record, None).await?;

    let version = state.jobs.row_version(&session_id, JobType::Download, &record.id).await?;
    state
        .dispatcher
        .dispatch_worker(
            &session_id,
            JobType::Download,
            &record.id,
            version,
            json!({ "sessionId": session_id.as_str(), "label": body.label, "keys": body.keys }),
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
        .load(&session_id, JobType::Download, &job_id)
        .await?
        .ok_or_else(|| MfError::not_found("download job not found"))?;
    Ok(Json(serde_json::to_value(&record)?))
}
