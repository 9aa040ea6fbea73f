use axum::extract::{Path, Query, State};
use axum::http::StatusCode;
use axum::Json;
use mf_core::{JobId, JobType, MfError};
use mf_registry::model::{JobPayload, TriagePayload};
use mf_registry::Projection;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{bind_session, AuthSubject};
use crate::error::ApiResult;
use crate::state::AppState;
use crate::validate::validate_session_id;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageInitBody {
    session_id: String,
    expected_file_count: u32,
}

pub async fn init(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Json(body): Json<TriageInitBody>,
) -> ApiResult<(StatusCode, Json<Value>)> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;
    if body.expected_file_count == 0 {
        return Err(MfError::validation("expectedFileCount must be greater than 0").into());
    }

    let payload = JobPayload::Triage(TriagePayload { expected_file_count: body.expected_file_count, ..Default::default() });
    let record = mf_registry::model::JobRecord::new(session_id.clone(), payload, "uploading");
    let idempotency_key = format!("triage-init:{session_id}");
    let record = state.jobs.create_job(record, Some(&idempotency_key)).await?;

    let version = state.jobs.row_version(&session_id, JobType::Triage, &record.id).await?;
    state
        .dispatcher
        .dispatch_pipeline(&session_id, JobType::Triage, &record.id, version, json!({ "sessionId": session_id.as_str(), "expectedFileCount": body.expected_file_count }))
        .await?;

    Ok((StatusCode::ACCEPTED, Json(json!({ "id": record.id.as_str(), "sessionId": session_id.as_str() }))))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFilesBody {
    session_id: String,
    job_id: String,
    expected_file_count: u32,
}

pub async fn update_files(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Json(body): Json<UpdateFilesBody>,
) -> ApiResult<StatusCode> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;
    if body.expected_file_count == 0 {
        return Err(MfError::validation("expectedFileCount must be greater than 0").into());
    }

    let job_id = JobId::from(body.job_id);
    let version = state.jobs.row_version(&session_id, JobType::Triage, &job_id).await?;
    let new_count = body.expected_file_count;
    state
        .jobs
        .update_payload(&session_id, JobType::Triage, &job_id, version, move |payload| {
            if let JobPayload::Triage(p) = payload {
                p.expected_file_count = new_count;
            }
        })
        .await?;
    Ok(StatusCode::OK)
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FinalizeBody {
    session_id: String,
    job_id: String,
}

pub async fn finalize(State(state): State<AppState>, AuthSubject(subject): AuthSubject, Json(body): Json<FinalizeBody>) -> ApiResult<StatusCode> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;

    let job_id = JobId::from(body.job_id);
    let version = state.jobs.row_version(&session_id, JobType::Triage, &job_id).await?;
    state
        .dispatcher
        .dispatch_worker(&session_id, JobType::Triage, &job_id, version, json!({ "sessionId": session_id.as_str(), "action": "finalize" }))
        .await?;
    Ok(StatusCode::OK)
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
        .load(&session_id, JobType::Triage, &job_id)
        .await?
        .ok_or_else(|| MfError::not_found("triage job not found"))?;

    let mut body = serde_json::to_value(&record)?;
    if !record.status.is_terminal() {
        let files = state.files.list_for_job(&session_id, &job_id).await?;
        if let Value::Object(ref mut map) = body {
            map.insert("files".to_string(), serde_json::to_value(&files)?);
        }
    }
    Ok(Json(body))
}

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConfirmBody {
    session_id: String,
    delete_keys: Vec<String>,
}

pub async fn confirm(State(state): State<AppState>, AuthSubject(subject): AuthSubject, Json(body): Json<ConfirmBody>) -> ApiResult<Json<Value>> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;

    let mut deleted = 0u32;
    let mut errors = Vec::new();
    for key in &body.delete_keys {
        match state.store.delete(key).await {
            Ok(()) => deleted += 1,
            Err(e) => errors.push(format!("{key}: {}", e.client_message())),
        }
    }
    Ok(Json(json!({ "deleted": deleted, "errors": errors })))
}
