use axum::extract::State;
use axum::Json;
use mf_core::MfError;
use mf_rewind::RewindStep;
use serde::Deserialize;
use serde_json::{json, Value};

use crate::auth::{bind_session, AuthSubject};
use crate::error::ApiResult;
use crate::state::AppState;
use crate::validate::validate_session_id;

#[derive(Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InvalidateBody {
    session_id: String,
    from_step: String,
}

pub async fn invalidate(
    State(state): State<AppState>,
    AuthSubject(subject): AuthSubject,
    Json(body): Json<InvalidateBody>,
) -> ApiResult<Json<Value>> {
    let session_id = validate_session_id(&body.session_id)?;
    bind_session(&state, &session_id, &subject).await?;

    let step = RewindStep::parse(&body.from_step).ok_or_else(|| MfError::validation("unknown fromStep"))?;
    let invalidated = state.rewind.invalidate(&session_id, step).await?;
    Ok(Json(json!({ "invalidated": invalidated })))
}
