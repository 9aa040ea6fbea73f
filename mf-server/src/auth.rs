//! Bearer-token subject extraction, adapted from `mf_auth::extract_bearer_token`
//! (which works over a plain header map) to Axum's `HeaderMap` and the
//! state's configured `TokenVerifier`.

use axum::extract::FromRequestParts;
use axum::http::request::Parts;
use std::collections::HashMap;

use mf_core::{MfError, MfResult, SessionId};

use crate::error::ApiError;
use crate::state::AppState;

/// The auth subject a mutating route is acting on behalf of, extracted and
/// verified from the `Authorization` header.
pub struct AuthSubject(pub String);

impl FromRequestParts<AppState> for AuthSubject {
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &AppState) -> Result<Self, Self::Rejection> {
        let mut headers = HashMap::new();
        if let Some(value) = parts.headers.get(axum::http::header::AUTHORIZATION) {
            if let Ok(s) = value.to_str() {
                headers.insert("authorization".to_string(), s.to_string());
            }
        }
        let token = mf_auth::extract_bearer_token(&headers)
            .ok_or_else(|| MfError::ownership("missing or malformed Authorization header"))?;
        let claims = state.verifier.verify(&token).await?;
        Ok(AuthSubject(claims.subject))
    }
}

/// Idempotent session binding for every mutating/polling route: creates
/// META on first contact for this subject, otherwise rejects with 403 if
/// the session belongs to someone else.
pub async fn bind_session(state: &AppState, session_id: &SessionId, subject: &str) -> MfResult<()> {
    state.sessions.bind_owner(session_id, subject).await?;
    Ok(())
}
