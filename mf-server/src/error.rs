//! `ApiError` is a thin `IntoResponse` wrapper that turns any `MfError`
//! into the `{"error": "<client-safe>"}` envelope, at the status code
//! `ErrorKind::status_code` names, while keeping `source` out of the
//! response body entirely.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use mf_core::MfError;
use serde_json::json;

#[derive(Debug)]
pub struct ApiError(pub MfError);

impl From<MfError> for ApiError {
    fn from(e: MfError) -> Self {
        Self(e)
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(e: serde_json::Error) -> Self {
        Self(MfError::from(e))
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = StatusCode::from_u16(self.0.kind.status_code()).unwrap_or(StatusCode::INTERNAL_SERVER_ERROR);
        (status, Json(json!({ "error": self.0.client_message() }))).into_response()
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
