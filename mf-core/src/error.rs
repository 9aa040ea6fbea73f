//! Structured errors: a `kind` that maps to an HTTP status, a client-safe
//! `message`, and an optional `source` that is logged but never serialized
//! back to the caller.

use std::fmt;

/// Error classes, ordered from most to least recoverable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Malformed request fields. 4xx, never retried.
    Validation,
    /// Session belongs to another subject.
    Ownership,
    /// Object-store/KV/vendor 5xx exhausted its retry budget.
    Transient,
    /// Could not hand off to the Coordinator/Invoker.
    Dispatch,
    /// Requested entity does not exist (or its TTL already expired).
    NotFound,
    /// Counter/status drift, impossible transitions — should self-heal, never
    /// reach the client, but the kind exists for completeness.
    Corruption,
    /// Catch-all for anything else.
    Internal,
}

impl ErrorKind {
    pub fn status_code(self) -> u16 {
        match self {
            Self::Validation => 400,
            Self::Ownership => 403,
            Self::Transient => 502,
            Self::Dispatch => 502,
            Self::NotFound => 404,
            Self::Corruption => 500,
            Self::Internal => 500,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::Validation => "Validation",
            Self::Ownership => "Ownership",
            Self::Transient => "Transient",
            Self::Dispatch => "Dispatch",
            Self::NotFound => "NotFound",
            Self::Corruption => "Corruption",
            Self::Internal => "Internal",
        }
    }
}

/// A structured MediaForge error. Carries enough to build an HTTP response
/// without ever leaking `source` to the client.
#[derive(Debug)]
pub struct MfError {
    pub kind: ErrorKind,
    pub message: String,
    pub source: Option<anyhow::Error>,
}

impl MfError {
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<anyhow::Error>) -> Self {
        self.source = Some(source.into());
        self
    }

    pub fn code(&self) -> u16 {
        self.kind.status_code()
    }

    pub fn validation(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, msg)
    }

    pub fn ownership(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Ownership, msg)
    }

    pub fn transient(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Transient, msg)
    }

    pub fn dispatch(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Dispatch, msg)
    }

    pub fn not_found(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::NotFound, msg)
    }

    pub fn corruption(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Corruption, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::new(ErrorKind::Internal, msg)
    }

    /// The message safe to hand straight to an HTTP client: never includes
    /// `source`.
    pub fn client_message(&self) -> &str {
        &self.message
    }

    /// A version with `source` dropped, suitable for anything that might
    /// later be serialized (kept distinct from `client_message` so callers
    /// that need the struct, not just the string, have one too).
    pub fn sanitize_for_client(&self) -> MfError {
        MfError {
            kind: self.kind,
            message: self.message.clone(),
            source: None,
        }
    }
}

impl fmt::Display for MfError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} ({}): {}", self.kind.name(), self.code(), self.message)
    }
}

impl std::error::Error for MfError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_ref()
            .map(|e| e.as_ref() as &(dyn std::error::Error + 'static))
    }
}

pub type MfResult<T> = Result<T, MfError>;

impl From<serde_json::Error> for MfError {
    fn from(err: serde_json::Error) -> Self {
        MfError::internal(format!("serialization error: {err}"))
    }
}
