use crate::ids::SessionId;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;

/// Context threaded through every KV/object-store/worker call: which
/// session it belongs to, which auth subject is making the call, and a
/// request id for log correlation. Mirrors `QueueCtx`/`BlobCtx`, generalized
/// from "tenant" to "session + owner subject" since that is this system's
/// isolation boundary.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RequestCtx {
    pub session_id: SessionId,
    pub owner_subject: String,
    pub request_id: String,
    pub tags: HashMap<String, String>,
}

impl RequestCtx {
    pub fn new(session_id: SessionId, owner_subject: impl Into<String>) -> Self {
        Self {
            session_id,
            owner_subject: owner_subject.into(),
            request_id: Uuid::new_v4().to_string(),
            tags: HashMap::new(),
        }
    }

    pub fn with_request_id(mut self, request_id: impl Into<String>) -> Self {
        self.request_id = request_id.into();
        self
    }

    pub fn with_tag(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.tags.insert(key.into(), value.into());
        self
    }
}
