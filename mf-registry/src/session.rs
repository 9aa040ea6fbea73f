use std::sync::Arc;

use chrono::Utc;
use mf_core::{time::SESSION_TTL, MfError, MfResult, SessionId};
use mf_kv::KvStore;
use tracing::warn;

use crate::model::SessionMeta;

const SORT_KEY: &str = "META";

/// Owner-binding for session META: created lazily on first authenticated
/// write, and rejects any later write from a different auth subject.
#[derive(Clone)]
pub struct SessionRegistry {
    kv: Arc<dyn KvStore>,
}

impl SessionRegistry {
    pub fn new(kv: Arc<dyn KvStore>) -> Self {
        Self { kv }
    }

    pub async fn get(&self, session_id: &SessionId) -> MfResult<Option<SessionMeta>> {
        let row = self.kv.get(session_id.as_str(), SORT_KEY).await?;
        row.map(|r| serde_json::from_value(r.value).map_err(MfError::from)).transpose()
    }

    /// Idempotent session binding: creates META on first contact, otherwise
    /// verifies `owner_subject` matches the record already on file.
    pub async fn bind_owner(&self, session_id: &SessionId, owner_subject: &str) -> MfResult<SessionMeta> {
        let meta = SessionMeta::new(session_id.clone(), owner_subject.to_string());
        let created = self
            .kv
            .put_if_absent(session_id.as_str(), SORT_KEY, serde_json::to_value(&meta)?, SESSION_TTL)
            .await?;
        if created {
            return Ok(meta);
        }

        let existing = self
            .get(session_id)
            .await?
            .ok_or_else(|| MfError::corruption(format!("session {session_id} vanished between put_if_absent and get")))?;

        if existing.owner_subject != owner_subject {
            warn!(
                session_id = %session_id,
                existing_owner = %existing.owner_subject,
                requesting_owner = %owner_subject,
                "rejected cross-owner session access"
            );
            return Err(MfError::ownership("access denied"));
        }
        Ok(existing)
    }

    /// Bump `last_activity_at`, extending the session's TTL eviction clock.
    /// Best-effort: a lost race just means the next touch wins.
    pub async fn touch(&self, session_id: &SessionId) -> MfResult<()> {
        let row = self
            .kv
            .get(session_id.as_str(), SORT_KEY)
            .await?
            .ok_or_else(|| MfError::not_found(format!("session {session_id} not found")))?;
        let mut meta: SessionMeta = serde_json::from_value(row.value)?;
        meta.last_activity_at = Utc::now();
        self.kv
            .compare_and_swap(session_id.as_str(), SORT_KEY, row.version, serde_json::to_value(&meta)?)
            .await?;
        Ok(())
    }
}
