use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

/// A single row in the KV table: `(partitionKey, sortKey) -> typed record`.
/// `version` backs optimistic compare-and-swap; `expires_at` backs the
/// store's authoritative TTL eviction.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Record {
    pub partition_key: String,
    pub sort_key: String,
    pub value: Value,
    pub version: u64,
    pub expires_at: DateTime<Utc>,
}

impl Record {
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}
