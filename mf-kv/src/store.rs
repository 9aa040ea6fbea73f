use async_trait::async_trait;
use chrono::Duration;
use mf_core::MfResult;
use serde_json::Value;

use crate::record::Record;

/// Durable KV store primitive. All operations are conditional or atomic so
/// concurrent writers never corrupt a record: status transitions
/// compare-and-swap against the row's current version, counters are atomic
/// adds, and item-by-index writes address a single array slot.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Point read. Returns `None` if absent or past its TTL.
    async fn get(&self, pk: &str, sk: &str) -> MfResult<Option<Record>>;

    /// Create a row only if one doesn't already exist at `(pk, sk)`.
    /// Returns `false` (no error) if a row was already there — this is how
    /// `PutFingerprintMapping` enforces "at most once per fingerprint per
    /// job" and how idempotent job creation is implemented.
    async fn put_if_absent(&self, pk: &str, sk: &str, value: Value, ttl: Duration) -> MfResult<bool>;

    /// Unconditional upsert. Used for first-write-wins rows the caller has
    /// already gated some other way (e.g. writing a FileResult after the
    /// pipeline's own idempotency checks).
    async fn put(&self, pk: &str, sk: &str, value: Value, ttl: Duration) -> MfResult<()>;

    /// Replace the row's value iff its current version equals
    /// `expected_version`. Returns `false` on mismatch — the caller must
    /// re-read and decide whether to retry or abandon.
    async fn compare_and_swap(
        &self,
        pk: &str,
        sk: &str,
        expected_version: u64,
        new_value: Value,
    ) -> MfResult<bool>;

    /// Atomically add `delta` to the numeric field `field` inside the row's
    /// JSON object, returning the new value. Creates the row at `delta` if
    /// absent. Never loses an increment under concurrent callers.
    async fn atomic_increment(&self, pk: &str, sk: &str, field: &str, delta: i64) -> MfResult<i64>;

    /// Replace element `index` of the array at `list_field` with `item`,
    /// growing the array with `Value::Null` as needed. Two writers touching
    /// different indexes never collide.
    async fn update_list_index(
        &self,
        pk: &str,
        sk: &str,
        list_field: &str,
        index: usize,
        item: Value,
    ) -> MfResult<()>;

    /// All non-expired rows under `pk` whose sort key starts with `prefix`.
    async fn query_prefix(&self, pk: &str, prefix: &str) -> MfResult<Vec<Record>>;

    async fn delete(&self, pk: &str, sk: &str) -> MfResult<()>;

    /// Best-effort bulk delete of every row under `pk` whose sort key starts
    /// with `prefix`. Returns the number of rows removed.
    async fn delete_prefix(&self, pk: &str, prefix: &str) -> MfResult<usize>;
}
