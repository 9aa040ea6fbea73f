use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use chrono::{Duration, Utc};
use mf_core::{MfError, MfResult};
use parking_lot::RwLock;
use serde_json::Value;

use crate::record::Record;
use crate::store::KvStore;

/// In-memory KV backend: a `RwLock<HashMap<...>>` guarding every row,
/// with a version-counter CAS usable by any record type in `mf-registry`.
///
/// This is the reference implementation used by every crate's own tests
/// and by `mediaforge-gateway` in local/dev mode; a production deployment
/// points `KvStore` at a real durable table instead.
#[derive(Default)]
pub struct MemoryKvStore {
    rows: Arc<RwLock<HashMap<(String, String), Record>>>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn key(pk: &str, sk: &str) -> (String, String) {
        (pk.to_string(), sk.to_string())
    }

    /// Number of live (non-expired) rows. Test/diagnostic helper.
    pub fn len(&self) -> usize {
        let now = Utc::now();
        self.rows.read().values().filter(|r| !r.is_expired(now)).count()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, pk: &str, sk: &str) -> MfResult<Option<Record>> {
        let now = Utc::now();
        let rows = self.rows.read();
        Ok(rows
            .get(&Self::key(pk, sk))
            .filter(|r| !r.is_expired(now))
            .cloned())
    }

    async fn put_if_absent(&self, pk: &str, sk: &str, value: Value, ttl: Duration) -> MfResult<bool> {
        let now = Utc::now();
        let mut rows = self.rows.write();
        let k = Self::key(pk, sk);
        if let Some(existing) = rows.get(&k) {
            if !existing.is_expired(now) {
                return Ok(false);
            }
        }
        rows.insert(
            k.clone(),
            Record {
                partition_key: pk.to_string(),
                sort_key: sk.to_string(),
                value,
                version: 1,
                expires_at: now + ttl,
            },
        );
        Ok(true)
    }

    async fn put(&self, pk: &str, sk: &str, value: Value, ttl: Duration) -> MfResult<()> {
        let now = Utc::now();
        let mut rows = self.rows.write();
        let k = Self::key(pk, sk);
        let version = rows.get(&k).map(|r| r.version + 1).unwrap_or(1);
        rows.insert(
            k,
            Record {
                partition_key: pk.to_string(),
                sort_key: sk.to_string(),
                value,
                version,
                expires_at: now + ttl,
            },
        );
        Ok(())
    }

    async fn compare_and_swap(
        &self,
        pk: &str,
        sk: &str,
        expected_version: u64,
        new_value: Value,
    ) -> MfResult<bool> {
        let now = Utc::now();
        let mut rows = self.rows.write();
        let k = Self::key(pk, sk);
        match rows.get(&k) {
            Some(existing) if !existing.is_expired(now) && existing.version == expected_version => {
                let ttl_remaining = existing.expires_at - now;
                rows.insert(
                    k,
                    Record {
                        partition_key: pk.to_string(),
                        sort_key: sk.to_string(),
                        value: new_value,
                        version: expected_version + 1,
                        expires_at: now + ttl_remaining,
                    },
                );
                Ok(true)
            }
            Some(_) => Ok(false),
            None => Ok(false),
        }
    }

    async fn atomic_increment(&self, pk: &str, sk: &str, field: &str, delta: i64) -> MfResult<i64> {
        let now = Utc::now();
        let mut rows = self.rows.write();
        let k = Self::key(pk, sk);
        let existing = rows.remove(&k).filter(|r| !r.is_expired(now));

        let (mut value, version, expires_at) = match existing {
            Some(r) => (r.value, r.version, r.expires_at),
            None => (Value::Object(Default::default()), 0, now + Duration::hours(24)),
        };

        let obj = value
            .as_object_mut()
            .ok_or_else(|| MfError::corruption(format!("row {pk}/{sk} is not an object")))?;
        let current = obj.get(field).and_then(|v| v.as_i64()).unwrap_or(0);
        let updated = current + delta;
        obj.insert(field.to_string(), Value::from(updated));

        rows.insert(
            k,
            Record {
                partition_key: pk.to_string(),
                sort_key: sk.to_string(),
                value,
                version: version + 1,
                expires_at,
            },
        );
        Ok(updated)
    }

    async fn update_list_index(
        &self,
        pk: &str,
        sk: &str,
        list_field: &str,
        index: usize,
        item: Value,
    ) -> MfResult<()> {
        let now = Utc::now();
        let mut rows = self.rows.write();
        let k = Self::key(pk, sk);
        let existing = rows
            .remove(&k)
            .filter(|r| !r.is_expired(now))
            .ok_or_else(|| MfError::not_found(format!("row {pk}/{sk} does not exist")))?;

        let mut value = existing.value;
        let obj = value
            .as_object_mut()
            .ok_or_else(|| MfError::corruption(format!("row {pk}/{sk} is not an object")))?;
        let list = obj
            .entry(list_field.to_string())
            .or_insert_with(|| Value::Array(Vec::new()));
        let arr = list
            .as_array_mut()
            .ok_or_else(|| MfError::corruption(format!("{list_field} on {pk}/{sk} is not an array")))?;
        if arr.len() <= index {
            arr.resize(index + 1, Value::Null);
        }
        arr[index] = item;

        rows.insert(
            k,
            Record {
                partition_key: pk.to_string(),
                sort_key: sk.to_string(),
                value,
                version: existing.version + 1,
                expires_at: existing.expires_at,
            },
        );
        Ok(())
    }

    async fn query_prefix(&self, pk: &str, prefix: &str) -> MfResult<Vec<Record>> {
        let now = Utc::now();
        let rows = self.rows.read();
        Ok(rows
            .values()
            .filter(|r| r.partition_key == pk && r.sort_key.starts_with(prefix) && !r.is_expired(now))
            .cloned()
            .collect())
    }

    async fn delete(&self, pk: &str, sk: &str) -> MfResult<()> {
        self.rows.write().remove(&Self::key(pk, sk));
        Ok(())
    }

    async fn delete_prefix(&self, pk: &str, prefix: &str) -> MfResult<usize> {
        let mut rows = self.rows.write();
        let doomed: Vec<(String, String)> = rows
            .keys()
            .filter(|(p, s)| p == pk && s.starts_with(prefix))
            .cloned()
            .collect();
        let count = doomed.len();
        for k in doomed {
            rows.remove(&k);
        }
        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn ttl() -> Duration {
        Duration::hours(24)
    }

    #[tokio::test]
    async fn put_if_absent_is_first_write_wins() {
        let kv = MemoryKvStore::new();
        assert!(kv.put_if_absent("s1", "FP#a", json!({"filename": "a.jpg"}), ttl()).await.unwrap());
        assert!(!kv.put_if_absent("s1", "FP#a", json!({"filename": "b.jpg"}), ttl()).await.unwrap());
        let row = kv.get("s1", "FP#a").await.unwrap().unwrap();
        assert_eq!(row.value["filename"], "a.jpg");
    }

    #[tokio::test]
    async fn compare_and_swap_rejects_stale_version() {
        let kv = MemoryKvStore::new();
        kv.put("s1", "JOB#1", json!({"status": "pending"}), ttl()).await.unwrap();
        let row = kv.get("s1", "JOB#1").await.unwrap().unwrap();
        assert!(kv
            .compare_and_swap("s1", "JOB#1", row.version, json!({"status": "processing"}))
            .await
            .unwrap());
        // Same (now stale) version fails the second time.
        assert!(!kv
            .compare_and_swap("s1", "JOB#1", row.version, json!({"status": "error"}))
            .await
            .unwrap());
        let row = kv.get("s1", "JOB#1").await.unwrap().unwrap();
        assert_eq!(row.value["status"], "processing");
    }

    #[tokio::test]
    async fn atomic_increment_accumulates_under_concurrency() {
        let kv = Arc::new(MemoryKvStore::new());
        let mut handles = Vec::new();
        for _ in 0..50 {
            let kv = Arc::clone(&kv);
            handles.push(tokio::spawn(async move {
                kv.atomic_increment("s1", "JOB#1", "processedCount", 1).await.unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let row = kv.get("s1", "JOB#1").await.unwrap().unwrap();
        assert_eq!(row.value["processedCount"], 50);
    }

    #[tokio::test]
    async fn update_list_index_never_collides_across_indexes() {
        let kv = Arc::new(MemoryKvStore::new());
        kv.put("s1", "JOB#1", json!({"items": []}), ttl()).await.unwrap();
        let mut handles = Vec::new();
        for i in 0..10u64 {
            let kv = Arc::clone(&kv);
            handles.push(tokio::spawn(async move {
                kv.update_list_index("s1", "JOB#1", "items", i as usize, json!({"index": i}))
                    .await
                    .unwrap();
            }));
        }
        for h in handles {
            h.await.unwrap();
        }
        let row = kv.get("s1", "JOB#1").await.unwrap().unwrap();
        let items = row.value["items"].as_array().unwrap();
        assert_eq!(items.len(), 10);
        for (i, item) in items.iter().enumerate() {
            assert_eq!(item["index"], i as u64);
        }
    }

    #[tokio::test]
    async fn query_prefix_only_matches_same_partition() {
        let kv = MemoryKvStore::new();
        kv.put("s1", "TRIAGE#a", json!({}), ttl()).await.unwrap();
        kv.put("s1", "SELECTION#a", json!({}), ttl()).await.unwrap();
        kv.put("s2", "TRIAGE#a", json!({}), ttl()).await.unwrap();
        let rows = kv.query_prefix("s1", "TRIAGE#").await.unwrap();
        assert_eq!(rows.len(), 1);
    }

    #[tokio::test]
    async fn delete_prefix_is_bulk_and_scoped() {
        let kv = MemoryKvStore::new();
        kv.put("s1", "ENHANCEMENT#a", json!({}), ttl()).await.unwrap();
        kv.put("s1", "ENHANCEMENT#b", json!({}), ttl()).await.unwrap();
        kv.put("s1", "PUBLISH#a", json!({}), ttl()).await.unwrap();
        let deleted = kv.delete_prefix("s1", "ENHANCEMENT#").await.unwrap();
        assert_eq!(deleted, 2);
        assert_eq!(kv.len(), 1);
    }
}
