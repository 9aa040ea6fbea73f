use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use async_trait::async_trait;
use bytes::Bytes;
use chrono::Utc;
use futures_util::StreamExt;
use mf_core::{MfError, MfResult};
use parking_lot::RwLock;

use crate::store::{MultipartStore, ObjectStore, SignedUrlStore};
use crate::types::{
    ByteRange, ByteStream, CompletedPart, GetResult, ObjectHead, PutResult, ResolvedRange, UploadId,
};

#[derive(Clone)]
struct StoredObject {
    bytes: Bytes,
    content_type: Option<String>,
    etag: String,
    last_modified: chrono::DateTime<Utc>,
    tags: Vec<(String, String)>,
}

struct MultipartSession {
    key: String,
    content_type: Option<String>,
    parts: BTreeMap<u32, Bytes>,
}

/// In-memory object store: the same role an S3-compatible store plays in
/// production, minus the network. Everything lives behind a
/// `RwLock<HashMap<...>>` so unit tests and local/dev runs don't need a
/// real bucket. Pre-signed URLs are deterministic tokens this same process
/// can redeem, not real HTTP URLs.
#[derive(Default)]
pub struct MemoryObjectStore {
    objects: Arc<RwLock<HashMap<String, StoredObject>>>,
    uploads: Arc<RwLock<HashMap<UploadId, MultipartSession>>>,
}

impl MemoryObjectStore {
    pub fn new() -> Self {
        Self::default()
    }

    async fn collect(mut stream: ByteStream) -> MfResult<Bytes> {
        let mut buf = Vec::new();
        while let Some(chunk) = stream.next().await {
            let chunk = chunk.map_err(|e| MfError::transient("object stream read failed").with_source(e.into()))?;
            buf.extend_from_slice(&chunk);
        }
        Ok(Bytes::from(buf))
    }

    fn etag_for(bytes: &[u8]) -> String {
        use sha2::{Digest, Sha256};
        let digest = Sha256::digest(bytes);
        hex::encode(digest)
    }
}

#[async_trait]
impl ObjectStore for MemoryObjectStore {
    async fn put(&self, key: &str, content_type: Option<&str>, stream: ByteStream) -> MfResult<PutResult> {
        let bytes = Self::collect(stream).await?;
        let size_bytes = bytes.len() as u64;
        let etag = Self::etag_for(&bytes);
        self.objects.write().insert(
            key.to_string(),
            StoredObject {
                bytes,
                content_type: content_type.map(str::to_string),
                etag: etag.clone(),
                last_modified: Utc::now(),
                tags: Vec::new(),
            },
        );
        Ok(PutResult { etag: Some(etag), size_bytes })
    }

    async fn get(&self, key: &str, range: Option<ByteRange>) -> MfResult<GetResult> {
        let object = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| MfError::not_found(format!("object {key} not found")))?;
        let total = object.bytes.len() as u64;

        let (body, resolved_range) = match range {
            Some(r) => {
                if !r.is_valid(total) {
                    return Err(MfError::validation("byte range out of bounds"));
                }
                let end = r.end.unwrap_or(total - 1);
                let slice = object.bytes.slice(r.start as usize..=end as usize);
                (slice, Some(ResolvedRange { start: r.start, end, total_size: total }))
            }
            None => (object.bytes.clone(), None),
        };

        let size_bytes = body.len() as u64;
        let stream: ByteStream = Box::pin(futures_util::stream::once(async move { Ok(body) }));
        Ok(GetResult { stream, size_bytes, content_type: object.content_type, resolved_range })
    }

    async fn head(&self, key: &str) -> MfResult<ObjectHead> {
        let object = self
            .objects
            .read()
            .get(key)
            .cloned()
            .ok_or_else(|| MfError::not_found(format!("object {key} not found")))?;
        Ok(ObjectHead {
            key: key.to_string(),
            size_bytes: object.bytes.len() as u64,
            content_type: object.content_type,
            etag: Some(object.etag),
            last_modified: object.last_modified,
        })
    }

    async fn delete(&self, key: &str) -> MfResult<()> {
        self.objects.write().remove(key);
        Ok(())
    }

    async fn list_prefix(&self, prefix: &str) -> MfResult<Vec<ObjectHead>> {
        let objects = self.objects.read();
        Ok(objects
            .iter()
            .filter(|(k, _)| k.starts_with(prefix))
            .map(|(k, v)| ObjectHead {
                key: k.clone(),
                size_bytes: v.bytes.len() as u64,
                content_type: v.content_type.clone(),
                etag: Some(v.etag.clone()),
                last_modified: v.last_modified,
            })
            .collect())
    }

    async fn tag(&self, key: &str, tags: &[(String, String)]) -> MfResult<()> {
        let mut objects = self.objects.write();
        let object = objects
            .get_mut(key)
            .ok_or_else(|| MfError::not_found(format!("object {key} not found")))?;
        object.tags = tags.to_vec();
        Ok(())
    }
}

#[async_trait]
impl SignedUrlStore for MemoryObjectStore {
    async fn sign_get(&self, key: &str, expires_in_secs: u64) -> MfResult<String> {
        Ok(format!("memory://{key}?op=get&exp={expires_in_secs}"))
    }

    async fn sign_put(&self, key: &str, content_type: Option<&str>, expires_in_secs: u64) -> MfResult<String> {
        let ct = content_type.unwrap_or("application/octet-stream");
        Ok(format!("memory://{key}?op=put&ct={ct}&exp={expires_in_secs}"))
    }

    async fn sign_get_attachment(&self, key: &str, filename: &str, expires_in_secs: u64) -> MfResult<String> {
        Ok(format!(
            "memory://{key}?op=get&disposition=attachment&filename={filename}&exp={expires_in_secs}"
        ))
    }
}

#[async_trait]
impl MultipartStore for MemoryObjectStore {
    async fn init_multipart(&self, key: &str, content_type: Option<&str>) -> MfResult<UploadId> {
        let upload_id = UploadId::new();
        self.uploads.write().insert(
            upload_id.clone(),
            MultipartSession {
                key: key.to_string(),
                content_type: content_type.map(str::to_string),
                parts: BTreeMap::new(),
            },
        );
        Ok(upload_id)
    }

    async fn presign_part(&self, upload_id: &UploadId, part_number: u32, expires_in_secs: u64) -> MfResult<String> {
        if !self.uploads.read().contains_key(upload_id) {
            return Err(MfError::not_found(format!("upload {upload_id} not found")));
        }
        Ok(format!("memory://uploads/{upload_id}/part-{part_number:06}?exp={expires_in_secs}"))
    }

    async fn complete_multipart(&self, upload_id: &UploadId, parts: Vec<CompletedPart>) -> MfResult<PutResult> {
        let session = self
            .uploads
            .write()
            .remove(upload_id)
            .ok_or_else(|| MfError::not_found(format!("upload {upload_id} not found")))?;

        let mut bytes = Vec::new();
        for part in &parts {
            let chunk = session
                .parts
                .get(&part.part_number)
                .ok_or_else(|| MfError::validation(format!("part {} was never uploaded", part.part_number)))?;
            bytes.extend_from_slice(chunk);
        }
        let size_bytes = bytes.len() as u64;
        let etag = Self::etag_for(&bytes);
        self.objects.write().insert(
            session.key,
            StoredObject {
                bytes: Bytes::from(bytes),
                content_type: session.content_type,
                etag: etag.clone(),
                last_modified: Utc::now(),
                tags: Vec::new(),
            },
        );
        Ok(PutResult { etag: Some(etag), size_bytes })
    }

    async fn abort_multipart(&self, upload_id: &UploadId) -> MfResult<()> {
        self.uploads.write().remove(upload_id);
        Ok(())
    }
}

impl MemoryObjectStore {
    /// Test helper: deposit a part's bytes directly, standing in for the
    /// browser PUT that would normally hit `presign_part`'s URL.
    pub fn deposit_part_for_test(&self, upload_id: &UploadId, part_number: u32, bytes: Bytes) -> MfResult<()> {
        let mut uploads = self.uploads.write();
        let session = uploads
            .get_mut(upload_id)
            .ok_or_else(|| MfError::not_found(format!("upload {upload_id} not found")))?;
        session.parts.insert(part_number, bytes);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn stream_of(bytes: &'static [u8]) -> ByteStream {
        Box::pin(futures_util::stream::once(async move { Ok(Bytes::from(bytes)) }))
    }

    #[tokio::test]
    async fn put_then_get_round_trips() {
        let store = MemoryObjectStore::new();
        store.put("s1/a.jpg", Some("image/jpeg"), stream_of(b"hello")).await.unwrap();
        let head = store.head("s1/a.jpg").await.unwrap();
        assert_eq!(head.size_bytes, 5);
        assert_eq!(head.content_type.as_deref(), Some("image/jpeg"));
    }

    #[tokio::test]
    async fn ranged_get_slices_correctly() {
        let store = MemoryObjectStore::new();
        store.put("s1/a.bin", None, stream_of(b"0123456789")).await.unwrap();
        let mut result = store
            .get("s1/a.bin", Some(ByteRange { start: 2, end: Some(4) }))
            .await
            .unwrap();
        let mut body = Vec::new();
        while let Some(chunk) = result.stream.next().await {
            body.extend_from_slice(&chunk.unwrap());
        }
        assert_eq!(body, b"234");
    }

    #[tokio::test]
    async fn multipart_round_trip_stitches_parts_in_order() {
        let store = MemoryObjectStore::new();
        let upload_id = store.init_multipart("s1/big.mp4", Some("video/mp4")).await.unwrap();
        store.deposit_part_for_test(&upload_id, 1, Bytes::from_static(b"AAA")).unwrap();
        store.deposit_part_for_test(&upload_id, 2, Bytes::from_static(b"BBB")).unwrap();
        let result = store
            .complete_multipart(
                &upload_id,
                vec![
                    CompletedPart { part_number: 1, etag: "ignored".into() },
                    CompletedPart { part_number: 2, etag: "ignored".into() },
                ],
            )
            .await
            .unwrap();
        assert_eq!(result.size_bytes, 6);
        let head = store.head("s1/big.mp4").await.unwrap();
        assert_eq!(head.size_bytes, 6);
    }

    #[tokio::test]
    async fn abort_multipart_leaves_no_object() {
        let store = MemoryObjectStore::new();
        let upload_id = store.init_multipart("s1/big.mp4", None).await.unwrap();
        store.abort_multipart(&upload_id).await.unwrap();
        assert!(store.head("s1/big.mp4").await.is_err());
    }

    #[tokio::test]
    async fn list_prefix_is_scoped() {
        let store = MemoryObjectStore::new();
        store.put("s1/thumbnails/a.jpg", None, stream_of(b"x")).await.unwrap();
        store.put("s1/processed/a.webm", None, stream_of(b"y")).await.unwrap();
        let listed = store.list_prefix("s1/thumbnails/").await.unwrap();
        assert_eq!(listed.len(), 1);
    }
}
