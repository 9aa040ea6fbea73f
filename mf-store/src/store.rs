use async_trait::async_trait;
use mf_core::MfResult;

use crate::types::{ByteRange, ByteStream, CompletedPart, GetResult, ObjectHead, PutResult, UploadId};

/// Opaque byte storage addressed by key: PUT, GET (optionally ranged), HEAD,
/// DELETE, LIST-by-prefix. Every ingest artifact, enhanced image, and
/// download archive is an object under this trait.
#[async_trait]
pub trait ObjectStore: Send + Sync {
    async fn put(&self, key: &str, content_type: Option<&str>, stream: ByteStream) -> MfResult<PutResult>;

    async fn get(&self, key: &str, range: Option<ByteRange>) -> MfResult<GetResult>;

    async fn head(&self, key: &str) -> MfResult<ObjectHead>;

    async fn delete(&self, key: &str) -> MfResult<()>;

    /// All live keys under `prefix`. Used by the rewind controller's
    /// best-effort bulk deletes.
    async fn list_prefix(&self, prefix: &str) -> MfResult<Vec<ObjectHead>>;

    /// Apply cost/ownership tags to an already-uploaded object. Pre-signed
    /// PUT URLs cannot embed tags, so the ingest pipeline tags objects after
    /// the fact; backends without tagging support may no-op.
    async fn tag(&self, key: &str, tags: &[(String, String)]) -> MfResult<()>;
}

/// Short-lived pre-signed URL issuance, layered on top of an `ObjectStore`.
#[async_trait]
pub trait SignedUrlStore: ObjectStore {
    async fn sign_get(&self, key: &str, expires_in_secs: u64) -> MfResult<String>;

    async fn sign_put(&self, key: &str, content_type: Option<&str>, expires_in_secs: u64) -> MfResult<String>;

    /// A presigned GET that asks the browser to download rather than
    /// render, via `Content-Disposition: attachment; filename="..."`.
    async fn sign_get_attachment(&self, key: &str, filename: &str, expires_in_secs: u64) -> MfResult<String>;
}

/// True multi-part upload: a session of independently-presigned part PUTs
/// stitched together by `complete_multipart`.
#[async_trait]
pub trait MultipartStore: ObjectStore {
    async fn init_multipart(&self, key: &str, content_type: Option<&str>) -> MfResult<UploadId>;

    async fn presign_part(&self, upload_id: &UploadId, part_number: u32, expires_in_secs: u64) -> MfResult<String>;

    async fn complete_multipart(&self, upload_id: &UploadId, parts: Vec<CompletedPart>) -> MfResult<PutResult>;

    async fn abort_multipart(&self, upload_id: &UploadId) -> MfResult<()>;
}
