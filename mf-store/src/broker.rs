use std::sync::Arc;

use mf_core::{MfError, MfResult};
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::store::MultipartStore;
use crate::types::{CompletedPart, PutResult, UploadId};

const MIN_CHUNK_SIZE: u64 = 5 * 1024 * 1024;
const MAX_CHUNK_SIZE: u64 = 100 * 1024 * 1024;
const MAX_NUM_PARTS: u64 = 10_000;
const MAX_IMAGE_SIZE: u64 = 50 * 1024 * 1024;
const MAX_VIDEO_SIZE: u64 = 5 * 1024 * 1024 * 1024;
const PART_URL_EXPIRY_SECS: u64 = 60 * 60;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MediaClass {
    Image,
    Video,
}

/// Response to `init`: the browser uploads each part to its own presigned
/// URL, then calls `complete` with the returned ETags.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InitResult {
    pub upload_id: UploadId,
    pub key: String,
    pub part_urls: Vec<String>,
}

/// Validates, then presigns, a multi-part upload in one burst so the
/// browser does no further server round-trips once it starts streaming
/// bytes. On any presign failure mid-burst the broker aborts the upload
/// rather than leave orphaned parts.
pub struct MultipartBroker {
    store: Arc<dyn MultipartStore>,
}

impl MultipartBroker {
    pub fn new(store: Arc<dyn MultipartStore>) -> Self {
        Self { store }
    }

    fn max_size_for(class: MediaClass) -> u64 {
        match class {
            MediaClass::Image => MAX_IMAGE_SIZE,
            MediaClass::Video => MAX_VIDEO_SIZE,
        }
    }

    pub async fn init(
        &self,
        key: &str,
        content_type: Option<&str>,
        class: MediaClass,
        file_size: u64,
        chunk_size: u64,
    ) -> MfResult<InitResult> {
        if chunk_size < MIN_CHUNK_SIZE || chunk_size > MAX_CHUNK_SIZE {
            return Err(MfError::validation(format!(
                "chunkSize must be between {MIN_CHUNK_SIZE} and {MAX_CHUNK_SIZE} bytes"
            )));
        }
        let max_size = Self::max_size_for(class);
        if file_size == 0 || file_size > max_size {
            return Err(MfError::validation(format!("fileSize must be between 1 and {max_size} bytes")));
        }
        let num_parts = file_size.div_ceil(chunk_size);
        if num_parts > MAX_NUM_PARTS {
            return Err(MfError::validation(format!("upload would require {num_parts} parts, max {MAX_NUM_PARTS}")));
        }

        let upload_id = self.store.init_multipart(key, content_type).await?;

        let mut part_urls = Vec::with_capacity(num_parts as usize);
        for part_number in 1..=num_parts as u32 {
            match self.store.presign_part(&upload_id, part_number, PART_URL_EXPIRY_SECS).await {
                Ok(url) => part_urls.push(url),
                Err(err) => {
                    warn!(%upload_id, part_number, error = %err, "presign failed mid-burst, aborting upload");
                    if let Err(abort_err) = self.store.abort_multipart(&upload_id).await {
                        warn!(%upload_id, error = %abort_err, "abort after failed presign also failed");
                    }
                    return Err(err);
                }
            }
        }

        Ok(InitResult { upload_id, key: key.to_string(), part_urls })
    }

    pub async fn complete(&self, upload_id: &UploadId, parts: Vec<CompletedPart>) -> MfResult<PutResult> {
        self.store.complete_multipart(upload_id, parts).await
    }

    pub async fn abort(&self, upload_id: &UploadId) -> MfResult<()> {
        self.store.abort_multipart(upload_id).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryObjectStore;

    fn broker() -> MultipartBroker {
        MultipartBroker::new(Arc::new(MemoryObjectStore::new()))
    }

    #[tokio::test]
    async fn chunk_size_boundary_accepts_5_mib_rejects_below() {
        let broker = broker();
        assert!(broker
            .init("s1/a.mp4", None, MediaClass::Video, 10 * 1024 * 1024, MIN_CHUNK_SIZE)
            .await
            .is_ok());
        assert!(broker
            .init("s1/a.mp4", None, MediaClass::Video, 10 * 1024 * 1024, MIN_CHUNK_SIZE - 1)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn file_size_boundary_for_images() {
        let broker = broker();
        assert!(broker
            .init("s1/a.jpg", None, MediaClass::Image, MAX_IMAGE_SIZE, MIN_CHUNK_SIZE)
            .await
            .is_ok());
        assert!(broker
            .init("s1/a.jpg", None, MediaClass::Image, MAX_IMAGE_SIZE + 1, MIN_CHUNK_SIZE)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn file_size_boundary_for_videos() {
        let broker = broker();
        assert!(broker
            .init("s1/a.mp4", None, MediaClass::Video, MAX_VIDEO_SIZE, MAX_CHUNK_SIZE)
            .await
            .is_ok());
        assert!(broker
            .init("s1/a.mp4", None, MediaClass::Video, MAX_VIDEO_SIZE + 1, MAX_CHUNK_SIZE)
            .await
            .is_err());
    }

    #[tokio::test]
    async fn too_many_parts_is_rejected() {
        let broker = broker();
        let err = broker
            .init("s1/a.mp4", None, MediaClass::Video, MAX_VIDEO_SIZE, MIN_CHUNK_SIZE)
            .await
            .unwrap_err();
        assert_eq!(err.kind, mf_core::ErrorKind::Validation);
    }

    #[tokio::test]
    async fn init_presigns_every_part_in_one_burst() {
        let broker = broker();
        let result = broker
            .init("s1/a.mp4", Some("video/mp4"), MediaClass::Video, 12 * 1024 * 1024, MIN_CHUNK_SIZE)
            .await
            .unwrap();
        assert_eq!(result.part_urls.len(), 3);
    }
}
