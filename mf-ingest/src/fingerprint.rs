use bytes::Bytes;
use futures_util::StreamExt;
use mf_core::{MfError, MfResult};
use mf_store::{ByteRange, ObjectStore};
use sha2::{Digest, Sha256};

/// Content fingerprint window: first and last 64 KiB of the object, plus its
/// total size. The same windowing runs client-side before upload, so a match
/// means byte-identical content without hashing the whole file twice.
const CHUNK_SIZE: u64 = 64 * 1024;

/// `SHA-256( bigEndianFloat64(fileSize) || firstChunk || lastChunk )`.
pub fn fingerprint_of(file_size: u64, first_chunk: &[u8], last_chunk: &[u8]) -> String {
    let mut hasher = Sha256::new();
    hasher.update((file_size as f64).to_be_bytes());
    hasher.update(first_chunk);
    hasher.update(last_chunk);
    hex::encode(hasher.finalize())
}

async fn drain(store: &dyn ObjectStore, key: &str, range: ByteRange) -> MfResult<Bytes> {
    let mut result = store.get(key, Some(range)).await?;
    let mut buf = Vec::new();
    while let Some(chunk) = result.stream.next().await {
        buf.extend_from_slice(&chunk.map_err(|e| MfError::transient(e.to_string()))?);
    }
    Ok(Bytes::from(buf))
}

/// Fetch the first/last `CHUNK_SIZE` bytes of `key` and fingerprint them. For
/// objects smaller than two chunks the windows overlap; that's fine, the
/// hash is still deterministic and reproducible.
pub async fn fingerprint_object(store: &dyn ObjectStore, key: &str, file_size: u64) -> MfResult<String> {
    let first_len = file_size.min(CHUNK_SIZE);
    let first = drain(store, key, ByteRange { start: 0, end: Some(first_len.saturating_sub(1)) }).await?;

    let last_start = file_size.saturating_sub(CHUNK_SIZE);
    let last = if file_size == 0 {
        Bytes::new()
    } else {
        drain(store, key, ByteRange { start: last_start, end: Some(file_size - 1) }).await?
    };

    Ok(fingerprint_of(file_size, &first, &last))
}
