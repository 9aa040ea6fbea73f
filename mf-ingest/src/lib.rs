//! mf-ingest: the per-file steps run against every newly-uploaded object —
//! route filtering, cost tagging, classification, content fingerprinting,
//! dedup, metadata extraction, thumbnail/transcode derivation, and
//! persistence of the resulting `FileResult`.

pub mod analyzer;
pub mod classify;
pub mod fingerprint;
pub mod pipeline;

pub use analyzer::{Derivation, DerivationEngine, Metadata, MetadataAnalyzer, NullAnalyzer, NullDerivationEngine};
pub use classify::{classify_content_type, is_own_artifact};
pub use fingerprint::{fingerprint_object, fingerprint_of};
pub use pipeline::IngestPipeline;

use bytes::Bytes;
use futures_util::StreamExt;
use mf_core::{MfError, MfResult};
use mf_store::{ByteStream, GetResult};

/// Wrap an in-memory buffer as a one-shot `ByteStream` for `ObjectStore::put`.
pub(crate) fn bytes_stream(bytes: Vec<u8>) -> ByteStream {
    Box::pin(futures_util::stream::once(async move { Ok(Bytes::from(bytes)) }))
}

/// Drain a whole `GetResult` body into memory. Ingest artifacts are bounded
/// (thumbnails, metadata reads on already-size-checked uploads), so buffering
/// the full stream is acceptable here unlike the download bundler.
pub(crate) async fn fingerprint_bytes(mut result: GetResult) -> MfResult<Bytes> {
    let mut buf = Vec::with_capacity(result.size_bytes as usize);
    while let Some(chunk) = result.stream.next().await {
        buf.extend_from_slice(&chunk.map_err(|e| MfError::transient(e.to_string()))?);
    }
    Ok(Bytes::from(buf))
}
