use async_trait::async_trait;
use mf_core::MfResult;

/// EXIF/FFprobe metadata pulled from a downloaded file's bytes. Every field
/// is best-effort: a vendor library that can't parse a given file should
/// return `Ok(Metadata::default())` rather than fail the whole ingest step.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Metadata {
    pub gps: Option<(f64, f64)>,
    pub captured_at: Option<chrono::DateTime<chrono::Utc>>,
    pub duration_secs: Option<f64>,
    pub width: Option<u32>,
    pub height: Option<u32>,
}

/// Extracts capture metadata from file bytes. Failures here are non-fatal to
/// ingest: the caller records the file as `valid` regardless and simply
/// leaves the unavailable fields empty.
#[async_trait]
pub trait MetadataAnalyzer: Send + Sync {
    async fn analyze(&self, bytes: &[u8], content_type: &str) -> MfResult<Metadata>;
}

/// No-op analyzer for tests and environments without EXIF/FFprobe tooling
/// wired in. Always succeeds with an empty `Metadata`.
pub struct NullAnalyzer;

#[async_trait]
impl MetadataAnalyzer for NullAnalyzer {
    async fn analyze(&self, _bytes: &[u8], _content_type: &str) -> MfResult<Metadata> {
        Ok(Metadata::default())
    }
}

/// Thumbnail (and, for video, transcode) output of the derivation step.
#[derive(Debug, Clone, Default)]
pub struct Derivation {
    pub thumbnail: Option<Vec<u8>>,
    pub transcoded: Option<Vec<u8>>,
}

/// Produces a thumbnail and, for video, a compact transcode. Errors here are
/// non-fatal: on failure the pipeline reuses the original as `processedKey`
/// and records the file as `valid` anyway.
#[async_trait]
pub trait DerivationEngine: Send + Sync {
    async fn derive(&self, bytes: &[u8], content_type: &str) -> MfResult<Derivation>;
}

/// Derivation fake for tests and environments without a local transcoder:
/// never produces a thumbnail or transcode, so the pipeline's
/// reuse-the-original fallback always engages.
pub struct NullDerivationEngine;

#[async_trait]
impl DerivationEngine for NullDerivationEngine {
    async fn derive(&self, _bytes: &[u8], _content_type: &str) -> MfResult<Derivation> {
        Ok(Derivation::default())
    }
}
