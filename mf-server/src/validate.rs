//! Request-field validation, kept independent of `mf-ingest::classify`: the
//! gateway rejects an obviously-bad upload request before anything is ever
//! written to the object store, which is a different moment (and a
//! different allow-list owner) than the ingest pipeline's own
//! classification of bytes that already landed.

use mf_core::{MfError, MfResult, SessionId};
use regex::Regex;
use std::sync::OnceLock;

const IMAGE_SUBTYPES: &[&str] = &[
    "jpeg", "png", "gif", "webp", "heic", "heif", "tiff", "bmp", "svg+xml", "x-adobe-dng", "x-canon-cr2",
    "x-canon-cr3", "x-nikon-nef", "x-sony-arw", "x-fuji-raf", "x-olympus-orf", "x-panasonic-rw2", "x-samsung-srw",
];

const VIDEO_SUBTYPES: &[&str] = &["mp4", "quicktime", "webm", "x-msvideo", "x-matroska", "3gpp", "MP2T"];

fn filename_re() -> &'static Regex {
    static RE: OnceLock<Regex> = OnceLock::new();
    RE.get_or_init(|| Regex::new(r"^[A-Za-z0-9][A-Za-z0-9._ ()-]{0,254}$").unwrap())
}

pub fn validate_session_id(raw: &str) -> MfResult<SessionId> {
    SessionId::parse(raw).ok_or_else(|| MfError::validation("sessionId must be a UUID v4"))
}

pub fn validate_filename(filename: &str) -> MfResult<()> {
    if !filename_re().is_match(filename) {
        return Err(MfError::validation("filename contains invalid characters"));
    }
    if filename.contains("..") || filename.contains('/') || filename.contains('\\') {
        return Err(MfError::validation("filename must not contain path separators"));
    }
    Ok(())
}

/// `objectKey` must be exactly `{sessionId}/{filename}` with `filename`
/// passing the same rules as a bare upload filename.
pub fn validate_object_key(session_id: &SessionId, object_key: &str) -> MfResult<()> {
    let prefix = format!("{}/", session_id.as_str());
    let filename = object_key
        .strip_prefix(&prefix)
        .ok_or_else(|| MfError::validation("objectKey must be {sessionId}/{filename}"))?;
    validate_filename(filename)
}

pub fn validate_content_type(content_type: &str) -> MfResult<()> {
    let (family, subtype) = content_type
        .split_once('/')
        .ok_or_else(|| MfError::validation("contentType must be a MIME type"))?;
    let allowed = match family {
        "image" => IMAGE_SUBTYPES.iter().any(|s| s.eq_ignore_ascii_case(subtype)),
        "video" => VIDEO_SUBTYPES.iter().any(|s| s.eq_ignore_ascii_case(subtype)),
        _ => false,
    };
    if allowed {
        Ok(())
    } else {
        Err(MfError::validation("contentType is not in the supported image/video allow-list"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn accepts_canonical_uuid_v4() {
        assert!(validate_session_id("a1b2c3d4-e5f6-4789-a012-3456789abcde").is_ok());
    }

    #[test]
    fn rejects_non_uuid_session_id() {
        assert!(validate_session_id("not-a-uuid").is_err());
    }

    #[test]
    fn rejects_filename_with_path_traversal() {
        assert!(validate_filename("../etc/passwd").is_err());
        assert!(validate_filename("a/b.jpg").is_err());
    }

    #[test]
    fn accepts_plain_filename() {
        assert!(validate_filename("vacation photo (1).jpg").is_ok());
    }

    #[test]
    fn object_key_must_be_prefixed_by_session_id() {
        let sid = validate_session_id("a1b2c3d4-e5f6-4789-a012-3456789abcde").unwrap();
        assert!(validate_object_key(&sid, "a1b2c3d4-e5f6-4789-a012-3456789abcde/a.jpg").is_ok());
        assert!(validate_object_key(&sid, "other-session/a.jpg").is_err());
    }

    #[test]
    fn content_type_allow_list() {
        assert!(validate_content_type("image/jpeg").is_ok());
        assert!(validate_content_type("video/quicktime").is_ok());
        assert!(validate_content_type("application/pdf").is_err());
    }
}
