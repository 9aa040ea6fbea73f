use mf_registry::model::FileKind;

/// Sub-directories the pipeline itself writes to; a "new object" notification
/// for a key under one of these is our own artifact, not a user upload.
const ARTIFACT_PREFIXES: &[&str] = &["thumbnails/", "processed/", "compressed/", "enhanced/", "downloads/"];

const IMAGE_SUBTYPES: &[&str] = &[
    "jpeg", "png", "gif", "webp", "heic", "heif", "tiff", "bmp", "svg+xml", "x-adobe-dng", "x-canon-cr2",
    "x-canon-cr3", "x-nikon-nef", "x-sony-arw", "x-fuji-raf", "x-olympus-orf", "x-panasonic-rw2", "x-samsung-srw",
];

const VIDEO_SUBTYPES: &[&str] =
    &["mp4", "quicktime", "webm", "x-msvideo", "x-matroska", "3gpp", "MP2T"];

/// `true` if `key`, stripped of its `{sessionId}/` prefix, falls under one of
/// the pipeline's own output sub-directories and should be skipped rather
/// than re-ingested.
pub fn is_own_artifact(key: &str) -> bool {
    let rest = match key.split_once('/') {
        Some((_, rest)) => rest,
        None => return false,
    };
    ARTIFACT_PREFIXES.iter().any(|p| rest.starts_with(p))
}

/// Validate a `image/<subtype>` or `video/<subtype>` MIME against the
/// allow-list and return which family it belongs to.
pub fn classify_content_type(content_type: &str) -> Option<FileKind> {
    let (family, subtype) = content_type.split_once('/')?;
    match family {
        "image" if IMAGE_SUBTYPES.iter().any(|s| s.eq_ignore_ascii_case(subtype)) => Some(FileKind::Image),
        "video" if VIDEO_SUBTYPES.iter().any(|s| s.eq_ignore_ascii_case(subtype)) => Some(FileKind::Video),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn skips_keys_under_own_output_directories() {
        assert!(is_own_artifact("session-1/thumbnails/a.jpg"));
        assert!(is_own_artifact("session-1/downloads/dl-abc/archive.zip"));
        assert!(!is_own_artifact("session-1/photo.jpg"));
    }

    #[test]
    fn classifies_known_image_and_video_subtypes() {
        assert_eq!(classify_content_type("image/jpeg"), Some(FileKind::Image));
        assert_eq!(classify_content_type("image/x-canon-cr2"), Some(FileKind::Image));
        assert_eq!(classify_content_type("video/quicktime"), Some(FileKind::Video));
        assert_eq!(classify_content_type("video/MP2T"), Some(FileKind::Video));
    }

    #[test]
    fn rejects_unknown_subtype() {
        assert_eq!(classify_content_type("application/pdf"), None);
        assert_eq!(classify_content_type("image/x-made-up"), None);
    }
}
