use std::io::{Cursor, Write};
use std::sync::Arc;

use futures_util::StreamExt;
use mf_core::{JobId, JobType, MfError, MfResult, SessionId};
use mf_registry::model::{BundleKind, BundleStatus, DownloadBundle, JobPayload, JobStatus};
use mf_registry::JobRegistry;
use mf_store::{ObjectStore, SignedUrlStore};

/// Per-archive size ceiling for video bundles; anything larger goes alone
/// in its own archive.
const MAX_VIDEO_BUNDLE_BYTES: u64 = 375 * 1024 * 1024;
const DOWNLOAD_URL_TTL_SECS: u64 = 3600;
const ZSTD_LEVEL: i32 = 12;

/// Sanitize a user-supplied group label to `[A-Za-z0-9 _-]`, trimmed and
/// capped at 50 characters.
pub fn sanitize_label(label: &str) -> String {
    let sanitized: String = label
        .chars()
        .map(|c| if c.is_ascii_alphanumeric() || c == ' ' || c == '_' || c == '-' { c } else { '-' })
        .collect();
    sanitized.trim().chars().take(50).collect()
}

struct InputFile {
    key: String,
    filename: String,
    size_bytes: u64,
    is_video: bool,
}

/// First-fit-decreasing bin packing into archives of at most `limit` bytes.
/// An item larger than `limit` on its own still gets its own bin.
fn pack_bins(mut files: Vec<InputFile>, limit: u64) -> Vec<Vec<InputFile>> {
    files.sort_by(|a, b| b.size_bytes.cmp(&a.size_bytes));
    let mut bins: Vec<(u64, Vec<InputFile>)> = Vec::new();
    for file in files {
        match bins.iter_mut().find(|(used, _)| *used + file.size_bytes <= limit) {
            Some((used, bin)) => {
                *used += file.size_bytes;
                bin.push(file);
            }
            None => bins.push((file.size_bytes, vec![file])),
        }
    }
    bins.into_iter().map(|(_, bin)| bin).collect()
}

pub struct DownloadWorker {
    jobs: JobRegistry,
    store: Arc<dyn SignedUrlStore>,
}

impl DownloadWorker {
    pub fn new(jobs: JobRegistry, store: Arc<dyn SignedUrlStore>) -> Self {
        Self { jobs, store }
    }

    pub async fn run(&self, session_id: &SessionId, job_id: &JobId, label: &str, keys: &[String]) -> MfResult<()> {
        let Some(record) = self.jobs.get(session_id, JobType::Download, job_id).await? else {
            return Ok(());
        };
        if record.status.is_terminal() {
            return Ok(());
        }
        let version = self.jobs.row_version(session_id, JobType::Download, job_id).await?;
        if !self.jobs.update_status(session_id, JobType::Download, job_id, version, JobStatus::Processing, None).await? {
            return Ok(());
        }

        let label = sanitize_label(label);
        let mut images = Vec::new();
        let mut videos = Vec::new();
        for key in keys {
            let head = self.store.head(key).await?;
            let filename = key.rsplit('/').next().unwrap_or(key).to_string();
            let is_video = head.content_type.as_deref().map(|c| c.starts_with("video/")).unwrap_or(false);
            let file = InputFile { key: key.clone(), filename, size_bytes: head.size_bytes, is_video };
            if is_video {
                videos.push(file);
            } else {
                images.push(file);
            }
        }

        let mut bundles = Vec::new();
        if !images.is_empty() {
            let name = format!("{label}-images.zip");
            bundles.push(self.build_bundle(session_id, job_id, BundleKind::Images, &name, images).await);
        }
        let video_bins = pack_bins(videos, MAX_VIDEO_BUNDLE_BYTES);
        for (n, bin) in video_bins.into_iter().enumerate() {
            let name = format!("{label}-videos-{}.zip", n + 1);
            bundles.push(self.build_bundle(session_id, job_id, BundleKind::Videos, &name, bin).await);
        }

        let version = self.jobs.row_version(session_id, JobType::Download, job_id).await?;
        self.jobs
            .update_payload(session_id, JobType::Download, job_id, version, move |payload| {
                if let JobPayload::Download(p) = payload {
                    p.bundles = bundles;
                }
            })
            .await?;

        let version = self.jobs.row_version(session_id, JobType::Download, job_id).await?;
        self.jobs.update_status(session_id, JobType::Download, job_id, version, JobStatus::Complete, None).await?;
        Ok(())
    }

    async fn build_bundle(&self, session_id: &SessionId, job_id: &JobId, kind: BundleKind, name: &str, files: Vec<InputFile>) -> DownloadBundle {
        let file_count = files.len() as u32;
        let total_size: u64 = files.iter().map(|f| f.size_bytes).sum();
        match self.zip_and_upload(session_id, job_id, name, &files).await {
            Ok((zip_key, zip_size)) => {
                let download_url = self.store.sign_get_attachment(&zip_key, name, DOWNLOAD_URL_TTL_SECS).await.ok();
                DownloadBundle {
                    kind,
                    name: name.to_string(),
                    file_count,
                    total_size,
                    status: BundleStatus::Complete,
                    zip_key: Some(zip_key),
                    zip_size: Some(zip_size),
                    download_url,
                    error: None,
                }
            }
            Err(e) => DownloadBundle {
                kind,
                name: name.to_string(),
                file_count,
                total_size,
                status: BundleStatus::Error,
                zip_key: None,
                zip_size: None,
                download_url: None,
                error: Some(e.client_message().to_string()),
            },
        }
    }

    async fn zip_and_upload(&self, session_id: &SessionId, job_id: &JobId, name: &str, files: &[InputFile]) -> MfResult<(String, u64)> {
        let mut buf = Vec::new();
        {
            let cursor = Cursor::new(&mut buf);
            let mut writer = zip::ZipWriter::new(cursor);
            let options = zip::write::FileOptions::default().compression_method(zip::CompressionMethod::Zstd).compression_level(Some(ZSTD_LEVEL));
            for file in files {
                let bytes = self.fetch(&file.key).await?;
                writer
                    .start_file(&file.filename, options)
                    .map_err(|e| MfError::internal(format!("zip write failed: {e}")))?;
                writer.write_all(&bytes).map_err(|e| MfError::internal(format!("zip write failed: {e}")))?;
            }
            writer.finish().map_err(|e| MfError::internal(format!("zip finalize failed: {e}")))?;
        }
        let zip_size = buf.len() as u64;
        let key = format!("{session_id}/downloads/{job_id}/{name}");
        self.store.put(&key, Some("application/zip"), bytes_stream(buf)).await?;
        Ok((key, zip_size))
    }

    async fn fetch(&self, key: &str) -> MfResult<Vec<u8>> {
        let mut result = self.store.get(key, None).await?;
        let mut out = Vec::new();
        while let Some(chunk) = result.stream.next().await {
            out.extend_from_slice(&chunk.map_err(|e| MfError::transient(e.to_string()))?);
        }
        Ok(out)
    }
}

fn bytes_stream(bytes: Vec<u8>) -> mf_store::ByteStream {
    Box::pin(futures_util::stream::once(async move { Ok(bytes::Bytes::from(bytes)) }))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sanitizes_unsafe_characters_and_truncates() {
        assert_eq!(sanitize_label("Trip: Tokyo/Osaka!"), "Trip- Tokyo-Osaka-");
        let long = "a".repeat(80);
        assert_eq!(sanitize_label(&long).len(), 50);
    }

    #[test]
    fn first_fit_decreasing_packs_large_files_alone() {
        let files = vec![
            InputFile { key: "a".into(), filename: "a".into(), size_bytes: 400 * 1024 * 1024, is_video: true },
            InputFile { key: "b".into(), filename: "b".into(), size_bytes: 100 * 1024 * 1024, is_video: true },
            InputFile { key: "c".into(), filename: "c".into(), size_bytes: 100 * 1024 * 1024, is_video: true },
        ];
        let bins = pack_bins(files, MAX_VIDEO_BUNDLE_BYTES);
        assert_eq!(bins.len(), 2);
        assert_eq!(bins[0].len(), 1);
        assert_eq!(bins[1].len(), 2);
    }

    proptest::proptest! {
        #[test]
        fn pack_bins_preserves_file_count_and_respects_limit(sizes in proptest::collection::vec(1u64..1_000_000, 0..50)) {
            let limit = 200_000u64;
            let file_count = sizes.len();
            let files: Vec<InputFile> = sizes
                .into_iter()
                .enumerate()
                .map(|(i, size_bytes)| InputFile { key: format!("k{i}"), filename: format!("f{i}"), size_bytes, is_video: true })
                .collect();

            let bins = pack_bins(files, limit);

            let packed_count: usize = bins.iter().map(|b| b.len()).sum();
            proptest::prop_assert_eq!(packed_count, file_count);

            for bin in &bins {
                let total: u64 = bin.iter().map(|f| f.size_bytes).sum();
                if bin.len() > 1 {
                    proptest::prop_assert!(total <= limit);
                }
            }
        }
    }
}
