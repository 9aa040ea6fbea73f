use chrono::{DateTime, Utc};
use mf_core::{JobId, JobType, SessionId};
use serde::{Deserialize, Serialize};

pub const SCHEMA_VERSION: u16 = 1;

/// Status lifecycle shared by every job type. Transitions are one-way:
/// `Pending -> Processing -> (Complete | Error)`. `Complete`/`Error` are
/// frozen once reached.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Complete,
    Error,
}

impl JobStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Error)
    }

    /// `true` iff moving from `self` to `next` is a legal forward transition.
    pub fn can_advance_to(self, next: JobStatus) -> bool {
        use JobStatus::*;
        matches!(
            (self, next),
            (Pending, Processing) | (Pending, Complete) | (Pending, Error)
                | (Processing, Complete) | (Processing, Error)
        )
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SessionStatus {
    Active,
    Closed,
}

/// Session META: created lazily on first authenticated write, owner-bound
/// for the life of the session.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionMeta {
    pub id: SessionId,
    pub owner_subject: String,
    pub created_at: DateTime<Utc>,
    pub last_activity_at: DateTime<Utc>,
    pub status: SessionStatus,
    pub schema_version: u16,
}

impl SessionMeta {
    pub fn new(id: SessionId, owner_subject: String) -> Self {
        let now = Utc::now();
        Self {
            id,
            owner_subject,
            created_at: now,
            last_activity_at: now,
            status: SessionStatus::Active,
            schema_version: SCHEMA_VERSION,
        }
    }
}

/// A single per-file classification verdict, as produced by the triage
/// worker's analysis phase.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriageVerdict {
    pub filename: String,
    pub media_index: usize,
    pub verdict: String,
    pub reason: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TriagePayload {
    pub expected_file_count: u32,
    pub processed_count: i64,
    pub keep: Vec<TriageVerdict>,
    pub discard: Vec<TriageVerdict>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionItem {
    pub media_index: usize,
    pub filename: String,
    pub reason: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SceneGroup {
    pub label: String,
    pub media_indexes: Vec<usize>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SelectionPayload {
    pub selected: Vec<SelectionItem>,
    pub excluded: Vec<SelectionItem>,
    pub scene_groups: Vec<SceneGroup>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeedbackEntry {
    pub feedback: String,
    pub applied_at: DateTime<Utc>,
}

/// A single enhancement item, advancing monotonically through
/// `initial -> phase1 -> phase2 -> phase3 -> complete` (or `error`, or
/// `feedback` after a post-completion edit).
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementItem {
    pub index: usize,
    pub key: String,
    pub filename: String,
    pub original_key: String,
    pub phase: String,
    pub enhanced_key: Option<String>,
    pub enhanced_thumb_key: Option<String>,
    pub analysis: Option<serde_json::Value>,
    pub edits: u32,
    pub feedback_history: Vec<FeedbackEntry>,
    pub error: Option<String>,
}

impl EnhancementItem {
    pub fn new(index: usize, key: String, filename: String, original_key: String) -> Self {
        Self {
            index,
            key,
            filename,
            original_key,
            phase: "initial".to_string(),
            enhanced_key: None,
            enhanced_thumb_key: None,
            analysis: None,
            edits: 0,
            feedback_history: Vec::new(),
            error: None,
        }
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EnhancementPayload {
    pub total_count: u32,
    pub completed_count: i64,
    pub items: Vec<EnhancementItem>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleKind {
    Images,
    Videos,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BundleStatus {
    Pending,
    Complete,
    Error,
}

/// One archive produced by the download worker. Embedded on the Download
/// Job, never a standalone row.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadBundle {
    pub kind: BundleKind,
    pub name: String,
    pub file_count: u32,
    pub total_size: u64,
    pub status: BundleStatus,
    pub zip_key: Option<String>,
    pub zip_size: Option<u64>,
    pub download_url: Option<String>,
    pub error: Option<String>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DownloadPayload {
    pub bundles: Vec<DownloadBundle>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ConversationTurn {
    pub role: String,
    pub content: String,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DescriptionPayload {
    pub caption: Option<String>,
    pub hashtags: Vec<String>,
    pub location_tag: Option<String>,
    pub history: Vec<ConversationTurn>,
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PublishPayload {
    pub container_ids: Vec<String>,
    pub external_post_id: Option<String>,
}

/// Type-tagged payload, one variant per job type. The common envelope
/// (`id`, `status`, `phase`, `error`, `createdAt`) lives on `JobRecord`
/// itself; this carries only what's specific to the job.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "jobType")]
pub enum JobPayload {
    Triage(TriagePayload),
    Selection(SelectionPayload),
    Enhancement(EnhancementPayload),
    Download(DownloadPayload),
    Description(DescriptionPayload),
    Publish(PublishPayload),
}

impl JobPayload {
    pub fn job_type(&self) -> JobType {
        match self {
            Self::Triage(_) => JobType::Triage,
            Self::Selection(_) => JobType::Selection,
            Self::Enhancement(_) => JobType::Enhancement,
            Self::Download(_) => JobType::Download,
            Self::Description(_) => JobType::Description,
            Self::Publish(_) => JobType::Publish,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: JobId,
    pub session_id: SessionId,
    pub status: JobStatus,
    pub phase: String,
    pub error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub schema_version: u16,
    pub payload: JobPayload,
}

impl JobRecord {
    pub fn new(session_id: SessionId, payload: JobPayload, phase: impl Into<String>) -> Self {
        Self {
            id: JobId::new(payload.job_type()),
            session_id,
            status: JobStatus::Pending,
            phase: phase.into(),
            error: None,
            created_at: Utc::now(),
            schema_version: SCHEMA_VERSION,
            payload,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileStatus {
    Valid,
    Invalid,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FileKind {
    Image,
    Video,
}

/// Per-file metadata written once by the ingest pipeline. Unique per
/// `(sessionId, jobId, filename)`.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FileResult {
    pub filename: String,
    pub status: FileStatus,
    pub original_key: String,
    pub processed_key: Option<String>,
    pub thumbnail_key: Option<String>,
    pub file_type: Option<FileKind>,
    pub mime_type: Option<String>,
    pub file_size: u64,
    pub converted: bool,
    pub fingerprint: Option<String>,
    pub metadata: std::collections::BTreeMap<String, String>,
    pub error: Option<String>,
}
