use rand::RngCore;
use serde::{Deserialize, Serialize};
use std::fmt;
use uuid::Uuid;

/// Session identifier — a UUID v4, one per authenticated user workspace.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct SessionId(pub String);

impl SessionId {
    pub fn new() -> Self {
        Self(Uuid::new_v4().to_string())
    }

    /// Parse and validate a UUID v4 string. Returns `None` on any other shape.
    pub fn parse(s: &str) -> Option<Self> {
        let uuid = Uuid::parse_str(s).ok()?;
        if uuid.get_version_num() != 4 {
            return None;
        }
        Some(Self(uuid.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl Default for SessionId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// The six job families the core knows how to orchestrate. Each has a fixed,
/// short URL-routing prefix.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum JobType {
    Triage,
    Selection,
    Enhancement,
    Download,
    Description,
    Publish,
}

impl JobType {
    /// Sort-key discriminant, e.g. `TRIAGE`, used as the `{JOB_TYPE}` component
    /// of a Job's sort key.
    pub fn sort_key_tag(self) -> &'static str {
        match self {
            Self::Triage => "TRIAGE",
            Self::Selection => "SELECTION",
            Self::Enhancement => "ENHANCEMENT",
            Self::Download => "DOWNLOAD",
            Self::Description => "DESCRIPTION",
            Self::Publish => "PUBLISH",
        }
    }

    /// 2-8 char id prefix used for cheap URL routing.
    pub fn id_prefix(self) -> &'static str {
        match self {
            Self::Triage => "triage-",
            Self::Selection => "sel-",
            Self::Enhancement => "enh-",
            Self::Download => "dl-",
            Self::Description => "desc-",
            Self::Publish => "pub-",
        }
    }

    /// Recover the job type from an id's prefix. Used by the gateway to route
    /// a bare job id to the right poll handler without a lookup.
    pub fn from_id(id: &str) -> Option<Self> {
        for jt in [
            Self::Triage,
            Self::Selection,
            Self::Enhancement,
            Self::Download,
            Self::Description,
            Self::Publish,
        ] {
            if id.starts_with(jt.id_prefix()) {
                return Some(jt);
            }
        }
        None
    }
}

/// Job identifier: `{prefix}{32 lowercase hex chars}`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct JobId(pub String);

impl JobId {
    pub fn new(job_type: JobType) -> Self {
        let mut bytes = [0u8; 16];
        rand::thread_rng().fill_bytes(&mut bytes);
        let hex: String = bytes.iter().map(|b| format!("{:02x}", b)).collect();
        Self(format!("{}{}", job_type.id_prefix(), hex))
    }

    pub fn from_string(id: String) -> Self {
        Self(id)
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }

    pub fn job_type(&self) -> Option<JobType> {
        JobType::from_id(&self.0)
    }

    /// The sort key a Job record lives under: `{JOB_TYPE}#{jobId}`.
    pub fn sort_key(&self) -> String {
        match self.job_type() {
            Some(jt) => format!("{}#{}", jt.sort_key_tag(), self.0),
            None => format!("UNKNOWN#{}", self.0),
        }
    }
}

impl fmt::Display for JobId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

impl From<String> for JobId {
    fn from(id: String) -> Self {
        Self(id)
    }
}

impl From<&str> for JobId {
    fn from(id: &str) -> Self {
        Self(id.to_string())
    }
}
