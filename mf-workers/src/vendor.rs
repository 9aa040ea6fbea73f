use async_trait::async_trait;
use mf_core::MfResult;
use serde::{Deserialize, Serialize};

/// One file offered to the vision vendor for triage classification.
#[derive(Debug, Clone, Serialize)]
pub struct TriageCandidate {
    pub media_index: usize,
    pub filename: String,
    pub thumbnail_url: String,
    pub is_video: bool,
    pub duration_secs: Option<f64>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct TriageVerdict {
    pub media_index: usize,
    pub verdict: String,
    pub reason: String,
}

/// One file offered to the vision vendor for selection ranking.
#[derive(Debug, Clone, Serialize)]
pub struct SelectionCandidate {
    pub media_index: usize,
    pub filename: String,
    pub thumbnail_url: String,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct SelectionVerdict {
    pub selected: Vec<usize>,
    pub excluded: Vec<(usize, String)>,
    pub scene_groups: Vec<(String, Vec<usize>)>,
}

/// Generative-vision calls: triage keep/discard classification and
/// selection ranking. Both take a batch and return a best-effort, possibly
/// incomplete, JSON verdict — callers apply tie-break and range-validation
/// rules to the response, never trust it blindly.
#[async_trait]
pub trait VisionVendor: Send + Sync {
    async fn classify_triage(&self, candidates: &[TriageCandidate]) -> MfResult<Vec<TriageVerdict>>;

    async fn rank_selection(&self, candidates: &[SelectionCandidate]) -> MfResult<SelectionVerdict>;
}

#[derive(Debug, Clone)]
pub struct CaptionRequest {
    pub post_label: String,
    pub trip_context: Option<String>,
    pub thumbnail_urls: Vec<String>,
    pub history: Vec<(String, String)>,
    pub feedback: Option<String>,
}

#[derive(Debug, Clone, Deserialize, Default)]
pub struct CaptionResponse {
    pub caption: String,
    pub hashtags: Vec<String>,
    pub location_tag: Option<String>,
}

#[async_trait]
pub trait CaptionVendor: Send + Sync {
    async fn caption(&self, request: &CaptionRequest) -> MfResult<CaptionResponse>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerStatus {
    InProgress,
    Finished,
    Error,
}

/// Publishing side: container creation, video-processing polling, carousel
/// assembly and the final publish call. One vendor implementation maps
/// directly onto one social platform's Graph-style publishing API.
#[async_trait]
pub trait PublishVendor: Send + Sync {
    async fn create_child_container(&self, media_url: &str, is_video: bool) -> MfResult<String>;

    async fn container_status(&self, container_id: &str) -> MfResult<ContainerStatus>;

    async fn create_carousel_container(&self, child_container_ids: &[String]) -> MfResult<String>;

    async fn publish(&self, container_id: &str) -> MfResult<String>;
}

/// Deterministic vendor fakes for tests and local dev: vision keeps
/// everything selected is accepted, caption echoes the label, publish
/// mints predictable ids and finishes containers immediately.
pub mod fakes {
    use super::*;

    pub struct FakeVisionVendor;

    #[async_trait]
    impl VisionVendor for FakeVisionVendor {
        async fn classify_triage(&self, candidates: &[TriageCandidate]) -> MfResult<Vec<TriageVerdict>> {
            Ok(candidates
                .iter()
                .map(|c| TriageVerdict { media_index: c.media_index, verdict: "keep".to_string(), reason: "looks good".to_string() })
                .collect())
        }

        async fn rank_selection(&self, candidates: &[SelectionCandidate]) -> MfResult<SelectionVerdict> {
            Ok(SelectionVerdict {
                selected: candidates.iter().map(|c| c.media_index).collect(),
                excluded: Vec::new(),
                scene_groups: Vec::new(),
            })
        }
    }

    pub struct FakeCaptionVendor;

    #[async_trait]
    impl CaptionVendor for FakeCaptionVendor {
        async fn caption(&self, request: &CaptionRequest) -> MfResult<CaptionResponse> {
            Ok(CaptionResponse { caption: format!("A trip to {}", request.post_label), hashtags: vec!["#travel".into()], location_tag: None })
        }
    }

    pub struct FakePublishVendor;

    #[async_trait]
    impl PublishVendor for FakePublishVendor {
        async fn create_child_container(&self, _media_url: &str, _is_video: bool) -> MfResult<String> {
            Ok(format!("container-{}", uuid::Uuid::new_v4().simple()))
        }

        async fn container_status(&self, _container_id: &str) -> MfResult<ContainerStatus> {
            Ok(ContainerStatus::Finished)
        }

        async fn create_carousel_container(&self, _child_container_ids: &[String]) -> MfResult<String> {
            Ok(format!("carousel-{}", uuid::Uuid::new_v4().simple()))
        }

        async fn publish(&self, _container_id: &str) -> MfResult<String> {
            Ok(format!("post-{}", uuid::Uuid::new_v4().simple()))
        }
    }
}
