use std::sync::Arc;

use mf_core::{JobId, JobType, MfResult, SessionId};
use mf_registry::model::{ConversationTurn, JobPayload, JobStatus};
use mf_registry::JobRegistry;
use mf_store::SignedUrlStore;

use crate::vendor::{CaptionRequest, CaptionVendor};

const THUMBNAIL_URL_TTL_SECS: u64 = 3600;

/// Assembles the caption request (label, trip context, member thumbnails)
/// and writes the vendor's `{caption, hashtags, locationTag}` response.
/// Supports iterative regeneration by feeding accumulated history back in.
pub struct DescriptionWorker {
    jobs: JobRegistry,
    store: Arc<dyn SignedUrlStore>,
    vendor: Arc<dyn CaptionVendor>,
}

impl DescriptionWorker {
    pub fn new(jobs: JobRegistry, store: Arc<dyn SignedUrlStore>, vendor: Arc<dyn CaptionVendor>) -> Self {
        Self { jobs, store, vendor }
    }

    pub async fn generate(
        &self,
        session_id: &SessionId,
        job_id: &JobId,
        post_label: &str,
        trip_context: Option<String>,
        thumbnail_keys: &[String],
    ) -> MfResult<()> {
        let Some(record) = self.jobs.get(session_id, JobType::Description, job_id).await? else {
            return Ok(());
        };
        if record.status.is_terminal() {
            return Ok(());
        }
        let version = self.jobs.row_version(session_id, JobType::Description, job_id).await?;
        if !self.jobs.update_status(session_id, JobType::Description, job_id, version, JobStatus::Processing, None).await? {
            return Ok(());
        }

        let mut thumbnail_urls = Vec::new();
        for key in thumbnail_keys {
            if let Ok(url) = self.store.sign_get(key, THUMBNAIL_URL_TTL_SECS).await {
                thumbnail_urls.push(url);
            }
        }

        let request = CaptionRequest { post_label: post_label.to_string(), trip_context, thumbnail_urls, history: Vec::new(), feedback: None };
        let response = self.vendor.caption(&request).await?;

        let version = self.jobs.row_version(session_id, JobType::Description, job_id).await?;
        let history_turn = ConversationTurn { role: "assistant".to_string(), content: response.caption.clone() };
        self.jobs
            .update_payload(session_id, JobType::Description, job_id, version, move |payload| {
                if let JobPayload::Description(p) = payload {
                    p.caption = Some(response.caption);
                    p.hashtags = response.hashtags;
                    p.location_tag = response.location_tag;
                    p.history.push(history_turn);
                }
            })
            .await?;

        let version = self.jobs.row_version(session_id, JobType::Description, job_id).await?;
        self.jobs.update_status(session_id, JobType::Description, job_id, version, JobStatus::Complete, None).await?;
        Ok(())
    }

    /// Regenerate: append the user's feedback to the conversation history
    /// and ask the vendor for a fresh caption given the full transcript.
    pub async fn regenerate(&self, session_id: &SessionId, job_id: &JobId, post_label: &str, feedback: String) -> MfResult<()> {
        let Some(record) = self.jobs.get(session_id, JobType::Description, job_id).await? else {
            return Ok(());
        };
        let history = match &record.payload {
            JobPayload::Description(p) => p.history.clone(),
            _ => Vec::new(),
        };

        let request = CaptionRequest {
            post_label: post_label.to_string(),
            trip_context: None,
            thumbnail_urls: Vec::new(),
            history: history.into_iter().map(|t| (t.role, t.content)).collect(),
            feedback: Some(feedback.clone()),
        };
        let response = self.vendor.caption(&request).await?;

        let version = self.jobs.row_version(session_id, JobType::Description, job_id).await?;
        self.jobs
            .update_payload(session_id, JobType::Description, job_id, version, move |payload| {
                if let JobPayload::Description(p) = payload {
                    p.history.push(ConversationTurn { role: "user".to_string(), content: feedback });
                    p.history.push(ConversationTurn { role: "assistant".to_string(), content: response.caption.clone() });
                    p.caption = Some(response.caption);
                    p.hashtags = response.hashtags;
                    p.location_tag = response.location_tag;
                }
            })
            .await?;
        Ok(())
    }
}
