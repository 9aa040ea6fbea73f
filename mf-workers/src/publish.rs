use std::sync::Arc;
use std::time::Duration;

use mf_core::{JobId, JobType, MfError, MfResult, SessionId};
use mf_registry::model::{JobPayload, JobStatus};
use mf_registry::JobRegistry;
use mf_store::SignedUrlStore;
use tokio::time::sleep;

use crate::vendor::{ContainerStatus, PublishVendor};

const MEDIA_URL_TTL_SECS: u64 = 3600;
const CONTAINER_POLL_INTERVAL: Duration = Duration::from_secs(2);
const CONTAINER_POLL_TIMEOUT: Duration = Duration::from_secs(120);

pub struct MediaItem {
    pub key: String,
    pub is_video: bool,
}

/// `creating_containers -> processing_videos -> creating_carousel ->
/// publishing -> published` (or `error`). `phase` tracks the stage name;
/// `status` only moves `pending/processing -> complete/error`.
pub struct PublishWorker {
    jobs: JobRegistry,
    store: Arc<dyn SignedUrlStore>,
    vendor: Arc<dyn PublishVendor>,
}

impl PublishWorker {
    pub fn new(jobs: JobRegistry, store: Arc<dyn SignedUrlStore>, vendor: Arc<dyn PublishVendor>) -> Self {
        Self { jobs, store, vendor }
    }

    pub async fn run(&self, session_id: &SessionId, job_id: &JobId, media: Vec<MediaItem>) -> MfResult<()> {
        let Some(record) = self.jobs.get(session_id, JobType::Publish, job_id).await? else {
            return Ok(());
        };
        if record.status.is_terminal() {
            return Ok(());
        }
        let version = self.jobs.row_version(session_id, JobType::Publish, job_id).await?;
        if !self.jobs.update_status(session_id, JobType::Publish, job_id, version, JobStatus::Processing, None).await? {
            return Ok(());
        }

        match self.run_stages(session_id, job_id, media).await {
            Ok(()) => Ok(()),
            Err(e) => {
                if let Ok(version) = self.jobs.row_version(session_id, JobType::Publish, job_id).await {
                    let _ = self.jobs.update_status(session_id, JobType::Publish, job_id, version, JobStatus::Error, Some(e.client_message().to_string())).await;
                }
                Err(e)
            }
        }
    }

    async fn run_stages(&self, session_id: &SessionId, job_id: &JobId, media: Vec<MediaItem>) -> MfResult<()> {
        self.set_phase(session_id, job_id, "creating_containers").await?;
        let mut child_ids = Vec::new();
        let mut video_ids = Vec::new();
        for item in &media {
            let url = self.store.sign_get(&item.key, MEDIA_URL_TTL_SECS).await?;
            let container_id = self.vendor.create_child_container(&url, item.is_video).await?;
            if item.is_video {
                video_ids.push(container_id.clone());
            }
            child_ids.push(container_id);
        }

        if !video_ids.is_empty() {
            self.set_phase(session_id, job_id, "processing_videos").await?;
            for container_id in &video_ids {
                self.wait_for_finished(container_id).await?;
            }
        }

        let publish_container_id = if child_ids.len() > 1 {
            self.set_phase(session_id, job_id, "creating_carousel").await?;
            self.vendor.create_carousel_container(&child_ids).await?
        } else {
            child_ids
                .first()
                .cloned()
                .ok_or_else(|| MfError::validation("publish requires at least one media item"))?
        };

        self.set_phase(session_id, job_id, "publishing").await?;
        let external_post_id = self.vendor.publish(&publish_container_id).await?;

        let version = self.jobs.row_version(session_id, JobType::Publish, job_id).await?;
        self.jobs
            .update_payload(session_id, JobType::Publish, job_id, version, move |payload| {
                if let JobPayload::Publish(p) = payload {
                    p.container_ids = child_ids;
                    p.external_post_id = Some(external_post_id);
                }
            })
            .await?;

        self.set_phase(session_id, job_id, "published").await?;
        let version = self.jobs.row_version(session_id, JobType::Publish, job_id).await?;
        self.jobs.update_status(session_id, JobType::Publish, job_id, version, JobStatus::Complete, None).await?;
        Ok(())
    }

    async fn set_phase(&self, session_id: &SessionId, job_id: &JobId, phase: &str) -> MfResult<()> {
        let version = self.jobs.row_version(session_id, JobType::Publish, job_id).await?;
        self.jobs.set_phase(session_id, JobType::Publish, job_id, version, phase).await?;
        Ok(())
    }

    async fn wait_for_finished(&self, container_id: &str) -> MfResult<()> {
        let deadline = tokio::time::Instant::now() + CONTAINER_POLL_TIMEOUT;
        loop {
            match self.vendor.container_status(container_id).await? {
                ContainerStatus::Finished => return Ok(()),
                ContainerStatus::Error => return Err(MfError::transient(format!("video container {container_id} failed to process"))),
                ContainerStatus::InProgress => {
                    if tokio::time::Instant::now() >= deadline {
                        return Err(MfError::transient(format!("video container {container_id} timed out")));
                    }
                    sleep(CONTAINER_POLL_INTERVAL).await;
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vendor::fakes::FakePublishVendor;
    use mf_kv::MemoryKvStore;
    use mf_registry::model::{JobRecord, PublishPayload};
    use mf_store::MemoryObjectStore;

    #[tokio::test]
    async fn single_image_publishes_without_a_carousel() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv);
        let store: Arc<dyn SignedUrlStore> = Arc::new(MemoryObjectStore::default());
        let session_id = SessionId::new();
        let record = jobs
            .create_job(JobRecord::new(session_id.clone(), JobPayload::Publish(PublishPayload::default()), "pending"), None)
            .await
            .unwrap();

        let worker = PublishWorker::new(jobs.clone(), store, Arc::new(FakePublishVendor));
        let media = vec![MediaItem { key: "s1/a.jpg".to_string(), is_video: false }];
        worker.run(&session_id, &record.id, media).await.unwrap();

        let updated = jobs.get(&session_id, JobType::Publish, &record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Complete);
        assert_eq!(updated.phase, "published");
        if let JobPayload::Publish(p) = &updated.payload {
            assert_eq!(p.container_ids.len(), 1);
            assert!(p.external_post_id.is_some());
        } else {
            panic!("expected publish payload");
        }
    }

    #[tokio::test]
    async fn multiple_items_go_through_the_carousel_stage() {
        let kv = Arc::new(MemoryKvStore::new());
        let jobs = JobRegistry::new(kv);
        let store: Arc<dyn SignedUrlStore> = Arc::new(MemoryObjectStore::default());
        let session_id = SessionId::new();
        let record = jobs
            .create_job(JobRecord::new(session_id.clone(), JobPayload::Publish(PublishPayload::default()), "pending"), None)
            .await
            .unwrap();

        let worker = PublishWorker::new(jobs.clone(), store, Arc::new(FakePublishVendor));
        let media = vec![
            MediaItem { key: "s1/a.jpg".to_string(), is_video: false },
            MediaItem { key: "s1/b.jpg".to_string(), is_video: false },
        ];
        worker.run(&session_id, &record.id, media).await.unwrap();

        let updated = jobs.get(&session_id, JobType::Publish, &record.id).await.unwrap().unwrap();
        assert_eq!(updated.status, JobStatus::Complete);
        if let JobPayload::Publish(p) = &updated.payload {
            assert_eq!(p.container_ids.len(), 2);
        } else {
            panic!("expected publish payload");
        }
    }
}
