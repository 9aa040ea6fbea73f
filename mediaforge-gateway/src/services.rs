use std::sync::Arc;

use mf_registry::{FileResultRegistry, JobRegistry};
use mf_store::{ObjectStore, SignedUrlStore};
use mf_workers::{CaptionVendor, EnhancementVendor, PublishVendor, VisionVendor};

/// Everything the coordinator/invoker adapters need to actually run a
/// worker in-process, gathered in one place so `main.rs` only wires it
/// once. `mediaforge-gateway` owns this bundle; `mf-server` never sees it.
pub struct Services {
    pub jobs: JobRegistry,
    pub files: FileResultRegistry,
    pub signed_store: Arc<dyn SignedUrlStore>,
    pub object_store: Arc<dyn ObjectStore>,
    pub vision_vendor: Arc<dyn VisionVendor>,
    pub caption_vendor: Arc<dyn CaptionVendor>,
    pub publish_vendor: Arc<dyn PublishVendor>,
    pub enhancement_vendor: Arc<dyn EnhancementVendor>,
}
