//! mf-workers: the state machine for each job type, driven by a
//! `PipelineCoordinator`/`WorkerInvoker` dispatch from `mf-dispatch`. Every
//! worker shares the same shape: read the job, bail out silently if it's
//! already terminal, mark it `processing`, do the work, write results with a
//! conditional update, and reach a terminal status.

pub mod description;
pub mod download;
pub mod enhancement;
pub mod publish;
pub mod selection;
pub mod triage;
pub mod vendor;

pub use description::DescriptionWorker;
pub use download::{sanitize_label, DownloadWorker};
pub use enhancement::{EnhancementVendor, EnhancementWorker, FakeEnhancementVendor};
pub use publish::{MediaItem, PublishWorker};
pub use selection::SelectionWorker;
pub use triage::TriageWorker;
pub use vendor::{CaptionVendor, ContainerStatus, PublishVendor, VisionVendor};
