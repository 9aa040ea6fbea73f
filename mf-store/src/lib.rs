//! mf-store: object storage abstraction and the multipart upload broker.
//!
//! `ObjectStore` is the narrow trait every artifact producer (ingest,
//! enhancement, download bundling) depends on; `SignedUrlStore` and
//! `MultipartStore` extend it for the two upload paths the gateway exposes.
//! `MemoryObjectStore` is the in-process fake used by tests and local/dev
//! runs; a production deployment swaps in an S3-compatible backend without
//! touching any caller.

pub mod broker;
pub mod memory;
pub mod store;
pub mod types;

pub use broker::{InitResult, MediaClass, MultipartBroker};
pub use memory::MemoryObjectStore;
pub use store::{MultipartStore, ObjectStore, SignedUrlStore};
pub use types::{ByteRange, ByteStream, CompletedPart, GetResult, ObjectHead, PutResult, UploadId};
