//! Upload coordination.
//!
//! - **Single**: validate the submission locally, then upload one file.
//! - **Batch**: upload many files concurrently into a batch job, tracking each
//!   in a two-phase [`ItemRegistry`] until the service assigns its id.

mod coordinator;
mod registry;

pub use coordinator::{
    submit_request, submit_single, upload_batch_files, BatchUploadReport, SingleSubmission,
};
pub use registry::{ItemRegistry, ProvisionalKey, RegistryError, TrackedItem, UploadState};
