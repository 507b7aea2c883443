//! Staging of PDF pages for remote merge and extraction
//!
//! Pages from one or more source documents are expanded into a
//! [`PageRegistry`], reordered, selected and rotated through a
//! [`StagingController`], then encoded into a single multipart request for
//! the remote processing service.

mod artifact;
pub mod controller;
mod options;
pub mod preview;
mod progress;
pub mod protocol;
mod registry;
pub mod reorder;
mod source;
pub mod transport;
mod types;

pub use artifact::Artifact;
pub use controller::{
    LoadReport, StagingController, SubmissionId, Submission, SubmitPhase, SubmitState,
};
pub use options::*;
pub use preview::{PlaceholderRenderer, PreviewJob, PreviewRenderer, PreviewState};
pub use progress::UploadProgress;
pub use protocol::{FormField, PageDescriptor, SubmissionRequest, WireForm};
pub use registry::{PageEntry, PageRegistry};
pub use reorder::move_entry;
pub use source::{FileBlob, PageSize, SourceFile};
pub use transport::{HttpTransport, Transport};
pub use types::*;
