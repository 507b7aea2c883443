use std::path::PathBuf;
use std::sync::Arc;

mod worker;

pub use worker::worker_task;

// Re-export types from the staging library
pub use pdf_stage::{
    Artifact, FileBlob, Operation, PageId, PlaceholderRenderer, PreviewRenderer, Rotation,
    ServiceOptions, StagingController, Transport,
};

/// Commands sent from UI to worker
#[derive(Debug)]
pub enum StageCommand {
    LoadFiles {
        paths: Vec<PathBuf>,
    },
    LoadBlobs {
        files: Vec<FileBlob>,
    },
    DeleteEntry {
        id: PageId,
    },
    RotateEntry {
        id: PageId,
    },
    ToggleSelect {
        id: PageId,
    },
    SelectAll,
    DeselectAll,
    /// Drag gesture: `dragged` was dropped onto `target`
    Reorder {
        dragged: PageId,
        target: PageId,
    },
    Submit {
        operation: Operation,
    },
    AbortSubmit,
    SaveArtifact {
        path: PathBuf,
    },
    Reset,
}

/// Updates sent from worker to UI
#[derive(Debug, Clone)]
pub enum StageUpdate {
    Progress {
        operation: String,
        current: usize,
        total: usize,
    },
    /// Full staging snapshot, sent after every change
    Staged {
        pages: Vec<PageView>,
    },
    PreviewReady {
        id: PageId,
        image: Arc<image::RgbaImage>,
    },
    PreviewFailed {
        id: PageId,
        message: String,
    },
    SubmitStarted {
        operation: Operation,
        page_count: usize,
    },
    /// Upload finished; waiting for the service
    Processing,
    SubmitComplete {
        artifact: Artifact,
    },
    SubmitFailed {
        message: String,
    },
    SubmitAborted,
    ArtifactSaved {
        path: PathBuf,
    },
    Error {
        message: String,
    },
}

/// What the UI needs to draw one staged page
#[derive(Debug, Clone, PartialEq)]
pub struct PageView {
    pub id: PageId,
    pub source_name: String,
    pub source_page_number: u32,
    pub rotation: Rotation,
    pub selected: bool,
}
