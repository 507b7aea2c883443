//! Staging controller
//!
//! Owns the loaded sources and the page registry, applies commands one at a
//! time and runs the submission state machine:
//!
//! ```text
//! Idle -> Submitting(Uploading -> Processing) -> Idle
//! ```
//!
//! While a submission is in flight every mutating command is rejected with
//! [`StageError::SubmissionInProgress`]. A failed or aborted submission
//! leaves staging untouched so it can be retried.

use crate::artifact::Artifact;
use crate::options::ServiceOptions;
use crate::preview::{PreviewJob, PreviewState};
use crate::progress::UploadProgress;
use crate::protocol::{SubmissionRequest, WireForm};
use crate::registry::PageRegistry;
use crate::reorder::move_entry;
use crate::source::{FileBlob, SourceFile};
use crate::transport::Transport;
use crate::types::*;
use image::RgbaImage;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubmissionId(pub u64);

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitPhase {
    /// Request body still leaving the client
    Uploading,
    /// Body sent, waiting for the service to answer
    Processing,
}

#[derive(Debug, Clone, Default)]
pub enum SubmitState {
    #[default]
    Idle,
    Submitting {
        id: SubmissionId,
        operation: Operation,
        progress: UploadProgress,
        cancel: CancellationToken,
    },
}

impl SubmitState {
    pub fn phase(&self) -> Option<SubmitPhase> {
        match self {
            SubmitState::Idle => None,
            SubmitState::Submitting { progress, .. } if progress.is_complete() => {
                Some(SubmitPhase::Processing)
            }
            SubmitState::Submitting { .. } => Some(SubmitPhase::Uploading),
        }
    }
}

/// Outcome of loading a batch of files
#[derive(Debug, Default)]
pub struct LoadReport {
    /// Ids of the new entries, in staging order
    pub added: Vec<PageId>,
    /// Files that could not be opened; they contribute no pages
    pub failures: Vec<LoadError>,
}

/// A request ready to send, detached from the controller so the controller
/// stays usable (and abortable) while it is in flight
#[derive(Debug)]
pub struct Submission {
    id: SubmissionId,
    operation: Operation,
    form: WireForm,
    filename: String,
    page_count: usize,
    timeout: Option<Duration>,
    progress: UploadProgress,
    cancel: CancellationToken,
}

impl Submission {
    pub fn id(&self) -> SubmissionId {
        self.id
    }

    pub fn operation(&self) -> Operation {
        self.operation
    }

    pub fn form(&self) -> &WireForm {
        &self.form
    }

    pub fn page_count(&self) -> usize {
        self.page_count
    }

    pub fn progress(&self) -> &UploadProgress {
        &self.progress
    }

    /// Send through `transport`, honouring the deadline and abort signal.
    /// File content held by the request is released when this returns.
    pub async fn send<T: Transport>(
        self,
        transport: &T,
    ) -> std::result::Result<Artifact, TransportError> {
        let Submission {
            operation,
            form,
            filename,
            timeout,
            progress,
            cancel,
            ..
        } = self;

        let call = transport.send(operation, form, progress);
        let call = async move {
            match timeout {
                Some(limit) => match tokio::time::timeout(limit, call).await {
                    Ok(result) => result,
                    Err(_) => Err(TransportError::Timeout(limit)),
                },
                None => call.await,
            }
        };

        tokio::select! {
            _ = cancel.cancelled() => Err(TransportError::Aborted),
            result = call => result.map(|bytes| Artifact {
                operation,
                filename,
                bytes,
            }),
        }
    }
}

#[derive(Debug, Default)]
pub struct StagingController {
    options: ServiceOptions,
    sources: Vec<Arc<SourceFile>>,
    registry: PageRegistry,
    state: SubmitState,
    next_submission: u64,
}

impl StagingController {
    pub fn new(options: ServiceOptions) -> Self {
        Self {
            options,
            ..Self::default()
        }
    }

    pub fn options(&self) -> &ServiceOptions {
        &self.options
    }

    pub fn registry(&self) -> &PageRegistry {
        &self.registry
    }

    /// Loaded sources in load order, including ones with no pages left
    pub fn sources(&self) -> &[Arc<SourceFile>] {
        &self.sources
    }

    pub fn state(&self) -> &SubmitState {
        &self.state
    }

    pub fn is_submitting(&self) -> bool {
        matches!(self.state, SubmitState::Submitting { .. })
    }

    fn ensure_idle(&self) -> Result<()> {
        if self.is_submitting() {
            Err(StageError::SubmissionInProgress)
        } else {
            Ok(())
        }
    }

    /// Open and stage a batch of files, in batch order. Files that fail to
    /// open are reported and skipped.
    pub async fn load_files(&mut self, files: Vec<FileBlob>) -> Result<LoadReport> {
        self.ensure_idle()?;
        let mut report = LoadReport::default();
        for blob in files {
            match SourceFile::open_blocking(blob).await {
                Ok(source) => report.added.extend(self.stage_source(source)?),
                Err(e) => {
                    log::warn!("Failed to load {}", e);
                    report.failures.push(e);
                }
            }
        }
        Ok(report)
    }

    /// Stage an already opened source, appending its pages
    pub fn stage_source(&mut self, source: SourceFile) -> Result<Vec<PageId>> {
        self.ensure_idle()?;
        let source = Arc::new(source);
        let added = self.registry.expand(&source);
        log::info!("Loaded {} with {} pages", source.name(), added.len());
        self.sources.push(source);
        Ok(added)
    }

    pub fn delete_entry(&mut self, id: PageId) -> Result<()> {
        self.ensure_idle()?;
        self.registry.remove(id)?;
        Ok(())
    }

    pub fn rotate_entry(&mut self, id: PageId) -> Result<Rotation> {
        self.ensure_idle()?;
        self.registry.rotate(id)
    }

    pub fn toggle_select(&mut self, id: PageId) -> Result<bool> {
        self.ensure_idle()?;
        self.registry.toggle_select(id)
    }

    pub fn select_all(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.registry.select_all();
        Ok(())
    }

    pub fn deselect_all(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.registry.deselect_all();
        Ok(())
    }

    /// Apply a drag gesture: `dragged` takes the position of `target`
    pub fn reorder(&mut self, dragged: PageId, target: PageId) -> Result<()> {
        self.ensure_idle()?;
        for id in [dragged, target] {
            if !self.registry.contains(id) {
                return Err(StageError::UnknownEntry(id));
            }
        }
        let sequence = move_entry(self.registry.order(), dragged, target);
        self.registry.reorder(sequence)
    }

    /// Replace the whole order with a permutation of the staged ids
    pub fn reorder_all(&mut self, sequence: Vec<PageId>) -> Result<()> {
        self.ensure_idle()?;
        self.registry.reorder(sequence)
    }

    /// Drop every source and page
    pub fn reset(&mut self) -> Result<()> {
        self.ensure_idle()?;
        self.registry.clear();
        self.sources.clear();
        Ok(())
    }

    /// Render requests for the given entries, skipping unknown ids
    pub fn preview_jobs(&self, ids: &[PageId]) -> Vec<PreviewJob> {
        ids.iter()
            .filter_map(|&id| self.registry.get(id))
            .map(|entry| PreviewJob {
                id: entry.id(),
                source: Arc::clone(entry.source()),
                page_number: entry.source_page_number(),
                scale: self.options.preview_scale,
            })
            .collect()
    }

    /// Store a finished render. Results for entries deleted in the meantime
    /// are discarded; returns whether the result was applied.
    pub fn apply_preview(
        &mut self,
        id: PageId,
        result: std::result::Result<RgbaImage, RenderError>,
    ) -> bool {
        let preview = match result {
            Ok(image) => PreviewState::Ready(Arc::new(image)),
            Err(e) => {
                log::warn!("Preview of {} failed: {}", id, e);
                PreviewState::Failed(e.to_string())
            }
        };
        match self.registry.set_preview(id, preview) {
            Ok(()) => true,
            Err(_) => {
                log::debug!("Discarding preview for removed {}", id);
                false
            }
        }
    }

    /// Compile the selection into a request and enter `Submitting`
    pub fn begin_submit(&mut self, operation: Operation) -> Result<Submission> {
        self.ensure_idle()?;

        let request = SubmissionRequest::encode(
            operation,
            self.registry.selected(),
            self.options.file_parts,
        );
        if request.pages.is_empty() {
            return Err(StageError::EmptySelection);
        }
        let form = request.to_form(self.options.wire_format)?;

        self.next_submission += 1;
        let id = SubmissionId(self.next_submission);
        let progress = UploadProgress::new();
        let cancel = CancellationToken::new();

        log::info!(
            "Submitting {} pages for {} from {} file parts",
            request.pages.len(),
            operation,
            request.files.len()
        );

        self.state = SubmitState::Submitting {
            id,
            operation,
            progress: progress.clone(),
            cancel: cancel.clone(),
        };

        Ok(Submission {
            id,
            operation,
            form,
            filename: self.options.artifact_filename(operation).to_string(),
            page_count: request.pages.len(),
            timeout: self.options.timeout(),
            progress,
            cancel,
        })
    }

    /// Return to `Idle` with the outcome of submission `id`.
    ///
    /// Returns `None` when `id` is no longer the submission in flight (it
    /// was aborted), in which case the outcome is dropped.
    pub fn finish_submit(
        &mut self,
        id: SubmissionId,
        result: std::result::Result<Artifact, TransportError>,
    ) -> Option<Result<Artifact>> {
        match &self.state {
            SubmitState::Submitting { id: current, .. } if *current == id => {}
            _ => {
                log::debug!("Ignoring outcome of stale submission {:?}", id);
                return None;
            }
        }
        self.state = SubmitState::Idle;

        Some(match result {
            Ok(artifact) => {
                log::info!(
                    "{} complete: {} ({} bytes)",
                    artifact.operation,
                    artifact.filename,
                    artifact.bytes.len()
                );
                Ok(artifact)
            }
            Err(e) => {
                log::warn!("Submission failed: {}", e);
                Err(e.into())
            }
        })
    }

    /// Cancel the submission in flight and return to `Idle`. Returns whether
    /// there was anything to abort.
    pub fn abort_submit(&mut self) -> bool {
        match std::mem::take(&mut self.state) {
            SubmitState::Submitting { id, cancel, .. } => {
                cancel.cancel();
                log::info!("Aborted submission {:?}", id);
                true
            }
            SubmitState::Idle => false,
        }
    }

    /// Submit and wait for the outcome
    pub async fn submit<T: Transport>(
        &mut self,
        operation: Operation,
        transport: &T,
    ) -> Result<Artifact> {
        let submission = self.begin_submit(operation)?;
        let id = submission.id();
        let result = submission.send(transport).await;
        self.finish_submit(id, result)
            .unwrap_or(Err(StageError::Transport(TransportError::Aborted)))
    }
}
