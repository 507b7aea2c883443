use crate::{PageView, StageCommand, StageUpdate};
use image::RgbaImage;
use pdf_stage::{
    Artifact, FileBlob, Operation, PageId, PreviewRenderer, RenderError, StageError,
    StagingController, SubmissionId, Transport, TransportError,
};
use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;
use tokio::sync::{Semaphore, mpsc};
use tokio::task::AbortHandle;

/// Renders at a time; pdfium must not be entered from several threads
const PREVIEW_CONCURRENCY: usize = 1;

/// Completions of work spawned by the worker
enum WorkerEvent {
    PreviewRendered {
        id: PageId,
        result: Result<RgbaImage, RenderError>,
    },
    UploadProgress {
        id: SubmissionId,
        percent: u8,
    },
    SubmitFinished {
        id: SubmissionId,
        result: Result<Artifact, TransportError>,
    },
}

/// Async worker task that owns the staging state, applies commands one at a
/// time and sends updates
pub async fn worker_task<T, R>(
    controller: StagingController,
    transport: Arc<T>,
    renderer: Arc<R>,
    mut command_rx: mpsc::UnboundedReceiver<StageCommand>,
    update_tx: mpsc::UnboundedSender<StageUpdate>,
) where
    T: Transport,
    R: PreviewRenderer,
{
    let (event_tx, mut event_rx) = mpsc::unbounded_channel();
    let mut worker = Worker {
        controller,
        transport,
        renderer,
        update_tx,
        event_tx,
        render_slots: Arc::new(Semaphore::new(PREVIEW_CONCURRENCY)),
        previews: HashMap::new(),
        artifact: None,
    };

    loop {
        tokio::select! {
            cmd = command_rx.recv() => match cmd {
                Some(cmd) => worker.process_command(cmd).await,
                None => break,
            },
            Some(event) = event_rx.recv() => worker.process_event(event),
        }
    }

    worker.shutdown();
}

struct Worker<T, R> {
    controller: StagingController,
    transport: Arc<T>,
    renderer: Arc<R>,
    update_tx: mpsc::UnboundedSender<StageUpdate>,
    event_tx: mpsc::UnboundedSender<WorkerEvent>,
    render_slots: Arc<Semaphore>,
    /// Outstanding preview renders, cancelled when their page is deleted
    previews: HashMap<PageId, AbortHandle>,
    /// Most recent successful submission, kept for saving
    artifact: Option<Artifact>,
}

impl<T: Transport, R: PreviewRenderer> Worker<T, R> {
    async fn process_command(&mut self, cmd: StageCommand) {
        let result = match cmd {
            StageCommand::LoadFiles { paths } => self.handle_load_paths(paths).await,
            StageCommand::LoadBlobs { files } => self.handle_load(files).await,
            StageCommand::DeleteEntry { id } => self.handle_delete(id),
            StageCommand::RotateEntry { id } => self.controller.rotate_entry(id).map(|_| true),
            StageCommand::ToggleSelect { id } => self.controller.toggle_select(id).map(|_| true),
            StageCommand::SelectAll => self.controller.select_all().map(|()| true),
            StageCommand::DeselectAll => self.controller.deselect_all().map(|()| true),
            StageCommand::Reorder { dragged, target } => {
                self.controller.reorder(dragged, target).map(|()| true)
            }
            StageCommand::Submit { operation } => self.handle_submit(operation).map(|()| false),
            StageCommand::AbortSubmit => {
                if self.controller.abort_submit() {
                    self.send(StageUpdate::SubmitAborted);
                }
                Ok(false)
            }
            StageCommand::SaveArtifact { path } => self.handle_save(path).await.map(|()| false),
            StageCommand::Reset => self.handle_reset(),
        };

        match result {
            Ok(true) => self.publish_pages(),
            Ok(false) => {}
            Err(e) => self.report(e),
        }
    }

    fn process_event(&mut self, event: WorkerEvent) {
        match event {
            WorkerEvent::PreviewRendered { id, result } => {
                self.previews.remove(&id);
                let update = match &result {
                    Ok(_) => None,
                    Err(e) => Some(StageUpdate::PreviewFailed {
                        id,
                        message: e.to_string(),
                    }),
                };
                if !self.controller.apply_preview(id, result) {
                    return;
                }
                let update = update.or_else(|| {
                    self.controller
                        .registry()
                        .get(id)
                        .and_then(|entry| entry.preview.image())
                        .map(|image| StageUpdate::PreviewReady {
                            id,
                            image: Arc::clone(image),
                        })
                });
                if let Some(update) = update {
                    self.send(update);
                }
            }
            WorkerEvent::UploadProgress { id, percent } => {
                if !self.is_current(id) {
                    return;
                }
                self.send(StageUpdate::Progress {
                    operation: "Uploading".to_string(),
                    current: usize::from(percent),
                    total: 100,
                });
                if percent == 100 {
                    self.send(StageUpdate::Processing);
                }
            }
            WorkerEvent::SubmitFinished { id, result } => {
                match self.controller.finish_submit(id, result) {
                    Some(Ok(artifact)) => {
                        self.artifact = Some(artifact.clone());
                        self.send(StageUpdate::SubmitComplete { artifact });
                    }
                    Some(Err(e)) => self.send(StageUpdate::SubmitFailed {
                        message: e.to_string(),
                    }),
                    None => {}
                }
            }
        }
    }

    fn is_current(&self, id: SubmissionId) -> bool {
        matches!(
            self.controller.state(),
            pdf_stage::SubmitState::Submitting { id: current, .. } if *current == id
        )
    }

    async fn handle_load_paths(&mut self, paths: Vec<PathBuf>) -> Result<bool, StageError> {
        let total = paths.len();
        let mut files = Vec::with_capacity(total);
        for (index, path) in paths.into_iter().enumerate() {
            self.send(StageUpdate::Progress {
                operation: "Reading files".to_string(),
                current: index,
                total,
            });
            match FileBlob::read(&path).await {
                Ok(blob) => files.push(blob),
                Err(e) => self.report(e.into()),
            }
        }
        self.handle_load(files).await
    }

    async fn handle_load(&mut self, files: Vec<FileBlob>) -> Result<bool, StageError> {
        let report = self.controller.load_files(files).await?;
        for failure in report.failures {
            self.report(failure.into());
        }
        self.schedule_previews(&report.added);
        Ok(!report.added.is_empty())
    }

    fn handle_delete(&mut self, id: PageId) -> Result<bool, StageError> {
        self.controller.delete_entry(id)?;
        if let Some(handle) = self.previews.remove(&id) {
            handle.abort();
        }
        Ok(true)
    }

    fn handle_reset(&mut self) -> Result<bool, StageError> {
        self.controller.reset()?;
        for (_, handle) in self.previews.drain() {
            handle.abort();
        }
        self.artifact = None;
        Ok(true)
    }

    fn handle_submit(&mut self, operation: Operation) -> Result<(), StageError> {
        let submission = self.controller.begin_submit(operation)?;
        let id = submission.id();
        self.send(StageUpdate::SubmitStarted {
            operation,
            page_count: submission.page_count(),
        });

        let mut progress_rx = submission.progress().subscribe();
        let progress_tx = self.event_tx.clone();
        tokio::spawn(async move {
            while progress_rx.changed().await.is_ok() {
                let percent = *progress_rx.borrow_and_update();
                if progress_tx
                    .send(WorkerEvent::UploadProgress { id, percent })
                    .is_err()
                    || percent == 100
                {
                    break;
                }
            }
        });

        let transport = Arc::clone(&self.transport);
        let event_tx = self.event_tx.clone();
        tokio::spawn(async move {
            let result = submission.send(transport.as_ref()).await;
            let _ = event_tx.send(WorkerEvent::SubmitFinished { id, result });
        });
        Ok(())
    }

    async fn handle_save(&mut self, path: PathBuf) -> Result<(), StageError> {
        let Some(artifact) = &self.artifact else {
            return Err(StageError::NoArtifact);
        };
        let path = artifact.save(path).await?;
        self.send(StageUpdate::ArtifactSaved { path });
        Ok(())
    }

    fn schedule_previews(&mut self, ids: &[PageId]) {
        for job in self.controller.preview_jobs(ids) {
            let id = job.id;
            let renderer = Arc::clone(&self.renderer);
            let slots = Arc::clone(&self.render_slots);
            let event_tx = self.event_tx.clone();

            let handle = tokio::spawn(async move {
                let Ok(_permit) = slots.acquire_owned().await else {
                    return;
                };
                let result =
                    match tokio::task::spawn_blocking(move || job.run(renderer.as_ref())).await {
                        Ok(result) => result,
                        Err(e) => Err(RenderError::Backend(format!("Task join error: {}", e))),
                    };
                let _ = event_tx.send(WorkerEvent::PreviewRendered { id, result });
            });
            self.previews.insert(id, handle.abort_handle());
        }
    }

    fn publish_pages(&self) {
        let pages = self
            .controller
            .registry()
            .iter()
            .map(|entry| PageView {
                id: entry.id(),
                source_name: entry.source().name().to_string(),
                source_page_number: entry.source_page_number(),
                rotation: entry.rotation,
                selected: entry.selected,
            })
            .collect();
        self.send(StageUpdate::Staged { pages });
    }

    fn report(&self, error: StageError) {
        if error.is_user_visible() {
            log::warn!("{}", error);
            self.send(StageUpdate::Error {
                message: error.to_string(),
            });
        } else {
            log::debug!("Ignoring command: {}", error);
        }
    }

    fn send(&self, update: StageUpdate) {
        let _ = self.update_tx.send(update);
    }

    fn shutdown(&mut self) {
        for (_, handle) in self.previews.drain() {
            handle.abort();
        }
        self.controller.abort_submit();
    }
}
