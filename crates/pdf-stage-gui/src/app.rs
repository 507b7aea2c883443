use eframe::egui;
use pdf_stage::preview::placeholder_image;
use pdf_stage_runtime::{
    PreviewRenderer, ServiceOptions, StageCommand, StageUpdate, StagingController, Transport,
    worker_task,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;

use crate::logger::AppLogger;
use crate::views::{ArtifactInfo, Preview, StagingState, SubmitView, show_log_window, show_staging};

#[derive(Clone)]
struct ProgressState {
    operation: String,
    current: usize,
    total: usize,
}

pub struct StageApp {
    status: String,

    // Async infrastructure
    command_tx: mpsc::UnboundedSender<StageCommand>,
    update_rx: mpsc::UnboundedReceiver<StageUpdate>,

    // Progress tracking
    progress: Option<ProgressState>,

    staging: StagingState,
    placeholder: egui::TextureHandle,

    logger: AppLogger,
    show_log: bool,

    _tokio_handle: tokio::runtime::Handle,
}

impl StageApp {
    pub fn new<T: Transport, R: PreviewRenderer>(
        cc: &eframe::CreationContext<'_>,
        tokio_handle: tokio::runtime::Handle,
        service: ServiceOptions,
        transport: T,
        renderer: R,
        logger: AppLogger,
    ) -> Self {
        let (command_tx, command_rx) = mpsc::unbounded_channel();
        let (update_tx, update_rx) = mpsc::unbounded_channel();

        // Spawn worker task
        tokio_handle.spawn(worker_task(
            StagingController::new(service),
            Arc::new(transport),
            Arc::new(renderer),
            command_rx,
            update_tx,
        ));

        let blank = placeholder_image(85, 110);
        let placeholder = cc.egui_ctx.load_texture(
            "placeholder",
            egui::ColorImage::from_rgba_unmultiplied(
                [blank.width() as usize, blank.height() as usize],
                blank.as_raw(),
            ),
            egui::TextureOptions::LINEAR,
        );

        Self {
            status: String::new(),
            command_tx,
            update_rx,
            progress: None,
            staging: StagingState::default(),
            placeholder,
            logger,
            show_log: false,
            _tokio_handle: tokio_handle,
        }
    }

    fn process_update(&mut self, ctx: &egui::Context, update: StageUpdate) {
        match update {
            StageUpdate::Progress {
                operation,
                current,
                total,
            } => {
                self.progress = Some(ProgressState {
                    operation,
                    current,
                    total,
                });
            }
            StageUpdate::Staged { pages } => {
                self.status = format!("{} pages staged", pages.len());
                self.staging.set_pages(pages);
                self.progress = None;
            }
            StageUpdate::PreviewReady { id, image } => {
                let color_image = egui::ColorImage::from_rgba_unmultiplied(
                    [image.width() as usize, image.height() as usize],
                    image.as_raw(),
                );
                let texture = ctx.load_texture(
                    format!("page-{}", id.0),
                    color_image,
                    egui::TextureOptions::LINEAR,
                );
                if let Some(preview) = self.staging.previews.get_mut(&id) {
                    *preview = Preview::Ready(texture);
                }
            }
            StageUpdate::PreviewFailed { id, message } => {
                if let Some(preview) = self.staging.previews.get_mut(&id) {
                    *preview = Preview::Failed(message);
                }
            }
            StageUpdate::SubmitStarted {
                operation,
                page_count,
            } => {
                self.staging.submitting = Some(SubmitView {
                    operation,
                    page_count,
                    processing: false,
                });
                self.status = format!("Submitting {} pages for {}", page_count, operation);
            }
            StageUpdate::Processing => {
                if let Some(submit) = &mut self.staging.submitting {
                    submit.processing = true;
                }
                self.progress = None;
            }
            StageUpdate::SubmitComplete { artifact } => {
                self.status = format!("{} complete: {}", artifact.operation, artifact.filename);
                self.staging.submitting = None;
                self.staging.artifact = Some(ArtifactInfo {
                    operation: artifact.operation,
                    filename: artifact.filename,
                    size: artifact.bytes.len(),
                });
                self.progress = None;
            }
            StageUpdate::SubmitFailed { message } => {
                self.status = format!("Submission failed: {message}");
                self.staging.submitting = None;
                self.progress = None;
            }
            StageUpdate::SubmitAborted => {
                self.status = "Submission aborted".to_string();
                self.staging.submitting = None;
                self.progress = None;
            }
            StageUpdate::ArtifactSaved { path } => {
                self.status = format!("Saved → {}", path.display());
            }
            StageUpdate::Error { message } => {
                self.status = format!("Error: {message}");
                self.progress = None;
            }
        }
    }

    fn is_busy(&self) -> bool {
        self.progress.is_some()
            || self.staging.submitting.is_some()
            || self.staging.has_pending_previews()
    }
}

impl eframe::App for StageApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Handle drag-and-drop for PDF files
        let dropped: Vec<_> = ctx.input(|i| {
            i.raw
                .dropped_files
                .iter()
                .filter_map(|file| file.path.clone())
                .filter(|path| {
                    path.extension()
                        .and_then(|s| s.to_str())
                        .is_some_and(|ext| ext.eq_ignore_ascii_case("pdf"))
                })
                .collect()
        });
        if !dropped.is_empty() {
            let _ = self
                .command_tx
                .send(StageCommand::LoadFiles { paths: dropped });
            self.status = "Loading PDFs...".to_string();
        }

        // Process all pending updates from worker
        while let Ok(update) = self.update_rx.try_recv() {
            self.process_update(ctx, update);
        }

        egui::TopBottomPanel::bottom("status").show(ctx, |ui| {
            ui.horizontal(|ui| {
                if ui.selectable_label(self.show_log, "📜 Log").clicked() {
                    self.show_log = !self.show_log;
                }
                ui.separator();
                if !self.status.is_empty() {
                    ui.label(&self.status);
                } else if let Some(message) = self.logger.latest_message() {
                    ui.weak(message);
                }
            });
        });

        egui::CentralPanel::default().show(ctx, |ui| {
            // Show progress bar
            if let Some(ref progress) = self.progress {
                ui.label(&progress.operation);
                ui.add(
                    egui::ProgressBar::new(progress.current as f32 / progress.total.max(1) as f32)
                        .show_percentage(),
                );
                ui.separator();
            }

            show_staging(ui, &self.staging, &self.placeholder, &self.command_tx);
        });

        show_log_window(ctx, &mut self.show_log, &self.logger);

        // Worker updates arrive without input events
        let poll = if self.is_busy() { 100 } else { 250 };
        ctx.request_repaint_after(Duration::from_millis(poll));
    }
}
