use eframe::egui;
use pdf_stage_runtime::{Operation, PageId, PageView, Rotation, StageCommand};
use std::collections::HashMap;
use tokio::sync::mpsc;

/// Edge of the square each thumbnail is fitted into
const THUMB_EDGE: f32 = 150.0;

pub enum Preview {
    Pending,
    Ready(egui::TextureHandle),
    Failed(String),
}

pub struct SubmitView {
    pub operation: Operation,
    pub page_count: usize,
    pub processing: bool,
}

/// Result of the last successful submission
pub struct ArtifactInfo {
    pub operation: Operation,
    pub filename: String,
    pub size: usize,
}

#[derive(Default)]
pub struct StagingState {
    pub pages: Vec<PageView>,
    pub previews: HashMap<PageId, Preview>,
    pub submitting: Option<SubmitView>,
    pub artifact: Option<ArtifactInfo>,
}

impl StagingState {
    /// Replace the page list, dropping textures of pages that are gone
    pub fn set_pages(&mut self, pages: Vec<PageView>) {
        self.previews
            .retain(|id, _| pages.iter().any(|page| page.id == *id));
        for page in &pages {
            self.previews.entry(page.id).or_insert(Preview::Pending);
        }
        self.pages = pages;
    }

    pub fn selected_count(&self) -> usize {
        self.pages.iter().filter(|page| page.selected).count()
    }

    pub fn has_pending_previews(&self) -> bool {
        self.previews
            .values()
            .any(|preview| matches!(preview, Preview::Pending))
    }
}

pub fn show_staging(
    ui: &mut egui::Ui,
    state: &StagingState,
    placeholder: &egui::TextureHandle,
    command_tx: &mpsc::UnboundedSender<StageCommand>,
) {
    let editable = state.submitting.is_none();

    ui.add_enabled_ui(editable, |ui| {
        ui.horizontal(|ui| {
            show_file_buttons(ui, command_tx);
            ui.separator();
            show_selection_buttons(ui, state, command_tx);
            ui.separator();
            show_submit_buttons(ui, command_tx);
        });
    });

    show_submission(ui, state, command_tx);

    ui.separator();

    if state.pages.is_empty() {
        ui.vertical_centered(|ui| {
            ui.add_space(50.0);
            ui.heading("No pages staged");
            ui.label("Drop PDF files here or use Add PDFs");
        });
        return;
    }

    egui::ScrollArea::vertical().show(ui, |ui| {
        ui.add_enabled_ui(editable, |ui| {
            ui.horizontal_wrapped(|ui| {
                for page in &state.pages {
                    show_page_card(ui, state, page, placeholder, command_tx);
                }
            });
        });
    });
}

fn show_file_buttons(ui: &mut egui::Ui, command_tx: &mpsc::UnboundedSender<StageCommand>) {
    if ui.button("📂 Add PDFs...").clicked() {
        if let Some(paths) = rfd::FileDialog::new()
            .add_filter("PDF", &["pdf"])
            .pick_files()
        {
            let _ = command_tx.send(StageCommand::LoadFiles { paths });
        }
    }

    if ui.button("🗑 Clear").clicked() {
        let _ = command_tx.send(StageCommand::Reset);
    }
}

fn show_selection_buttons(
    ui: &mut egui::Ui,
    state: &StagingState,
    command_tx: &mpsc::UnboundedSender<StageCommand>,
) {
    if ui.button("Select all").clicked() {
        let _ = command_tx.send(StageCommand::SelectAll);
    }
    if ui.button("Deselect all").clicked() {
        let _ = command_tx.send(StageCommand::DeselectAll);
    }
    ui.label(format!(
        "{} of {} selected",
        state.selected_count(),
        state.pages.len()
    ));
}

fn show_submit_buttons(ui: &mut egui::Ui, command_tx: &mpsc::UnboundedSender<StageCommand>) {
    if ui.button("📑 Merge selected").clicked() {
        let _ = command_tx.send(StageCommand::Submit {
            operation: Operation::Merge,
        });
    }
    if ui.button("✂ Extract selected").clicked() {
        let _ = command_tx.send(StageCommand::Submit {
            operation: Operation::Extract,
        });
    }
}

fn show_submission(
    ui: &mut egui::Ui,
    state: &StagingState,
    command_tx: &mpsc::UnboundedSender<StageCommand>,
) {
    if let Some(submit) = &state.submitting {
        ui.horizontal(|ui| {
            ui.spinner();
            if submit.processing {
                ui.label(format!(
                    "Waiting for {} of {} pages...",
                    submit.operation, submit.page_count
                ));
            } else {
                ui.label(format!(
                    "Uploading {} pages for {}...",
                    submit.page_count, submit.operation
                ));
            }
            if ui.button("Abort").clicked() {
                let _ = command_tx.send(StageCommand::AbortSubmit);
            }
        });
    } else if let Some(artifact) = &state.artifact {
        ui.horizontal(|ui| {
            ui.label(format!(
                "{} ready: {} ({} KB)",
                artifact.operation,
                artifact.filename,
                artifact.size.div_ceil(1024)
            ));
            if ui.button("💾 Save...").clicked() {
                if let Some(path) = rfd::FileDialog::new()
                    .add_filter("PDF", &["pdf"])
                    .set_file_name(&artifact.filename)
                    .save_file()
                {
                    let _ = command_tx.send(StageCommand::SaveArtifact { path });
                }
            }
        });
    }
}

fn show_page_card(
    ui: &mut egui::Ui,
    state: &StagingState,
    page: &PageView,
    placeholder: &egui::TextureHandle,
    command_tx: &mpsc::UnboundedSender<StageCommand>,
) {
    let drag_id = egui::Id::new(("staged-page", page.id.0));
    let response = ui
        .dnd_drag_source(drag_id, page.id, |ui| {
            egui::Frame::group(ui.style()).show(ui, |ui| {
                ui.set_width(THUMB_EDGE);
                ui.vertical(|ui| {
                    show_thumbnail(ui, state.previews.get(&page.id), page, placeholder);
                    ui.add(
                        egui::Label::new(format!(
                            "{} · p.{}",
                            page.source_name, page.source_page_number
                        ))
                        .truncate(),
                    );
                    show_page_controls(ui, page, command_tx);
                });
            });
        })
        .response;

    if let Some(dragged) = response.dnd_hover_payload::<PageId>() {
        if *dragged != page.id {
            ui.painter().rect_stroke(
                response.rect,
                4.0,
                ui.visuals().selection.stroke,
                egui::StrokeKind::Outside,
            );
        }
    }

    if let Some(dragged) = response.dnd_release_payload::<PageId>() {
        let _ = command_tx.send(StageCommand::Reorder {
            dragged: *dragged,
            target: page.id,
        });
    }
}

fn show_thumbnail(
    ui: &mut egui::Ui,
    preview: Option<&Preview>,
    page: &PageView,
    placeholder: &egui::TextureHandle,
) {
    let (rect, response) =
        ui.allocate_exact_size(egui::vec2(THUMB_EDGE, THUMB_EDGE), egui::Sense::hover());

    let texture = match preview {
        Some(Preview::Ready(texture)) => texture,
        _ => placeholder,
    };
    let size = fitted_size(texture.size_vec2(), page.rotation, THUMB_EDGE);
    egui::Image::new((texture.id(), size))
        .rotate(page.rotation.radians(), egui::Vec2::splat(0.5))
        .paint_at(ui, egui::Rect::from_center_size(rect.center(), size));

    match preview {
        Some(Preview::Pending) | None => {
            egui::Spinner::new().paint_at(
                ui,
                egui::Rect::from_center_size(rect.center(), egui::Vec2::splat(24.0)),
            );
        }
        Some(Preview::Failed(message)) => {
            response.on_hover_text(format!("Preview unavailable: {}", message));
        }
        Some(Preview::Ready(_)) => {}
    }
}

fn show_page_controls(
    ui: &mut egui::Ui,
    page: &PageView,
    command_tx: &mpsc::UnboundedSender<StageCommand>,
) {
    ui.horizontal(|ui| {
        let mut selected = page.selected;
        if ui.checkbox(&mut selected, "").changed() {
            let _ = command_tx.send(StageCommand::ToggleSelect { id: page.id });
        }

        if ui
            .button("⟳")
            .on_hover_text(format!("Rotate ({}°)", page.rotation.degrees()))
            .clicked()
        {
            let _ = command_tx.send(StageCommand::RotateEntry { id: page.id });
        }

        if ui.button("🗑").on_hover_text("Remove page").clicked() {
            let _ = command_tx.send(StageCommand::DeleteEntry { id: page.id });
        }
    });
}

/// Unrotated size at which an image, once rotated, fits a square of `edge`
fn fitted_size(image: egui::Vec2, rotation: Rotation, edge: f32) -> egui::Vec2 {
    let (width, height) = match rotation {
        Rotation::Clockwise90 | Rotation::Clockwise270 => (image.y, image.x),
        Rotation::None | Rotation::Clockwise180 => (image.x, image.y),
    };
    if width <= 0.0 || height <= 0.0 {
        return egui::Vec2::ZERO;
    }
    image * (edge / width).min(edge / height)
}
