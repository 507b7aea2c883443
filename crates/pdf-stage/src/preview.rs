use crate::source::SourceFile;
use crate::types::*;
use image::{Rgba, RgbaImage};
use std::sync::Arc;

/// Fill colour of placeholder previews
const PLACEHOLDER_FILL: Rgba<u8> = Rgba([236, 236, 236, 255]);
const PLACEHOLDER_BORDER: Rgba<u8> = Rgba([160, 160, 160, 255]);

/// Largest edge, in pixels, a placeholder is drawn at
const MAX_PLACEHOLDER_EDGE: u32 = 2048;

/// Rasterizes single pages for display.
///
/// Implementations must not rotate the output: staged rotation is applied
/// when the preview is drawn, and only the rotation value is submitted.
pub trait PreviewRenderer: Send + Sync + 'static {
    fn render(
        &self,
        source: &SourceFile,
        page_number: u32,
        scale: f32,
    ) -> std::result::Result<RgbaImage, RenderError>;
}

impl<R: PreviewRenderer + ?Sized> PreviewRenderer for Arc<R> {
    fn render(
        &self,
        source: &SourceFile,
        page_number: u32,
        scale: f32,
    ) -> std::result::Result<RgbaImage, RenderError> {
        (**self).render(source, page_number, scale)
    }
}

/// Preview lifecycle of a staged page
#[derive(Debug, Clone, Default)]
pub enum PreviewState {
    #[default]
    Pending,
    Ready(Arc<RgbaImage>),
    /// Rendering failed; the page is drawn as a placeholder
    Failed(String),
}

impl PreviewState {
    pub fn image(&self) -> Option<&Arc<RgbaImage>> {
        match self {
            PreviewState::Ready(image) => Some(image),
            _ => None,
        }
    }
}

/// A render request for one staged page
#[derive(Debug, Clone)]
pub struct PreviewJob {
    pub id: PageId,
    pub source: Arc<SourceFile>,
    pub page_number: u32,
    pub scale: f32,
}

impl PreviewJob {
    pub fn run<R: PreviewRenderer>(&self, renderer: &R) -> std::result::Result<RgbaImage, RenderError> {
        renderer.render(&self.source, self.page_number, self.scale)
    }
}

/// Draws a blank page of the right proportions instead of rasterizing.
/// Used where no rendering backend is available.
#[derive(Debug, Clone, Copy, Default)]
pub struct PlaceholderRenderer;

impl PreviewRenderer for PlaceholderRenderer {
    fn render(
        &self,
        source: &SourceFile,
        page_number: u32,
        scale: f32,
    ) -> std::result::Result<RgbaImage, RenderError> {
        let size = source
            .page_size(page_number)
            .ok_or(RenderError::PageOutOfRange {
                page: page_number,
                page_count: source.page_count(),
            })?;
        let width = scaled_edge(size.width_pt, scale);
        let height = scaled_edge(size.height_pt, scale);
        Ok(placeholder_image(width, height))
    }
}

fn scaled_edge(points: f32, scale: f32) -> u32 {
    let pixels = (points * scale.max(0.0)).round();
    (pixels as u32).clamp(1, MAX_PLACEHOLDER_EDGE)
}

/// Plain page with a one pixel border
pub fn placeholder_image(width: u32, height: u32) -> RgbaImage {
    RgbaImage::from_fn(width, height, |x, y| {
        if x == 0 || y == 0 || x + 1 == width || y + 1 == height {
            PLACEHOLDER_BORDER
        } else {
            PLACEHOLDER_FILL
        }
    })
}
