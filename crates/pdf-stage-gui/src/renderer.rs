use image::RgbaImage;
use pdf_stage::{PreviewRenderer, RenderError, SourceFile};
use pdfium_render::prelude::*;
use std::path::PathBuf;

/// Environment variable naming a directory that holds the pdfium library
pub const PDFIUM_DIR_VAR: &str = "PDFIUM_LIB_DIR";

/// Rasterizes pages with pdfium.
///
/// A fresh binding is made for every render; pdfium is not thread safe, so
/// the worker never runs two renders at once.
#[derive(Debug, Clone, Default)]
pub struct PdfiumRenderer {
    library_dir: Option<PathBuf>,
}

impl PdfiumRenderer {
    /// Bind to the library in `library_dir`, or to the system library
    pub fn new(library_dir: Option<PathBuf>) -> Self {
        Self { library_dir }
    }

    /// Library directory from the environment, then `vendor/pdfium/lib`
    /// under the working directory
    pub fn from_env() -> Self {
        let library_dir = std::env::var_os(PDFIUM_DIR_VAR)
            .map(PathBuf::from)
            .or_else(|| {
                let vendored = std::env::current_dir().ok()?.join("vendor/pdfium/lib");
                vendored.exists().then_some(vendored)
            });
        Self::new(library_dir)
    }

    fn bind(&self) -> Result<Pdfium, PdfiumError> {
        if let Some(dir) = &self.library_dir {
            match Pdfium::bind_to_library(Pdfium::pdfium_platform_library_name_at_path(dir)) {
                Ok(binding) => return Ok(Pdfium::new(binding)),
                Err(e) => log::debug!("No pdfium in {}: {}", dir.display(), e),
            }
        }
        Pdfium::bind_to_system_library().map(Pdfium::new)
    }
}

impl PreviewRenderer for PdfiumRenderer {
    fn render(
        &self,
        source: &SourceFile,
        page_number: u32,
        scale: f32,
    ) -> Result<RgbaImage, RenderError> {
        if page_number == 0 || page_number > source.page_count() {
            return Err(RenderError::PageOutOfRange {
                page: page_number,
                page_count: source.page_count(),
            });
        }
        let index = u16::try_from(page_number - 1)
            .map_err(|_| RenderError::Backend(format!("Page {} is beyond pdfium", page_number)))?;

        let pdfium = self.bind().map_err(backend)?;
        let document = pdfium
            .load_pdf_from_byte_slice(source.content(), None)
            .map_err(backend)?;
        let page = document.pages().get(index).map_err(backend)?;

        let config = PdfRenderConfig::new().scale_page_by_factor(scale);
        let bitmap = page.render_with_config(&config).map_err(backend)?;

        let width = u32::try_from(bitmap.width()).unwrap_or(0);
        let height = u32::try_from(bitmap.height()).unwrap_or(0);
        RgbaImage::from_raw(width, height, bitmap.as_rgba_bytes()).ok_or_else(|| {
            RenderError::Backend(format!("Bitmap size mismatch ({}x{})", width, height))
        })
    }
}

fn backend(e: PdfiumError) -> RenderError {
    RenderError::Backend(e.to_string())
}
