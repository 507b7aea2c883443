#![cfg_attr(not(debug_assertions), windows_subsystem = "windows")]

use eframe::egui;
use pdf_stage::{HttpTransport, ServiceOptions};

mod app;
mod logger;
#[cfg(feature = "pdf-viewer")]
mod renderer;
mod views;

/// Optional service configuration next to the working directory
const CONFIG_FILE: &str = "pdf-stage.json";

fn main() -> anyhow::Result<()> {
    let logger = logger::AppLogger::new(500, log::LevelFilter::Info).init()?;

    let runtime = tokio::runtime::Builder::new_multi_thread()
        .enable_all()
        .build()?;

    let service = runtime.block_on(async {
        if !tokio::fs::try_exists(CONFIG_FILE).await.unwrap_or(false) {
            return ServiceOptions::default();
        }
        match ServiceOptions::load(CONFIG_FILE).await {
            Ok(options) => options,
            Err(e) => {
                log::warn!("Ignoring {}: {}", CONFIG_FILE, e);
                ServiceOptions::default()
            }
        }
    });

    let transport = HttpTransport::new(service.clone())?;
    log::info!("Submitting to {}", service.base_url);

    #[cfg(feature = "pdf-viewer")]
    let renderer = renderer::PdfiumRenderer::from_env();
    #[cfg(not(feature = "pdf-viewer"))]
    let renderer = pdf_stage::PlaceholderRenderer;

    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size([1024.0, 768.0])
            .with_title("PDF Stage"),
        ..Default::default()
    };

    let handle = runtime.handle().clone();
    eframe::run_native(
        "PDF Stage",
        options,
        Box::new(move |cc| {
            Ok(Box::new(app::StageApp::new(
                cc, handle, service, transport, renderer, logger,
            )))
        }),
    )
    .map_err(|e| anyhow::anyhow!("{}", e))?;

    Ok(())
}
