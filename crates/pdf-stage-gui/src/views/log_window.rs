use eframe::egui;
use log::Level;

use crate::logger::AppLogger;

pub fn show_log_window(ctx: &egui::Context, open: &mut bool, logger: &AppLogger) {
    egui::Window::new("Log")
        .open(open)
        .default_size([560.0, 320.0])
        .show(ctx, |ui| {
            if ui.button("Clear").clicked() {
                logger.clear();
            }
            ui.separator();

            egui::ScrollArea::vertical()
                .stick_to_bottom(true)
                .show(ui, |ui| {
                    for entry in logger.entries() {
                        let color = match entry.level {
                            Level::Error => ui.visuals().error_fg_color,
                            Level::Warn => ui.visuals().warn_fg_color,
                            _ => ui.visuals().text_color(),
                        };
                        ui.colored_label(
                            color,
                            format!(
                                "{} {:<5} [{}] {}",
                                entry.timestamp.format("%H:%M:%S"),
                                entry.level,
                                entry.target,
                                entry.message
                            ),
                        );
                    }
                });
        });
}
