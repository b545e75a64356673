//! Compact always-on-top indicator window.
//!
//! Shows the last recognized question and drawn answer, and exposes
//! pause/resume and exit. Runs on the main thread while the autoplay runner
//! polls in the background.

use eframe::egui::{self, Vec2};

use crate::autoplay::runner;

struct IndicatorApp {
    region_text: String,
}

impl IndicatorApp {
    fn new(region_text: String) -> Self {
        Self { region_text }
    }
}

impl eframe::App for IndicatorApp {
    fn update(&mut self, ctx: &egui::Context, _frame: &mut eframe::Frame) {
        // Poll the runner's status at 100ms while visible.
        ctx.request_repaint_after(std::time::Duration::from_millis(100));

        egui::CentralPanel::default().show(ctx, |ui| {
            ui.heading("mathpen");
            ui.label(&self.region_text);
            ui.add_space(8.0);

            let status = runner::status_text();
            if status.is_empty() {
                ui.label(if runner::is_running() {
                    "Watching..."
                } else {
                    "Runner stopped"
                });
            } else {
                ui.monospace(status);
            }
            ui.add_space(8.0);

            ui.horizontal(|ui| {
                let pause_label = if runner::is_paused() { "Resume" } else { "Pause" };
                if ui.button(pause_label).clicked() {
                    let paused = !runner::is_paused();
                    runner::set_paused(paused);
                    crate::log(if paused {
                        "Autoplay paused"
                    } else {
                        "Autoplay resumed"
                    });
                }
                if ui.button("Reposition").clicked() {
                    // TODO: interactive region picking; for now the corners
                    // come from config.json.
                    crate::log("Reposition: edit region corners in config.json and restart");
                }
                if ui.button("Exit").clicked() {
                    runner::request_abort();
                    ctx.send_viewport_cmd(egui::ViewportCommand::Close);
                }
            });
        });
    }
}

/// Runs the indicator window; blocks until it is closed.
pub fn run_indicator(region_text: String) -> eframe::Result<()> {
    let options = eframe::NativeOptions {
        viewport: egui::ViewportBuilder::default()
            .with_inner_size(Vec2::new(240.0, 150.0))
            .with_position(egui::pos2(20.0, 20.0))
            .with_always_on_top()
            .with_title("mathpen"),
        ..Default::default()
    };

    eframe::run_native(
        "mathpen",
        options,
        Box::new(move |_cc| Ok(Box::new(IndicatorApp::new(region_text)))),
    )
}
