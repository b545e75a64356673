//! mathpen
//!
//! Watches a fixed screen region for a typeset arithmetic problem, solves
//! it, and writes the answer back with synthesized pen strokes.

// Hide console window on Windows for GUI mode
#![windows_subsystem = "windows"]

mod agent;
mod autoplay;
mod gui;
mod paths;
mod platform;
mod recognizer;
mod solver;
mod timing;

use std::sync::Arc;
use std::time::Duration;

use anyhow::{anyhow, Result};
use chrono::Local;
use std::fs::OpenOptions;
use std::io::Write;

use agent::draw::DrawCoordinator;
use agent::strokes::StrokeSet;
use agent::PenAgent;
use autoplay::config::{load_config, Strategy};
use autoplay::state::Autoplayer;
use recognizer::template::TemplateSet;
use recognizer::Recognizer;
use timing::TimingRegistry;

/// Logs a message to both console and log file with timestamp.
pub fn log(msg: &str) {
    let timestamp = Local::now().format("%H:%M:%S%.3f");
    let line = format!("[{}] {}\n", timestamp, msg);
    print!("{}", line);
    let log_path = paths::get_logs_dir().join("mathpen.log");
    if let Ok(mut file) = OpenOptions::new().create(true).append(true).open(&log_path) {
        let _ = file.write_all(line.as_bytes());
    }
}

fn main() -> Result<()> {
    // Set up panic hook to log panics
    std::panic::set_hook(Box::new(|panic_info| {
        let msg = if let Some(s) = panic_info.payload().downcast_ref::<&str>() {
            s.to_string()
        } else if let Some(s) = panic_info.payload().downcast_ref::<String>() {
            s.clone()
        } else {
            "Unknown panic".to_string()
        };
        let location = if let Some(loc) = panic_info.location() {
            format!(" at {}:{}:{}", loc.file(), loc.line(), loc.column())
        } else {
            String::new()
        };
        // Try to log even if paths module isn't initialized
        let log_msg = format!("[PANIC]{} {}\n", location, msg);
        eprintln!("{}", log_msg);
        if let Ok(exe_dir) = std::env::current_exe().map(|p| p.parent().unwrap().to_path_buf()) {
            let log_path = exe_dir.join("logs").join("mathpen.log");
            if let Ok(mut file) = std::fs::OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
            {
                let _ = file.write_all(log_msg.as_bytes());
            }
        }
    }));

    paths::ensure_directories()?;
    let config = load_config();
    let timing = Arc::new(TimingRegistry::new());

    let recognizer = match config.strategy {
        Strategy::Template => {
            let templates =
                TemplateSet::load(&paths::get_template_dir(), config.template_norm_size)?;
            if templates.is_empty() {
                return Err(anyhow!(
                    "no glyph templates in {}",
                    paths::get_template_dir().display()
                ));
            }
            log(&format!("Loaded {} glyph templates", templates.len()));
            Recognizer::with_templates(templates, config.match_confidence)
        }
        Strategy::Engine => {
            let runtime = recognizer::setup::ensure_engine()?;
            Recognizer::with_engine(runtime)
        }
    };

    let strokes = Arc::new(StrokeSet::load(&paths::get_strokes_file())?);
    log(&format!("Loaded {} stroke paths", strokes.len()));

    let grab = platform::native_screen_grab()?;
    let pen = platform::native_pen_device(Duration::from_millis(config.pen_step_ms))?;
    let agent = PenAgent::new(grab, config.region_left_top, config.region_right_bottom);
    let (lt, rb) = agent.monitored_corners();
    let region_text = format!("Region: ({}, {})-({}, {})", lt.0, lt.1, rb.0, rb.1);

    let coordinator = DrawCoordinator::new(pen, strokes, Arc::clone(&timing));
    let player = Autoplayer::new(agent, recognizer, coordinator, &config, Arc::clone(&timing));

    autoplay::runner::start_autoplay(
        player,
        Duration::from_millis(config.poll_interval_ms),
        Duration::from_millis(config.post_draw_pause_ms),
    )?;
    log(&format!("Watching {region_text}"));

    gui::run_indicator(region_text).map_err(|e| anyhow!("indicator window error: {e}"))?;

    autoplay::runner::request_abort();
    log(&timing.summary());
    Ok(())
}
