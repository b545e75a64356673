//! Runner thread for the polling loop.
//!
//! Spawns one dedicated thread that ticks the [`Autoplayer`] on a fixed
//! interval. The indicator window reads progress through the statics here;
//! pause and abort are flag-based, checked once per tick.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Mutex;
use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};

use crate::autoplay::state::{Autoplayer, TickOutcome};

/// Whether the runner thread is alive.
static AUTOPLAY_RUNNING: AtomicBool = AtomicBool::new(false);

/// Set by the indicator's pause toggle; the loop idles while it holds.
static PAUSE_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Set by the indicator's exit path; the loop drains and stops.
static ABORT_REQUESTED: AtomicBool = AtomicBool::new(false);

/// Last question/answer text, shown by the indicator window.
static STATUS_TEXT: Mutex<String> = Mutex::new(String::new());

pub fn is_running() -> bool {
    AUTOPLAY_RUNNING.load(Ordering::SeqCst)
}

pub fn is_paused() -> bool {
    PAUSE_REQUESTED.load(Ordering::SeqCst)
}

pub fn set_paused(paused: bool) {
    PAUSE_REQUESTED.store(paused, Ordering::SeqCst);
}

pub fn request_abort() {
    ABORT_REQUESTED.store(true, Ordering::SeqCst);
}

pub fn status_text() -> String {
    STATUS_TEXT
        .lock()
        .map(|s| s.clone())
        .unwrap_or_else(|_| String::new())
}

pub fn set_status_text(text: &str) {
    if let Ok(mut status) = STATUS_TEXT.lock() {
        *status = text.to_string();
    }
}

/// Starts the polling loop on a background thread.
///
/// Errors inside a tick are logged as warnings and the loop keeps polling;
/// the system tolerates transient misrecognition without intervention.
pub fn start_autoplay(
    mut player: Autoplayer,
    interval: Duration,
    post_draw_pause: Duration,
) -> Result<()> {
    if AUTOPLAY_RUNNING.swap(true, Ordering::SeqCst) {
        return Err(anyhow!("autoplay is already running"));
    }
    ABORT_REQUESTED.store(false, Ordering::SeqCst);
    PAUSE_REQUESTED.store(false, Ordering::SeqCst);

    thread::spawn(move || {
        crate::log("Autoplay runner started");
        while !ABORT_REQUESTED.load(Ordering::SeqCst) {
            if PAUSE_REQUESTED.load(Ordering::SeqCst) {
                thread::sleep(interval);
                continue;
            }
            match player.tick() {
                Ok(TickOutcome::Drew) => thread::sleep(post_draw_pause),
                Ok(TickOutcome::Quiet) => {}
                Err(e) => {
                    crate::log(&format!("Warning: tick failed while {}: {e}", player.phase()));
                }
            }
            thread::sleep(interval);
        }
        AUTOPLAY_RUNNING.store(false, Ordering::SeqCst);
        crate::log("Autoplay runner stopped");
    });

    Ok(())
}
