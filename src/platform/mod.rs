//! OS integration: full-screen capture and pointer injection.
//!
//! The rest of the crate talks to these two traits only; the Windows
//! backends live in [`windows`]. Builds for other platforms compile but
//! refuse to construct the native backends.

use std::fmt;
use std::time::Duration;

use anyhow::Result;
use image::RgbaImage;

#[cfg(windows)]
pub mod windows;

/// Errors surfaced by the pointer backend.
#[derive(Debug)]
pub enum InputError {
    /// The pointer was parked in the reserved screen corner. Callers must
    /// treat this as fatal to the whole process.
    SafetyTrip,
    /// The OS rejected or dropped an injected event.
    Backend(String),
}

impl fmt::Display for InputError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InputError::SafetyTrip => {
                write!(f, "fail-safe tripped: pointer parked in the reserved screen corner")
            }
            InputError::Backend(msg) => write!(f, "input backend error: {msg}"),
        }
    }
}

impl std::error::Error for InputError {}

/// Captures the full primary screen as one RGBA frame.
pub trait ScreenGrab: Send {
    fn grab(&mut self) -> Result<RgbaImage>;
}

/// Replays pen gestures as pointer events at absolute pixel coordinates.
///
/// Every event settles for the backend's configured step duration before the
/// call returns, which paces stroke playback.
pub trait PenDevice: Send {
    fn pen_down(&mut self, x: i32, y: i32) -> Result<(), InputError>;
    fn pen_move(&mut self, x: i32, y: i32) -> Result<(), InputError>;
    fn pen_up(&mut self, x: i32, y: i32) -> Result<(), InputError>;
}

/// Builds the native capture backend for this platform.
pub fn native_screen_grab() -> Result<Box<dyn ScreenGrab>> {
    #[cfg(windows)]
    {
        Ok(Box::new(windows::GdiScreenGrab::new()))
    }
    #[cfg(not(windows))]
    {
        anyhow::bail!("screen capture is only implemented for Windows")
    }
}

/// Builds the native pointer backend for this platform.
pub fn native_pen_device(step: Duration) -> Result<Box<dyn PenDevice>> {
    #[cfg(windows)]
    {
        Ok(Box::new(windows::SendInputPen::new(step)))
    }
    #[cfg(not(windows))]
    {
        let _ = step;
        anyhow::bail!("pointer injection is only implemented for Windows")
    }
}
