//! Windows backends: GDI screen capture and SendInput pointer injection.
//!
//! Capture BitBlts the primary screen into a top-down 32bpp DIB section and
//! converts the BGRA rows into an [`RgbaImage`]. Injection uses `SendInput`
//! with absolute coordinates normalized to the 0-65535 device range; the
//! game's input layer only sees hardware-level events, so window messages
//! are not an option here.

use std::thread;
use std::time::Duration;

use anyhow::{anyhow, Result};
use image::RgbaImage;

use windows::Win32::Foundation::{HANDLE, POINT};
use windows::Win32::Graphics::Gdi::{
    BitBlt, CreateCompatibleDC, CreateDIBSection, DeleteDC, DeleteObject, GetDC, ReleaseDC,
    SelectObject, BITMAPINFO, BITMAPINFOHEADER, BI_RGB, DIB_RGB_COLORS, HDC, SRCCOPY,
};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_ABSOLUTE, MOUSEEVENTF_LEFTDOWN,
    MOUSEEVENTF_LEFTUP, MOUSEEVENTF_MOVE, MOUSEINPUT, MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{
    GetCursorPos, GetSystemMetrics, SM_CXSCREEN, SM_CYSCREEN,
};

use super::{InputError, PenDevice, ScreenGrab};

/// Pointer positions this close to the top-left corner trip the fail-safe.
const FAILSAFE_MARGIN: i32 = 2;

fn screen_size() -> (i32, i32) {
    unsafe { (GetSystemMetrics(SM_CXSCREEN), GetSystemMetrics(SM_CYSCREEN)) }
}

/// Captures the primary screen with a GDI BitBlt.
pub struct GdiScreenGrab;

impl GdiScreenGrab {
    pub fn new() -> Self {
        GdiScreenGrab
    }
}

impl ScreenGrab for GdiScreenGrab {
    fn grab(&mut self) -> Result<RgbaImage> {
        let (width, height) = screen_size();
        if width <= 0 || height <= 0 {
            return Err(anyhow!("no screen metrics available"));
        }
        let screen_dc = unsafe { GetDC(None) };
        if screen_dc.is_invalid() {
            return Err(anyhow!("GetDC failed"));
        }
        let result = blit_screen(screen_dc, width, height);
        unsafe { ReleaseDC(None, screen_dc) };
        result
    }
}

fn blit_screen(screen_dc: HDC, width: i32, height: i32) -> Result<RgbaImage> {
    let mem_dc = unsafe { CreateCompatibleDC(screen_dc) };
    if mem_dc.is_invalid() {
        return Err(anyhow!("CreateCompatibleDC failed"));
    }

    let mut bmi = BITMAPINFO::default();
    bmi.bmiHeader = BITMAPINFOHEADER {
        biSize: std::mem::size_of::<BITMAPINFOHEADER>() as u32,
        biWidth: width,
        // Negative height requests top-down row order.
        biHeight: -height,
        biPlanes: 1,
        biBitCount: 32,
        biCompression: BI_RGB.0,
        ..Default::default()
    };

    let mut bits: *mut core::ffi::c_void = std::ptr::null_mut();
    let dib = match unsafe {
        CreateDIBSection(mem_dc, &bmi, DIB_RGB_COLORS, &mut bits, HANDLE::default(), 0)
    } {
        Ok(dib) => dib,
        Err(e) => {
            let _ = unsafe { DeleteDC(mem_dc) };
            return Err(anyhow!("CreateDIBSection failed: {e}"));
        }
    };
    if bits.is_null() {
        let _ = unsafe { DeleteObject(dib) };
        let _ = unsafe { DeleteDC(mem_dc) };
        return Err(anyhow!("CreateDIBSection returned no pixel storage"));
    }

    let old_bitmap = unsafe { SelectObject(mem_dc, dib) };
    let blitted = unsafe { BitBlt(mem_dc, 0, 0, width, height, screen_dc, 0, 0, SRCCOPY) };

    let image = if blitted.is_ok() {
        let len = width as usize * height as usize * 4;
        let bgra = unsafe { std::slice::from_raw_parts(bits as *const u8, len) };
        let mut rgba = Vec::with_capacity(len);
        for px in bgra.chunks_exact(4) {
            rgba.extend_from_slice(&[px[2], px[1], px[0], 255]);
        }
        RgbaImage::from_raw(width as u32, height as u32, rgba)
            .ok_or_else(|| anyhow!("captured buffer has the wrong size"))
    } else {
        Err(anyhow!("BitBlt failed"))
    };

    unsafe { SelectObject(mem_dc, old_bitmap) };
    let _ = unsafe { DeleteObject(dib) };
    let _ = unsafe { DeleteDC(mem_dc) };
    image
}

/// Replays pen gestures through `SendInput`.
pub struct SendInputPen {
    step: Duration,
    screen: (i32, i32),
}

impl SendInputPen {
    pub fn new(step: Duration) -> Self {
        SendInputPen {
            step,
            screen: screen_size(),
        }
    }

    fn check_failsafe(&self) -> Result<(), InputError> {
        let mut pt = POINT::default();
        if unsafe { GetCursorPos(&mut pt) }.is_err() {
            return Err(InputError::Backend("GetCursorPos failed".into()));
        }
        if pt.x <= FAILSAFE_MARGIN && pt.y <= FAILSAFE_MARGIN {
            return Err(InputError::SafetyTrip);
        }
        Ok(())
    }

    fn send(&self, x: i32, y: i32, flags: MOUSE_EVENT_FLAGS) -> Result<(), InputError> {
        self.check_failsafe()?;
        let (sw, sh) = self.screen;
        if sw <= 0 || sh <= 0 {
            return Err(InputError::Backend("no screen metrics available".into()));
        }
        let input = INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: ((x as i64 * 65535) / sw as i64) as i32,
                    dy: ((y as i64 * 65535) / sh as i64) as i32,
                    dwFlags: flags | MOUSEEVENTF_ABSOLUTE | MOUSEEVENTF_MOVE,
                    ..Default::default()
                },
            },
        };
        let sent = unsafe { SendInput(&[input], std::mem::size_of::<INPUT>() as i32) };
        if sent == 0 {
            return Err(InputError::Backend("SendInput dropped the event".into()));
        }
        thread::sleep(self.step);
        Ok(())
    }
}

impl PenDevice for SendInputPen {
    fn pen_down(&mut self, x: i32, y: i32) -> Result<(), InputError> {
        self.send(x, y, MOUSEEVENTF_LEFTDOWN)
    }

    fn pen_move(&mut self, x: i32, y: i32) -> Result<(), InputError> {
        self.send(x, y, MOUSEEVENTF_MOVE)
    }

    fn pen_up(&mut self, x: i32, y: i32) -> Result<(), InputError> {
        self.send(x, y, MOUSEEVENTF_LEFTUP)
    }
}
