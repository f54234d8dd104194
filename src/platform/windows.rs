//! Windows desktop backed by GDI and SendInput

#![cfg(target_os = "windows")]

use std::mem::size_of;

use windows::Win32::Foundation::{HWND, POINT};
use windows::Win32::Graphics::Gdi::{GetDC, GetPixel, ReleaseDC};
use windows::Win32::UI::Input::KeyboardAndMouse::{
    SendInput, INPUT, INPUT_0, INPUT_MOUSE, MOUSEEVENTF_LEFTDOWN, MOUSEEVENTF_LEFTUP, MOUSEINPUT,
    MOUSE_EVENT_FLAGS,
};
use windows::Win32::UI::WindowsAndMessaging::{GetCursorPos, SetCursorPos};

use crate::error::{Result, WatchError};
use crate::vision::{ColorGrid, Point, PointerSink, PointerSource, RegionCapture, Rgb};

/// GetPixel returns this for points outside the clipping region
const CLR_INVALID: u32 = 0xFFFF_FFFF;

/// Pointer and screen access for the primary desktop
#[derive(Debug, Default)]
pub struct WindowsDesktop;

impl WindowsDesktop {
    pub fn new() -> Self {
        Self
    }

    fn mouse_input(flags: MOUSE_EVENT_FLAGS) -> INPUT {
        INPUT {
            r#type: INPUT_MOUSE,
            Anonymous: INPUT_0 {
                mi: MOUSEINPUT {
                    dx: 0,
                    dy: 0,
                    mouseData: 0,
                    dwFlags: flags,
                    time: 0,
                    dwExtraInfo: 0,
                },
            },
        }
    }
}

impl PointerSource for WindowsDesktop {
    fn pointer_position(&self) -> Result<Point> {
        let mut point = POINT::default();
        unsafe { GetCursorPos(&mut point) }
            .map_err(|e| WatchError::capture(format!("GetCursorPos failed: {}", e)))?;
        Ok(Point::new(point.x, point.y))
    }
}

impl RegionCapture for WindowsDesktop {
    fn capture_region(&self, top_left: Point, bottom_right: Point) -> Result<ColorGrid> {
        let hdc = unsafe { GetDC(HWND::default()) };
        if hdc.is_invalid() {
            return Err(WatchError::capture("GetDC failed for the screen"));
        }

        let mut columns = Vec::new();
        let mut failure = None;

        'outer: for x in top_left.x..=bottom_right.x {
            let mut column = Vec::new();
            for y in top_left.y..=bottom_right.y {
                let color = unsafe { GetPixel(hdc, x, y) };
                if color.0 == CLR_INVALID {
                    failure = Some(WatchError::capture(format!(
                        "GetPixel failed at ({}, {})",
                        x, y
                    )));
                    break 'outer;
                }
                // COLORREF is 0x00BBGGRR
                let c = color.0;
                column.push(Rgb::new(
                    (c & 0xFF) as u8,
                    ((c >> 8) & 0xFF) as u8,
                    ((c >> 16) & 0xFF) as u8,
                ));
            }
            columns.push(column);
        }

        unsafe {
            ReleaseDC(HWND::default(), hdc);
        }

        match failure {
            Some(e) => Err(e),
            None => ColorGrid::from_columns(columns),
        }
    }
}

impl PointerSink for WindowsDesktop {
    fn click(&self, p: Point) -> Result<()> {
        self.move_to(p)?;

        let inputs = [
            Self::mouse_input(MOUSEEVENTF_LEFTDOWN),
            Self::mouse_input(MOUSEEVENTF_LEFTUP),
        ];
        let sent = unsafe { SendInput(&inputs, size_of::<INPUT>() as i32) };
        if sent as usize != inputs.len() {
            return Err(WatchError::injection(format!(
                "SendInput injected {} of {} events",
                sent,
                inputs.len()
            )));
        }
        Ok(())
    }

    fn move_to(&self, p: Point) -> Result<()> {
        unsafe { SetCursorPos(p.x, p.y) }
            .map_err(|e| WatchError::injection(format!("SetCursorPos failed: {}", e)))
    }
}
