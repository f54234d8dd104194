//! Native pointer and screen access
//!
//! Windows is backed by GDI and `SendInput`. Other platforms get a desktop
//! whose every call fails, so a run can still be rehearsed with replay
//! capture and dry-run input.

use std::sync::Arc;

use crate::vision::Desktop;

#[cfg(target_os = "windows")]
pub mod windows;

#[cfg(not(target_os = "windows"))]
pub mod unsupported;

/// Desktop backed by the current platform
#[cfg(target_os = "windows")]
pub fn native_desktop() -> Desktop {
    Desktop::from_shared(Arc::new(self::windows::WindowsDesktop::new()))
}

/// Desktop backed by the current platform
#[cfg(not(target_os = "windows"))]
pub fn native_desktop() -> Desktop {
    Desktop::from_shared(Arc::new(unsupported::UnsupportedDesktop::new()))
}
