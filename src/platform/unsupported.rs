//! Placeholder desktop for platforms without a native backend

use crate::error::{Result, WatchError};
use crate::vision::{ColorGrid, Point, PointerSink, PointerSource, RegionCapture};

/// Fails every pointer query, capture and injection
#[derive(Debug, Default)]
pub struct UnsupportedDesktop;

impl UnsupportedDesktop {
    pub fn new() -> Self {
        Self
    }

    fn platform() -> &'static str {
        std::env::consts::OS
    }
}

impl PointerSource for UnsupportedDesktop {
    fn pointer_position(&self) -> Result<Point> {
        Err(WatchError::capture(format!(
            "pointer query is not supported on {}",
            Self::platform()
        )))
    }
}

impl RegionCapture for UnsupportedDesktop {
    fn capture_region(&self, _top_left: Point, _bottom_right: Point) -> Result<ColorGrid> {
        Err(WatchError::capture(format!(
            "screen capture is not supported on {}",
            Self::platform()
        )))
    }
}

impl PointerSink for UnsupportedDesktop {
    fn click(&self, _p: Point) -> Result<()> {
        Err(WatchError::injection(format!(
            "click injection is not supported on {}",
            Self::platform()
        )))
    }

    fn move_to(&self, _p: Point) -> Result<()> {
        Err(WatchError::injection(format!(
            "pointer moves are not supported on {}",
            Self::platform()
        )))
    }
}
