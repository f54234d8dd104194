//! Pointer and screen capabilities used by the watcher
//!
//! These traits keep the cycle logic independent of how the pointer is read,
//! how pixels are captured and how clicks are injected, so mock
//! implementations can stand in for a real display in tests.

use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;

use super::config::WatchConfig;
use super::grid::{ColorGrid, Point};
use crate::error::{Result, WatchError};

/// Reads the current pointer position
pub trait PointerSource: Send + Sync {
    fn pointer_position(&self) -> Result<Point>;
}

/// Captures the colours of a screen rectangle, corners inclusive
pub trait RegionCapture: Send + Sync {
    /// Must return a grid of exactly
    /// `(bottom_right.x - top_left.x + 1) x (bottom_right.y - top_left.y + 1)` cells
    fn capture_region(&self, top_left: Point, bottom_right: Point) -> Result<ColorGrid>;
}

/// Injects pointer input
pub trait PointerSink: Send + Sync {
    /// Move to `p` and click the primary button
    fn click(&self, p: Point) -> Result<()>;

    /// Move to `p` without clicking
    fn move_to(&self, p: Point) -> Result<()>;
}

/// The three capabilities a watcher needs, shared between threads
#[derive(Clone)]
pub struct Desktop {
    pub pointer: Arc<dyn PointerSource>,
    pub capture: Arc<dyn RegionCapture>,
    pub input: Arc<dyn PointerSink>,
}

impl Desktop {
    pub fn new(
        pointer: Arc<dyn PointerSource>,
        capture: Arc<dyn RegionCapture>,
        input: Arc<dyn PointerSink>,
    ) -> Self {
        Self {
            pointer,
            capture,
            input,
        }
    }

    /// Use one object for all three capabilities
    pub fn from_shared<T>(shared: Arc<T>) -> Self
    where
        T: PointerSource + RegionCapture + PointerSink + 'static,
    {
        Self {
            pointer: shared.clone(),
            capture: shared.clone(),
            input: shared,
        }
    }

    /// Replace the input sink, e.g. with [`DryRunInput`]
    pub fn with_input(mut self, input: Arc<dyn PointerSink>) -> Self {
        self.input = input;
        self
    }

    /// Replace the region capture, e.g. with a replay source
    pub fn with_capture(mut self, capture: Arc<dyn RegionCapture>) -> Self {
        self.capture = capture;
        self
    }

    /// Capture the rectangle of `config`, rejecting a grid of the wrong shape
    pub fn capture_for(&self, config: &WatchConfig) -> Result<ColorGrid> {
        let grid = self.capture.capture_region(config.top_left, config.bottom_right)?;
        let expected = config.dimensions();
        if grid.dimensions() != expected {
            return Err(WatchError::format(format!(
                "captured {}x{} grid for a {}x{} rectangle",
                grid.width(),
                grid.height(),
                expected.0,
                expected.1
            )));
        }
        Ok(grid)
    }
}

/// Pointer sink that only logs what it would have done
#[derive(Debug, Default)]
pub struct DryRunInput;

impl PointerSink for DryRunInput {
    fn click(&self, p: Point) -> Result<()> {
        log::info!("[dry run] click at {}", p);
        Ok(())
    }

    fn move_to(&self, p: Point) -> Result<()> {
        log::info!("[dry run] move pointer to {}", p);
        Ok(())
    }
}

// =============================================================================
// Mock Implementation for Testing
// =============================================================================

/// Something the mock desktop was asked to do
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DesktopCall {
    PointerQuery,
    Capture { top_left: Point, bottom_right: Point },
    Click(Point),
    MoveTo(Point),
}

#[derive(Default)]
struct MockInner {
    pointer: Point,
    frames: VecDeque<ColorGrid>,
    fallback: Option<ColorGrid>,
    calls: Vec<DesktopCall>,
    fail_pointer: bool,
    fail_capture: bool,
    fail_click: bool,
    fail_move: bool,
}

/// Scripted desktop: returns queued grids and records every call
#[derive(Default)]
pub struct MockDesktop {
    inner: Mutex<MockInner>,
}

impl MockDesktop {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set the initial pointer position
    pub fn with_pointer(self, p: Point) -> Self {
        self.inner.lock().pointer = p;
        self
    }

    /// Grid returned by every capture once the queue is empty
    pub fn with_frame(self, grid: ColorGrid) -> Self {
        self.set_frame(grid);
        self
    }

    pub fn set_frame(&self, grid: ColorGrid) {
        self.inner.lock().fallback = Some(grid);
    }

    /// Queue a grid for the next capture
    pub fn push_frame(&self, grid: ColorGrid) {
        self.inner.lock().frames.push_back(grid);
    }

    pub fn set_pointer(&self, p: Point) {
        self.inner.lock().pointer = p;
    }

    pub fn pointer(&self) -> Point {
        self.inner.lock().pointer
    }

    pub fn fail_pointer(&self, fail: bool) {
        self.inner.lock().fail_pointer = fail;
    }

    pub fn fail_capture(&self, fail: bool) {
        self.inner.lock().fail_capture = fail;
    }

    pub fn fail_click(&self, fail: bool) {
        self.inner.lock().fail_click = fail;
    }

    pub fn fail_move(&self, fail: bool) {
        self.inner.lock().fail_move = fail;
    }

    /// Every call made so far, in order
    pub fn calls(&self) -> Vec<DesktopCall> {
        self.inner.lock().calls.clone()
    }

    pub fn clear_calls(&self) {
        self.inner.lock().calls.clear();
    }

    pub fn capture_count(&self) -> usize {
        self.inner
            .lock()
            .calls
            .iter()
            .filter(|c| matches!(c, DesktopCall::Capture { .. }))
            .count()
    }

    pub fn clicks(&self) -> Vec<Point> {
        self.inner
            .lock()
            .calls
            .iter()
            .filter_map(|c| match c {
                DesktopCall::Click(p) => Some(*p),
                _ => None,
            })
            .collect()
    }
}

impl PointerSource for MockDesktop {
    fn pointer_position(&self) -> Result<Point> {
        let mut inner = self.inner.lock();
        inner.calls.push(DesktopCall::PointerQuery);
        if inner.fail_pointer {
            return Err(WatchError::capture("mock pointer query failed"));
        }
        Ok(inner.pointer)
    }
}

impl RegionCapture for MockDesktop {
    fn capture_region(&self, top_left: Point, bottom_right: Point) -> Result<ColorGrid> {
        let mut inner = self.inner.lock();
        inner.calls.push(DesktopCall::Capture {
            top_left,
            bottom_right,
        });
        if inner.fail_capture {
            return Err(WatchError::capture("mock capture failed"));
        }
        match inner.frames.pop_front() {
            Some(grid) => Ok(grid),
            None => inner
                .fallback
                .clone()
                .ok_or_else(|| WatchError::capture("mock desktop has no frame")),
        }
    }
}

impl PointerSink for MockDesktop {
    fn click(&self, p: Point) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(DesktopCall::Click(p));
        if inner.fail_click {
            return Err(WatchError::injection("mock click failed"));
        }
        inner.pointer = p;
        Ok(())
    }

    fn move_to(&self, p: Point) -> Result<()> {
        let mut inner = self.inner.lock();
        inner.calls.push(DesktopCall::MoveTo(p));
        if inner.fail_move {
            return Err(WatchError::injection("mock move failed"));
        }
        inner.pointer = p;
        Ok(())
    }
}
