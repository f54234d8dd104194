//! Interactive calibration
//!
//! Builds a watch configuration by asking the operator to hover over two
//! opposite corners of the region, then snapshotting the region once per
//! reference state. The operator gets a settle delay after every prompt.

use std::sync::Arc;
use std::thread;
use std::time::Duration;

use super::capture::{PointerSource, RegionCapture};
use super::config::{WatchConfig, DEFAULT_INTERVAL_MS, DEFAULT_THRESHOLD};
use super::grid::Point;
use crate::error::{Result, WatchError};

/// Time the operator gets to position the pointer after each prompt
pub const DEFAULT_SETTLE_DELAY: Duration = Duration::from_secs(5);

/// Callback receiving operator prompts
pub type PromptCallback = Box<dyn FnMut(&str) + Send>;

/// Drives the calibration flow over a pointer source and a region capture
pub struct Calibrator {
    pointer: Arc<dyn PointerSource>,
    capture: Arc<dyn RegionCapture>,
    settle_delay: Duration,
    state_count: usize,
    threshold: f64,
    interval_ms: u64,
    name: Option<String>,
    prompt: PromptCallback,
}

impl Calibrator {
    pub fn new(pointer: Arc<dyn PointerSource>, capture: Arc<dyn RegionCapture>) -> Self {
        Self {
            pointer,
            capture,
            settle_delay: DEFAULT_SETTLE_DELAY,
            state_count: 1,
            threshold: DEFAULT_THRESHOLD,
            interval_ms: DEFAULT_INTERVAL_MS,
            name: None,
            prompt: Box::new(|msg| log::info!("{}", msg)),
        }
    }

    pub fn with_settle_delay(mut self, delay: Duration) -> Self {
        self.settle_delay = delay;
        self
    }

    /// Number of reference states to record
    pub fn with_states(mut self, count: usize) -> Self {
        self.state_count = count;
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.threshold = threshold;
        self
    }

    pub fn with_interval(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    /// Where prompts are sent; the default logs them
    pub fn on_prompt<F>(mut self, prompt: F) -> Self
    where
        F: FnMut(&str) + Send + 'static,
    {
        self.prompt = Box::new(prompt);
        self
    }

    fn ask(&mut self, message: &str) {
        (self.prompt)(message);
        if !self.settle_delay.is_zero() {
            thread::sleep(self.settle_delay);
        }
    }

    /// Run the whole flow and return a validated configuration
    pub fn run(mut self) -> Result<WatchConfig> {
        if self.state_count == 0 {
            return Err(WatchError::config("at least one reference state must be recorded"));
        }

        self.ask("Place the pointer over the first corner of the region to watch...");
        let first = self.pointer.pointer_position()?;
        (self.prompt)(&format!("First corner captured at {}", first));

        self.ask("Now place the pointer over the opposite corner...");
        let second = self.pointer.pointer_position()?;
        (self.prompt)(&format!("Second corner captured at {}", second));

        let (top_left, bottom_right) = normalize_corners(first, second);
        (self.prompt)(&format!("Watching rectangle {} to {}", top_left, bottom_right));

        let mut config = WatchConfig::new(top_left, bottom_right)
            .with_threshold(self.threshold)
            .with_interval(self.interval_ms);
        config.name = self.name.take();

        for i in 0..self.state_count {
            if i == 0 {
                self.ask("Move the pointer away from the region...");
            } else {
                self.ask(&format!(
                    "Bring the region into reference state {} of {} and keep the pointer clear...",
                    i + 1,
                    self.state_count
                ));
            }

            let grid = self.capture.capture_region(top_left, bottom_right)?;
            if grid.dimensions() != config.dimensions() {
                return Err(WatchError::format(format!(
                    "captured {}x{} grid for a {}x{} rectangle",
                    grid.width(),
                    grid.height(),
                    config.dimensions().0,
                    config.dimensions().1
                )));
            }
            config.states.push(grid);
            (self.prompt)(&format!("Recorded reference state {}", i + 1));
        }

        config.validate()?;
        Ok(config)
    }
}

/// Order two opposite corners as (top-left, bottom-right)
pub fn normalize_corners(a: Point, b: Point) -> (Point, Point) {
    (
        Point::new(a.x.min(b.x), a.y.min(b.y)),
        Point::new(a.x.max(b.x), a.y.max(b.y)),
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::vision::capture::{DesktopCall, MockDesktop};
    use crate::vision::grid::{ColorGrid, Rgb};
    use parking_lot::Mutex;

    /// Mock whose pointer walks through a list of positions on each query
    struct WalkingPointer {
        positions: Mutex<Vec<Point>>,
    }

    impl PointerSource for WalkingPointer {
        fn pointer_position(&self) -> Result<Point> {
            let mut positions = self.positions.lock();
            if positions.is_empty() {
                return Err(WatchError::capture("no more positions"));
            }
            Ok(positions.remove(0))
        }
    }

    fn walking(points: &[Point]) -> Arc<WalkingPointer> {
        Arc::new(WalkingPointer {
            positions: Mutex::new(points.to_vec()),
        })
    }

    #[test]
    fn test_normalize_corners() {
        let (tl, br) = normalize_corners(Point::new(10, 2), Point::new(4, 8));
        assert_eq!(tl, Point::new(4, 2));
        assert_eq!(br, Point::new(10, 8));
    }

    #[test]
    fn test_calibration_builds_config() {
        let pointer = walking(&[Point::new(11, 21), Point::new(10, 20)]);
        let capture = Arc::new(MockDesktop::new());
        capture.push_frame(ColorGrid::filled(2, 2, Rgb::BLACK).unwrap());
        capture.push_frame(ColorGrid::filled(2, 2, Rgb::WHITE).unwrap());

        let prompts = Arc::new(Mutex::new(Vec::new()));
        let sink = prompts.clone();

        let config = Calibrator::new(pointer, capture.clone())
            .with_settle_delay(Duration::ZERO)
            .with_states(2)
            .with_threshold(0.8)
            .with_interval(1000)
            .with_name("ok button")
            .on_prompt(move |m| sink.lock().push(m.to_string()))
            .run()
            .unwrap();

        assert_eq!(config.top_left, Point::new(10, 20));
        assert_eq!(config.bottom_right, Point::new(11, 21));
        assert_eq!(config.states.len(), 2);
        assert_eq!(config.states[1].get(0, 0), Some(Rgb::WHITE));
        assert_eq!(config.similarity_threshold, 0.8);
        assert_eq!(config.interval_ms, 1000);
        assert_eq!(config.name.as_deref(), Some("ok button"));

        assert_eq!(
            capture.calls()[0],
            DesktopCall::Capture {
                top_left: Point::new(10, 20),
                bottom_right: Point::new(11, 21),
            }
        );
        assert!(prompts.lock().iter().any(|p| p.contains("first corner")));
    }

    #[test]
    fn test_calibration_rejects_wrong_capture_shape() {
        let pointer = walking(&[Point::new(0, 0), Point::new(1, 1)]);
        let capture = Arc::new(MockDesktop::new().with_frame(ColorGrid::filled(1, 1, Rgb::BLACK).unwrap()));

        let err = Calibrator::new(pointer, capture)
            .with_settle_delay(Duration::ZERO)
            .run()
            .unwrap_err();
        assert!(matches!(err, WatchError::Format(_)));
    }

    #[test]
    fn test_calibration_propagates_pointer_failure() {
        let pointer = walking(&[Point::new(0, 0)]);
        let capture = Arc::new(MockDesktop::new());

        let err = Calibrator::new(pointer, capture)
            .with_settle_delay(Duration::ZERO)
            .run()
            .unwrap_err();
        assert!(matches!(err, WatchError::Capture(_)));
    }

    #[test]
    fn test_calibration_rejects_invalid_threshold() {
        let pointer = walking(&[Point::new(0, 0), Point::new(0, 0)]);
        let capture = Arc::new(MockDesktop::new().with_frame(ColorGrid::filled(1, 1, Rgb::BLACK).unwrap()));

        let err = Calibrator::new(pointer, capture)
            .with_settle_delay(Duration::ZERO)
            .with_threshold(2.0)
            .run()
            .unwrap_err();
        assert!(matches!(err, WatchError::Config(_)));
    }
}
