//! Reports emitted after every watch cycle

use std::time::{Duration, Instant};

use super::detector::Evaluation;
use super::trigger::ActionReport;
use crate::error::WatchError;

/// Outcome of one capture, compare and act cycle
#[derive(Debug, Clone)]
pub struct CycleReport {
    /// Sequence number, starting at 1
    pub cycle: u64,
    /// Index of the configuration checked in this cycle
    pub config_index: usize,
    /// Display label of that configuration
    pub config_label: String,
    /// Comparison result, absent if the capture failed
    pub evaluation: Option<Evaluation>,
    /// The click-and-restore sequence, present only on a match
    pub action: Option<ActionReport>,
    /// First error hit during the cycle
    pub error: Option<WatchError>,
    /// Rotation index once the cycle finished
    pub rotation_index: usize,
    /// When the cycle started
    pub started_at: Instant,
    /// How long the region capture took, including a failed one
    pub capture_duration: Duration,
    /// How long capture, compare and act took
    pub duration: Duration,
}

impl CycleReport {
    pub fn matched(&self) -> bool {
        self.evaluation.map(|e| e.is_match()).unwrap_or(false)
    }

    pub fn fired(&self) -> bool {
        self.action.as_ref().map(ActionReport::fired).unwrap_or(false)
    }

    /// Best similarity seen, if the capture got as far as comparing
    pub fn similarity(&self) -> Option<f64> {
        self.evaluation.map(|e| e.similarity())
    }

    pub fn is_error(&self) -> bool {
        self.error.is_some()
    }
}

/// Callback type for cycle reports
pub type CycleCallback = Box<dyn Fn(&CycleReport) + Send + Sync>;

/// Listener registry for cycle reports
pub struct EventHandler {
    callbacks: Vec<CycleCallback>,
}

impl EventHandler {
    pub fn new() -> Self {
        Self {
            callbacks: Vec::new(),
        }
    }

    /// Add a listener
    pub fn on_cycle(&mut self, callback: CycleCallback) {
        self.callbacks.push(callback);
    }

    /// Send a report to every listener
    pub fn emit(&self, report: &CycleReport) {
        for callback in &self.callbacks {
            callback(report);
        }
    }

    pub fn has_listeners(&self) -> bool {
        !self.callbacks.is_empty()
    }
}

impl Default for EventHandler {
    fn default() -> Self {
        Self::new()
    }
}
