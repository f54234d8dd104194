//! Watcher status snapshot

use serde::{Deserialize, Serialize};

use super::events::CycleReport;

/// Lifecycle phase of a watcher
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum WatchPhase {
    /// Started, first cycle not run yet
    #[default]
    Idle,
    /// Cycling
    Running,
    /// Shut down through the stop hook
    Stopped,
}

/// Current state of a watcher, shared with whoever holds its handle
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct WatchStatus {
    pub phase: WatchPhase,
    /// Number of configurations being rotated
    pub config_count: usize,
    /// Configuration due for the next cycle
    pub active_index: usize,
    /// Cycles completed
    pub cycles: u64,
    /// Cycles where a reference state matched
    pub matches: u64,
    /// Cycles where the click was issued
    pub actions: u64,
    /// Cycles that hit an error
    pub errors: u64,
    /// Similarity reported by the latest cycle
    pub last_similarity: Option<f64>,
    /// Error message of the latest failed cycle
    pub last_error: Option<String>,
}

impl WatchStatus {
    pub fn new(config_count: usize) -> Self {
        Self {
            config_count,
            ..Self::default()
        }
    }

    pub fn is_running(&self) -> bool {
        self.phase == WatchPhase::Running
    }

    /// Fold a finished cycle into the counters
    pub fn record(&mut self, report: &CycleReport) {
        self.phase = WatchPhase::Running;
        self.cycles += 1;
        self.active_index = report.rotation_index;

        if report.matched() {
            self.matches += 1;
        }
        if report.fired() {
            self.actions += 1;
        }
        if let Some(similarity) = report.similarity() {
            self.last_similarity = Some(similarity);
        }
        if let Some(ref e) = report.error {
            self.errors += 1;
            self.last_error = Some(e.to_string());
        }
    }

    pub fn to_json(&self) -> String {
        serde_json::to_string(self).unwrap_or_else(|_| "{}".to_string())
    }
}
