//! Watch configuration and its persisted form
//!
//! A watch configuration is stored as TOML by default:
//!
//! ```toml
//! name = "accept button"
//! similarity_threshold = 0.9
//! interval_ms = 20000
//! states = [[["000000", "000000"], ["000000", "000000"]]]
//!
//! [top_left]
//! x = 0
//! y = 0
//!
//! [bottom_right]
//! x = 1
//! y = 1
//! ```
//!
//! Files ending in `.json` use the same fields as JSON.

use serde::{Deserialize, Serialize};
use std::path::Path;

use super::grid::{ColorGrid, Point};
use crate::error::{Result, WatchError};

/// Threshold written by calibration when none is supplied
pub const DEFAULT_THRESHOLD: f64 = 0.9;

/// Interval written by calibration when none is supplied
pub const DEFAULT_INTERVAL_MS: u64 = 20_000;

/// Rectangle, reference states, threshold and interval for one watched region
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WatchConfig {
    /// Optional label used in logs
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Minimum similarity (inclusive) for a reference state to match
    #[serde(alias = "similarityThreshold")]
    pub similarity_threshold: f64,
    /// Delay between cycles in milliseconds
    #[serde(alias = "intervalMs")]
    pub interval_ms: u64,
    /// Known appearances of the rectangle, compared in order
    pub states: Vec<ColorGrid>,
    #[serde(alias = "topLeft")]
    pub top_left: Point,
    #[serde(alias = "bottomRight")]
    pub bottom_right: Point,
}

impl WatchConfig {
    /// Create a configuration with no states yet and default threshold/interval
    pub fn new(top_left: Point, bottom_right: Point) -> Self {
        Self {
            name: None,
            similarity_threshold: DEFAULT_THRESHOLD,
            interval_ms: DEFAULT_INTERVAL_MS,
            states: Vec::new(),
            top_left,
            bottom_right,
        }
    }

    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = Some(name.into());
        self
    }

    pub fn with_threshold(mut self, threshold: f64) -> Self {
        self.similarity_threshold = threshold;
        self
    }

    pub fn with_interval(mut self, ms: u64) -> Self {
        self.interval_ms = ms;
        self
    }

    pub fn with_state(mut self, state: ColorGrid) -> Self {
        self.states.push(state);
        self
    }

    /// Label for logs: the name if set, otherwise the rectangle
    pub fn label(&self) -> String {
        match &self.name {
            Some(name) => name.clone(),
            None => format!("{}-{}", self.top_left, self.bottom_right),
        }
    }

    /// `(width, height)` of the rectangle, corners inclusive.
    ///
    /// Meaningless for a rectangle with inverted corners; `validate` rejects those.
    pub fn dimensions(&self) -> (usize, usize) {
        let w = self.bottom_right.x as i64 - self.top_left.x as i64 + 1;
        let h = self.bottom_right.y as i64 - self.top_left.y as i64 + 1;
        (w.max(0) as usize, h.max(0) as usize)
    }

    /// Point clicked on a match, rounded down to whole pixels
    pub fn midpoint(&self) -> Point {
        let x = (self.top_left.x as i64 + self.bottom_right.x as i64).div_euclid(2);
        let y = (self.top_left.y as i64 + self.bottom_right.y as i64).div_euclid(2);
        Point::new(x as i32, y as i32)
    }

    /// Check every invariant a configuration needs before it can be scheduled
    pub fn validate(&self) -> Result<()> {
        if self.top_left.x > self.bottom_right.x || self.top_left.y > self.bottom_right.y {
            return Err(WatchError::config(format!(
                "top-left corner {} must not lie right of or below bottom-right corner {}",
                self.top_left, self.bottom_right
            )));
        }

        if self.states.is_empty() {
            return Err(WatchError::config("at least one reference state is required"));
        }

        let expected = self.dimensions();
        for (i, state) in self.states.iter().enumerate() {
            if state.dimensions() != expected {
                return Err(WatchError::config(format!(
                    "reference state #{} is {}x{}, rectangle is {}x{}",
                    i,
                    state.width(),
                    state.height(),
                    expected.0,
                    expected.1
                )));
            }
        }

        if !(0.0..=1.0).contains(&self.similarity_threshold) {
            return Err(WatchError::config(format!(
                "similarity threshold {} is outside 0.0..=1.0",
                self.similarity_threshold
            )));
        }

        if self.interval_ms == 0 {
            return Err(WatchError::config("interval must be at least 1 ms"));
        }

        Ok(())
    }

    // =========================================================================
    // SERIALIZATION
    // =========================================================================

    pub fn to_toml(&self) -> Result<String> {
        Ok(toml::to_string(self)?)
    }

    /// Parse and validate a TOML configuration
    pub fn from_toml(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_json(&self) -> Result<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Parse and validate a JSON configuration
    pub fn from_json(content: &str) -> Result<Self> {
        let config: Self = serde_json::from_str(content)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a configuration file, picking the format from its extension
    pub fn load(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .map_err(|e| WatchError::Io(format!("{}: {}", path.display(), e)))?;

        let parsed = if is_json(path) {
            Self::from_json(&content)
        } else {
            Self::from_toml(&content)
        };

        parsed.map_err(|e| match e {
            WatchError::Format(msg) => WatchError::Format(format!("{}: {}", path.display(), msg)),
            WatchError::Config(msg) => WatchError::Config(format!("{}: {}", path.display(), msg)),
            other => other,
        })
    }

    /// Validate and write the configuration, picking the format from the extension
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = if is_json(path) {
            self.to_json()?
        } else {
            self.to_toml()?
        };
        std::fs::write(path, content)
            .map_err(|e| WatchError::Io(format!("{}: {}", path.display(), e)))?;
        log::info!("Saved watch configuration '{}' to {}", self.label(), path.display());
        Ok(())
    }
}

fn is_json(path: &Path) -> bool {
    path.extension()
        .map(|ext| ext.eq_ignore_ascii_case("json"))
        .unwrap_or(false)
}
