//! Region Watch
//!
//! Watches a rectangle of the display, compares it against recorded reference
//! states and clicks it when one of them matches, returning the pointer to
//! where it was.
//!
//! This crate can be used as:
//! - A Rust library for embedding the watcher with custom capture backends
//! - The `region-watch` command line tool (calibrate, check, run)

pub mod error;
pub mod platform;
pub mod vision;

// Re-export commonly used types
pub use error::{Result, WatchError};
pub use vision::{
    similarity, Calibrator, ColorGrid, ConfigurationSet, CycleReport, Desktop, Evaluation,
    MockDesktop, Pacing, Point, Rgb, RunnerOptions, Scheduler, WatchConfig, WatchStatus, Watcher,
};

/// Library version
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
