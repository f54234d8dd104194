//! Screen region watching
//!
//! A watch configuration names a rectangle of the display and one or more
//! reference states recorded from it. The runner captures the rectangle on an
//! interval, compares it against the states in order and, on the first state
//! that is similar enough, clicks the middle of the rectangle and returns the
//! pointer to where it was.
//!
//! # Example
//!
//! ```ignore
//! use region_watch::vision::{ConfigurationSet, Desktop, RunnerOptions, Scheduler, Watcher};
//!
//! let set = ConfigurationSet::load_all(&["accept.toml", "confirm.toml"])?;
//! let mut scheduler = Scheduler::new(set, desktop);
//! scheduler.on_cycle(|report| println!("similarity {:?}", report.similarity()));
//!
//! let mut watcher = Watcher::new();
//! watcher.start(scheduler, RunnerOptions::default())?;
//! ```

pub mod calibrate;
pub mod capture;
pub mod config;
pub mod detector;
pub mod events;
pub mod grid;
pub mod set;
pub mod state;
pub mod trigger;

#[cfg(feature = "replay")]
pub mod replay;

mod runner;

// Re-export main types for convenient access
pub use calibrate::Calibrator;
pub use capture::{Desktop, DesktopCall, DryRunInput, MockDesktop, PointerSink, PointerSource, RegionCapture};
pub use config::WatchConfig;
pub use detector::{evaluate_states, similarity, Evaluation};
pub use events::{CycleCallback, CycleReport, EventHandler};
pub use grid::{ColorGrid, Point, Rgb};
pub use runner::{Pacing, RunnerOptions, Scheduler, ShutdownSignal, Watcher};
pub use set::ConfigurationSet;
pub use state::{WatchPhase, WatchStatus};
pub use trigger::{ActionReport, TriggerOutcome};

#[cfg(feature = "replay")]
pub use replay::ReplayCapture;
