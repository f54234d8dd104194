//! Action trigger: decide on a capture and click when a state matches
//!
//! The action is a fixed sequence: remember where the pointer is, click the
//! middle of the watched rectangle, then move the pointer back. A failure
//! aborts the rest of the sequence, so a failed restore leaves the pointer on
//! the click location.

use super::capture::Desktop;
use super::config::WatchConfig;
use super::detector::{evaluate_states, Evaluation};
use super::grid::{ColorGrid, Point};
use crate::error::{Result, WatchError};

/// What happened during the click-and-restore sequence
#[derive(Debug, Clone, PartialEq)]
pub struct ActionReport {
    /// Pointer position before the click
    pub original: Option<Point>,
    /// Where the click was issued, if it succeeded
    pub clicked_at: Option<Point>,
    /// Whether the pointer was moved back to `original`
    pub restored: bool,
    /// The error that cut the sequence short
    pub error: Option<WatchError>,
}

impl ActionReport {
    fn empty() -> Self {
        Self {
            original: None,
            clicked_at: None,
            restored: false,
            error: None,
        }
    }

    /// The click went through; rotation advances on this
    pub fn fired(&self) -> bool {
        self.clicked_at.is_some()
    }

    pub fn is_complete(&self) -> bool {
        self.fired() && self.restored
    }
}

/// Decision for one capture plus the action it caused, if any
#[derive(Debug, Clone, PartialEq)]
pub struct TriggerOutcome {
    pub evaluation: Evaluation,
    pub action: Option<ActionReport>,
}

impl TriggerOutcome {
    pub fn fired(&self) -> bool {
        self.action.as_ref().map(ActionReport::fired).unwrap_or(false)
    }
}

/// Compare `current` against the configuration's states without side effects
pub fn evaluate(config: &WatchConfig, current: &ColorGrid) -> Result<Evaluation> {
    evaluate_states(&config.states, current, config.similarity_threshold)
}

/// Click the rectangle's midpoint and put the pointer back where it was
pub fn perform_action(config: &WatchConfig, desktop: &Desktop) -> ActionReport {
    let mut report = ActionReport::empty();

    let original = match desktop.pointer.pointer_position() {
        Ok(p) => p,
        Err(e) => {
            report.error = Some(e);
            return report;
        }
    };
    report.original = Some(original);

    let target = config.midpoint();
    if let Err(e) = desktop.input.click(target) {
        report.error = Some(e);
        return report;
    }
    report.clicked_at = Some(target);
    log::info!("Clicked at {} for '{}'", target, config.label());

    match desktop.input.move_to(original) {
        Ok(()) => {
            report.restored = true;
            log::debug!("Returned pointer to {}", original);
        }
        Err(e) => {
            log::warn!(
                "Pointer left at {} after click, restore to {} failed: {}",
                target,
                original,
                e
            );
            report.error = Some(e);
        }
    }

    report
}

/// Evaluate `current` and run the action on a match
pub fn process(config: &WatchConfig, current: &ColorGrid, desktop: &Desktop) -> Result<TriggerOutcome> {
    let evaluation = evaluate(config, current)?;

    let action = if evaluation.is_match() {
        Some(perform_action(config, desktop))
    } else {
        None
    };

    Ok(TriggerOutcome { evaluation, action })
}
