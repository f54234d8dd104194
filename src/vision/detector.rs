//! Similarity metric and reference-state matching

use super::grid::ColorGrid;
use crate::error::{Result, WatchError};

/// Largest possible per-pixel distance (255 on each of three channels)
const MAX_PIXEL_DISTANCE: u64 = 255 * 3;

/// Score how alike two equally shaped grids are, from 0.0 to 1.0.
///
/// `1 - total / (cells * 765)` where `total` sums the absolute channel
/// differences of every cell. Grids of different dimensions are rejected
/// rather than truncated.
pub fn similarity(a: &ColorGrid, b: &ColorGrid) -> Result<f64> {
    if a.dimensions() != b.dimensions() {
        return Err(WatchError::ShapeMismatch {
            expected: a.dimensions(),
            actual: b.dimensions(),
        });
    }

    let total: u64 = a
        .cells()
        .zip(b.cells())
        .map(|(x, y)| x.distance(y) as u64)
        .sum();
    let max = a.cell_count() as u64 * MAX_PIXEL_DISTANCE;

    Ok(1.0 - total as f64 / max as f64)
}

/// Result of comparing one capture against a list of reference states
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Evaluation {
    /// The state at `state_index` met the threshold
    Matched { state_index: usize, similarity: f64 },
    /// No state met the threshold
    NoMatch { best_similarity: f64 },
}

impl Evaluation {
    pub fn is_match(&self) -> bool {
        matches!(self, Evaluation::Matched { .. })
    }

    /// Similarity of the matched state, or the best one seen when nothing matched
    pub fn similarity(&self) -> f64 {
        match *self {
            Evaluation::Matched { similarity, .. } => similarity,
            Evaluation::NoMatch { best_similarity } => best_similarity,
        }
    }

    pub fn matched_state(&self) -> Option<usize> {
        match *self {
            Evaluation::Matched { state_index, .. } => Some(state_index),
            Evaluation::NoMatch { .. } => None,
        }
    }
}

/// Compare `current` against `states` in order.
///
/// The first state scoring at least `threshold` wins and no later state is
/// compared. Reaching the threshold exactly counts as a match.
pub fn evaluate_states(states: &[ColorGrid], current: &ColorGrid, threshold: f64) -> Result<Evaluation> {
    let mut best = 0.0_f64;

    for (state_index, state) in states.iter().enumerate() {
        let score = similarity(state, current)?;
        log::trace!("state #{} similarity {:.4}", state_index, score);

        if score >= threshold {
            return Ok(Evaluation::Matched {
                state_index,
                similarity: score,
            });
        }
        best = best.max(score);
    }

    Ok(Evaluation::NoMatch {
        best_similarity: best,
    })
}
