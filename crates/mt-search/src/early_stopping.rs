//! Early-stopping policies consulted by the search driver after each trial.

use serde::{Deserialize, Serialize};

use mt_types::{config_error, ObjectiveDirection, TunerResult};

use crate::history::SearchHistory;

/// Decides from the recorded mean scores whether a search loop should halt.
///
/// Policies keep no state of their own; everything they need is in the
/// history passed to [`should_stop`](Self::should_stop).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EarlyStoppingPolicy {
    /// Never stops.
    Dummy,
    /// Stops once the last `window_size` scores bring no strict improvement
    /// over the best score recorded before them.
    NoImprovement {
        window_size: usize,
        direction: ObjectiveDirection,
    },
}

impl Default for EarlyStoppingPolicy {
    fn default() -> Self {
        Self::Dummy
    }
}

impl EarlyStoppingPolicy {
    pub fn no_improvement(window_size: usize, direction: ObjectiveDirection) -> TunerResult<Self> {
        if window_size == 0 {
            return Err(config_error!("early stopping window size must be at least 1"));
        }
        Ok(Self::NoImprovement {
            window_size,
            direction,
        })
    }

    pub fn should_stop(&self, history: &SearchHistory) -> bool {
        self.should_stop_scores(&history.mean_scores())
    }

    /// Same decision over a bare score sequence, most recent last.
    pub fn should_stop_scores(&self, scores: &[f64]) -> bool {
        match *self {
            Self::Dummy => false,
            Self::NoImprovement {
                window_size,
                direction,
            } => {
                // A zero window can only arrive through deserialization.
                if window_size == 0 || scores.len() <= window_size {
                    return false;
                }
                let (prior, window) = scores.split_at(scores.len() - window_size);
                let Some(best_prior) = direction.best_score(prior) else {
                    return false;
                };
                !window.iter().any(|&s| direction.is_better(s, best_prior))
            }
        }
    }
}
