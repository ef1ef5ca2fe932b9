use serde::{Deserialize, Serialize};

use mt_search::{SearchHistory, SearchResults};
use mt_types::HyperParams;

/// The evaluated configurations of one dataset and their mean scores, in
/// the order they were tried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunabilityRecord {
    pub dataset: String,
    pub hyperparameters: Vec<HyperParams>,
    #[serde(with = "mt_types::nan_serde::scores")]
    pub scores: Vec<f64>,
}

impl TunabilityRecord {
    pub fn new(dataset: impl Into<String>, hyperparameters: Vec<HyperParams>, scores: Vec<f64>) -> Self {
        Self {
            dataset: dataset.into(),
            hyperparameters,
            scores,
        }
    }

    pub fn from_history(dataset: impl Into<String>, history: &SearchHistory) -> Self {
        Self::new(dataset, history.parameters(), history.mean_scores())
    }

    pub fn from_results(dataset: impl Into<String>, results: &SearchResults) -> Self {
        Self::from_history(dataset, &results.history)
    }

    pub fn len(&self) -> usize {
        self.hyperparameters.len()
    }

    pub fn is_empty(&self) -> bool {
        self.hyperparameters.is_empty()
    }

    /// Score of the first trial that used `params`.
    pub fn score_of(&self, params: &HyperParams) -> Option<f64> {
        self.hyperparameters
            .iter()
            .position(|candidate| candidate == params)
            .and_then(|idx| self.scores.get(idx).copied())
    }
}
