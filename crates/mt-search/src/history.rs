//! Append-only record of completed trials.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use mt_types::{HyperParams, ObjectiveDirection};

/// One completed trial: a drawn configuration and how it scored.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TrialRecord {
    pub trial_number: usize,
    pub parameters: HyperParams,
    /// Mean of `fold_scores`.
    #[serde(with = "mt_types::nan_serde::score")]
    pub mean_score: f64,
    /// One score per fold, or the single holdout score.
    #[serde(with = "mt_types::nan_serde::scores")]
    pub fold_scores: Vec<f64>,
    pub duration_ms: u64,
    pub finished_at: DateTime<Utc>,
}

/// Trials recorded by one search driver, oldest first.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchHistory {
    records: Vec<TrialRecord>,
}

impl SearchHistory {
    pub fn new() -> Self {
        Self::default()
    }

    pub(crate) fn record(
        &mut self,
        parameters: HyperParams,
        fold_scores: Vec<f64>,
        duration_ms: u64,
    ) -> &TrialRecord {
        let mean_score = if fold_scores.is_empty() {
            f64::NAN
        } else {
            fold_scores.iter().sum::<f64>() / fold_scores.len() as f64
        };
        self.records.push(TrialRecord {
            trial_number: self.records.len(),
            parameters,
            mean_score,
            fold_scores,
            duration_ms,
            finished_at: Utc::now(),
        });
        &self.records[self.records.len() - 1]
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    pub fn records(&self) -> &[TrialRecord] {
        &self.records
    }

    pub fn iter(&self) -> impl Iterator<Item = &TrialRecord> {
        self.records.iter()
    }

    pub fn last(&self) -> Option<&TrialRecord> {
        self.records.last()
    }

    /// Mean score per trial, most recent last.
    pub fn mean_scores(&self) -> Vec<f64> {
        self.records.iter().map(|r| r.mean_score).collect()
    }

    pub fn fold_scores(&self) -> Vec<Vec<f64>> {
        self.records.iter().map(|r| r.fold_scores.clone()).collect()
    }

    pub fn parameters(&self) -> Vec<HyperParams> {
        self.records.iter().map(|r| r.parameters.clone()).collect()
    }

    /// Best trial by mean score; the earliest one wins ties.
    pub fn best(&self, direction: ObjectiveDirection) -> Option<&TrialRecord> {
        direction
            .best_index(&self.mean_scores())
            .map(|idx| &self.records[idx])
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_types::ParameterValue;

    fn params(a: i64) -> HyperParams {
        let mut p = HyperParams::new();
        p.insert("a".into(), ParameterValue::Int(a));
        p
    }

    #[test]
    fn record_computes_mean_and_numbers_trials() {
        let mut history = SearchHistory::new();
        let first = history.record(params(1), vec![0.5, 0.7, 0.9], 3);
        assert!((first.mean_score - 0.7).abs() < 1e-12);
        assert_eq!(first.trial_number, 0);

        let second = history.record(params(2), vec![0.1], 1);
        assert_eq!(second.trial_number, 1);
        assert_eq!(history.len(), 2);
        assert_eq!(history.fold_scores()[0].len(), 3);
    }

    #[test]
    fn best_breaks_ties_by_first_occurrence() {
        let mut history = SearchHistory::new();
        history.record(params(1), vec![0.2], 0);
        history.record(params(2), vec![0.8], 0);
        history.record(params(3), vec![0.8], 0);
        history.record(params(4), vec![0.1], 0);

        let best = history.best(ObjectiveDirection::Maximize).unwrap();
        assert_eq!(best.parameters, params(2));

        let best = history.best(ObjectiveDirection::Minimize).unwrap();
        assert_eq!(best.parameters, params(4));
    }

    #[test]
    fn empty_history_has_no_best() {
        let history = SearchHistory::new();
        assert!(history.best(ObjectiveDirection::Maximize).is_none());
        assert!(history.is_empty());
    }

    #[test]
    fn history_serializes() {
        let mut history = SearchHistory::new();
        history.record(params(1), vec![0.25, 0.75], 10);
        let json = serde_json::to_string(&history).unwrap();
        let back: SearchHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mean_scores(), vec![0.5]);
        assert_eq!(back.parameters(), vec![params(1)]);
    }

    #[test]
    fn nan_scores_survive_serialization() {
        let mut history = SearchHistory::new();
        history.record(params(1), vec![f64::NAN, 0.5], 0);
        history.record(params(2), vec![0.25], 0);

        let json = serde_json::to_string(&history).unwrap();
        let back: SearchHistory = serde_json::from_str(&json).unwrap();
        assert_eq!(back.len(), 2);
        assert!(back.records()[0].mean_score.is_nan());
        assert!(back.records()[0].fold_scores[0].is_nan());
        assert_eq!(back.records()[0].fold_scores[1], 0.5);
        assert_eq!(back.best(ObjectiveDirection::Maximize).unwrap().parameters, params(2));
    }
}
