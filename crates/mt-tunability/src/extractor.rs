//! Default configuration and tunability extraction.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use mt_types::{config_error, state_error, HyperParams, ObjectiveDirection, TunerResult};

use crate::record::TunabilityRecord;

/// How much tuning improves on the default for one dataset.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DatasetGain {
    pub dataset: String,
    #[serde(with = "mt_types::nan_serde::score")]
    pub best_score: f64,
    #[serde(with = "mt_types::nan_serde::score")]
    pub default_score: f64,
    /// `|best_score - default_score|`.
    #[serde(with = "mt_types::nan_serde::score")]
    pub gain: f64,
}

/// Serializable outcome of a tunability analysis.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TunabilityReport {
    pub direction: ObjectiveDirection,
    pub default_hpo: HyperParams,
    #[serde(with = "mt_types::nan_serde::score")]
    pub default_mean_score: f64,
    pub datasets: Vec<DatasetGain>,
    #[serde(with = "mt_types::nan_serde::score")]
    pub mean_gain: f64,
    pub created_at: DateTime<Utc>,
}

/// Derives a shared default configuration from per-dataset searches and the
/// per-dataset gain of tuning over it.
///
/// The candidates for the default are the configurations of the first
/// dataset that were also evaluated on every other dataset. The default is
/// the candidate with the best mean score across datasets; earlier
/// candidates win ties.
#[derive(Debug, Clone)]
pub struct TunabilityExtractor {
    records: Vec<TunabilityRecord>,
    direction: ObjectiveDirection,
    default_hpo: Option<HyperParams>,
}

impl TunabilityExtractor {
    pub fn new(records: Vec<TunabilityRecord>, direction: ObjectiveDirection) -> TunerResult<Self> {
        if records.is_empty() {
            return Err(config_error!("tunability needs at least one dataset"));
        }
        for record in &records {
            if record.hyperparameters.len() != record.scores.len() {
                return Err(config_error!(
                    "dataset '{}' has {} configurations but {} scores",
                    record.dataset,
                    record.hyperparameters.len(),
                    record.scores.len()
                ));
            }
        }
        Ok(Self {
            records,
            direction,
            default_hpo: None,
        })
    }

    pub fn from_lower_is_better(records: Vec<TunabilityRecord>, lower_is_better: bool) -> TunerResult<Self> {
        Self::new(records, ObjectiveDirection::from_lower_is_better(lower_is_better))
    }

    pub fn records(&self) -> &[TunabilityRecord] {
        &self.records
    }

    pub fn direction(&self) -> ObjectiveDirection {
        self.direction
    }

    /// The default found by the last [`extract_default_hpo`](Self::extract_default_hpo).
    pub fn default_hpo(&self) -> Option<&HyperParams> {
        self.default_hpo.as_ref()
    }

    pub fn extract_default_hpo(&mut self) -> TunerResult<&HyperParams> {
        let (first, rest) = self
            .records
            .split_first()
            .ok_or_else(|| state_error!("no datasets to extract a default from"))?;

        let mut candidates: Vec<&HyperParams> = Vec::new();
        let mut means: Vec<f64> = Vec::new();
        for (idx, candidate) in first.hyperparameters.iter().enumerate() {
            if first.hyperparameters[..idx].contains(candidate) {
                continue;
            }
            let mut total = first.scores[idx];
            let mut shared = true;
            for record in rest {
                match record.score_of(candidate) {
                    Some(score) => total += score,
                    None => {
                        shared = false;
                        break;
                    }
                }
            }
            if shared {
                candidates.push(candidate);
                means.push(total / self.records.len() as f64);
            }
        }

        // Candidates whose mean is NaN only win when nothing else was scored.
        let best = self
            .direction
            .best_index(&means)
            .or_else(|| (!candidates.is_empty()).then_some(0));
        let (default, mean) = best.map(|idx| (candidates[idx], means[idx])).ok_or_else(|| {
            state_error!("no configuration was evaluated on all {} datasets", self.records.len())
        })?;
        info!(
            "Default configuration {:?} has mean score {:.6} over {} datasets",
            default,
            mean,
            self.records.len()
        );

        Ok(self.default_hpo.insert(default.clone()))
    }

    /// Per dataset, the absolute difference between the best score reached
    /// and the score of the default configuration.
    pub fn extract_gains(&self) -> TunerResult<Vec<f64>> {
        Ok(self
            .dataset_gains()?
            .into_iter()
            .map(|gain| gain.gain)
            .collect())
    }

    pub fn dataset_gains(&self) -> TunerResult<Vec<DatasetGain>> {
        let default = self.default_hpo.as_ref().ok_or_else(|| {
            state_error!("default configuration is not set; call extract_default_hpo first")
        })?;

        self.records
            .iter()
            .map(|record| {
                let default_score = record.score_of(default).ok_or_else(|| {
                    state_error!("dataset '{}' never evaluated the default", record.dataset)
                })?;
                let best_score = self
                    .direction
                    .best_score(&record.scores)
                    .unwrap_or(default_score);
                let gain = (best_score - default_score).abs();
                debug!("Dataset '{}': tunability {:.6}", record.dataset, gain);
                Ok(DatasetGain {
                    dataset: record.dataset.clone(),
                    best_score,
                    default_score,
                    gain,
                })
            })
            .collect()
    }

    /// Default and gains in one serializable report; extracts the default
    /// first when it is not set yet.
    pub fn report(&mut self) -> TunerResult<TunabilityReport> {
        if self.default_hpo.is_none() {
            self.extract_default_hpo()?;
        }
        let datasets = self.dataset_gains()?;
        let n = datasets.len() as f64;
        let default_mean_score = datasets.iter().map(|d| d.default_score).sum::<f64>() / n;
        let mean_gain = datasets.iter().map(|d| d.gain).sum::<f64>() / n;

        Ok(TunabilityReport {
            direction: self.direction,
            default_hpo: self.default_hpo.clone().unwrap_or_default(),
            default_mean_score,
            datasets,
            mean_gain,
            created_at: Utc::now(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_types::{ParameterValue, TunerError};

    fn hpo(a: i64) -> HyperParams {
        let mut params = HyperParams::new();
        params.insert("a".into(), ParameterValue::Int(a));
        params
    }

    fn search_result() -> Vec<TunabilityRecord> {
        [("d1", [200.0, 99.0]), ("d2", [0.0, 10.0]), ("d3", [5.0, 4.0])]
            .into_iter()
            .map(|(name, scores)| TunabilityRecord::new(name, vec![hpo(1), hpo(2)], scores.to_vec()))
            .collect()
    }

    #[test]
    fn wrong_lengths_fail_at_construction() {
        let records = vec![
            TunabilityRecord::new("d1", vec![hpo(1), hpo(2)], vec![100.0, 99.0]),
            TunabilityRecord::new("d2", vec![hpo(1)], vec![0.0, 0.0]),
            TunabilityRecord::new("d3", vec![hpo(1), hpo(2)], vec![4.0]),
        ];
        let err = TunabilityExtractor::from_lower_is_better(records, true).unwrap_err();
        assert!(matches!(err, TunerError::Configuration(_)));

        assert!(TunabilityExtractor::new(Vec::new(), ObjectiveDirection::Maximize).is_err());
    }

    #[test]
    fn extract_default_hpo_follows_direction() {
        let mut extractor = TunabilityExtractor::from_lower_is_better(search_result(), true).unwrap();
        assert_eq!(extractor.extract_default_hpo().unwrap()["a"], ParameterValue::Int(2));

        let mut extractor = TunabilityExtractor::from_lower_is_better(search_result(), false).unwrap();
        assert_eq!(extractor.extract_default_hpo().unwrap()["a"], ParameterValue::Int(1));
        assert_eq!(extractor.default_hpo(), Some(&hpo(1)));
    }

    #[test]
    fn extract_gains_both_directions() {
        for lower_is_better in [true, false] {
            let mut extractor =
                TunabilityExtractor::from_lower_is_better(search_result(), lower_is_better).unwrap();
            extractor.extract_default_hpo().unwrap();
            assert_eq!(extractor.extract_gains().unwrap(), vec![0.0, 10.0, 0.0]);
        }
    }

    #[test]
    fn gains_before_default_is_a_state_error() {
        let extractor = TunabilityExtractor::from_lower_is_better(search_result(), true).unwrap();
        assert!(matches!(extractor.extract_gains(), Err(TunerError::State(_))));
    }

    #[test]
    fn only_shared_configurations_are_candidates() {
        let records = vec![
            TunabilityRecord::new("d1", vec![hpo(1), hpo(2), hpo(3)], vec![0.9, 0.5, 0.7]),
            TunabilityRecord::new("d2", vec![hpo(3), hpo(2)], vec![0.6, 0.8]),
        ];
        let mut extractor = TunabilityExtractor::new(records, ObjectiveDirection::Maximize).unwrap();
        // hpo(1) scores best on d1 but was never tried on d2.
        assert_eq!(extractor.extract_default_hpo().unwrap(), &hpo(3));
        let gains = extractor.extract_gains().unwrap();
        assert!((gains[0] - 0.2).abs() < 1e-12);
        assert!((gains[1] - 0.2).abs() < 1e-12);
    }

    #[test]
    fn nan_scores_do_not_win_the_default() {
        let records = vec![
            TunabilityRecord::new("d1", vec![hpo(1), hpo(2), hpo(3)], vec![f64::NAN, 0.4, 0.6]),
            TunabilityRecord::new("d2", vec![hpo(1), hpo(2), hpo(3)], vec![0.9, 0.5, 0.7]),
        ];
        let mut extractor = TunabilityExtractor::new(records, ObjectiveDirection::Maximize).unwrap();
        assert_eq!(extractor.extract_default_hpo().unwrap(), &hpo(3));

        let gains = extractor.dataset_gains().unwrap();
        assert_eq!(gains[0].best_score, 0.6);
        assert_eq!(gains[0].gain, 0.0);
        assert!((gains[1].gain - 0.2).abs() < 1e-12);
    }

    #[test]
    fn no_shared_configuration_is_a_state_error() {
        let records = vec![
            TunabilityRecord::new("d1", vec![hpo(1)], vec![0.9]),
            TunabilityRecord::new("d2", vec![hpo(2)], vec![0.6]),
        ];
        let mut extractor = TunabilityExtractor::new(records, ObjectiveDirection::Maximize).unwrap();
        assert!(matches!(extractor.extract_default_hpo(), Err(TunerError::State(_))));
        assert!(extractor.default_hpo().is_none());
    }

    #[test]
    fn report_serializes() {
        let mut extractor = TunabilityExtractor::from_lower_is_better(search_result(), true).unwrap();
        let report = extractor.report().unwrap();
        assert_eq!(report.default_hpo, hpo(2));
        assert_eq!(report.datasets.len(), 3);
        assert!((report.mean_gain - 10.0 / 3.0).abs() < 1e-12);

        let json = serde_json::to_string(&report).unwrap();
        let back: TunabilityReport = serde_json::from_str(&json).unwrap();
        assert_eq!(back.datasets, report.datasets);
    }
}
