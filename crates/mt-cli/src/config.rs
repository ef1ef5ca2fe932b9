//! Experiment configuration read by the `meta-tuner` binary.

use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::ArrayView1;
use serde::{Deserialize, Serialize};

use mt_models::{binary_accuracy, neg_mean_squared_error, roc_auc};
use mt_search::{EarlyStoppingPolicy, SearchConfig};
use mt_types::{ObjectiveDirection, TunerResult};

/// Overrides [`ExperimentConfig::results_dir`] when set.
pub const RESULTS_DIR_ENV: &str = "META_TUNER_RESULTS_DIR";

pub type Scorer = fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> TunerResult<f64>;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelKind {
    /// Standard-scaled logistic regression over the solver-conditional grid.
    Logistic,
    Ridge,
}

impl fmt::Display for ModelKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Logistic => f.write_str("logistic"),
            Self::Ridge => f.write_str("ridge"),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Scoring {
    RocAuc,
    /// Accuracy of probabilities thresholded at 0.5.
    Accuracy,
    NegMse,
}

impl Scoring {
    pub fn scorer(self) -> Scorer {
        match self {
            Self::RocAuc => roc_auc,
            Self::Accuracy => binary_accuracy,
            Self::NegMse => neg_mean_squared_error,
        }
    }

    /// Every supported score is higher-is-better.
    pub fn direction(self) -> ObjectiveDirection {
        ObjectiveDirection::Maximize
    }

    /// Classification scores need 0/1 targets.
    pub fn encode_y(self) -> bool {
        matches!(self, Self::RocAuc | Self::Accuracy)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExperimentConfig {
    /// `*.csv` datasets for `search`, `<name>/{train,test}.csv` pairs for `holdout`.
    pub data_dir: PathBuf,
    pub results_dir: PathBuf,
    pub model: ModelKind,
    pub scoring: Scoring,
    pub n_iter: usize,
    pub cv: usize,
    /// Grid seed; every dataset replays the same draws when set.
    pub seed: Option<u64>,
    /// Seed for fold assignment.
    pub cv_seed: Option<u64>,
    /// Stop a search after this many trials without improvement.
    pub early_stopping_window: Option<usize>,
}

impl Default for ExperimentConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("data"),
            results_dir: PathBuf::from("results/linear/classification/bin/roc-auc"),
            model: ModelKind::Logistic,
            scoring: Scoring::RocAuc,
            n_iter: 500,
            cv: 3,
            seed: None,
            cv_seed: None,
            early_stopping_window: None,
        }
    }
}

impl ExperimentConfig {
    pub fn from_file<P: AsRef<Path>>(path: P) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let raw = fs::read_to_string(path)
            .with_context(|| format!("failed to read config {}", path.display()))?;
        let config: Self = serde_json::from_str(&raw)
            .with_context(|| format!("failed to parse config {}", path.display()))?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> anyhow::Result<()> {
        if self.n_iter == 0 {
            anyhow::bail!("n_iter must be at least 1");
        }
        if self.cv < 2 {
            anyhow::bail!("cv must be at least 2, got {}", self.cv);
        }
        if self.early_stopping_window == Some(0) {
            anyhow::bail!("early_stopping_window must be at least 1");
        }
        Ok(())
    }

    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = dir.into();
        self
    }

    pub fn with_results_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.results_dir = dir.into();
        self
    }

    pub fn with_model(mut self, model: ModelKind) -> Self {
        self.model = model;
        self
    }

    pub fn with_scoring(mut self, scoring: Scoring) -> Self {
        self.scoring = scoring;
        self
    }

    pub fn with_n_iter(mut self, n_iter: usize) -> Self {
        self.n_iter = n_iter;
        self
    }

    pub fn with_cv(mut self, cv: usize) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_seed(mut self, seed: u64) -> Self {
        self.seed = Some(seed);
        self
    }

    pub fn with_cv_seed(mut self, seed: u64) -> Self {
        self.cv_seed = Some(seed);
        self
    }

    pub fn with_early_stopping_window(mut self, window: usize) -> Self {
        self.early_stopping_window = Some(window);
        self
    }

    /// The results directory, honouring `META_TUNER_RESULTS_DIR`.
    pub fn resolved_results_dir(&self) -> PathBuf {
        std::env::var_os(RESULTS_DIR_ENV)
            .map(PathBuf::from)
            .unwrap_or_else(|| self.results_dir.clone())
    }

    pub fn search_config(&self) -> SearchConfig {
        SearchConfig::default()
            .with_n_iter(self.n_iter)
            .with_cv(self.cv)
            .with_encode_y(self.scoring.encode_y())
    }

    pub fn early_stopping(&self) -> TunerResult<EarlyStoppingPolicy> {
        match self.early_stopping_window {
            Some(window) => EarlyStoppingPolicy::no_improvement(window, self.scoring.direction()),
            None => Ok(EarlyStoppingPolicy::Dummy),
        }
    }
}
