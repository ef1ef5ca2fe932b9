//! The experiment commands: cross-validated search, holdout search and
//! tunability collection over saved results.

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::Context;
use ndarray::{concatenate, Array1, Axis};
use serde::{Deserialize, Serialize};
use tracing::{error, info, warn};

use mt_data::{CsvLoader, Dataset, HoldoutPair};
use mt_models::{
    logistic_regression_grid, predefined_logistic_regression, ridge_grid, Pipeline,
    RidgeRegression, StandardScaler,
};
use mt_search::{encode_target, ConditionalGrid, Preprocessors, RandomSearch, SearchResults};
use mt_tunability::{TunabilityExtractor, TunabilityRecord, TunabilityReport};
use mt_types::{state_error, Estimator, HyperParams, TunerError, TunerResult};

use crate::config::{ExperimentConfig, ModelKind, Scoring};

pub const TUNABILITY_FILE: &str = "tunability.json";

/// What gets written to `<results>/name=<dataset>.json`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ExperimentRecord {
    pub dataset: String,
    pub model: ModelKind,
    pub scoring: Scoring,
    pub best_hyperparameters: HyperParams,
    #[serde(with = "mt_types::nan_serde::score")]
    pub best_score: f64,
    pub results: SearchResults,
}

/// Dataset names per outcome of one command run.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RunSummary {
    pub completed: Vec<String>,
    pub skipped: Vec<String>,
    pub failed: Vec<String>,
}

enum Evaluation<'a> {
    CrossValidation(&'a Dataset),
    Holdout(&'a HoldoutPair),
}

impl Evaluation<'_> {
    fn name(&self) -> &str {
        match self {
            Self::CrossValidation(dataset) => &dataset.name,
            Self::Holdout(pair) => &pair.name,
        }
    }
}

pub fn result_path(results_dir: &Path, dataset: &str) -> PathBuf {
    results_dir.join(format!("name={dataset}.json"))
}

pub fn is_search_completed(results_dir: &Path, dataset: &str) -> bool {
    result_path(results_dir, dataset).exists()
}

/// Cross-validated random search on every `*.csv` in the data directory.
pub fn run_search(config: &ExperimentConfig) -> anyhow::Result<RunSummary> {
    let datasets = CsvLoader::new().load_dir(&config.data_dir)?;
    let evaluations: Vec<Evaluation<'_>> = datasets.iter().map(Evaluation::CrossValidation).collect();
    run_all(config, &evaluations)
}

/// Random search scored on fixed train/test pairs.
pub fn run_holdout(config: &ExperimentConfig) -> anyhow::Result<RunSummary> {
    let pairs = CsvLoader::new().load_holdout_dir(&config.data_dir)?;
    let evaluations: Vec<Evaluation<'_>> = pairs.iter().map(Evaluation::Holdout).collect();
    run_all(config, &evaluations)
}

fn run_all(config: &ExperimentConfig, evaluations: &[Evaluation<'_>]) -> anyhow::Result<RunSummary> {
    let results_dir = config.resolved_results_dir();
    fs::create_dir_all(&results_dir)
        .with_context(|| format!("failed to create {}", results_dir.display()))?;

    let mut grid = build_grid(config)?;
    let mut summary = RunSummary::default();
    info!(
        "Running {} search for {} datasets into {}",
        config.model,
        evaluations.len(),
        results_dir.display()
    );

    for evaluation in evaluations {
        let name = evaluation.name().to_string();
        if is_search_completed(&results_dir, &name) {
            warn!("Dataset name={} is already computed", name);
            summary.skipped.push(name);
            continue;
        }

        info!("Dataset name={}", name);
        grid.reset_seed();
        let outcome = search_dataset(config, grid.clone(), evaluation)
            .map_err(anyhow::Error::from)
            .and_then(|record| save_record(&result_path(&results_dir, &name), &record));
        match outcome {
            Ok(()) => summary.completed.push(name),
            Err(e) => {
                error!("Dataset name={} results in error and skipped: {:#}", name, e);
                summary.failed.push(name);
            }
        }
    }

    info!(
        "Finished: {} completed, {} skipped, {} failed",
        summary.completed.len(),
        summary.skipped.len(),
        summary.failed.len()
    );
    Ok(summary)
}

fn build_grid(config: &ExperimentConfig) -> TunerResult<ConditionalGrid> {
    match config.model {
        ModelKind::Logistic => logistic_regression_grid(config.seed),
        ModelKind::Ridge => ridge_grid(config.seed),
    }
}

fn search_dataset(
    config: &ExperimentConfig,
    grid: ConditionalGrid,
    evaluation: &Evaluation<'_>,
) -> TunerResult<ExperimentRecord> {
    match config.model {
        ModelKind::Logistic => {
            let model = Pipeline::new(StandardScaler::new(), predefined_logistic_regression());
            random_search(model, grid, config, evaluation)
        }
        ModelKind::Ridge => {
            let model = Pipeline::new(StandardScaler::new(), RidgeRegression::new());
            random_search(model, grid, config, evaluation)
        }
    }
}

fn random_search<M: Estimator>(
    model: M,
    grid: ConditionalGrid,
    config: &ExperimentConfig,
    evaluation: &Evaluation<'_>,
) -> TunerResult<ExperimentRecord> {
    let mut search = RandomSearch::new(model, grid).with_early_stopping(config.early_stopping()?);
    if let Some(seed) = config.cv_seed {
        search = search.with_seed(seed);
    }
    let scorer = config.scoring.scorer();

    match evaluation {
        Evaluation::CrossValidation(dataset) => {
            search.search(
                dataset.features.view(),
                dataset.target.view(),
                scorer,
                &config.search_config(),
                Preprocessors::none(),
            )?;
        }
        Evaluation::Holdout(pair) => {
            let (y_train, y_test) = holdout_targets(pair, config.scoring.encode_y())?;
            search.search_holdout(
                pair.train.features.view(),
                y_train.view(),
                pair.test.features.view(),
                y_test.view(),
                scorer,
                config.n_iter,
                Preprocessors::none(),
            )?;
        }
    }

    let direction = config.scoring.direction();
    let best = search
        .history()
        .best(direction)
        .ok_or_else(|| state_error!("no trials recorded for '{}'", evaluation.name()))?;
    info!(
        "Dataset name={}: best score {:.6} after {} trials",
        evaluation.name(),
        best.mean_score,
        search.history().len()
    );

    Ok(ExperimentRecord {
        dataset: evaluation.name().to_string(),
        model: config.model,
        scoring: config.scoring,
        best_hyperparameters: best.parameters.clone(),
        best_score: best.mean_score,
        results: search.results(),
    })
}

/// Targets of a holdout pair, encoded over both halves at once so train and
/// test share the same codes.
fn holdout_targets(pair: &HoldoutPair, encode: bool) -> TunerResult<(Array1<f64>, Array1<f64>)> {
    if !encode {
        return Ok((pair.train.target.clone(), pair.test.target.clone()));
    }
    let joined = concatenate(Axis(0), &[pair.train.target.view(), pair.test.target.view()])
        .map_err(|e| TunerError::Internal(format!("failed to join targets: {e}")))?;
    let encoded = encode_target(joined.view());
    let (train, test) = encoded.view().split_at(Axis(0), pair.train.target.len());
    Ok((train.to_owned(), test.to_owned()))
}

fn save_record(path: &Path, record: &ExperimentRecord) -> anyhow::Result<()> {
    let json = serde_json::to_string_pretty(record)?;
    fs::write(path, json).with_context(|| format!("failed to write {}", path.display()))?;
    info!("Saved results to {}", path.display());
    Ok(())
}

/// Every `name=*.json` record in `results_dir`, sorted by file name.
/// Unreadable files are logged and skipped.
pub fn load_records(results_dir: &Path) -> anyhow::Result<Vec<ExperimentRecord>> {
    let mut paths: Vec<PathBuf> = fs::read_dir(results_dir)
        .with_context(|| format!("failed to read {}", results_dir.display()))?
        .filter_map(|entry| entry.ok().map(|e| e.path()))
        .filter(|p| {
            p.extension().is_some_and(|ext| ext == "json")
                && p.file_name()
                    .and_then(|n| n.to_str())
                    .is_some_and(|n| n.starts_with("name="))
        })
        .collect();
    paths.sort();

    let mut records = Vec::with_capacity(paths.len());
    for path in paths {
        let parsed = fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|raw| {
                serde_json::from_str::<ExperimentRecord>(&raw).map_err(anyhow::Error::from)
            });
        match parsed {
            Ok(record) => records.push(record),
            Err(e) => warn!("Skipping results file {}: {}", path.display(), e),
        }
    }
    Ok(records)
}

/// Extract the default configuration and per-dataset gains from saved
/// results and write them to `<results_dir>/tunability.json`.
pub fn run_tunability(results_dir: &Path, lowest_best: bool) -> anyhow::Result<TunabilityReport> {
    let records: Vec<TunabilityRecord> = load_records(results_dir)?
        .iter()
        .map(|record| TunabilityRecord::from_results(record.dataset.clone(), &record.results))
        .collect();
    if records.is_empty() {
        anyhow::bail!("no search results found in {}", results_dir.display());
    }
    info!("Collecting tunability over {} datasets", records.len());

    let mut extractor = TunabilityExtractor::from_lower_is_better(records, lowest_best)?;
    let report = extractor.report()?;

    let path = results_dir.join(TUNABILITY_FILE);
    fs::write(&path, serde_json::to_string_pretty(&report)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    info!(
        "Mean tunability {:.6}; report written to {}",
        report.mean_gain,
        path.display()
    );
    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::{array, Array2};

    #[test]
    fn result_files_are_named_after_the_dataset() {
        let path = result_path(Path::new("/tmp/results"), "credit-g");
        assert_eq!(path, PathBuf::from("/tmp/results/name=credit-g.json"));
    }

    #[test]
    fn holdout_targets_share_codes() {
        let train = Dataset::new("p", Array2::zeros((2, 1)), array![-1.0, 1.0]).unwrap();
        let test = Dataset::new("p", Array2::zeros((3, 1)), array![1.0, 1.0, 1.0]).unwrap();
        let pair = HoldoutPair {
            name: "p".to_string(),
            train,
            test,
        };

        let (y_train, y_test) = holdout_targets(&pair, true).unwrap();
        assert_eq!(y_train, array![0.0, 1.0]);
        assert_eq!(y_test, array![1.0, 1.0, 1.0]);

        let (y_train, _) = holdout_targets(&pair, false).unwrap();
        assert_eq!(y_train, array![-1.0, 1.0]);
    }
}
