//! # mt-cli
//!
//! Experiment driver behind the `meta-tuner` binary: runs random searches
//! over a directory of datasets, saves one JSON record per dataset and
//! collects tunability over the saved records.

pub mod config;
pub mod experiment;

pub use config::{ExperimentConfig, ModelKind, Scoring, RESULTS_DIR_ENV};
pub use experiment::{
    load_records, result_path, run_holdout, run_search, run_tunability, ExperimentRecord,
    RunSummary,
};
