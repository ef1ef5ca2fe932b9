//! # mt-search
//!
//! Random-search machinery for meta-tuner.
//!
//! Provides independent sampling spaces ([`CubeGrid`]), conditional spaces
//! built from them ([`ConditionalGrid`]), early-stopping policies and the
//! [`RandomSearch`] driver that evaluates sampled configurations with k-fold
//! cross-validation or a fixed holdout split.

mod conditional;
mod cube;
mod early_stopping;
mod folds;
mod grid;
mod history;
mod random_search;

pub use conditional::{Condition, ConditionalGrid, PartialAssignment};
pub use cube::{CubeGrid, Dimension, Distribution, Space, ValueSpec};
pub use early_stopping::EarlyStoppingPolicy;
pub use folds::{cv_folds, Fold};
pub use grid::SearchGrid;
pub use history::{SearchHistory, TrialRecord};
pub use random_search::{encode_target, Preprocessors, RandomSearch, SearchConfig, SearchResults};
