//! # mt-models
//!
//! Estimators, preprocessing steps and scoring functions that plug into the
//! [`mt_search::RandomSearch`] driver, together with the predefined search
//! grids used by the experiment binary.

pub mod grids;
mod hyper;
pub mod logistic;
pub mod metrics;
pub mod pipeline;
pub mod ridge;
pub mod scaler;

pub use grids::{logistic_regression_grid, predefined_logistic_regression, ridge_grid};
pub use logistic::{LogisticRegression, Penalty, Solver};
pub use metrics::{accuracy, binary_accuracy, mean_squared_error, neg_mean_squared_error, roc_auc};
pub use pipeline::Pipeline;
pub use ridge::RidgeRegression;
pub use scaler::StandardScaler;
