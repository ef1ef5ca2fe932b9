//! Contracts between the search driver and the models it tunes.

use ndarray::{Array1, Array2, ArrayView1, ArrayView2};

use crate::errors::TunerResult;
use crate::params::HyperParams;

/// A model the search driver can re-parameterize, fit and query.
///
/// Implementors are cloned once per trial fold; `set_params` is only ever
/// called on such a copy, never on the prototype held by the driver.
pub trait Estimator: Clone {
    /// Override the hyperparameters named in `params`, leaving others as-is.
    fn set_params(&mut self, params: &HyperParams) -> TunerResult<()>;

    /// Current hyperparameter configuration.
    fn params(&self) -> HyperParams;

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> TunerResult<()>;

    fn predict(&self, x: ArrayView2<'_, f64>) -> TunerResult<Array1<f64>>;
}

/// A preprocessing step fitted on training rows and replayed on test rows.
pub trait Transformer {
    /// Fit from scratch on `x` and return the transformed data.
    fn fit_transform(&mut self, x: ArrayView2<'_, f64>) -> TunerResult<Array2<f64>>;

    fn transform(&self, x: ArrayView2<'_, f64>) -> TunerResult<Array2<f64>>;
}
