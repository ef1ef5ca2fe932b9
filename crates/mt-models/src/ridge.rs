//! L2-regularized least squares.

use ndarray::{Array1, ArrayView1, ArrayView2, Axis};
use tracing::debug;

use mt_types::{estimator_error, state_error, Estimator, HyperParams, TunerResult};

use crate::hyper;

/// Minimizes `||y - Xw - b||^2 + alpha * ||w||^2` by gradient descent with a
/// step of `1 / L`, where `L` bounds the Lipschitz constant of the gradient.
///
/// With `fit_intercept` the features and target are centred first and the
/// intercept is recovered from the means, so it is never penalized.
#[derive(Debug, Clone, PartialEq)]
pub struct RidgeRegression {
    alpha: f64,
    max_iter: usize,
    tol: f64,
    fit_intercept: bool,

    coef: Option<Array1<f64>>,
    intercept: f64,
}

impl Default for RidgeRegression {
    fn default() -> Self {
        Self {
            alpha: 1.0,
            max_iter: 1000,
            tol: 1e-6,
            fit_intercept: true,
            coef: None,
            intercept: 0.0,
        }
    }
}

impl RidgeRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_alpha(mut self, alpha: f64) -> Self {
        self.alpha = alpha;
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn coef(&self) -> Option<ArrayView1<'_, f64>> {
        self.coef.as_ref().map(|c| c.view())
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }
}

impl Estimator for RidgeRegression {
    fn set_params(&mut self, params: &HyperParams) -> TunerResult<()> {
        let mut next = self.clone();
        for (name, value) in params {
            match name.as_str() {
                "alpha" => next.alpha = hyper::non_negative(name, value)?,
                "max_iter" => next.max_iter = hyper::count(name, value)?,
                "tol" => next.tol = hyper::positive(name, value)?,
                "fit_intercept" => next.fit_intercept = hyper::flag(name, value)?,
                other => {
                    return Err(estimator_error!(
                        "unknown parameter '{other}' for RidgeRegression"
                    ))
                }
            }
        }
        *self = next;
        Ok(())
    }

    fn params(&self) -> HyperParams {
        let mut params = HyperParams::new();
        params.insert("alpha".into(), self.alpha.into());
        params.insert("max_iter".into(), (self.max_iter as i64).into());
        params.insert("tol".into(), self.tol.into());
        params.insert("fit_intercept".into(), self.fit_intercept.into());
        params
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> TunerResult<()> {
        if x.nrows() != y.len() {
            return Err(estimator_error!(
                "x has {} rows but y has {} values",
                x.nrows(),
                y.len()
            ));
        }
        if x.nrows() == 0 {
            return Err(estimator_error!("cannot fit on an empty dataset"));
        }

        let (x_mean, y_mean) = if self.fit_intercept {
            let x_mean = x
                .mean_axis(Axis(0))
                .ok_or_else(|| estimator_error!("cannot centre an empty matrix"))?;
            (x_mean, y.mean().unwrap_or(0.0))
        } else {
            (Array1::zeros(x.ncols()), 0.0)
        };
        let xc = &x - &x_mean;
        let yc = &y - y_mean;

        let lipschitz = xc.iter().map(|v| v * v).sum::<f64>() + self.alpha;
        let mut w = Array1::<f64>::zeros(x.ncols());

        if lipschitz > 0.0 {
            let step = 1.0 / lipschitz;
            let mut converged = false;
            for _ in 0..self.max_iter {
                let residual = xc.dot(&w) - &yc;
                let grad = xc.t().dot(&residual) + &w * self.alpha;
                let update = grad * step;
                w -= &update;
                if update.iter().all(|u| u.abs() < self.tol) {
                    converged = true;
                    break;
                }
            }
            if !converged {
                debug!(
                    "RidgeRegression did not converge within {} iterations",
                    self.max_iter
                );
            }
        }

        self.intercept = y_mean - x_mean.dot(&w);
        self.coef = Some(w);
        Ok(())
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> TunerResult<Array1<f64>> {
        let coef = self
            .coef
            .as_ref()
            .ok_or_else(|| state_error!("RidgeRegression is not fitted yet"))?;
        if x.ncols() != coef.len() {
            return Err(estimator_error!(
                "model was fitted on {} features but got {}",
                coef.len(),
                x.ncols()
            ));
        }
        Ok(x.dot(coef) + self.intercept)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use mt_types::ParameterValue;
    use ndarray::Array2;

    fn linear() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((30, 2), |(i, j)| match j {
            0 => (i as f64 + 1.0) * 0.1,
            _ => ((i * 7) % 11) as f64 * 0.1,
        });
        let y = x.column(0).mapv(|v| 3.0 * v) + x.column(1).mapv(|v| 2.0 * v) + 1.5;
        (x, y)
    }

    #[test]
    fn recovers_an_exact_linear_relation_without_penalty() {
        let (x, y) = linear();
        let mut model = RidgeRegression::new().with_alpha(0.0).with_max_iter(20_000);
        model.fit(x.view(), y.view()).unwrap();

        let pred = model.predict(x.view()).unwrap();
        for (p, t) in pred.iter().zip(y.iter()) {
            assert!((p - t).abs() < 1e-3, "{p} vs {t}");
        }
    }

    #[test]
    fn penalty_shrinks_coefficients() {
        let (x, y) = linear();
        let mut weak = RidgeRegression::new().with_alpha(0.01).with_max_iter(5000);
        let mut strong = RidgeRegression::new().with_alpha(1000.0).with_max_iter(5000);
        weak.fit(x.view(), y.view()).unwrap();
        strong.fit(x.view(), y.view()).unwrap();

        let norm = |m: &RidgeRegression| m.coef().unwrap().iter().map(|c| c * c).sum::<f64>();
        assert!(norm(&strong) < norm(&weak));
    }

    #[test]
    fn set_params_validates_names_and_values() {
        let mut model = RidgeRegression::new();
        let mut params = HyperParams::new();
        params.insert("alpha".into(), ParameterValue::Float(-1.0));
        assert!(model.set_params(&params).is_err());

        let mut params = HyperParams::new();
        params.insert("solver".into(), "cholesky".into());
        assert!(model.set_params(&params).is_err());

        let mut params = HyperParams::new();
        params.insert("alpha".into(), ParameterValue::Int(3));
        model.set_params(&params).unwrap();
        assert_eq!(model.params()["alpha"], ParameterValue::Float(3.0));
    }

    #[test]
    fn predict_requires_fit() {
        let (x, _) = linear();
        assert!(RidgeRegression::new().predict(x.view()).is_err());
    }
}
