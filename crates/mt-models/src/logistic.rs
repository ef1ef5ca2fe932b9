//! Binary logistic regression with pluggable solvers.
//!
//! The objective is the mean log-loss plus a penalty whose strength is
//! `1 / (C * n_samples)`, i.e. a larger `C` means weaker regularization.
//! The intercept is learned as the weight of a synthetic constant feature of
//! value `intercept_scaling` and is never penalized.

use std::fmt;
use std::str::FromStr;

use ndarray::{s, Array1, Array2, ArrayView1, ArrayView2};
use rand::seq::SliceRandom;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use tracing::debug;

use mt_types::{
    estimator_error, state_error, Estimator, HyperParams, ParameterValue, TunerError,
    TunerResult,
};

use crate::hyper;

/// Optimisation algorithm used by [`LogisticRegression::fit`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Solver {
    /// Full-batch gradient descent.
    Gd,
    /// Stochastic gradient descent with a `1/sqrt(epoch)` step decay.
    Sgd,
    /// Proximal gradient descent; the only solver that handles L1 terms.
    Proximal,
}

impl Solver {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Gd => "gd",
            Self::Sgd => "sgd",
            Self::Proximal => "proximal",
        }
    }

    pub fn supports(&self, penalty: Penalty) -> bool {
        match self {
            Self::Gd | Self::Sgd => matches!(penalty, Penalty::L2 | Penalty::None),
            Self::Proximal => true,
        }
    }
}

impl fmt::Display for Solver {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Solver {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "gd" => Ok(Self::Gd),
            "sgd" => Ok(Self::Sgd),
            "proximal" => Ok(Self::Proximal),
            other => Err(estimator_error!("unknown solver '{other}'")),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Penalty {
    L1,
    L2,
    ElasticNet,
    None,
}

impl Penalty {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::L1 => "l1",
            Self::L2 => "l2",
            Self::ElasticNet => "elasticnet",
            Self::None => "none",
        }
    }

    /// Parse a grid value; `null` and `"none"` both mean no penalty.
    pub fn from_value(value: &ParameterValue) -> TunerResult<Self> {
        match value {
            ParameterValue::Null => Ok(Self::None),
            ParameterValue::Str(s) => s.parse(),
            other => Err(estimator_error!(
                "parameter 'penalty' must be a string or null, got {other}"
            )),
        }
    }

    fn to_value(self) -> ParameterValue {
        match self {
            Self::None => ParameterValue::Null,
            other => ParameterValue::from(other.as_str()),
        }
    }
}

impl fmt::Display for Penalty {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Penalty {
    type Err = TunerError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "l1" => Ok(Self::L1),
            "l2" => Ok(Self::L2),
            "elasticnet" => Ok(Self::ElasticNet),
            "none" => Ok(Self::None),
            other => Err(estimator_error!("unknown penalty '{other}'")),
        }
    }
}

/// Binary classifier over 0/1 targets.
///
/// Hyperparameters are exposed under the names `solver`, `penalty`, `C`,
/// `tol`, `max_iter`, `l1_ratio`, `learning_rate`, `fit_intercept`,
/// `intercept_scaling` and `random_state`.
#[derive(Debug, Clone, PartialEq)]
pub struct LogisticRegression {
    solver: Solver,
    penalty: Penalty,
    c: f64,
    tol: f64,
    max_iter: usize,
    l1_ratio: Option<f64>,
    learning_rate: f64,
    fit_intercept: bool,
    intercept_scaling: f64,
    random_state: Option<u64>,

    coef: Option<Array1<f64>>,
    intercept: f64,
    n_iter: usize,
}

impl Default for LogisticRegression {
    fn default() -> Self {
        Self {
            solver: Solver::Gd,
            penalty: Penalty::L2,
            c: 1.0,
            tol: 1e-4,
            max_iter: 100,
            l1_ratio: None,
            learning_rate: 0.1,
            fit_intercept: true,
            intercept_scaling: 1.0,
            random_state: None,
            coef: None,
            intercept: 0.0,
            n_iter: 0,
        }
    }
}

impl LogisticRegression {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_solver(mut self, solver: Solver) -> Self {
        self.solver = solver;
        self
    }

    pub fn with_penalty(mut self, penalty: Penalty) -> Self {
        self.penalty = penalty;
        self
    }

    pub fn with_c(mut self, c: f64) -> Self {
        self.c = c;
        self
    }

    pub fn with_l1_ratio(mut self, l1_ratio: f64) -> Self {
        self.l1_ratio = Some(l1_ratio);
        self
    }

    pub fn with_max_iter(mut self, max_iter: usize) -> Self {
        self.max_iter = max_iter;
        self
    }

    pub fn with_learning_rate(mut self, learning_rate: f64) -> Self {
        self.learning_rate = learning_rate;
        self
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn solver(&self) -> Solver {
        self.solver
    }

    pub fn penalty(&self) -> Penalty {
        self.penalty
    }

    pub fn coef(&self) -> Option<ArrayView1<'_, f64>> {
        self.coef.as_ref().map(|c| c.view())
    }

    pub fn intercept(&self) -> f64 {
        self.intercept
    }

    /// Iterations (epochs for `sgd`) used by the last fit.
    pub fn n_iter(&self) -> usize {
        self.n_iter
    }

    pub fn is_fitted(&self) -> bool {
        self.coef.is_some()
    }

    fn validate(&self) -> TunerResult<()> {
        if !self.solver.supports(self.penalty) {
            return Err(estimator_error!(
                "solver '{}' does not support penalty '{}'",
                self.solver,
                self.penalty
            ));
        }
        if self.penalty == Penalty::ElasticNet {
            match self.l1_ratio {
                Some(r) if (0.0..=1.0).contains(&r) => {}
                _ => {
                    return Err(estimator_error!(
                        "penalty 'elasticnet' requires l1_ratio in [0, 1], got {:?}",
                        self.l1_ratio
                    ))
                }
            }
        }
        Ok(())
    }

    /// L1 and L2 strengths for a problem with `n` samples.
    fn penalty_strengths(&self, n: usize) -> (f64, f64) {
        let lambda = 1.0 / (self.c * n as f64);
        match self.penalty {
            Penalty::L1 => (lambda, 0.0),
            Penalty::L2 => (0.0, lambda),
            Penalty::ElasticNet => {
                let ratio = self.l1_ratio.unwrap_or(0.5);
                (lambda * ratio, lambda * (1.0 - ratio))
            }
            Penalty::None => (0.0, 0.0),
        }
    }

    /// Features with the synthetic intercept column appended when needed.
    fn design(&self, x: ArrayView2<'_, f64>) -> Array2<f64> {
        if !self.fit_intercept {
            return x.to_owned();
        }
        let (rows, cols) = x.dim();
        let mut design = Array2::from_elem((rows, cols + 1), self.intercept_scaling);
        design.slice_mut(s![.., ..cols]).assign(&x);
        design
    }

    pub fn decision_function(&self, x: ArrayView2<'_, f64>) -> TunerResult<Array1<f64>> {
        let coef = self
            .coef
            .as_ref()
            .ok_or_else(|| state_error!("LogisticRegression is not fitted yet"))?;
        if x.ncols() != coef.len() {
            return Err(estimator_error!(
                "model was fitted on {} features but got {}",
                coef.len(),
                x.ncols()
            ));
        }
        Ok(x.dot(coef) + self.intercept)
    }

    /// Hard 0/1 predictions at the 0.5 probability threshold.
    pub fn predict_labels(&self, x: ArrayView2<'_, f64>) -> TunerResult<Array1<f64>> {
        Ok(self
            .decision_function(x)?
            .mapv(|z| if z >= 0.0 { 1.0 } else { 0.0 }))
    }

    fn fit_gd(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, w: &mut Array1<f64>, l2: f64) -> usize {
        self.fit_proximal(x, y, w, 0.0, l2)
    }

    fn fit_sgd(&self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, w: &mut Array1<f64>, l2: f64) -> usize {
        let penalized = self.penalized(x.ncols());
        let mut rng = match self.random_state {
            Some(seed) => ChaCha8Rng::seed_from_u64(seed),
            None => ChaCha8Rng::from_entropy(),
        };
        let mut order: Vec<usize> = (0..x.nrows()).collect();

        for epoch in 1..=self.max_iter {
            let eta = self.learning_rate / (epoch as f64).sqrt();
            let before = w.clone();
            order.shuffle(&mut rng);

            for &i in &order {
                let row = x.row(i);
                let err = sigmoid(row.dot(&*w)) - y[i];
                w.scaled_add(-eta * err, &row);
                shrink(w, eta * l2, penalized);
            }

            if max_abs((&*w - &before).view()) < self.tol {
                return epoch;
            }
        }
        self.report_no_convergence();
        self.max_iter
    }

    /// Gradient step on the log-loss followed by the proximal operator of the
    /// penalty. With `l1 == 0` this is plain gradient descent with an implicit
    /// L2 step.
    fn fit_proximal(
        &self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        w: &mut Array1<f64>,
        l1: f64,
        l2: f64,
    ) -> usize {
        let penalized = self.penalized(x.ncols());
        let threshold = self.learning_rate * l1;
        for iter in 1..=self.max_iter {
            let grad = log_loss_gradient(x, y, w.view());
            let mut next = &*w - &(grad * self.learning_rate);
            if threshold > 0.0 {
                next.slice_mut(s![..penalized])
                    .mapv_inplace(|v| soft_threshold(v, threshold));
            }
            shrink(&mut next, self.learning_rate * l2, penalized);

            let delta = max_abs((&next - &*w).view());
            *w = next;
            if delta < self.tol {
                return iter;
            }
        }
        self.report_no_convergence();
        self.max_iter
    }

    fn penalized(&self, n_weights: usize) -> usize {
        n_weights - usize::from(self.fit_intercept)
    }

    fn report_no_convergence(&self) {
        debug!(
            "LogisticRegression ({} / {}) did not converge within {} iterations",
            self.solver, self.penalty, self.max_iter
        );
    }
}

impl Estimator for LogisticRegression {
    fn set_params(&mut self, params: &HyperParams) -> TunerResult<()> {
        let mut next = self.clone();
        for (name, value) in params {
            match name.as_str() {
                "solver" => {
                    next.solver = value
                        .as_str()
                        .ok_or_else(|| {
                            estimator_error!("parameter 'solver' must be a string, got {value}")
                        })?
                        .parse()?
                }
                "penalty" => next.penalty = Penalty::from_value(value)?,
                "C" => next.c = hyper::positive(name, value)?,
                "tol" => next.tol = hyper::positive(name, value)?,
                "max_iter" => next.max_iter = hyper::count(name, value)?,
                "l1_ratio" => {
                    next.l1_ratio = if value.is_null() {
                        None
                    } else {
                        Some(hyper::float(name, value)?)
                    }
                }
                "learning_rate" => next.learning_rate = hyper::positive(name, value)?,
                "fit_intercept" => next.fit_intercept = hyper::flag(name, value)?,
                "intercept_scaling" => next.intercept_scaling = hyper::positive(name, value)?,
                "random_state" => next.random_state = hyper::optional_seed(name, value)?,
                other => {
                    return Err(estimator_error!(
                        "unknown parameter '{other}' for LogisticRegression"
                    ))
                }
            }
        }
        next.validate()?;
        *self = next;
        Ok(())
    }

    fn params(&self) -> HyperParams {
        let mut params = HyperParams::new();
        params.insert("solver".into(), self.solver.as_str().into());
        params.insert("penalty".into(), self.penalty.to_value());
        params.insert("C".into(), self.c.into());
        params.insert("tol".into(), self.tol.into());
        params.insert("max_iter".into(), (self.max_iter as i64).into());
        params.insert("l1_ratio".into(), self.l1_ratio.into());
        params.insert("learning_rate".into(), self.learning_rate.into());
        params.insert("fit_intercept".into(), self.fit_intercept.into());
        params.insert("intercept_scaling".into(), self.intercept_scaling.into());
        params.insert(
            "random_state".into(),
            self.random_state.map(|s| s as i64).into(),
        );
        params
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> TunerResult<()> {
        self.validate()?;
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
        if let Some(bad) = y.iter().find(|&&v| v != 0.0 && v != 1.0) {
            return Err(estimator_error!(
                "LogisticRegression expects 0/1 targets, found {bad}"
            ));
        }

        let design = self.design(x);
        let (l1, l2) = self.penalty_strengths(x.nrows());
        let mut w = Array1::zeros(design.ncols());

        self.n_iter = match self.solver {
            Solver::Gd => self.fit_gd(design.view(), y, &mut w, l2),
            Solver::Sgd => self.fit_sgd(design.view(), y, &mut w, l2),
            Solver::Proximal => self.fit_proximal(design.view(), y, &mut w, l1, l2),
        };

        let n_features = x.ncols();
        self.intercept = if self.fit_intercept {
            w[n_features] * self.intercept_scaling
        } else {
            0.0
        };
        self.coef = Some(w.slice(s![..n_features]).to_owned());
        Ok(())
    }

    /// Positive-class probabilities.
    fn predict(&self, x: ArrayView2<'_, f64>) -> TunerResult<Array1<f64>> {
        Ok(self.decision_function(x)?.mapv(sigmoid))
    }
}

fn sigmoid(z: f64) -> f64 {
    if z >= 0.0 {
        1.0 / (1.0 + (-z).exp())
    } else {
        let e = z.exp();
        e / (1.0 + e)
    }
}

/// Gradient of the mean log-loss with respect to `w`.
fn log_loss_gradient(x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>, w: ArrayView1<'_, f64>) -> Array1<f64> {
    let residual = x.dot(&w).mapv(sigmoid) - y;
    x.t().dot(&residual) / x.nrows() as f64
}

/// Proximal step of `strength / 2 * ||w||^2` over the penalized weights.
fn shrink(w: &mut Array1<f64>, strength: f64, penalized: usize) {
    if strength > 0.0 {
        let factor = 1.0 / (1.0 + strength);
        w.slice_mut(s![..penalized]).mapv_inplace(|v| v * factor);
    }
}

fn soft_threshold(v: f64, threshold: f64) -> f64 {
    v.signum() * (v.abs() - threshold).max(0.0)
}

fn max_abs(v: ArrayView1<'_, f64>) -> f64 {
    v.iter().fold(0.0_f64, |acc, x| acc.max(x.abs()))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metrics::accuracy;

    /// 40 rows: a signal feature separating the classes and a feature with
    /// the same distribution in both classes.
    fn separable() -> (Array2<f64>, Array1<f64>) {
        let x = Array2::from_shape_fn((40, 2), |(i, j)| match j {
            0 => (i as f64 - 19.5) / 20.0,
            _ => (i % 4) as f64 * 0.1,
        });
        let y = Array1::from_shape_fn(40, |i| if i >= 20 { 1.0 } else { 0.0 });
        (x, y)
    }

    fn set(model: &mut LogisticRegression, pairs: &[(&str, ParameterValue)]) -> TunerResult<()> {
        let params: HyperParams = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.clone()))
            .collect();
        model.set_params(&params)
    }

    #[test]
    fn every_solver_learns_a_separable_problem() {
        let (x, y) = separable();
        for solver in [Solver::Gd, Solver::Sgd, Solver::Proximal] {
            let mut model = LogisticRegression::new()
                .with_solver(solver)
                .with_max_iter(500)
                .with_random_state(0);
            model.fit(x.view(), y.view()).unwrap();

            let labels = model.predict_labels(x.view()).unwrap();
            let acc = accuracy(y.view(), labels.view()).unwrap();
            assert!(acc >= 0.95, "{solver}: accuracy {acc}");
            assert!(model.coef().unwrap()[0] > 0.0);

            let proba = model.predict(x.view()).unwrap();
            assert!(proba.iter().all(|p| (0.0..=1.0).contains(p)));
        }
    }

    #[test]
    fn strong_l1_zeroes_every_coefficient() {
        let (x, y) = separable();
        let mut model = LogisticRegression::new()
            .with_solver(Solver::Proximal)
            .with_penalty(Penalty::L1)
            .with_c(0.01);
        model.fit(x.view(), y.view()).unwrap();
        assert!(model.coef().unwrap().iter().all(|&c| c == 0.0));
    }

    #[test]
    fn sgd_is_reproducible_with_random_state() {
        let (x, y) = separable();
        let base = LogisticRegression::new()
            .with_solver(Solver::Sgd)
            .with_random_state(17);
        let mut a = base.clone();
        let mut b = base;
        a.fit(x.view(), y.view()).unwrap();
        b.fit(x.view(), y.view()).unwrap();
        assert_eq!(a.coef(), b.coef());
    }

    #[test]
    fn set_params_checks_solver_penalty_pairs() {
        let mut model = LogisticRegression::new();
        let err = set(&mut model, &[("penalty", "l1".into())]).unwrap_err();
        assert!(matches!(err, TunerError::Estimator(_)));
        assert_eq!(model.penalty(), Penalty::L2);

        set(
            &mut model,
            &[("solver", "proximal".into()), ("penalty", "l1".into())],
        )
        .unwrap();
        assert_eq!(model.solver(), Solver::Proximal);
        assert_eq!(model.penalty(), Penalty::L1);

        set(&mut model, &[("solver", "gd".into()), ("penalty", ParameterValue::Null)]).unwrap();
        assert_eq!(model.penalty(), Penalty::None);
    }

    #[test]
    fn elasticnet_needs_a_ratio() {
        let mut model = LogisticRegression::new();
        let missing = set(
            &mut model,
            &[("solver", "proximal".into()), ("penalty", "elasticnet".into())],
        );
        assert!(missing.is_err());

        set(
            &mut model,
            &[
                ("solver", "proximal".into()),
                ("penalty", "elasticnet".into()),
                ("l1_ratio", 0.3_f64.into()),
            ],
        )
        .unwrap();
        assert_eq!(model.penalty(), Penalty::ElasticNet);
    }

    #[test]
    fn unknown_parameters_are_rejected() {
        let mut model = LogisticRegression::new();
        let err = set(&mut model, &[("dual", true.into())]).unwrap_err();
        assert!(err.to_string().contains("dual"));
    }

    #[test]
    fn params_round_trip_through_set_params() {
        let model = LogisticRegression::new().with_c(3.0).with_random_state(5);
        let mut other = LogisticRegression::new();
        other.set_params(&model.params()).unwrap();
        assert_eq!(other.params(), model.params());
    }

    #[test]
    fn predict_before_fit_is_a_state_error() {
        let (x, _) = separable();
        let model = LogisticRegression::new();
        assert!(matches!(model.predict(x.view()), Err(TunerError::State(_))));
    }

    #[test]
    fn rejects_non_binary_targets() {
        let (x, _) = separable();
        let y = Array1::from_elem(40, 2.0);
        let mut model = LogisticRegression::new();
        assert!(model.fit(x.view(), y.view()).is_err());
    }
}
