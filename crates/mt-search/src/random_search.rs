//! The random-search driver.

use chrono::{DateTime, Utc};
use ndarray::{Array1, Array2, ArrayView1, ArrayView2, Axis};
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::time::Instant;
use tracing::{debug, info};
use uuid::Uuid;

use mt_types::{
    config_error, state_error, DataError, Estimator, HyperParams, ObjectiveDirection, Transformer,
    TunerResult,
};

use crate::early_stopping::EarlyStoppingPolicy;
use crate::folds::{cv_folds, Fold};
use crate::grid::SearchGrid;
use crate::history::SearchHistory;

/// Settings of one cross-validated `search` call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchConfig {
    /// Number of configurations to evaluate.
    pub n_iter: usize,
    /// Number of cross-validation folds.
    pub cv: usize,
    /// Ordinal-encode the target before searching.
    pub encode_y: bool,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            n_iter: 100,
            cv: 5,
            encode_y: false,
        }
    }
}

impl SearchConfig {
    pub fn with_n_iter(mut self, n: usize) -> Self {
        self.n_iter = n;
        self
    }

    pub fn with_cv(mut self, cv: usize) -> Self {
        self.cv = cv;
        self
    }

    pub fn with_encode_y(mut self, encode_y: bool) -> Self {
        self.encode_y = encode_y;
        self
    }
}

/// Optional feature and target preprocessing, refitted on every training split.
#[derive(Default)]
pub struct Preprocessors<'a> {
    pub x: Option<&'a mut dyn Transformer>,
    pub y: Option<&'a mut dyn Transformer>,
}

impl<'a> Preprocessors<'a> {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn with_x(mut self, transformer: &'a mut dyn Transformer) -> Self {
        self.x = Some(transformer);
        self
    }

    pub fn with_y(mut self, transformer: &'a mut dyn Transformer) -> Self {
        self.y = Some(transformer);
        self
    }
}

/// Serializable summary of a search driver's state.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchResults {
    pub id: Uuid,
    pub grid: String,
    pub created_at: DateTime<Utc>,
    pub early_stopping: EarlyStoppingPolicy,
    pub history: SearchHistory,
}

impl SearchResults {
    pub fn best(&self, direction: ObjectiveDirection) -> Option<&HyperParams> {
        self.history.best(direction).map(|r| &r.parameters)
    }
}

/// Random search over a grid with cross-validated or holdout evaluation.
///
/// The driver keeps a prototype model and never mutates it: each fold fits a
/// fresh copy configured with the drawn hyperparameters. History accumulates
/// across calls, so running `search` twice appends to the same record.
#[derive(Debug, Clone)]
pub struct RandomSearch<M, G> {
    id: Uuid,
    model: M,
    grid: G,
    early_stopping: EarlyStoppingPolicy,
    history: SearchHistory,
    rng: ChaCha8Rng,
    created_at: DateTime<Utc>,
}

impl<M: Estimator, G: SearchGrid> RandomSearch<M, G> {
    pub fn new(model: M, grid: G) -> Self {
        Self {
            id: Uuid::new_v4(),
            model,
            grid,
            early_stopping: EarlyStoppingPolicy::Dummy,
            history: SearchHistory::new(),
            rng: ChaCha8Rng::from_entropy(),
            created_at: Utc::now(),
        }
    }

    pub fn with_early_stopping(mut self, policy: EarlyStoppingPolicy) -> Self {
        self.early_stopping = policy;
        self
    }

    /// Seed the generator used for fold assignment.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.rng = ChaCha8Rng::seed_from_u64(seed);
        self
    }

    pub fn id(&self) -> Uuid {
        self.id
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn grid(&self) -> &G {
        &self.grid
    }

    pub fn grid_mut(&mut self) -> &mut G {
        &mut self.grid
    }

    pub fn history(&self) -> &SearchHistory {
        &self.history
    }

    pub fn early_stopping(&self) -> EarlyStoppingPolicy {
        self.early_stopping
    }

    /// An independent copy of the prototype configured with `params`.
    pub fn override_model_params(&self, params: &HyperParams) -> TunerResult<M> {
        let mut model = self.model.clone();
        model.set_params(params)?;
        Ok(model)
    }

    pub fn cv_indices(&mut self, size: usize, cv: usize) -> TunerResult<Vec<Fold>> {
        cv_folds(size, cv, &mut self.rng)
    }

    /// Evaluate `config.n_iter` sampled configurations with k-fold
    /// cross-validation. Returns the number of trials run, which is smaller
    /// than `n_iter` when the early-stopping policy fires.
    pub fn search<F>(
        &mut self,
        x: ArrayView2<'_, f64>,
        y: ArrayView1<'_, f64>,
        scoring: F,
        config: &SearchConfig,
        mut preprocessors: Preprocessors<'_>,
    ) -> TunerResult<usize>
    where
        F: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> TunerResult<f64>,
    {
        check_rows(x.nrows(), y.len())?;
        let y = if config.encode_y {
            encode_target(y)
        } else {
            y.to_owned()
        };

        info!(
            "Starting random search {} on grid '{}': {} iterations, {} folds, {} rows",
            self.id,
            self.grid.name(),
            config.n_iter,
            config.cv,
            x.nrows()
        );

        let mut completed = 0;
        for iteration in 0..config.n_iter {
            let params = self.grid.pick()?;
            let folds = self.cv_indices(x.nrows(), config.cv)?;
            let started = Instant::now();

            let mut fold_scores = Vec::with_capacity(folds.len());
            for fold in &folds {
                let x_train = x.select(Axis(0), &fold.train);
                let x_test = x.select(Axis(0), &fold.test);
                let y_train = y.select(Axis(0), &fold.train);
                let y_test = y.select(Axis(0), &fold.test);

                let score = self.evaluate_split(
                    &params,
                    x_train.view(),
                    y_train.view(),
                    x_test.view(),
                    y_test.view(),
                    &scoring,
                    &mut preprocessors,
                )?;
                fold_scores.push(score);
            }

            completed += 1;
            if self.finish_trial(iteration, params, fold_scores, started) {
                break;
            }
        }

        info!(
            "Random search {} finished {} trials ({} recorded in total)",
            self.id,
            completed,
            self.history.len()
        );
        Ok(completed)
    }

    /// Same draw-fit-score cycle as [`search`](Self::search) against one fixed
    /// train/test split.
    #[allow(clippy::too_many_arguments)]
    pub fn search_holdout<F>(
        &mut self,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, f64>,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, f64>,
        scoring: F,
        n_iter: usize,
        mut preprocessors: Preprocessors<'_>,
    ) -> TunerResult<usize>
    where
        F: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> TunerResult<f64>,
    {
        check_rows(x_train.nrows(), y_train.len())?;
        check_rows(x_test.nrows(), y_test.len())?;
        if x_train.ncols() != x_test.ncols() {
            return Err(config_error!(
                "train has {} features but test has {}",
                x_train.ncols(),
                x_test.ncols()
            ));
        }

        info!(
            "Starting holdout search {} on grid '{}': {} iterations, {} train rows, {} test rows",
            self.id,
            self.grid.name(),
            n_iter,
            x_train.nrows(),
            x_test.nrows()
        );

        let mut completed = 0;
        for iteration in 0..n_iter {
            let params = self.grid.pick()?;
            let started = Instant::now();
            let score = self.evaluate_split(
                &params,
                x_train,
                y_train,
                x_test,
                y_test,
                &scoring,
                &mut preprocessors,
            )?;

            completed += 1;
            if self.finish_trial(iteration, params, vec![score], started) {
                break;
            }
        }

        Ok(completed)
    }

    /// Hyperparameters of the best recorded trial; first occurrence wins ties.
    pub fn best_hyperparameters(&self, direction: ObjectiveDirection) -> TunerResult<&HyperParams> {
        self.history
            .best(direction)
            .map(|record| &record.parameters)
            .ok_or_else(|| state_error!("no trials recorded yet for search {}", self.id))
    }

    /// Lower-is-better flavoured shorthand for [`best_hyperparameters`](Self::best_hyperparameters).
    pub fn get_best_hpo(&self, min_best: bool) -> TunerResult<&HyperParams> {
        self.best_hyperparameters(ObjectiveDirection::from_lower_is_better(min_best))
    }

    pub fn results(&self) -> SearchResults {
        SearchResults {
            id: self.id,
            grid: self.grid.name().to_string(),
            created_at: self.created_at,
            early_stopping: self.early_stopping,
            history: self.history.clone(),
        }
    }

    /// Record a trial and report whether the loop should stop.
    fn finish_trial(
        &mut self,
        iteration: usize,
        params: HyperParams,
        fold_scores: Vec<f64>,
        started: Instant,
    ) -> bool {
        let duration_ms = started.elapsed().as_millis() as u64;
        let record = self.history.record(params, fold_scores, duration_ms);
        debug!(
            "Trial {} (iteration {}): mean score {:.6} over {} split(s) in {} ms",
            record.trial_number,
            iteration,
            record.mean_score,
            record.fold_scores.len(),
            duration_ms
        );

        if self.early_stopping.should_stop(&self.history) {
            info!(
                "Early stopping search {} after iteration {} ({:?})",
                self.id, iteration, self.early_stopping
            );
            return true;
        }
        false
    }

    #[allow(clippy::too_many_arguments)]
    fn evaluate_split<F>(
        &self,
        params: &HyperParams,
        x_train: ArrayView2<'_, f64>,
        y_train: ArrayView1<'_, f64>,
        x_test: ArrayView2<'_, f64>,
        y_test: ArrayView1<'_, f64>,
        scoring: &F,
        preprocessors: &mut Preprocessors<'_>,
    ) -> TunerResult<f64>
    where
        F: Fn(ArrayView1<'_, f64>, ArrayView1<'_, f64>) -> TunerResult<f64>,
    {
        let (x_train, x_test) = prepare_x(x_train, x_test, preprocessors.x.as_deref_mut())?;
        let (y_train, y_test) = prepare_y(y_train, y_test, preprocessors.y.as_deref_mut())?;

        let mut model = self.override_model_params(params)?;
        model.fit(x_train.view(), y_train.view())?;
        let y_pred = model.predict(x_test.view())?;

        scoring(y_test.view(), y_pred.view())
    }
}

fn check_rows(x_rows: usize, y_rows: usize) -> TunerResult<()> {
    if x_rows != y_rows {
        return Err(DataError::ShapeMismatch {
            expected: x_rows,
            actual: y_rows,
        }
        .into());
    }
    Ok(())
}

fn prepare_x(
    train: ArrayView2<'_, f64>,
    test: ArrayView2<'_, f64>,
    transformer: Option<&mut (dyn Transformer + '_)>,
) -> TunerResult<(Array2<f64>, Array2<f64>)> {
    match transformer {
        Some(t) => {
            let train = t.fit_transform(train)?;
            let test = t.transform(test)?;
            Ok((train, test))
        }
        None => Ok((train.to_owned(), test.to_owned())),
    }
}

fn prepare_y(
    train: ArrayView1<'_, f64>,
    test: ArrayView1<'_, f64>,
    transformer: Option<&mut (dyn Transformer + '_)>,
) -> TunerResult<(Array1<f64>, Array1<f64>)> {
    let Some(t) = transformer else {
        return Ok((train.to_owned(), test.to_owned()));
    };
    let train = t.fit_transform(train.insert_axis(Axis(1)))?;
    let test = t.transform(test.insert_axis(Axis(1)))?;
    if train.ncols() != 1 || test.ncols() != 1 {
        return Err(config_error!(
            "target preprocessing must produce a single column, got {}",
            train.ncols()
        ));
    }
    Ok((train.column(0).to_owned(), test.column(0).to_owned()))
}

/// Replace target values by their rank among the distinct values (0, 1, ...).
/// For a binary target this is the usual 0/1 indicator of the larger label.
pub fn encode_target(y: ArrayView1<'_, f64>) -> Array1<f64> {
    let mut levels: Vec<f64> = y.iter().copied().collect();
    levels.sort_by(|a, b| a.total_cmp(b));
    levels.dedup_by(|a, b| a.total_cmp(b).is_eq());

    y.mapv(|v| {
        levels
            .binary_search_by(|level| level.total_cmp(&v))
            .map_or(f64::NAN, |idx| idx as f64)
    })
}
