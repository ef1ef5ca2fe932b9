//! A preprocessing step and a model fitted together.

use ndarray::{Array1, ArrayView1, ArrayView2};

use mt_types::{Estimator, HyperParams, Transformer, TunerResult};

/// Runs `transformer` in front of `model`.
///
/// The transformer is refitted on the training rows each time the pipeline
/// is fitted and only replayed at prediction time. Hyperparameters are
/// forwarded to the model untouched.
#[derive(Debug, Clone, PartialEq)]
pub struct Pipeline<T, M> {
    transformer: T,
    model: M,
}

impl<T, M> Pipeline<T, M>
where
    T: Transformer + Clone,
    M: Estimator,
{
    pub fn new(transformer: T, model: M) -> Self {
        Self { transformer, model }
    }

    pub fn transformer(&self) -> &T {
        &self.transformer
    }

    pub fn model(&self) -> &M {
        &self.model
    }

    pub fn into_parts(self) -> (T, M) {
        (self.transformer, self.model)
    }
}

impl<T, M> Estimator for Pipeline<T, M>
where
    T: Transformer + Clone,
    M: Estimator,
{
    fn set_params(&mut self, params: &HyperParams) -> TunerResult<()> {
        self.model.set_params(params)
    }

    fn params(&self) -> HyperParams {
        self.model.params()
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>, y: ArrayView1<'_, f64>) -> TunerResult<()> {
        let x = self.transformer.fit_transform(x)?;
        self.model.fit(x.view(), y)
    }

    fn predict(&self, x: ArrayView2<'_, f64>) -> TunerResult<Array1<f64>> {
        let x = self.transformer.transform(x)?;
        self.model.predict(x.view())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::logistic::LogisticRegression;
    use crate::metrics::roc_auc;
    use crate::scaler::StandardScaler;
    use mt_types::ParameterValue;
    use ndarray::Array2;

    #[test]
    fn scales_before_fitting() {
        // Badly scaled feature: plain gradient descent would barely move.
        let x = Array2::from_shape_fn((40, 1), |(i, _)| (i as f64 - 19.5) * 1000.0);
        let y = Array1::from_shape_fn(40, |i| if i >= 20 { 1.0 } else { 0.0 });

        let mut pipeline = Pipeline::new(StandardScaler::new(), LogisticRegression::new());
        pipeline.fit(x.view(), y.view()).unwrap();

        assert!(pipeline.transformer().mean().is_some());
        let proba = pipeline.predict(x.view()).unwrap();
        assert_eq!(roc_auc(y.view(), proba.view()).unwrap(), 1.0);
    }

    #[test]
    fn params_are_forwarded_to_the_model() {
        let mut pipeline = Pipeline::new(StandardScaler::new(), LogisticRegression::new());
        let mut params = HyperParams::new();
        params.insert("C".into(), ParameterValue::Float(0.5));
        pipeline.set_params(&params).unwrap();

        assert_eq!(pipeline.params()["C"], ParameterValue::Float(0.5));
        assert_eq!(pipeline.model().params()["C"], ParameterValue::Float(0.5));
    }
}
