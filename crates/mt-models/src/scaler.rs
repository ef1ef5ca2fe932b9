//! Column standardization.

use ndarray::{Array1, Array2, ArrayView2, Axis};

use mt_types::{estimator_error, state_error, Transformer, TunerResult};

/// Rescales every column to zero mean and unit variance.
///
/// Statistics ignore missing values (`NaN`); missing entries are replaced by
/// the column mean, i.e. `0.0` after scaling. Constant columns are only
/// centred.
#[derive(Debug, Clone, PartialEq)]
pub struct StandardScaler {
    with_mean: bool,
    with_std: bool,
    mean: Option<Array1<f64>>,
    scale: Option<Array1<f64>>,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self::new()
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self {
            with_mean: true,
            with_std: true,
            mean: None,
            scale: None,
        }
    }

    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.with_mean = with_mean;
        self
    }

    pub fn with_std(mut self, with_std: bool) -> Self {
        self.with_std = with_std;
        self
    }

    pub fn mean(&self) -> Option<&Array1<f64>> {
        self.mean.as_ref()
    }

    pub fn scale(&self) -> Option<&Array1<f64>> {
        self.scale.as_ref()
    }

    fn fit(&mut self, x: ArrayView2<'_, f64>) {
        let mut mean = Array1::zeros(x.ncols());
        let mut scale = Array1::ones(x.ncols());

        for (j, column) in x.axis_iter(Axis(1)).enumerate() {
            let present: Vec<f64> = column.iter().copied().filter(|v| !v.is_nan()).collect();
            if present.is_empty() {
                continue;
            }
            let n = present.len() as f64;
            let m = present.iter().sum::<f64>() / n;
            let var = present.iter().map(|v| (v - m).powi(2)).sum::<f64>() / n;

            mean[j] = m;
            if var > 0.0 {
                scale[j] = var.sqrt();
            }
        }

        self.mean = Some(mean);
        self.scale = Some(scale);
    }
}

impl Transformer for StandardScaler {
    fn fit_transform(&mut self, x: ArrayView2<'_, f64>) -> TunerResult<Array2<f64>> {
        self.fit(x);
        self.transform(x)
    }

    fn transform(&self, x: ArrayView2<'_, f64>) -> TunerResult<Array2<f64>> {
        let (Some(mean), Some(scale)) = (&self.mean, &self.scale) else {
            return Err(state_error!("StandardScaler is not fitted yet"));
        };
        if x.ncols() != mean.len() {
            return Err(estimator_error!(
                "scaler was fitted on {} columns but got {}",
                mean.len(),
                x.ncols()
            ));
        }

        let mut out = x.to_owned();
        for (j, mut column) in out.axis_iter_mut(Axis(1)).enumerate() {
            let shift = if self.with_mean { mean[j] } else { 0.0 };
            let divisor = if self.with_std { scale[j] } else { 1.0 };
            column.mapv_inplace(|v| {
                let v = if v.is_nan() { mean[j] } else { v };
                (v - shift) / divisor
            });
        }
        Ok(out)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    #[test]
    fn standardizes_columns() {
        let x = array![[1.0, 10.0], [2.0, 10.0], [3.0, 10.0]];
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(x.view()).unwrap();

        let col0 = out.column(0);
        assert!(col0.mean().unwrap().abs() < 1e-12);
        let var = col0.mapv(|v| v * v).mean().unwrap();
        assert!((var - 1.0).abs() < 1e-12);

        assert!(out.column(1).iter().all(|&v| v == 0.0));
    }

    #[test]
    fn missing_values_become_the_mean() {
        let x = array![[1.0], [f64::NAN], [3.0]];
        let mut scaler = StandardScaler::new();
        let out = scaler.fit_transform(x.view()).unwrap();
        assert_eq!(scaler.mean().unwrap()[0], 2.0);
        assert_eq!(out[[1, 0]], 0.0);
    }

    #[test]
    fn transform_uses_training_statistics() {
        let train = array![[0.0], [2.0]];
        let test = array![[4.0]];
        let mut scaler = StandardScaler::new();
        scaler.fit_transform(train.view()).unwrap();
        assert_eq!(scaler.transform(test.view()).unwrap()[[0, 0]], 3.0);
    }

    #[test]
    fn unfitted_or_mismatched_input_is_rejected() {
        let scaler = StandardScaler::new();
        assert!(scaler.transform(array![[1.0]].view()).is_err());

        let mut scaler = StandardScaler::new();
        scaler.fit_transform(array![[1.0, 2.0]].view()).unwrap();
        assert!(scaler.transform(array![[1.0]].view()).is_err());
    }
}
