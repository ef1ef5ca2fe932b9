//! Typed reads of hyperparameter values shared by the estimators.

use mt_types::{estimator_error, ParameterValue, TunerResult};

pub(crate) fn float(name: &str, value: &ParameterValue) -> TunerResult<f64> {
    match value.as_f64() {
        Some(v) if v.is_finite() => Ok(v),
        _ => Err(estimator_error!(
            "parameter '{name}' must be a finite number, got {value}"
        )),
    }
}

pub(crate) fn positive(name: &str, value: &ParameterValue) -> TunerResult<f64> {
    let v = float(name, value)?;
    if v <= 0.0 {
        return Err(estimator_error!("parameter '{name}' must be positive, got {v}"));
    }
    Ok(v)
}

pub(crate) fn non_negative(name: &str, value: &ParameterValue) -> TunerResult<f64> {
    let v = float(name, value)?;
    if v < 0.0 {
        return Err(estimator_error!(
            "parameter '{name}' must be non-negative, got {v}"
        ));
    }
    Ok(v)
}

/// Iteration counts; accepts integral floats such as `500.0`.
pub(crate) fn count(name: &str, value: &ParameterValue) -> TunerResult<usize> {
    let v = match value {
        ParameterValue::Int(v) => *v,
        ParameterValue::Float(v) if v.fract() == 0.0 => *v as i64,
        _ => {
            return Err(estimator_error!(
                "parameter '{name}' must be an integer, got {value}"
            ))
        }
    };
    if v < 1 {
        return Err(estimator_error!("parameter '{name}' must be at least 1, got {v}"));
    }
    Ok(v as usize)
}

pub(crate) fn flag(name: &str, value: &ParameterValue) -> TunerResult<bool> {
    value
        .as_bool()
        .ok_or_else(|| estimator_error!("parameter '{name}' must be a boolean, got {value}"))
}

pub(crate) fn optional_seed(name: &str, value: &ParameterValue) -> TunerResult<Option<u64>> {
    match value {
        ParameterValue::Null => Ok(None),
        ParameterValue::Int(v) if *v >= 0 => Ok(Some(*v as u64)),
        _ => Err(estimator_error!(
            "parameter '{name}' must be a non-negative integer or null, got {value}"
        )),
    }
}
