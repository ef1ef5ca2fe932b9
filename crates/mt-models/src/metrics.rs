//! Scoring functions with the `(y_true, y_pred)` signature expected by the
//! search driver.
//!
//! Higher is better for [`accuracy`], [`binary_accuracy`], [`roc_auc`] and
//! [`neg_mean_squared_error`]; lower is better for [`mean_squared_error`].

use ndarray::ArrayView1;

use mt_types::{DataError, TunerResult};

fn check_pair(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> TunerResult<()> {
    if y_true.len() != y_pred.len() {
        return Err(DataError::ShapeMismatch {
            expected: y_true.len(),
            actual: y_pred.len(),
        }
        .into());
    }
    if y_true.is_empty() {
        return Err(DataError::InsufficientData {
            message: "cannot score an empty prediction".to_string(),
        }
        .into());
    }
    Ok(())
}

/// Fraction of predictions exactly equal to the target.
pub fn accuracy(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> TunerResult<f64> {
    check_pair(y_true, y_pred)?;
    let hits = y_true
        .iter()
        .zip(y_pred.iter())
        .filter(|(t, p)| t == p)
        .count();
    Ok(hits as f64 / y_true.len() as f64)
}

/// Accuracy of positive-class scores thresholded at 0.5 against 0/1 targets.
pub fn binary_accuracy(y_true: ArrayView1<'_, f64>, y_score: ArrayView1<'_, f64>) -> TunerResult<f64> {
    let labels = y_score.mapv(|s| if s >= 0.5 { 1.0 } else { 0.0 });
    accuracy(y_true, labels.view())
}

/// Area under the ROC curve for 0/1 targets, computed from average ranks so
/// tied scores count one half.
pub fn roc_auc(y_true: ArrayView1<'_, f64>, y_score: ArrayView1<'_, f64>) -> TunerResult<f64> {
    check_pair(y_true, y_score)?;
    if let Some(bad) = y_true.iter().find(|&&v| v != 0.0 && v != 1.0) {
        return Err(DataError::InvalidFormat {
            message: format!("roc_auc expects 0/1 targets, found {bad}"),
        }
        .into());
    }

    let positives = y_true.iter().filter(|&&v| v == 1.0).count();
    let negatives = y_true.len() - positives;
    if positives == 0 || negatives == 0 {
        return Err(DataError::InsufficientData {
            message: "roc_auc is undefined when only one class is present".to_string(),
        }
        .into());
    }

    let mut order: Vec<usize> = (0..y_score.len()).collect();
    order.sort_by(|&a, &b| y_score[a].total_cmp(&y_score[b]));

    let mut rank_sum = 0.0;
    let mut start = 0;
    while start < order.len() {
        let mut end = start;
        while end + 1 < order.len() && y_score[order[end + 1]] == y_score[order[start]] {
            end += 1;
        }
        // Ranks are 1-based; tied scores share the average rank.
        let avg_rank = (start + end) as f64 / 2.0 + 1.0;
        let tied_positives = order[start..=end]
            .iter()
            .filter(|&&i| y_true[i] == 1.0)
            .count();
        rank_sum += avg_rank * tied_positives as f64;
        start = end + 1;
    }

    let p = positives as f64;
    let n = negatives as f64;
    Ok((rank_sum - p * (p + 1.0) / 2.0) / (p * n))
}

pub fn mean_squared_error(y_true: ArrayView1<'_, f64>, y_pred: ArrayView1<'_, f64>) -> TunerResult<f64> {
    check_pair(y_true, y_pred)?;
    let sum: f64 = y_true
        .iter()
        .zip(y_pred.iter())
        .map(|(t, p)| (t - p).powi(2))
        .sum();
    Ok(sum / y_true.len() as f64)
}

pub fn neg_mean_squared_error(
    y_true: ArrayView1<'_, f64>,
    y_pred: ArrayView1<'_, f64>,
) -> TunerResult<f64> {
    mean_squared_error(y_true, y_pred).map(|mse| -mse)
}
