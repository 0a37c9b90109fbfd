//! Evaluation metrics used by the built-in scorers.
//!
//! Every metric takes optional sample weights; `None` weighs all observations
//! equally. Inputs with no rows, or whose weights sum to zero, score `NaN`;
//! [`Scorer`](crate::scoring::Scorer) rejects such slices before any metric runs.

use ndarray::Array1;

/// Weighted average of per-observation values.
fn weighted_average<I>(values: I, weight: Option<&Array1<f64>>) -> f64
where
    I: Iterator<Item = f64>,
{
    match weight {
        None => {
            let (sum, n) = values.fold((0.0, 0usize), |(s, n), v| (s + v, n + 1));
            if n == 0 {
                f64::NAN
            } else {
                sum / n as f64
            }
        }
        Some(w) => {
            let total = w.sum();
            if total <= 0.0 {
                return f64::NAN;
            }
            values.zip(w.iter()).map(|(v, wi)| v * wi).sum::<f64>() / total
        }
    }
}

/// Compute the mean absolute error.
pub fn mean_absolute_error(
    predicted: &Array1<f64>,
    actual: &Array1<f64>,
    weight: Option<&Array1<f64>>,
) -> f64 {
    weighted_average(
        predicted.iter().zip(actual.iter()).map(|(p, a)| (p - a).abs()),
        weight,
    )
}

/// Compute the mean squared error.
pub fn mean_squared_error(
    predicted: &Array1<f64>,
    actual: &Array1<f64>,
    weight: Option<&Array1<f64>>,
) -> f64 {
    weighted_average(
        predicted.iter().zip(actual.iter()).map(|(p, a)| (p - a).powi(2)),
        weight,
    )
}

/// Compute the root mean squared error.
pub fn root_mean_squared_error(
    predicted: &Array1<f64>,
    actual: &Array1<f64>,
    weight: Option<&Array1<f64>>,
) -> f64 {
    mean_squared_error(predicted, actual, weight).sqrt()
}

/// Coefficient of determination.
///
/// # Arguments
/// * `predicted` - Predicted values.
/// * `actual` - Observed values.
/// * `weight` - Optional sample weights.
///
/// # Returns
/// `1 - SS_res / SS_tot`. When the observed values are constant the score is
/// `1.0` for a perfect prediction and `0.0` otherwise. Fewer than two
/// observations give `NaN`.
pub fn r2_score(
    predicted: &Array1<f64>,
    actual: &Array1<f64>,
    weight: Option<&Array1<f64>>,
) -> f64 {
    if actual.len() < 2 {
        return f64::NAN;
    }
    let mean = weighted_average(actual.iter().copied(), weight);
    let ss_res = mean_squared_error(predicted, actual, weight);
    let ss_tot = weighted_average(actual.iter().map(|a| (a - mean).powi(2)), weight);
    if ss_tot <= f64::EPSILON {
        return if ss_res <= f64::EPSILON { 1.0 } else { 0.0 };
    }
    1.0 - ss_res / ss_tot
}

/// Fraction of (weighted) observations whose predicted label equals the actual one.
pub fn accuracy(predicted: &Array1<f64>, actual: &Array1<f64>, weight: Option<&Array1<f64>>) -> f64 {
    weighted_average(
        predicted
            .iter()
            .zip(actual.iter())
            .map(|(p, a)| if p == a { 1.0 } else { 0.0 }),
        weight,
    )
}
