//! Baseline learners used as the final stage of a [`Pipeline`](crate::pipeline::Pipeline).
//!
//! A [`Learner`] holds hyperparameters only; fitting it yields a boxed
//! [`TrainedLearner`] that can predict. Learners are object safe and
//! box-clonable so a pipeline template can be cloned once per split.

use crate::error::{LearnerError, LearnerResult};
use ndarray::{Array1, ArrayView1, ArrayView2};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Debug;

/// Extra, learner-specific fit parameters keyed by name.
pub type LearnerParams = BTreeMap<String, f64>;

/// Whether a learner predicts continuous values or class labels.
///
/// The kind selects the default scorer when no scoring is given.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum LearnerKind {
    Regressor,
    Classifier,
}

pub trait Learner: Debug + Send + Sync {
    fn fit(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        weight: Option<ArrayView1<f64>>,
        params: &LearnerParams,
    ) -> LearnerResult<Box<dyn TrainedLearner>>;

    fn kind(&self) -> LearnerKind;

    fn box_clone(&self) -> Box<dyn Learner>;
}

impl Clone for Box<dyn Learner> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

pub trait TrainedLearner: Debug + Send + Sync {
    fn predict(&self, x: ArrayView2<f64>) -> Array1<f64>;

    /// Relative importance of each of the `n_features` training columns.
    fn feature_importances(&self, n_features: usize) -> Array1<f64> {
        Array1::zeros(n_features)
    }
}

/// Reject any fit parameter not in `allowed`.
fn check_params(learner: &str, params: &LearnerParams, allowed: &[&str]) -> LearnerResult<()> {
    match params.keys().find(|k| !allowed.contains(&k.as_str())) {
        Some(key) => Err(LearnerError::InvalidParameter(format!(
            "{learner} does not accept fit parameter '{key}'"
        ))),
        None => Ok(()),
    }
}

fn check_fit_input(
    x: &ArrayView2<f64>,
    y: &ArrayView1<f64>,
    weight: Option<&ArrayView1<f64>>,
) -> LearnerResult<()> {
    if x.nrows() == 0 {
        return Err(LearnerError::EmptyData("cannot fit to an empty dataset".to_string()));
    }
    if y.len() != x.nrows() {
        return Err(LearnerError::ShapeMismatch {
            expected: format!("{} target values", x.nrows()),
            got: format!("{}", y.len()),
        });
    }
    if let Some(w) = weight {
        if w.len() != x.nrows() {
            return Err(LearnerError::ShapeMismatch {
                expected: format!("{} sample weights", x.nrows()),
                got: format!("{}", w.len()),
            });
        }
    }
    Ok(())
}

fn weighted_mean(y: &ArrayView1<f64>, weight: Option<&ArrayView1<f64>>) -> LearnerResult<f64> {
    match weight {
        None => y
            .mean()
            .ok_or_else(|| LearnerError::EmptyData("no target values".to_string())),
        Some(w) => {
            let total = w.sum();
            if total <= 0.0 {
                return Err(LearnerError::InvalidParameter(
                    "sample weights sum to zero".to_string(),
                ));
            }
            Ok(y.iter().zip(w.iter()).map(|(yi, wi)| yi * wi).sum::<f64>() / total)
        }
    }
}

// ============================================================================
// Mean learner
// ============================================================================

/// Predicts the (weighted) mean of the training target. A dummy regressor.
#[derive(Debug, Clone, Default)]
pub struct MeanLearner;

impl Learner for MeanLearner {
    fn fit(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        weight: Option<ArrayView1<f64>>,
        params: &LearnerParams,
    ) -> LearnerResult<Box<dyn TrainedLearner>> {
        check_params("MeanLearner", params, &[])?;
        check_fit_input(&x, &y, weight.as_ref())?;
        Ok(Box::new(TrainedConstant {
            value: weighted_mean(&y, weight.as_ref())?,
        }))
    }

    fn kind(&self) -> LearnerKind {
        LearnerKind::Regressor
    }

    fn box_clone(&self) -> Box<dyn Learner> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
pub struct TrainedConstant {
    value: f64,
}

impl TrainedConstant {
    pub fn value(&self) -> f64 {
        self.value
    }
}

impl TrainedLearner for TrainedConstant {
    fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        Array1::from_elem(x.nrows(), self.value)
    }
}

// ============================================================================
// Majority class learner
// ============================================================================

/// Predicts the class label with the largest (weighted) count.
///
/// Ties go to the smallest label.
#[derive(Debug, Clone, Default)]
pub struct MajorityClassLearner;

impl Learner for MajorityClassLearner {
    fn fit(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        weight: Option<ArrayView1<f64>>,
        params: &LearnerParams,
    ) -> LearnerResult<Box<dyn TrainedLearner>> {
        check_params("MajorityClassLearner", params, &[])?;
        check_fit_input(&x, &y, weight.as_ref())?;

        let mut counts: Vec<(f64, f64)> = Vec::new();
        for (i, &label) in y.iter().enumerate() {
            if !label.is_finite() {
                return Err(LearnerError::InvalidParameter(format!(
                    "class label at row {i} is not finite"
                )));
            }
            let w = weight.as_ref().map_or(1.0, |w| w[i]);
            match counts.iter_mut().find(|(l, _)| *l == label) {
                Some((_, c)) => *c += w,
                None => counts.push((label, w)),
            }
        }
        counts.sort_by(|a, b| a.0.total_cmp(&b.0));

        let mut best = counts[0];
        for &entry in &counts[1..] {
            if entry.1 > best.1 {
                best = entry;
            }
        }
        Ok(Box::new(TrainedConstant { value: best.0 }))
    }

    fn kind(&self) -> LearnerKind {
        LearnerKind::Classifier
    }

    fn box_clone(&self) -> Box<dyn Learner> {
        Box::new(self.clone())
    }
}

// ============================================================================
// Regression stump
// ============================================================================

/// A depth-one regression tree minimising weighted squared error.
///
/// When two features give the same error the one in the leftmost column wins,
/// so the fitted stump depends on column order. Accepts the fit parameter
/// `min_samples_leaf` (default 1).
#[derive(Debug, Clone)]
pub struct StumpLearner {
    pub min_samples_leaf: usize,
}

impl Default for StumpLearner {
    fn default() -> Self {
        Self { min_samples_leaf: 1 }
    }
}

impl Learner for StumpLearner {
    fn fit(
        &self,
        x: ArrayView2<f64>,
        y: ArrayView1<f64>,
        weight: Option<ArrayView1<f64>>,
        params: &LearnerParams,
    ) -> LearnerResult<Box<dyn TrainedLearner>> {
        check_params("StumpLearner", params, &["min_samples_leaf"])?;
        check_fit_input(&x, &y, weight.as_ref())?;

        let min_leaf = match params.get("min_samples_leaf") {
            Some(&v) if v >= 1.0 && v.fract() == 0.0 => v as usize,
            Some(&v) => {
                return Err(LearnerError::InvalidParameter(format!(
                    "min_samples_leaf must be a positive integer, got {v}"
                )))
            }
            None => self.min_samples_leaf.max(1),
        };

        let fallback = weighted_mean(&y, weight.as_ref())?;
        let best = find_best_split(&x, &y, weight.as_ref(), min_leaf);

        Ok(Box::new(match best {
            Some(split) => TrainedStumpLearner {
                feature_index: split.feature,
                threshold: split.threshold,
                left_value: split.left_value,
                right_value: split.right_value,
            },
            None => TrainedStumpLearner {
                feature_index: 0,
                threshold: f64::INFINITY,
                left_value: fallback,
                right_value: fallback,
            },
        }))
    }

    fn kind(&self) -> LearnerKind {
        LearnerKind::Regressor
    }

    fn box_clone(&self) -> Box<dyn Learner> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
pub struct TrainedStumpLearner {
    feature_index: usize,
    threshold: f64,
    left_value: f64,
    right_value: f64,
}

impl TrainedStumpLearner {
    pub fn feature_index(&self) -> usize {
        self.feature_index
    }

    pub fn threshold(&self) -> f64 {
        self.threshold
    }
}

impl TrainedLearner for TrainedStumpLearner {
    fn predict(&self, x: ArrayView2<f64>) -> Array1<f64> {
        if x.ncols() <= self.feature_index {
            return Array1::from_elem(x.nrows(), self.left_value);
        }
        x.column(self.feature_index).mapv(|val| {
            if val < self.threshold {
                self.left_value
            } else {
                self.right_value
            }
        })
    }

    fn feature_importances(&self, n_features: usize) -> Array1<f64> {
        let mut importances = Array1::zeros(n_features);
        if self.threshold.is_finite() && self.feature_index < n_features {
            importances[self.feature_index] = 1.0;
        }
        importances
    }
}

struct BestSplit {
    feature: usize,
    threshold: f64,
    left_value: f64,
    right_value: f64,
}

/// Sweep every feature in sorted order, tracking weighted prefix sums.
fn find_best_split(
    x: &ArrayView2<f64>,
    y: &ArrayView1<f64>,
    weight: Option<&ArrayView1<f64>>,
    min_leaf: usize,
) -> Option<BestSplit> {
    let n = x.nrows();
    let w_at = |i: usize| weight.map_or(1.0, |w| w[i]);

    let (total_w, total_wy, total_wyy) = (0..n).fold((0.0, 0.0, 0.0), |(a, b, c), i| {
        let w = w_at(i);
        (a + w, b + w * y[i], c + w * y[i] * y[i])
    });

    let mut best: Option<BestSplit> = None;
    let mut best_sse = f64::INFINITY;

    for feature in 0..x.ncols() {
        let column = x.column(feature);
        let mut order: Vec<usize> = (0..n).collect();
        order.sort_by(|&a, &b| column[a].total_cmp(&column[b]));

        let (mut lw, mut lwy, mut lwyy) = (0.0, 0.0, 0.0);
        for pos in 0..n - 1 {
            let i = order[pos];
            let w = w_at(i);
            lw += w;
            lwy += w * y[i];
            lwyy += w * y[i] * y[i];

            let (here, next) = (column[i], column[order[pos + 1]]);
            let n_left = pos + 1;
            if here == next || n_left < min_leaf || n - n_left < min_leaf {
                continue;
            }
            let rw = total_w - lw;
            if lw <= 0.0 || rw <= 0.0 {
                continue;
            }
            let rwy = total_wy - lwy;
            let sse = (lwyy - lwy * lwy / lw) + (total_wyy - lwyy - rwy * rwy / rw);
            if sse < best_sse {
                best_sse = sse;
                best = Some(BestSplit {
                    feature,
                    threshold: next,
                    left_value: lwy / lw,
                    right_value: rwy / rw,
                });
            }
        }
    }
    best
}
