//! Labeled data sets for crossfitting.
//!
//! [`Features`] is a 2-D feature table with unique column names. Name-based
//! column access is what lets models trained on a permuted column order still
//! be applied to data in the original order. [`Sample`] bundles features with a
//! target vector and an optional per-row weight vector, all aligned by row.

use crate::error::{CrossfitError, CrossfitResult, LearnerError, LearnerResult};
use ndarray::{Array1, Array2, Axis};
use std::collections::HashSet;

/// A feature table: a row-major `f64` matrix plus one unique name per column.
#[derive(Debug, Clone, PartialEq)]
pub struct Features {
    values: Array2<f64>,
    names: Vec<String>,
}

impl Features {
    /// Create a feature table, checking that there is one unique name per column.
    pub fn new(values: Array2<f64>, names: Vec<String>) -> LearnerResult<Self> {
        if names.len() != values.ncols() {
            return Err(LearnerError::ShapeMismatch {
                expected: format!("{} column names", values.ncols()),
                got: format!("{} column names", names.len()),
            });
        }
        let mut seen = HashSet::with_capacity(names.len());
        for name in &names {
            if !seen.insert(name.as_str()) {
                return Err(LearnerError::InvalidParameter(format!(
                    "duplicate feature name '{name}'"
                )));
            }
        }
        Ok(Self { values, names })
    }

    /// Create a feature table with columns named `x0`, `x1`, ...
    pub fn with_default_names(values: Array2<f64>) -> Self {
        let names = (0..values.ncols()).map(|j| format!("x{j}")).collect();
        Self { values, names }
    }

    pub fn values(&self) -> &Array2<f64> {
        &self.values
    }

    pub fn names(&self) -> &[String] {
        &self.names
    }

    pub fn nrows(&self) -> usize {
        self.values.nrows()
    }

    pub fn ncols(&self) -> usize {
        self.values.ncols()
    }

    /// Position of the column with the given name.
    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.names.iter().position(|n| n == name)
    }

    /// Copy the given rows, in the given order.
    pub fn select_rows(&self, rows: &[usize]) -> Self {
        Self {
            values: self.values.select(Axis(0), rows),
            names: self.names.clone(),
        }
    }

    /// Copy the named columns, in the given order.
    ///
    /// Every requested name must exist; columns not named are dropped.
    pub fn select_columns(&self, names: &[String]) -> LearnerResult<Self> {
        let indices = names
            .iter()
            .map(|name| {
                self.column_index(name)
                    .ok_or_else(|| LearnerError::UnknownFeature(name.clone()))
            })
            .collect::<LearnerResult<Vec<usize>>>()?;
        Ok(Self {
            values: self.values.select(Axis(1), &indices),
            names: names.to_vec(),
        })
    }

    /// Reorder the columns to `order`, which must be a permutation of the names.
    pub fn reorder(&self, order: &[String]) -> LearnerResult<Self> {
        if order.len() != self.ncols() {
            return Err(LearnerError::ShapeMismatch {
                expected: format!("a sequence of {} feature names", self.ncols()),
                got: format!("{} feature names", order.len()),
            });
        }
        let reordered = self.select_columns(order)?;
        // select_columns accepts repeats; a permutation must not have any.
        let unique: HashSet<&str> = order.iter().map(String::as_str).collect();
        if unique.len() != order.len() {
            return Err(LearnerError::InvalidParameter(
                "feature sequence contains duplicate names".to_string(),
            ));
        }
        Ok(reordered)
    }
}

/// A labeled data set: features, target and optional sample weights.
#[derive(Debug, Clone)]
pub struct Sample {
    features: Features,
    target: Array1<f64>,
    weight: Option<Array1<f64>>,
}

impl Sample {
    /// Create a sample from a feature table and an aligned target vector.
    pub fn new(features: Features, target: Array1<f64>) -> CrossfitResult<Self> {
        if features.nrows() == 0 {
            return Err(CrossfitError::InvalidData(
                "sample must have at least one observation".to_string(),
            ));
        }
        if features.ncols() == 0 {
            return Err(CrossfitError::InvalidData(
                "sample must have at least one feature".to_string(),
            ));
        }
        if target.len() != features.nrows() {
            return Err(CrossfitError::InvalidData(format!(
                "target has {} rows but features have {}",
                target.len(),
                features.nrows()
            )));
        }
        Ok(Self {
            features,
            target,
            weight: None,
        })
    }

    /// Convenience constructor from raw arrays with default column names.
    pub fn from_arrays(x: Array2<f64>, y: Array1<f64>) -> CrossfitResult<Self> {
        Self::new(Features::with_default_names(x), y)
    }

    /// Attach per-row sample weights; they must be finite and non-negative.
    pub fn with_weight(mut self, weight: Array1<f64>) -> CrossfitResult<Self> {
        if weight.len() != self.n_observations() {
            return Err(CrossfitError::InvalidData(format!(
                "weight has {} rows but sample has {}",
                weight.len(),
                self.n_observations()
            )));
        }
        if weight.iter().any(|w| !w.is_finite() || *w < 0.0) {
            return Err(CrossfitError::InvalidData(
                "sample weights must be finite and non-negative".to_string(),
            ));
        }
        self.weight = Some(weight);
        Ok(self)
    }

    pub fn features(&self) -> &Features {
        &self.features
    }

    pub fn feature_names(&self) -> &[String] {
        self.features.names()
    }

    pub fn target(&self) -> &Array1<f64> {
        &self.target
    }

    pub fn weight(&self) -> Option<&Array1<f64>> {
        self.weight.as_ref()
    }

    pub fn n_observations(&self) -> usize {
        self.target.len()
    }

    /// Copy the given rows of features, target and weight.
    pub fn subsample(&self, rows: &[usize]) -> Self {
        Self {
            features: self.features.select_rows(rows),
            target: self.target.select(Axis(0), rows),
            weight: self.weight.as_ref().map(|w| w.select(Axis(0), rows)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::array;

    fn names(list: &[&str]) -> Vec<String> {
        list.iter().map(|s| s.to_string()).collect()
    }

    #[test]
    fn test_features_rejects_duplicate_names() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        let err = Features::new(x, names(&["a", "a"])).unwrap_err();
        assert!(matches!(err, LearnerError::InvalidParameter(_)));
    }

    #[test]
    fn test_features_rejects_name_count_mismatch() {
        let x = array![[1.0, 2.0], [3.0, 4.0]];
        assert!(Features::new(x, names(&["a"])).is_err());
    }

    #[test]
    fn test_reorder_moves_columns_by_name() {
        let x = array![[1.0, 2.0, 3.0], [4.0, 5.0, 6.0]];
        let f = Features::new(x, names(&["a", "b", "c"])).unwrap();
        let r = f.reorder(&names(&["c", "a", "b"])).unwrap();
        assert_eq!(r.names(), &names(&["c", "a", "b"])[..]);
        assert_eq!(r.values(), &array![[3.0, 1.0, 2.0], [6.0, 4.0, 5.0]]);
    }

    #[test]
    fn test_reorder_requires_permutation() {
        let x = array![[1.0, 2.0]];
        let f = Features::new(x, names(&["a", "b"])).unwrap();
        assert!(f.reorder(&names(&["a", "a"])).is_err());
        assert!(f.reorder(&names(&["a"])).is_err());
        assert!(matches!(
            f.reorder(&names(&["a", "z"])),
            Err(LearnerError::UnknownFeature(_))
        ));
    }

    #[test]
    fn test_sample_rejects_misaligned_target() {
        let x = array![[1.0], [2.0], [3.0]];
        let err = Sample::from_arrays(x, array![1.0, 2.0]).unwrap_err();
        assert!(matches!(err, CrossfitError::InvalidData(_)));
    }

    #[test]
    fn test_sample_rejects_negative_weight() {
        let x = array![[1.0], [2.0]];
        let sample = Sample::from_arrays(x, array![1.0, 2.0]).unwrap();
        assert!(sample.with_weight(array![1.0, -1.0]).is_err());
    }

    #[test]
    fn test_subsample_keeps_rows_aligned() {
        let x = array![[1.0], [2.0], [3.0], [4.0]];
        let sample = Sample::from_arrays(x, array![10.0, 20.0, 30.0, 40.0])
            .unwrap()
            .with_weight(array![0.1, 0.2, 0.3, 0.4])
            .unwrap();
        let sub = sample.subsample(&[3, 1]);
        assert_eq!(sub.features().values(), &array![[4.0], [2.0]]);
        assert_eq!(sub.target(), &array![40.0, 20.0]);
        assert_eq!(sub.weight().unwrap(), &array![0.4, 0.2]);
    }
}
