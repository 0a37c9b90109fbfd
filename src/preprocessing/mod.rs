//! Preprocessing stages that run ahead of a pipeline's learner.
//!
//! - [`Transformer`]: unfitted, holds configuration only. Knows which feature
//!   names it will output for a given input, without seeing any data.
//! - [`FittedTransformer`]: learned parameters, transforms new data.
//!
//! Both work on named [`Features`] so the learner downstream sees a stable set
//! of column names.

use crate::data::Features;
use crate::error::{LearnerError, LearnerResult};
use ndarray::{Array1, Axis};
use serde::{Deserialize, Serialize};
use std::fmt::Debug;

pub trait Transformer: Debug + Send + Sync {
    /// Learn parameters from `data`.
    fn fit(&self, data: &Features) -> LearnerResult<Box<dyn FittedTransformer>>;

    /// Names of the columns `transform` will produce for the given input names.
    fn feature_names_out(&self, input: &[String]) -> LearnerResult<Vec<String>>;

    fn box_clone(&self) -> Box<dyn Transformer>;
}

impl Clone for Box<dyn Transformer> {
    fn clone(&self) -> Self {
        self.box_clone()
    }
}

pub trait FittedTransformer: Debug + Send + Sync {
    fn transform(&self, data: &Features) -> LearnerResult<Features>;

    /// Input column names seen during fit.
    fn feature_names_in(&self) -> &[String];

    fn feature_names_out(&self) -> &[String];
}

// ============================================================================
// StandardScaler
// ============================================================================

/// Removes the mean and scales each column to unit variance.
///
/// Columns with zero variance are only centred.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StandardScaler {
    pub with_mean: bool,
    pub with_std: bool,
}

impl Default for StandardScaler {
    fn default() -> Self {
        Self {
            with_mean: true,
            with_std: true,
        }
    }
}

impl StandardScaler {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_mean(mut self, with_mean: bool) -> Self {
        self.with_mean = with_mean;
        self
    }

    pub fn with_std(mut self, with_std: bool) -> Self {
        self.with_std = with_std;
        self
    }
}

impl Transformer for StandardScaler {
    fn fit(&self, data: &Features) -> LearnerResult<Box<dyn FittedTransformer>> {
        if data.nrows() == 0 {
            return Err(LearnerError::EmptyData(
                "cannot fit StandardScaler on empty data".to_string(),
            ));
        }
        let values = data.values();
        let mean = if self.with_mean {
            values
                .mean_axis(Axis(0))
                .ok_or_else(|| LearnerError::EmptyData("no rows".to_string()))?
        } else {
            Array1::zeros(data.ncols())
        };
        let scale = if self.with_std {
            // population std (ddof = 0)
            values
                .std_axis(Axis(0), 0.0)
                .mapv(|s| if s > f64::EPSILON { s } else { 1.0 })
        } else {
            Array1::ones(data.ncols())
        };
        Ok(Box::new(FittedStandardScaler {
            mean,
            scale,
            names: data.names().to_vec(),
        }))
    }

    fn feature_names_out(&self, input: &[String]) -> LearnerResult<Vec<String>> {
        Ok(input.to_vec())
    }

    fn box_clone(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
pub struct FittedStandardScaler {
    mean: Array1<f64>,
    scale: Array1<f64>,
    names: Vec<String>,
}

impl FittedStandardScaler {
    pub fn mean(&self) -> &Array1<f64> {
        &self.mean
    }

    pub fn scale(&self) -> &Array1<f64> {
        &self.scale
    }
}

impl FittedTransformer for FittedStandardScaler {
    fn transform(&self, data: &Features) -> LearnerResult<Features> {
        // align by name so a caller's column order does not matter
        let aligned = data.select_columns(&self.names)?;
        let scaled = (aligned.values() - &self.mean) / &self.scale;
        Features::new(scaled, self.names.clone())
    }

    fn feature_names_in(&self) -> &[String] {
        &self.names
    }

    fn feature_names_out(&self) -> &[String] {
        &self.names
    }
}

// ============================================================================
// ColumnSelector
// ============================================================================

/// Keeps the named columns, in the given order, and drops everything else.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ColumnSelector {
    columns: Vec<String>,
}

impl ColumnSelector {
    pub fn new<S: Into<String>>(columns: impl IntoIterator<Item = S>) -> Self {
        Self {
            columns: columns.into_iter().map(Into::into).collect(),
        }
    }
}

impl Transformer for ColumnSelector {
    fn fit(&self, data: &Features) -> LearnerResult<Box<dyn FittedTransformer>> {
        let names_out = self.feature_names_out(data.names())?;
        Ok(Box::new(FittedColumnSelector {
            names_in: data.names().to_vec(),
            names_out,
        }))
    }

    fn feature_names_out(&self, input: &[String]) -> LearnerResult<Vec<String>> {
        if self.columns.is_empty() {
            return Err(LearnerError::InvalidParameter(
                "ColumnSelector needs at least one column".to_string(),
            ));
        }
        if let Some(missing) = self.columns.iter().find(|c| !input.contains(c)) {
            return Err(LearnerError::UnknownFeature(missing.clone()));
        }
        Ok(self.columns.clone())
    }

    fn box_clone(&self) -> Box<dyn Transformer> {
        Box::new(self.clone())
    }
}

#[derive(Debug, Clone)]
pub struct FittedColumnSelector {
    names_in: Vec<String>,
    names_out: Vec<String>,
}

impl FittedTransformer for FittedColumnSelector {
    fn transform(&self, data: &Features) -> LearnerResult<Features> {
        data.select_columns(&self.names_out)
    }

    fn feature_names_in(&self) -> &[String] {
        &self.names_in
    }

    fn feature_names_out(&self) -> &[String] {
        &self.names_out
    }
}
