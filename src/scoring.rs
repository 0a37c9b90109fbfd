//! Scoring specifications and the scorers they resolve to.
//!
//! A [`Scoring`] is what callers pass to
//! [`LearnerCrossfit::score`](crate::crossfit::LearnerCrossfit::score): a metric
//! name, a metric function, or nothing (use the learner kind's default). It is
//! resolved once per call into a [`Scorer`] that every split task shares.
//!
//! All built-in scorers follow the "greater is better" convention, so error
//! metrics are negated (`neg_mean_squared_error` and friends).

use crate::data::Features;
use crate::error::{CrossfitError, CrossfitResult, LearnerError, LearnerResult};
use crate::evaluation::{
    accuracy, mean_absolute_error, mean_squared_error, r2_score, root_mean_squared_error,
};
use crate::learners::LearnerKind;
use crate::pipeline::Estimator;
use ndarray::Array1;
use std::fmt;

/// A metric over `(predicted, actual, weight)`.
pub type MetricFn = fn(&Array1<f64>, &Array1<f64>, Option<&Array1<f64>>) -> f64;

/// How to score fitted models.
#[derive(Debug, Clone, Default)]
pub enum Scoring {
    /// `r2` for regressors, `accuracy` for classifiers.
    #[default]
    Default,
    /// One of the built-in scorer names.
    Named(String),
    /// A custom metric; higher must mean better.
    Metric(MetricFn),
    /// Several metrics at once. Never accepted by the crossfit engine.
    Multi(Vec<String>),
}

impl From<&str> for Scoring {
    fn from(name: &str) -> Self {
        Scoring::Named(name.to_string())
    }
}

impl From<String> for Scoring {
    fn from(name: String) -> Self {
        Scoring::Named(name)
    }
}

impl From<MetricFn> for Scoring {
    fn from(metric: MetricFn) -> Self {
        Scoring::Metric(metric)
    }
}

impl From<Vec<String>> for Scoring {
    fn from(names: Vec<String>) -> Self {
        Scoring::Multi(names)
    }
}

impl From<Vec<&str>> for Scoring {
    fn from(names: Vec<&str>) -> Self {
        Scoring::Multi(names.into_iter().map(str::to_string).collect())
    }
}

impl<T: Into<Scoring>> From<Option<T>> for Scoring {
    fn from(scoring: Option<T>) -> Self {
        scoring.map_or(Scoring::Default, Into::into)
    }
}

impl fmt::Display for Scoring {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Scoring::Default => write!(f, "default"),
            Scoring::Named(name) => write!(f, "{name}"),
            Scoring::Metric(_) => write!(f, "<custom metric>"),
            Scoring::Multi(names) => write!(f, "[{}]", names.join(", ")),
        }
    }
}

/// A resolved scorer: predicts with an estimator and applies a metric.
#[derive(Debug, Clone)]
pub struct Scorer {
    name: String,
    metric: MetricFn,
    sign: f64,
}

impl Scorer {
    fn new(name: &str, metric: MetricFn, sign: f64) -> Self {
        Self {
            name: name.to_string(),
            metric,
            sign,
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Score `estimator` on already preprocessed `features`.
    ///
    /// Fails with [`LearnerError::EmptyData`] on a slice with no rows and with
    /// [`LearnerError::InvalidParameter`] when its weights sum to zero.
    pub fn score(
        &self,
        estimator: &Estimator,
        features: &Features,
        target: &Array1<f64>,
        weight: Option<&Array1<f64>>,
    ) -> LearnerResult<f64> {
        if target.is_empty() {
            return Err(LearnerError::EmptyData(format!(
                "no observations to score with {}",
                self.name
            )));
        }
        if let Some(w) = weight {
            if w.sum() <= 0.0 {
                return Err(LearnerError::InvalidParameter(format!(
                    "sample weights of the scored observations sum to {}",
                    w.sum()
                )));
            }
        }
        let predicted = estimator.predict(features)?;
        Ok(self.sign * (self.metric)(&predicted, target, weight))
    }
}

fn named_scorer(name: &str) -> Option<Scorer> {
    let scorer = match name {
        "r2" => Scorer::new(name, r2_score, 1.0),
        "accuracy" => Scorer::new(name, accuracy, 1.0),
        "neg_mean_squared_error" => Scorer::new(name, mean_squared_error, -1.0),
        "neg_mean_absolute_error" => Scorer::new(name, mean_absolute_error, -1.0),
        "neg_root_mean_squared_error" => Scorer::new(name, root_mean_squared_error, -1.0),
        _ => return None,
    };
    Some(scorer)
}

/// Resolve a scoring specification for a learner of the given kind.
pub fn resolve_scorer(scoring: &Scoring, kind: LearnerKind) -> CrossfitResult<Scorer> {
    match scoring {
        Scoring::Default => {
            let name = match kind {
                LearnerKind::Regressor => "r2",
                LearnerKind::Classifier => "accuracy",
            };
            named_scorer(name).ok_or_else(|| {
                CrossfitError::Configuration(format!("no default scorer named '{name}'"))
            })
        }
        Scoring::Named(name) => named_scorer(name).ok_or_else(|| {
            CrossfitError::Configuration(format!("unknown scoring '{name}'"))
        }),
        Scoring::Metric(metric) => Ok(Scorer::new("custom", *metric, 1.0)),
        Scoring::Multi(_) => Err(CrossfitError::UnsupportedScoring(scoring.to_string())),
    }
}
