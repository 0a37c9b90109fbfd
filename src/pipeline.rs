//! Learner pipelines: an optional preprocessing stage followed by a learner.
//!
//! [`LearnerPipeline`] is the contract the crossfit engine relies on; [`Pipeline`]
//! is the implementation shipped with this crate.
//!
//! Fitting accepts an optional *feature sequence*: a permutation of the
//! preprocessing output names that decides the column order the learner is
//! trained on. The fitted [`Estimator`] remembers that order and aligns any
//! input by name before predicting.

use crate::data::Features;
use crate::error::{LearnerError, LearnerResult};
use crate::learners::{Learner, LearnerKind, LearnerParams, TrainedLearner};
use crate::preprocessing::{FittedTransformer, Transformer};
use ndarray::Array1;
use std::borrow::Cow;
use std::fmt::Debug;
use std::sync::Arc;

/// A fitted final-stage learner together with the feature names it was trained on.
#[derive(Debug, Clone)]
pub struct Estimator {
    model: Arc<dyn TrainedLearner>,
    feature_names: Vec<String>,
    kind: LearnerKind,
}

impl Estimator {
    /// Predict on preprocessed features, selecting columns by name.
    pub fn predict(&self, features: &Features) -> LearnerResult<Array1<f64>> {
        let aligned = features
            .select_columns(&self.feature_names)
            .map_err(|err| match err {
                LearnerError::UnknownFeature(name) => LearnerError::MissingFeature(name),
                other => other,
            })?;
        Ok(self.model.predict(aligned.values().view()))
    }

    /// Feature names in the column order used for training.
    pub fn feature_names(&self) -> &[String] {
        &self.feature_names
    }

    pub fn kind(&self) -> LearnerKind {
        self.kind
    }

    pub fn model(&self) -> &dyn TrainedLearner {
        self.model.as_ref()
    }
}

pub trait LearnerPipeline: Clone + Debug + Send + Sync + 'static {
    /// Fit the pipeline in place, discarding any previous fit.
    ///
    /// `feature_sequence`, when given, must be a permutation of
    /// [`feature_names_out`](Self::feature_names_out) for the input names.
    fn fit(
        &mut self,
        features: &Features,
        target: &Array1<f64>,
        feature_sequence: Option<&[String]>,
        weight: Option<&Array1<f64>>,
        params: &LearnerParams,
    ) -> LearnerResult<()>;

    fn is_fitted(&self) -> bool;

    /// A copy carrying configuration only.
    fn clone_unfitted(&self) -> Self;

    fn learner_kind(&self) -> LearnerKind;

    fn final_estimator(&self) -> LearnerResult<&Estimator>;

    /// The fitted preprocessing stage, if the pipeline has one and is fitted.
    fn preprocessing(&self) -> Option<&dyn FittedTransformer>;

    /// Names of the features the final estimator sees, for the given input names.
    fn feature_names_out(&self, input: &[String]) -> LearnerResult<Vec<String>>;

    /// Input feature names seen during fit.
    fn feature_names_in(&self) -> LearnerResult<&[String]>;

    fn predict(&self, features: &Features) -> LearnerResult<Array1<f64>> {
        let estimator = self.final_estimator()?;
        match self.preprocessing() {
            Some(pre) => estimator.predict(&pre.transform(features)?),
            None => estimator.predict(features),
        }
    }
}

#[derive(Debug, Clone)]
struct FittedStages {
    preprocessing: Option<Arc<dyn FittedTransformer>>,
    estimator: Estimator,
    feature_names_in: Vec<String>,
}

/// Preprocessing (optional) plus learner.
#[derive(Debug, Clone)]
pub struct Pipeline {
    // Stages
    preprocessing: Option<Box<dyn Transformer>>,
    learner: Box<dyn Learner>,

    // State
    fitted: Option<FittedStages>,
}

impl Pipeline {
    pub fn new<L: Learner + 'static>(learner: L) -> Self {
        Self {
            preprocessing: None,
            learner: Box::new(learner),
            fitted: None,
        }
    }

    pub fn with_preprocessing<T: Transformer + 'static>(mut self, preprocessing: T) -> Self {
        self.preprocessing = Some(Box::new(preprocessing));
        self.fitted = None;
        self
    }

    pub fn learner(&self) -> &dyn Learner {
        self.learner.as_ref()
    }
}

impl LearnerPipeline for Pipeline {
    fn fit(
        &mut self,
        features: &Features,
        target: &Array1<f64>,
        feature_sequence: Option<&[String]>,
        weight: Option<&Array1<f64>>,
        params: &LearnerParams,
    ) -> LearnerResult<()> {
        self.fitted = None;

        if target.len() != features.nrows() {
            return Err(LearnerError::ShapeMismatch {
                expected: format!("{} target values", features.nrows()),
                got: format!("{}", target.len()),
            });
        }

        let (preprocessing, transformed): (Option<Arc<dyn FittedTransformer>>, Cow<Features>) =
            match &self.preprocessing {
                Some(stage) => {
                    let fitted = stage.fit(features)?;
                    let out = fitted.transform(features)?;
                    (Some(Arc::from(fitted)), Cow::Owned(out))
                }
                None => (None, Cow::Borrowed(features)),
            };

        let ordered = match feature_sequence {
            Some(sequence) => Cow::Owned(transformed.reorder(sequence)?),
            None => transformed,
        };

        let model = self.learner.fit(
            ordered.values().view(),
            target.view(),
            weight.map(|w| w.view()),
            params,
        )?;

        self.fitted = Some(FittedStages {
            preprocessing,
            estimator: Estimator {
                model: Arc::from(model),
                feature_names: ordered.names().to_vec(),
                kind: self.learner.kind(),
            },
            feature_names_in: features.names().to_vec(),
        });
        Ok(())
    }

    fn is_fitted(&self) -> bool {
        self.fitted.is_some()
    }

    fn clone_unfitted(&self) -> Self {
        Self {
            preprocessing: self.preprocessing.clone(),
            learner: self.learner.clone(),
            fitted: None,
        }
    }

    fn learner_kind(&self) -> LearnerKind {
        self.learner.kind()
    }

    fn final_estimator(&self) -> LearnerResult<&Estimator> {
        self.fitted
            .as_ref()
            .map(|f| &f.estimator)
            .ok_or(LearnerError::NotFitted("Pipeline"))
    }

    fn preprocessing(&self) -> Option<&dyn FittedTransformer> {
        self.fitted.as_ref()?.preprocessing.as_deref()
    }

    fn feature_names_out(&self, input: &[String]) -> LearnerResult<Vec<String>> {
        match &self.preprocessing {
            Some(stage) => stage.feature_names_out(input),
            None => Ok(input.to_vec()),
        }
    }

    fn feature_names_in(&self) -> LearnerResult<&[String]> {
        self.fitted
            .as_ref()
            .map(|f| f.feature_names_in.as_slice())
            .ok_or(LearnerError::NotFitted("Pipeline"))
    }
}
