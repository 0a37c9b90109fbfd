//! Error types for crossfitting and for the learner pipelines it drives.
//!
//! Two layers are kept apart:
//! - [`LearnerError`] is raised by pipelines, learners and transformers while
//!   fitting, transforming or predicting a single data set.
//! - [`CrossfitError`] is raised by the crossfit engine itself. A learner failure
//!   inside a split task is wrapped in [`CrossfitError::TaskFailed`] together with
//!   the position of the failing split.

use thiserror::Error;

/// Errors raised by learner pipelines and their stages.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum LearnerError {
    #[error("empty data: {0}")]
    EmptyData(String),

    #[error("shape mismatch: expected {expected}, got {got}")]
    ShapeMismatch { expected: String, got: String },

    #[error("unknown feature '{0}'")]
    UnknownFeature(String),

    #[error("missing feature '{0}' required by the fitted model")]
    MissingFeature(String),

    #[error("invalid parameter: {0}")]
    InvalidParameter(String),

    #[error("{0} is not fitted")]
    NotFitted(&'static str),
}

/// Errors raised by [`LearnerCrossfit`](crate::crossfit::LearnerCrossfit).
#[derive(Error, Debug)]
pub enum CrossfitError {
    /// The engine or one of its collaborators was configured inconsistently.
    #[error("configuration error: {0}")]
    Configuration(String),

    /// An operation that needs a fitted crossfit was called before `fit`.
    #[error("{0} is not fitted")]
    NotFitted(&'static str),

    /// `resize` was asked for a number of splits outside `[1, max]`.
    #[error("arg n_splits={n_splits} must be in range 1..={max}")]
    OutOfRange { n_splits: usize, max: usize },

    /// A scoring specification naming more than one metric.
    #[error("multi-metric scoring is not supported, use a single scorer instead; got {0}")]
    UnsupportedScoring(String),

    /// A per-split fit or score task failed; the whole call is aborted.
    #[error("task for split {split} failed: {source}")]
    TaskFailed {
        split: usize,
        #[source]
        source: LearnerError,
    },

    /// Sample data or captured splits are malformed.
    #[error("invalid data: {0}")]
    InvalidData(String),

    #[error(transparent)]
    Learner(#[from] LearnerError),
}

pub type LearnerResult<T> = Result<T, LearnerError>;

pub type CrossfitResult<T> = Result<T, CrossfitError>;
