//! Cross-validated fitting of learner pipelines.
//!
//! [`LearnerCrossfit`] fits one clone of a pipeline per train split of a
//! cross-validator and keeps every fitted model together with the exact split
//! it was trained on. The splits are captured once per fit and replayed by
//! every later call, so random cross-validators score consistently.
//!
//! Feature shuffling hands each split's learner an independently permuted
//! column order. Learners that break ties between similar features by column
//! position then pick each of those features equally often across the
//! ensemble.
//!
//! # Example
//!
//! ```no_run
//! use crossfit_rs::{CrossfitError, KFold, LearnerCrossfit, Pipeline, Sample, StumpLearner};
//! use ndarray::Array2;
//!
//! # fn main() -> Result<(), CrossfitError> {
//! let x = Array2::from_shape_fn((100, 3), |(i, j)| (i * (j + 1)) as f64);
//! let y = x.column(0).to_owned();
//! let sample = Sample::from_arrays(x, y)?;
//!
//! let mut crossfit = LearnerCrossfit::new(Pipeline::new(StumpLearner::default()), KFold::new(5)?)
//!     .shuffle_features(true)
//!     .random_state(42)
//!     .n_jobs(-1);
//!
//! let scores = crossfit.fit_score(&sample, "r2", false)?;
//! assert_eq!(scores.len(), crossfit.n_splits()?);
//! # Ok(())
//! # }
//! ```

mod task;

pub use task::{run_split_task, EvalPart, FitPart, ScorePart, SplitOutcome, SplitTask};

use crate::data::Sample;
use crate::error::{CrossfitError, CrossfitResult};
use crate::fit::Fittable;
use crate::learners::LearnerParams;
use crate::parallel::{ParallelConfig, Parallelizable};
use crate::pipeline::LearnerPipeline;
use crate::scoring::{resolve_scorer, Scorer, Scoring};
use crate::validation::{make_rng, CrossValidator, Split};
use log::{info, warn};
use ndarray::Array1;
use rand::seq::SliceRandom;
use std::sync::Arc;
use std::time::Instant;

/// Parameters for a single `fit` call.
#[derive(Debug, Clone, Default)]
pub struct FitParams {
    /// Always rejected: weights are taken from the [`Sample`] itself.
    pub sample_weight: Option<Array1<f64>>,
    /// Passed on to the learner of every split.
    pub learner_params: LearnerParams,
}

impl FitParams {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_learner_param(mut self, name: impl Into<String>, value: f64) -> Self {
        self.learner_params.insert(name.into(), value);
        self
    }
}

/// Everything a fit produces. Set or cleared as a whole.
#[derive(Debug, Clone)]
struct FitState<P> {
    splits: Arc<[Split]>,
    models: Arc<[P]>,
    sample: Arc<Sample>,
}

/// Fits a learner pipeline to every train split of a cross-validator.
#[derive(Debug, Clone)]
pub struct LearnerCrossfit<P: LearnerPipeline> {
    // Configuration
    pipeline: P,
    cv: Arc<dyn CrossValidator>,
    shuffle_features: bool,
    random_state: Option<u64>,
    parallel: ParallelConfig,

    // Fitted state
    state: Option<FitState<P>>,
}

impl<P: LearnerPipeline> LearnerCrossfit<P> {
    /// Create an unfitted crossfit. Only the configuration of `pipeline` is kept.
    pub fn new<CV: CrossValidator + 'static>(pipeline: P, cv: CV) -> Self {
        Self {
            pipeline: pipeline.clone_unfitted(),
            cv: Arc::new(cv),
            shuffle_features: false,
            random_state: None,
            parallel: ParallelConfig::default(),
            state: None,
        }
    }

    /// Permute the learner's feature order independently for every split.
    pub fn shuffle_features(mut self, shuffle_features: bool) -> Self {
        self.shuffle_features = shuffle_features;
        self
    }

    /// Seed for the feature permutations. Unset draws a fresh seed per fit.
    pub fn random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    pub fn parallel(mut self, parallel: ParallelConfig) -> Self {
        self.parallel = parallel;
        self
    }

    pub fn n_jobs(mut self, n_jobs: isize) -> Self {
        self.parallel.n_jobs = Some(n_jobs);
        self
    }

    /// The unfitted pipeline template.
    pub fn pipeline(&self) -> &P {
        &self.pipeline
    }

    pub fn cv(&self) -> &dyn CrossValidator {
        self.cv.as_ref()
    }

    /// Fit a clone of the pipeline to each train split of the cross-validator.
    ///
    /// Sample weights, if the sample has any, are passed to every learner.
    pub fn fit(&mut self, sample: &Sample) -> CrossfitResult<&mut Self> {
        self.fit_with_params(sample, &FitParams::default())
    }

    pub fn fit_with_params(
        &mut self,
        sample: &Sample,
        params: &FitParams,
    ) -> CrossfitResult<&mut Self> {
        self.reset_fit();
        self.fit_splits(sample, None, false, params)?;
        Ok(self)
    }

    /// Score every fitted model on its test split, or its train split if
    /// `train_scores` is set. Returns one score per split, in split order.
    pub fn score(
        &self,
        scoring: impl Into<Scoring>,
        train_scores: bool,
    ) -> CrossfitResult<Array1<f64>> {
        let state = self.fit_state()?;
        let kind = match state.models.first() {
            Some(model) => model.final_estimator()?.kind(),
            None => self.pipeline.learner_kind(),
        };
        let scorer = resolve_scorer(&scoring.into(), kind)?;
        let executor = self.executor()?;
        let no_params = LearnerParams::new();

        info!(
            "scoring {} models with {} on {} splits",
            state.models.len(),
            scorer.name(),
            if train_scores { "train" } else { "test" }
        );
        let start = Instant::now();

        let work: Vec<(&Split, &P)> = state.splits.iter().zip(state.models.iter()).collect();
        let outcomes = executor.map_ordered(work, |index, (split, model)| {
            let rows = if train_scores { &split.train } else { &split.test };
            let task = SplitTask::Score(ScorePart {
                model,
                eval: state.sample.subsample(rows),
                scorer: &scorer,
            });
            run_split_task(task, &no_params).map_err(|source| CrossfitError::TaskFailed {
                split: index,
                source,
            })
        })?;

        info!("scored {} models in {:.2?}", outcomes.len(), start.elapsed());
        Ok(outcomes.into_iter().filter_map(|o| o.score).collect())
    }

    /// Fit, then score. The models are fitted and scored in one pass.
    pub fn fit_score(
        &mut self,
        sample: &Sample,
        scoring: impl Into<Scoring>,
        train_scores: bool,
    ) -> CrossfitResult<Array1<f64>> {
        self.fit_score_with_params(sample, scoring, train_scores, &FitParams::default())
    }

    pub fn fit_score_with_params(
        &mut self,
        sample: &Sample,
        scoring: impl Into<Scoring>,
        train_scores: bool,
        params: &FitParams,
    ) -> CrossfitResult<Array1<f64>> {
        self.reset_fit();
        let scorer = resolve_scorer(&scoring.into(), self.pipeline.learner_kind())?;
        let scores = self.fit_splits(sample, Some(&scorer), train_scores, params)?;
        Ok(Array1::from(scores))
    }

    /// A copy keeping only the first `n_splits` splits and models.
    pub fn resize(&self, n_splits: usize) -> CrossfitResult<Self> {
        let state = self.fit_state()?;
        let max = state.splits.len();
        if n_splits < 1 || n_splits > max {
            return Err(CrossfitError::OutOfRange { n_splits, max });
        }
        Ok(Self {
            pipeline: self.pipeline.clone(),
            cv: Arc::clone(&self.cv),
            shuffle_features: self.shuffle_features,
            random_state: self.random_state,
            parallel: self.parallel.clone(),
            state: Some(FitState {
                splits: Arc::from(&state.splits[..n_splits]),
                models: Arc::from(&state.models[..n_splits]),
                sample: Arc::clone(&state.sample),
            }),
        })
    }

    /// Number of fitted splits.
    pub fn n_splits(&self) -> CrossfitResult<usize> {
        Ok(self.fit_state()?.splits.len())
    }

    pub fn len(&self) -> CrossfitResult<usize> {
        self.n_splits()
    }

    /// The captured train/test splits, in fit order.
    pub fn splits(&self) -> CrossfitResult<std::slice::Iter<'_, Split>> {
        Ok(self.fit_state()?.splits.iter())
    }

    /// The fitted models; the i-th model was trained on the i-th split.
    pub fn models(&self) -> CrossfitResult<std::slice::Iter<'_, P>> {
        Ok(self.fit_state()?.models.iter())
    }

    /// The sample this crossfit was fitted on.
    pub fn sample(&self) -> CrossfitResult<&Sample> {
        Ok(self.fit_state()?.sample.as_ref())
    }

    fn reset_fit(&mut self) {
        self.state = None;
    }

    fn fit_state(&self) -> CrossfitResult<&FitState<P>> {
        self.state
            .as_ref()
            .ok_or_else(|| CrossfitError::NotFitted(self.fittable_name()))
    }

    /// Capture splits, fit (and optionally score) every split, store the state.
    fn fit_splits(
        &mut self,
        sample: &Sample,
        scorer: Option<&Scorer>,
        train_scores: bool,
        params: &FitParams,
    ) -> CrossfitResult<Vec<f64>> {
        if params.sample_weight.is_some() {
            return Err(CrossfitError::Configuration(
                "do not use sample_weight to pass sample weights; \
                 attach a weight column to the Sample instead"
                    .to_string(),
            ));
        }

        let executor = self.executor()?;
        let splits = self.capture_splits(sample)?;
        let sequences = self.feature_sequences(sample, splits.len())?;

        info!(
            "fitting {} models on {} observations using {} worker(s)",
            splits.len(),
            sample.n_observations(),
            executor.n_workers()
        );
        let start = Instant::now();

        let work: Vec<(&Split, Option<Vec<String>>)> = splits.iter().zip(sequences).collect();
        let outcomes = executor.map_ordered(work, |index, (split, feature_sequence)| {
            let fit = FitPart {
                pipeline: self.pipeline.clone(),
                train: sample.subsample(&split.train),
                feature_sequence,
            };
            let task = match scorer {
                None => SplitTask::Fit(fit),
                Some(scorer) => {
                    let rows = if train_scores { &split.train } else { &split.test };
                    SplitTask::FitAndScore(
                        fit,
                        EvalPart {
                            eval: sample.subsample(rows),
                            scorer,
                        },
                    )
                }
            };
            run_split_task(task, &params.learner_params)
                .map_err(|source| CrossfitError::TaskFailed { split: index, source })
        })?;

        let mut models = Vec::with_capacity(outcomes.len());
        let mut scores = Vec::with_capacity(outcomes.len());
        for outcome in outcomes {
            models.extend(outcome.model);
            scores.extend(outcome.score);
        }

        info!("fitted {} models in {:.2?}", models.len(), start.elapsed());

        self.state = Some(FitState {
            splits: Arc::from(splits),
            models: Arc::from(models),
            sample: Arc::new(sample.clone()),
        });
        Ok(scores)
    }

    fn capture_splits(&self, sample: &Sample) -> CrossfitResult<Vec<Split>> {
        let splits = self.cv.split(sample.features(), sample.target())?;
        if splits.is_empty() {
            return Err(CrossfitError::Configuration(
                "cross-validator produced no splits".to_string(),
            ));
        }
        let n = sample.n_observations();
        for (i, split) in splits.iter().enumerate() {
            if let Some(max) = split.max_index().filter(|&max| max >= n) {
                return Err(CrossfitError::InvalidData(format!(
                    "split {i} references row {max} but the sample has {n} rows"
                )));
            }
            if split.train.is_empty() {
                warn!("split {i} has an empty train set");
            }
        }
        Ok(splits)
    }

    /// One optional column order per split, drawn before any work is dispatched.
    fn feature_sequences(
        &self,
        sample: &Sample,
        n_splits: usize,
    ) -> CrossfitResult<Vec<Option<Vec<String>>>> {
        if !self.shuffle_features {
            return Ok(vec![None; n_splits]);
        }
        let names = self.pipeline.feature_names_out(sample.feature_names())?;
        let mut rng = make_rng(self.random_state);
        Ok((0..n_splits)
            .map(|_| {
                let mut sequence = names.clone();
                sequence.shuffle(&mut rng);
                Some(sequence)
            })
            .collect())
    }
}

impl<P: LearnerPipeline> Fittable for LearnerCrossfit<P> {
    fn is_fitted(&self) -> bool {
        self.state.is_some()
    }

    fn fittable_name(&self) -> &'static str {
        "LearnerCrossfit"
    }
}

impl<P: LearnerPipeline> Parallelizable for LearnerCrossfit<P> {
    fn parallel_config(&self) -> &ParallelConfig {
        &self.parallel
    }
}
