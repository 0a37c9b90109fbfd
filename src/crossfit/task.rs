//! Per-split work units.
//!
//! A [`SplitTask`] carries everything one split needs to be fitted, scored, or
//! both. Each task owns its data slices; models and scorers are borrowed from
//! the dispatching call. [`run_split_task`] executes a task without touching
//! any engine state, so tasks can run on any worker in any order.

use crate::data::Sample;
use crate::error::LearnerResult;
use crate::learners::LearnerParams;
use crate::pipeline::LearnerPipeline;
use crate::scoring::Scorer;

/// Fit a fresh pipeline on one train slice.
#[derive(Debug)]
pub struct FitPart<P> {
    pub pipeline: P,
    pub train: Sample,
    /// Column order for the learner; `None` keeps the preprocessing output order.
    pub feature_sequence: Option<Vec<String>>,
}

/// Score an already fitted model.
#[derive(Debug)]
pub struct ScorePart<'a, P> {
    pub model: &'a P,
    pub eval: Sample,
    pub scorer: &'a Scorer,
}

/// The scoring half of a fused fit-and-score task; the model comes from the fit.
#[derive(Debug)]
pub struct EvalPart<'a> {
    pub eval: Sample,
    pub scorer: &'a Scorer,
}

#[derive(Debug)]
pub enum SplitTask<'a, P> {
    Fit(FitPart<P>),
    Score(ScorePart<'a, P>),
    FitAndScore(FitPart<P>, EvalPart<'a>),
}

/// What a task produced: a model if it fitted one, a score if it scored.
#[derive(Debug)]
pub struct SplitOutcome<P> {
    pub model: Option<P>,
    pub score: Option<f64>,
}

pub fn run_split_task<P: LearnerPipeline>(
    task: SplitTask<'_, P>,
    params: &LearnerParams,
) -> LearnerResult<SplitOutcome<P>> {
    match task {
        SplitTask::Fit(fit) => Ok(SplitOutcome {
            model: Some(fit_part(fit, params)?),
            score: None,
        }),
        SplitTask::Score(ScorePart {
            model,
            eval,
            scorer,
        }) => Ok(SplitOutcome {
            model: None,
            score: Some(score_model(model, &eval, scorer)?),
        }),
        SplitTask::FitAndScore(fit, EvalPart { eval, scorer }) => {
            let model = fit_part(fit, params)?;
            let score = score_model(&model, &eval, scorer)?;
            Ok(SplitOutcome {
                model: Some(model),
                score: Some(score),
            })
        }
    }
}

fn fit_part<P: LearnerPipeline>(part: FitPart<P>, params: &LearnerParams) -> LearnerResult<P> {
    let FitPart {
        mut pipeline,
        train,
        feature_sequence,
    } = part;
    pipeline.fit(
        train.features(),
        train.target(),
        feature_sequence.as_deref(),
        train.weight(),
        params,
    )?;
    Ok(pipeline)
}

fn score_model<P: LearnerPipeline>(model: &P, eval: &Sample, scorer: &Scorer) -> LearnerResult<f64> {
    let estimator = model.final_estimator()?;
    match model.preprocessing() {
        Some(preprocessing) => {
            let transformed = preprocessing.transform(eval.features())?;
            scorer.score(estimator, &transformed, eval.target(), eval.weight())
        }
        None => scorer.score(estimator, eval.features(), eval.target(), eval.weight()),
    }
}
