//! Tests for LearnerCrossfit: fitting, scoring, resizing and error states.

use approx::assert_relative_eq;
use crossfit_rs::crossfit::{FitParams, LearnerCrossfit};
use crossfit_rs::data::{Features, Sample};
use crossfit_rs::error::{CrossfitError, LearnerError};
use crossfit_rs::fit::Fittable;
use crossfit_rs::learners::{MajorityClassLearner, MeanLearner, StumpLearner};
use crossfit_rs::parallel::{Backend, ParallelConfig};
use crossfit_rs::pipeline::{LearnerPipeline, Pipeline};
use crossfit_rs::preprocessing::StandardScaler;
use crossfit_rs::scoring::Scoring;
use crossfit_rs::validation::{BootstrapCV, KFold, PredefinedSplits, Split};
use ndarray::{Array1, Array2, Axis};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;

// ============================================================================
// Test data generation
// ============================================================================

/// Regression data where `x0` and its near-copy `x1` both drive the target.
fn generate_regression_sample(n_samples: usize, seed: u64) -> Sample {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let mut x = Array2::random_using((n_samples, 4), Uniform::new(0.0, 1.0).unwrap(), &mut rng);
    for i in 0..n_samples {
        x[[i, 1]] = x[[i, 0]] + 1e-6;
    }
    let y = Array1::from_shape_fn(n_samples, |i| {
        let step = if x[[i, 0]] > 0.5 { 3.0 } else { 0.0 };
        step + 0.5 * x[[i, 2]]
    });
    let names = ["signal", "signal_copy", "noise_a", "noise_b"]
        .iter()
        .map(|s| s.to_string())
        .collect();
    Sample::new(Features::new(x, names).unwrap(), y).unwrap()
}

/// Binary labels from a single threshold on `x0`.
fn generate_classification_sample(n_samples: usize, seed: u64) -> Sample {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let x = Array2::random_using((n_samples, 2), Uniform::new(0.0, 1.0).unwrap(), &mut rng);
    let y = x.column(0).mapv(|v| if v > 0.3 { 1.0 } else { 0.0 });
    Sample::from_arrays(x, y).unwrap()
}

fn mean_of(values: &Array1<f64>, rows: &[usize]) -> f64 {
    values.select(Axis(0), rows).mean().unwrap()
}

fn mean_crossfit(n_splits: usize) -> LearnerCrossfit<Pipeline> {
    LearnerCrossfit::new(
        Pipeline::new(MeanLearner),
        KFold::new(n_splits).unwrap().with_shuffle(11),
    )
}

// ============================================================================
// Split / model correspondence
// ============================================================================

#[test]
fn test_models_correspond_to_splits() {
    let sample = generate_regression_sample(200, 1);
    let mut crossfit = mean_crossfit(5);
    crossfit.fit(&sample).unwrap();

    assert_eq!(crossfit.n_splits().unwrap(), 5);
    assert_eq!(crossfit.models().unwrap().count(), 5);

    for (split, model) in crossfit.splits().unwrap().zip(crossfit.models().unwrap()) {
        let prediction = model.predict(sample.features()).unwrap();
        assert_relative_eq!(
            prediction[0],
            mean_of(sample.target(), &split.train),
            epsilon = 1e-12
        );
    }
}

#[test]
fn test_resize_keeps_prefix() {
    let sample = generate_regression_sample(200, 2);
    let mut crossfit = mean_crossfit(5);
    crossfit.fit(&sample).unwrap();

    let resized = crossfit.resize(3).unwrap();
    assert_eq!(resized.n_splits().unwrap(), 3);
    assert_eq!(resized.len().unwrap(), 3);
    assert_eq!(crossfit.n_splits().unwrap(), 5, "original must be untouched");

    let original: Vec<&Split> = crossfit.splits().unwrap().take(3).collect();
    let kept: Vec<&Split> = resized.splits().unwrap().collect();
    assert_eq!(original, kept);

    for (a, b) in crossfit.models().unwrap().zip(resized.models().unwrap()) {
        assert_eq!(
            a.predict(sample.features()).unwrap(),
            b.predict(sample.features()).unwrap()
        );
    }

    // resized scores are a prefix of the original scores
    let full = crossfit.score("neg_mean_squared_error", false).unwrap();
    let prefix = resized.score("neg_mean_squared_error", false).unwrap();
    assert_eq!(prefix.as_slice().unwrap(), &full.as_slice().unwrap()[..3]);
}

#[test]
fn test_resize_out_of_range() {
    let sample = generate_regression_sample(50, 3);
    let mut crossfit = mean_crossfit(5);
    crossfit.fit(&sample).unwrap();

    assert!(matches!(
        crossfit.resize(0),
        Err(CrossfitError::OutOfRange { n_splits: 0, max: 5 })
    ));
    assert!(matches!(
        crossfit.resize(6),
        Err(CrossfitError::OutOfRange { n_splits: 6, max: 5 })
    ));
    assert!(crossfit.resize(5).is_ok());
}

// ============================================================================
// Feature shuffling
// ============================================================================

fn trained_orders(crossfit: &LearnerCrossfit<Pipeline>) -> Vec<Vec<String>> {
    crossfit
        .models()
        .unwrap()
        .map(|m| m.final_estimator().unwrap().feature_names().to_vec())
        .collect()
}

#[test]
fn test_shuffled_features_reproducible_with_seed() {
    let sample = generate_regression_sample(300, 4);
    let build = |seed: u64| {
        LearnerCrossfit::new(
            Pipeline::new(StumpLearner::default()),
            KFold::new(5).unwrap().with_shuffle(5),
        )
        .shuffle_features(true)
        .random_state(seed)
    };

    let mut a = build(42);
    let mut b = build(42);
    a.fit(&sample).unwrap();
    b.fit(&sample).unwrap();
    assert_eq!(trained_orders(&a), trained_orders(&b));
    assert_eq!(
        a.score(Scoring::Default, false).unwrap(),
        b.score(Scoring::Default, false).unwrap()
    );

    // every order is a permutation of the input columns
    for mut order in trained_orders(&a) {
        order.sort();
        let mut expected = sample.feature_names().to_vec();
        expected.sort();
        assert_eq!(order, expected);
    }
}

#[test]
fn test_unshuffled_features_keep_input_order() {
    let sample = generate_regression_sample(100, 5);
    let mut crossfit = LearnerCrossfit::new(
        Pipeline::new(StumpLearner::default()),
        KFold::new(4).unwrap(),
    );
    crossfit.fit(&sample).unwrap();
    for order in trained_orders(&crossfit) {
        assert_eq!(order, sample.feature_names());
    }
}

#[test]
fn test_shuffling_spreads_similar_features() {
    // signal and signal_copy split the target equally well; without shuffling
    // the stump always takes the leftmost one
    let sample = generate_regression_sample(200, 6);
    let mut crossfit = LearnerCrossfit::new(
        Pipeline::new(StumpLearner::default()),
        BootstrapCV::new(40).unwrap().with_random_state(6),
    )
    .shuffle_features(true)
    .random_state(6);
    crossfit.fit(&sample).unwrap();

    let chosen: Vec<String> = crossfit
        .models()
        .unwrap()
        .map(|m| {
            let estimator = m.final_estimator().unwrap();
            let names = estimator.feature_names();
            let importances = estimator.model().feature_importances(names.len());
            let best = importances
                .iter()
                .position(|v| *v > 0.0)
                .unwrap();
            names[best].clone()
        })
        .collect();
    assert!(chosen.iter().any(|c| c == "signal"));
    assert!(chosen.iter().any(|c| c == "signal_copy"));
    assert!(chosen.iter().all(|c| c.starts_with("signal")));
}

// ============================================================================
// Scoring
// ============================================================================

#[test]
fn test_dummy_pipeline_five_fold_scenario() {
    let sample = generate_regression_sample(1000, 7);
    let mut crossfit = LearnerCrossfit::new(Pipeline::new(MeanLearner), KFold::new(5).unwrap());
    crossfit.fit(&sample).unwrap();

    let scores = crossfit.score("neg_mean_squared_error", false).unwrap();
    assert_eq!(scores.len(), 5);
    assert!(scores.iter().all(|s| *s <= 0.0));

    assert_eq!(crossfit.resize(2).unwrap().n_splits().unwrap(), 2);
}

#[test]
fn test_score_is_idempotent() {
    let sample = generate_regression_sample(150, 8);
    let mut crossfit = mean_crossfit(3);
    crossfit.fit(&sample).unwrap();
    let first = crossfit.score("r2", false).unwrap();
    let second = crossfit.score("r2", false).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_unseeded_bootstrap_scores_are_stable() {
    let sample = generate_regression_sample(120, 9);
    let mut crossfit = LearnerCrossfit::new(Pipeline::new(MeanLearner), BootstrapCV::new(10).unwrap());
    crossfit.fit(&sample).unwrap();

    let first = crossfit.score("neg_mean_absolute_error", false).unwrap();
    let second = crossfit.score("neg_mean_absolute_error", false).unwrap();
    assert_eq!(first, second, "captured splits must be replayed");

    for split in crossfit.splits().unwrap() {
        assert!(split.test.iter().all(|i| !split.train.contains(i)));
    }
}

#[test]
fn test_fit_score_equals_fit_then_score() {
    let sample = generate_regression_sample(200, 10);
    let pipeline = Pipeline::new(StumpLearner::default());
    let cv = KFold::new(4).unwrap().with_shuffle(3);

    let mut fused = LearnerCrossfit::new(pipeline.clone(), cv.clone())
        .shuffle_features(true)
        .random_state(1);
    let fused_scores = fused.fit_score(&sample, "r2", false).unwrap();

    let mut separate = LearnerCrossfit::new(pipeline, cv)
        .shuffle_features(true)
        .random_state(1);
    separate.fit(&sample).unwrap();
    let separate_scores = separate.score("r2", false).unwrap();

    assert_eq!(fused_scores, separate_scores);
    assert_eq!(fused.n_splits().unwrap(), 4);
    assert!(fused.is_fitted());
}

#[test]
fn test_train_and_test_scores_differ() {
    let sample = generate_regression_sample(300, 11);
    let mut crossfit = LearnerCrossfit::new(
        Pipeline::new(StumpLearner::default()),
        BootstrapCV::new(20).unwrap().with_random_state(11),
    );
    crossfit.fit(&sample).unwrap();
    let train = crossfit.score("r2", true).unwrap();
    let test = crossfit.score("r2", false).unwrap();
    assert_eq!(train.len(), 20);
    assert_ne!(train, test);
    assert!(train.mean().unwrap() > 0.5);
    assert!(test.mean().unwrap() > 0.5);
}

#[test]
fn test_preprocessing_applied_when_scoring() {
    let sample = generate_regression_sample(200, 12);
    let pipeline = Pipeline::new(StumpLearner::default()).with_preprocessing(StandardScaler::new());
    let mut crossfit = LearnerCrossfit::new(pipeline, KFold::new(4).unwrap());
    crossfit.fit(&sample).unwrap();

    let scores = crossfit.score("neg_mean_squared_error", false).unwrap();
    for ((split, model), score) in crossfit
        .splits()
        .unwrap()
        .zip(crossfit.models().unwrap())
        .zip(scores.iter())
    {
        let test = sample.subsample(&split.test);
        let scaled = model.preprocessing().unwrap().transform(test.features()).unwrap();
        let predicted = model.final_estimator().unwrap().predict(&scaled).unwrap();
        let mse = (&predicted - test.target()).mapv(|d| d * d).mean().unwrap();
        assert_relative_eq!(*score, -mse, epsilon = 1e-12);
    }
}

#[test]
fn test_classifier_defaults_to_accuracy() {
    let sample = generate_classification_sample(100, 13);
    let mut crossfit =
        LearnerCrossfit::new(Pipeline::new(MajorityClassLearner), KFold::new(5).unwrap());
    let scores = crossfit.fit_score(&sample, Scoring::Default, false).unwrap();
    assert!(scores.iter().all(|s| (0.0..=1.0).contains(s)));
}

#[test]
fn test_custom_metric_scoring() {
    fn max_error(predicted: &Array1<f64>, actual: &Array1<f64>, _: Option<&Array1<f64>>) -> f64 {
        -predicted
            .iter()
            .zip(actual.iter())
            .map(|(p, a)| (p - a).abs())
            .fold(0.0, f64::max)
    }
    let sample = generate_regression_sample(100, 14);
    let mut crossfit = mean_crossfit(3);
    crossfit.fit(&sample).unwrap();
    let scores = crossfit
        .score(Scoring::Metric(max_error), false)
        .unwrap();
    let mae = crossfit.score("neg_mean_absolute_error", false).unwrap();
    for (max, mean) in scores.iter().zip(mae.iter()) {
        assert!(max <= mean);
    }
}

// ============================================================================
// Sample weights
// ============================================================================

#[test]
fn test_sample_weights_reach_learner_and_scorer() {
    let base = generate_regression_sample(60, 15);
    let weight = Array1::from_shape_fn(60, |i| if i % 3 == 0 { 5.0 } else { 1.0 });
    let sample = base.with_weight(weight.clone()).unwrap();

    let mut crossfit = mean_crossfit(3);
    let scores = crossfit.fit_score(&sample, "neg_mean_squared_error", false).unwrap();

    for ((split, model), score) in crossfit
        .splits()
        .unwrap()
        .zip(crossfit.models().unwrap())
        .zip(scores.iter())
    {
        let y_train = sample.target().select(Axis(0), &split.train);
        let w_train = weight.select(Axis(0), &split.train);
        let expected_mean = (&y_train * &w_train).sum() / w_train.sum();
        let predicted = model.predict(sample.features()).unwrap();
        assert_relative_eq!(predicted[0], expected_mean, epsilon = 1e-10);

        let y_test = sample.target().select(Axis(0), &split.test);
        let w_test = weight.select(Axis(0), &split.test);
        let expected_mse =
            (y_test.mapv(|y| (y - expected_mean).powi(2)) * &w_test).sum() / w_test.sum();
        assert_relative_eq!(*score, -expected_mse, epsilon = 1e-10);
    }
}

#[test]
fn test_explicit_sample_weight_rejected() {
    let sample = generate_regression_sample(30, 16);
    let mut crossfit = mean_crossfit(3);
    let params = FitParams {
        sample_weight: Some(Array1::ones(30)),
        ..FitParams::default()
    };
    assert!(matches!(
        crossfit.fit_with_params(&sample, &params),
        Err(CrossfitError::Configuration(_))
    ));
    assert!(!crossfit.is_fitted());
    assert!(matches!(
        crossfit.fit_score_with_params(&sample, "r2", false, &params),
        Err(CrossfitError::Configuration(_))
    ));
}

// ============================================================================
// Error states
// ============================================================================

#[test]
fn test_state_errors_before_fit() {
    let crossfit = mean_crossfit(3);
    assert!(!crossfit.is_fitted());
    assert!(matches!(crossfit.ensure_fitted(), Err(CrossfitError::NotFitted(_))));
    assert!(matches!(crossfit.len(), Err(CrossfitError::NotFitted(_))));
    assert!(matches!(
        crossfit.score(Scoring::Default, false),
        Err(CrossfitError::NotFitted(_))
    ));
}

#[test]
fn test_multi_metric_scoring_rejected() {
    let sample = generate_regression_sample(60, 17);
    let mut crossfit = mean_crossfit(3);
    crossfit.fit(&sample).unwrap();
    assert!(matches!(
        crossfit.score(vec!["r2", "neg_mean_squared_error"], false),
        Err(CrossfitError::UnsupportedScoring(_))
    ));
    assert!(crossfit.is_fitted(), "a failed score leaves the fit in place");

    assert!(matches!(
        crossfit.fit_score(&sample, vec!["r2", "neg_mean_squared_error"], false),
        Err(CrossfitError::UnsupportedScoring(_))
    ));
    assert!(!crossfit.is_fitted());
}

#[test]
fn test_unknown_scoring_name_rejected() {
    let sample = generate_regression_sample(60, 18);
    let mut crossfit = mean_crossfit(3);
    crossfit.fit(&sample).unwrap();
    assert!(matches!(
        crossfit.score("not_a_metric", false),
        Err(CrossfitError::Configuration(_))
    ));
}

#[test]
fn test_failed_refit_resets_state() {
    let sample = generate_regression_sample(60, 19);
    let mut crossfit = mean_crossfit(3);
    crossfit.fit(&sample).unwrap();
    assert!(crossfit.is_fitted());

    let params = FitParams::new().with_learner_param("no_such_param", 1.0);
    let err = crossfit.fit_with_params(&sample, &params).unwrap_err();
    match err {
        CrossfitError::TaskFailed { split, source } => {
            assert_eq!(split, 0);
            assert!(matches!(source, LearnerError::InvalidParameter(_)));
        }
        other => panic!("unexpected error: {other}"),
    }
    assert!(!crossfit.is_fitted());
    assert!(crossfit.n_splits().is_err());
}

#[test]
fn test_empty_train_split_fails_task() {
    let sample = generate_regression_sample(10, 20);
    let cv = PredefinedSplits::new(vec![
        Split::new((0..5).collect(), (5..10).collect()),
        Split::new(vec![], (0..10).collect()),
    ]);
    let mut crossfit = LearnerCrossfit::new(Pipeline::new(MeanLearner), cv);
    assert!(matches!(
        crossfit.fit(&sample),
        Err(CrossfitError::TaskFailed { split: 1, .. })
    ));
    assert!(!crossfit.is_fitted());
}

#[test]
fn test_empty_test_split_fails_scoring() {
    let sample = generate_regression_sample(4, 21);
    let cv = PredefinedSplits::from_iter(vec![
        (vec![0, 1], vec![2, 3]),
        (vec![0, 1, 2, 3], vec![]),
    ]);
    let mut crossfit = LearnerCrossfit::new(Pipeline::new(MeanLearner), cv);
    crossfit.fit(&sample).unwrap();

    for scoring in ["neg_mean_squared_error", "r2"] {
        match crossfit.score(scoring, false) {
            Err(CrossfitError::TaskFailed { split, source }) => {
                assert_eq!(split, 1);
                assert!(matches!(source, LearnerError::EmptyData(_)));
            }
            other => panic!("expected a failed split for {scoring}, got {other:?}"),
        }
    }
    // the training side of the same split is still scorable
    assert_eq!(crossfit.score("neg_mean_squared_error", true).unwrap().len(), 2);
}

#[test]
fn test_zero_weight_test_slice_fails_scoring() {
    let weight = Array1::from_shape_fn(10, |i| if i < 5 { 1.0 } else { 0.0 });
    let sample = generate_regression_sample(10, 22).with_weight(weight).unwrap();
    let cv = PredefinedSplits::new(vec![Split::new((0..5).collect(), (5..10).collect())]);
    let mut crossfit = LearnerCrossfit::new(Pipeline::new(MeanLearner), cv);

    assert!(matches!(
        crossfit.fit_score(&sample, "neg_mean_squared_error", false),
        Err(CrossfitError::TaskFailed {
            split: 0,
            source: LearnerError::InvalidParameter(_)
        })
    ));
}

#[test]
fn test_small_bootstrap_empty_out_of_bag_is_reported() {
    let sample = generate_regression_sample(2, 23);
    let mut crossfit = LearnerCrossfit::new(
        Pipeline::new(MeanLearner),
        BootstrapCV::new(20).unwrap().with_random_state(1),
    );
    crossfit.fit(&sample).unwrap();
    // with two rows, a draw covers both rows about half the time
    assert!(crossfit.splits().unwrap().any(|s| s.test.is_empty()));
    assert!(matches!(
        crossfit.score("neg_mean_squared_error", false),
        Err(CrossfitError::TaskFailed { .. })
    ));
}

#[test]
fn test_learner_params_reach_every_split() {
    let sample = generate_regression_sample(100, 21);
    let mut crossfit = LearnerCrossfit::new(
        Pipeline::new(StumpLearner::default()),
        KFold::new(4).unwrap(),
    );
    let params = FitParams::new().with_learner_param("min_samples_leaf", 30.0);
    crossfit.fit_with_params(&sample, &params).unwrap();
    for (split, model) in crossfit.splits().unwrap().zip(crossfit.models().unwrap()) {
        let train = sample.subsample(&split.train);
        let predicted = model.predict(train.features()).unwrap();
        let first = predicted[0];
        let left = predicted.iter().filter(|p| **p == first).count();
        let right = predicted.len() - left;
        assert!(left >= 30 && (right == 0 || right >= 30));
    }
}

// ============================================================================
// Parallel execution
// ============================================================================

#[test]
fn test_threaded_matches_sequential() {
    let sample = generate_regression_sample(400, 22);
    let build = |parallel: ParallelConfig| {
        LearnerCrossfit::new(
            Pipeline::new(StumpLearner::default()),
            BootstrapCV::new(16).unwrap().with_random_state(22),
        )
        .shuffle_features(true)
        .random_state(22)
        .parallel(parallel)
    };

    let mut sequential = build(ParallelConfig::new().with_backend(Backend::Sequential));
    let mut threaded = build(
        ParallelConfig::new()
            .with_n_jobs(4)
            .with_backend(Backend::Threads)
            .with_pre_dispatch(2)
            .with_verbose(10),
    );

    let a = sequential.fit_score(&sample, "r2", false).unwrap();
    let b = threaded.fit_score(&sample, "r2", false).unwrap();
    assert_eq!(a, b);
    assert_eq!(trained_orders(&sequential), trained_orders(&threaded));
}

#[test]
fn test_zero_jobs_is_a_configuration_error() {
    let sample = generate_regression_sample(30, 23);
    let mut crossfit = mean_crossfit(3).n_jobs(0);
    assert!(matches!(
        crossfit.fit(&sample),
        Err(CrossfitError::Configuration(_))
    ));
}
