//! Crossfit a regression stump with feature shuffling and bootstrap splits.
//!
//! Run with: cargo run --example crossfit_regression

use crossfit_rs::{
    BootstrapCV, CrossfitError, Features, KFold, LearnerCrossfit, LearnerPipeline, MeanLearner,
    ParallelConfig, Pipeline, Sample, StumpLearner,
};
use crossfit_rs::preprocessing::StandardScaler;
use ndarray::{Array1, Array2};
use ndarray_rand::rand_distr::Uniform;
use ndarray_rand::RandomExt;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use std::collections::BTreeMap;

fn main() -> Result<(), CrossfitError> {
    // Two near-identical features: a stump breaks the tie by column position.
    let mut rng = ChaCha8Rng::seed_from_u64(7);
    let n_samples = 500;
    let mut x = Array2::random_using((n_samples, 3), Uniform::new(0.0, 1.0).unwrap(), &mut rng);
    for i in 0..n_samples {
        x[[i, 1]] = x[[i, 0]] + 1e-6;
    }
    let y = Array1::from_shape_fn(n_samples, |i| {
        let step = if x[[i, 0]] > 0.4 { 2.0 } else { 0.0 };
        step + x[[i, 2]]
    });
    let names = vec!["price".to_string(), "price_copy".to_string(), "volume".to_string()];
    let sample = Sample::new(Features::new(x, names)?, y)?;

    println!("=== Baseline: mean predictor, 5-fold ===");
    let mut baseline = LearnerCrossfit::new(Pipeline::new(MeanLearner), KFold::new(5)?);
    let scores = baseline.fit_score(&sample, "neg_mean_squared_error", false)?;
    println!("   test scores: {scores:.4}");

    println!("\n=== Stump with shuffled features, 100 bootstrap splits ===");
    let pipeline = Pipeline::new(StumpLearner::default()).with_preprocessing(StandardScaler::new());
    let mut crossfit = LearnerCrossfit::new(pipeline, BootstrapCV::new(100)?.with_random_state(42))
        .shuffle_features(true)
        .random_state(42)
        .parallel(ParallelConfig::new().with_n_jobs(-1));
    crossfit.fit(&sample)?;

    let test = crossfit.score("r2", false)?;
    let train = crossfit.score("r2", true)?;
    println!("   splits:          {}", crossfit.n_splits()?);
    println!("   mean test r2:    {:.4}", test.mean().unwrap_or(f64::NAN));
    println!("   mean train r2:   {:.4}", train.mean().unwrap_or(f64::NAN));

    // Which feature did each model split on?
    let mut chosen: BTreeMap<String, usize> = BTreeMap::new();
    for model in crossfit.models()? {
        let estimator = model.final_estimator()?;
        let names = estimator.feature_names();
        let importances = estimator.model().feature_importances(names.len());
        if let Some(best) = importances.iter().position(|v| *v > 0.0) {
            *chosen.entry(names[best].clone()).or_insert(0) += 1;
        }
    }
    println!("   split feature counts: {chosen:?}");

    println!("\n=== Resized to the first 10 splits ===");
    let small = crossfit.resize(10)?;
    println!("   test scores: {:.4}", small.score("r2", false)?);

    Ok(())
}
