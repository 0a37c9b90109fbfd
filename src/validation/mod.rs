//! Cross-validation splitters.
//!
//! A [`CrossValidator`] turns a data set into a list of [`Split`]s, each a pair
//! of train and test row indices. Splitters may be random; the crossfit engine
//! calls `split` exactly once per fit and replays the captured list afterwards.
//!
//! Built-in splitters:
//! - [`KFold`]: contiguous folds, optionally shuffled.
//! - [`BootstrapCV`]: rows drawn with replacement, out-of-bag rows as test set.
//! - [`StationaryBootstrapCV`]: circular blocks of geometric length, for
//!   serially correlated data.
//! - [`PredefinedSplits`]: a fixed list supplied by the caller.

mod bootstrap;
mod kfold;

pub use bootstrap::{BootstrapCV, StationaryBootstrapCV};
pub use kfold::KFold;

use crate::data::Features;
use crate::error::{CrossfitError, CrossfitResult};
use ndarray::Array1;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};
use std::fmt::Debug;
use std::sync::Arc;

/// One captured cross-validation split.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Split {
    pub train: Vec<usize>,
    pub test: Vec<usize>,
}

impl Split {
    pub fn new(train: Vec<usize>, test: Vec<usize>) -> Self {
        Self { train, test }
    }

    /// The largest row index referenced by either side, if any.
    pub fn max_index(&self) -> Option<usize> {
        self.train.iter().chain(self.test.iter()).copied().max()
    }
}

pub trait CrossValidator: Debug + Send + Sync {
    /// Produce the splits for `features` and `target`.
    fn split(&self, features: &Features, target: &Array1<f64>) -> CrossfitResult<Vec<Split>>;
}

impl<T: CrossValidator + ?Sized> CrossValidator for Arc<T> {
    fn split(&self, features: &Features, target: &Array1<f64>) -> CrossfitResult<Vec<Split>> {
        (**self).split(features, target)
    }
}

impl<T: CrossValidator + ?Sized> CrossValidator for Box<T> {
    fn split(&self, features: &Features, target: &Array1<f64>) -> CrossfitResult<Vec<Split>> {
        (**self).split(features, target)
    }
}

/// A fixed list of splits, returned as is.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PredefinedSplits {
    splits: Vec<Split>,
}

impl PredefinedSplits {
    pub fn new(splits: Vec<Split>) -> Self {
        Self { splits }
    }
}

impl FromIterator<(Vec<usize>, Vec<usize>)> for PredefinedSplits {
    fn from_iter<I: IntoIterator<Item = (Vec<usize>, Vec<usize>)>>(iter: I) -> Self {
        Self::new(iter.into_iter().map(|(train, test)| Split::new(train, test)).collect())
    }
}

impl CrossValidator for PredefinedSplits {
    fn split(&self, _features: &Features, _target: &Array1<f64>) -> CrossfitResult<Vec<Split>> {
        Ok(self.splits.clone())
    }
}

/// A seeded generator, or one seeded from OS entropy.
pub(crate) fn make_rng(random_state: Option<u64>) -> ChaCha8Rng {
    match random_state {
        Some(seed) => ChaCha8Rng::seed_from_u64(seed),
        None => ChaCha8Rng::from_os_rng(),
    }
}

fn check_n_splits(n_splits: usize, min: usize) -> CrossfitResult<()> {
    if n_splits < min {
        return Err(CrossfitError::Configuration(format!(
            "n_splits must be at least {min}, got {n_splits}"
        )));
    }
    Ok(())
}

/// Rows not in `drawn`, ascending.
fn out_of_bag(drawn: &[usize], n: usize) -> Vec<usize> {
    let mut in_bag = vec![false; n];
    for &i in drawn {
        in_bag[i] = true;
    }
    (0..n).filter(|&i| !in_bag[i]).collect()
}
