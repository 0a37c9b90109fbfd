use super::{check_n_splits, make_rng, CrossValidator, Split};
use crate::data::Features;
use crate::error::{CrossfitError, CrossfitResult};
use ndarray::Array1;
use rand::seq::SliceRandom;
use serde::{Deserialize, Serialize};

/// K contiguous folds; each fold is the test set once.
///
/// The first `n % k` folds get one extra row. With `shuffle`, rows are
/// permuted before folding, reproducibly if `random_state` is set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KFold {
    pub n_splits: usize,
    pub shuffle: bool,
    pub random_state: Option<u64>,
}

impl KFold {
    pub fn new(n_splits: usize) -> CrossfitResult<Self> {
        check_n_splits(n_splits, 2)?;
        Ok(Self {
            n_splits,
            shuffle: false,
            random_state: None,
        })
    }

    /// Shuffle rows with a fixed seed.
    pub fn with_shuffle(mut self, seed: u64) -> Self {
        self.shuffle = true;
        self.random_state = Some(seed);
        self
    }

    /// Shuffle rows with a fresh seed on every call to `split`.
    pub fn with_random_shuffle(mut self) -> Self {
        self.shuffle = true;
        self.random_state = None;
        self
    }
}

impl CrossValidator for KFold {
    fn split(&self, features: &Features, _target: &Array1<f64>) -> CrossfitResult<Vec<Split>> {
        check_n_splits(self.n_splits, 2)?;
        let n = features.nrows();
        if self.n_splits > n {
            return Err(CrossfitError::Configuration(format!(
                "cannot have n_splits={} greater than the number of samples {n}",
                self.n_splits
            )));
        }

        let mut order: Vec<usize> = (0..n).collect();
        if self.shuffle {
            order.shuffle(&mut make_rng(self.random_state));
        }

        let base = n / self.n_splits;
        let extra = n % self.n_splits;
        let mut splits = Vec::with_capacity(self.n_splits);
        let mut start = 0;
        for fold in 0..self.n_splits {
            let size = base + usize::from(fold < extra);
            let end = start + size;
            let test = order[start..end].to_vec();
            let train = order[..start]
                .iter()
                .chain(order[end..].iter())
                .copied()
                .collect();
            splits.push(Split::new(train, test));
            start = end;
        }
        Ok(splits)
    }
}
