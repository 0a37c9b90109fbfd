use super::{check_n_splits, make_rng, out_of_bag, CrossValidator, Split};
use crate::data::Features;
use crate::error::{CrossfitError, CrossfitResult};
use ndarray::Array1;
use rand::Rng;
use rand_chacha::ChaCha8Rng;
use serde::{Deserialize, Serialize};

/// Draw `n_splits` training sets of `n` rows each and pair them with their
/// out-of-bag rows.
fn bootstrap_splits<F>(
    n: usize,
    n_splits: usize,
    random_state: Option<u64>,
    mut draw: F,
) -> CrossfitResult<Vec<Split>>
where
    F: FnMut(&mut ChaCha8Rng, usize) -> Vec<usize>,
{
    if n == 0 {
        return Err(CrossfitError::InvalidData(
            "cannot bootstrap an empty sample".to_string(),
        ));
    }
    let mut rng = make_rng(random_state);
    Ok((0..n_splits)
        .map(|_| {
            let train = draw(&mut rng, n);
            let test = out_of_bag(&train, n);
            Split::new(train, test)
        })
        .collect())
}

// ============================================================================
// BootstrapCV
// ============================================================================

/// Bootstrap resampling: each training set draws `n` rows with replacement.
///
/// About 36.8% of the rows end up out of bag and form the test set.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct BootstrapCV {
    pub n_splits: usize,
    pub random_state: Option<u64>,
}

impl Default for BootstrapCV {
    fn default() -> Self {
        Self {
            n_splits: 1000,
            random_state: None,
        }
    }
}

impl BootstrapCV {
    pub fn new(n_splits: usize) -> CrossfitResult<Self> {
        check_n_splits(n_splits, 1)?;
        Ok(Self {
            n_splits,
            random_state: None,
        })
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }
}

impl CrossValidator for BootstrapCV {
    fn split(&self, features: &Features, _target: &Array1<f64>) -> CrossfitResult<Vec<Split>> {
        check_n_splits(self.n_splits, 1)?;
        bootstrap_splits(features.nrows(), self.n_splits, self.random_state, |rng, n| {
            (0..n).map(|_| rng.random_range(0..n)).collect()
        })
    }
}

// ============================================================================
// StationaryBootstrapCV
// ============================================================================

/// Stationary bootstrap: circular blocks with geometrically distributed length.
///
/// `mean_block_size` below 1 is a fraction of the sample size, 1 or above an
/// absolute row count. Unset means `sqrt(n)`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StationaryBootstrapCV {
    pub n_splits: usize,
    pub mean_block_size: Option<f64>,
    pub random_state: Option<u64>,
}

impl Default for StationaryBootstrapCV {
    fn default() -> Self {
        Self {
            n_splits: 1000,
            mean_block_size: None,
            random_state: None,
        }
    }
}

impl StationaryBootstrapCV {
    pub fn new(n_splits: usize) -> CrossfitResult<Self> {
        check_n_splits(n_splits, 1)?;
        Ok(Self {
            n_splits,
            ..Self::default()
        })
    }

    pub fn with_mean_block_size(mut self, mean_block_size: f64) -> CrossfitResult<Self> {
        if !(mean_block_size.is_finite() && mean_block_size > 0.0) {
            return Err(CrossfitError::Configuration(format!(
                "mean_block_size must be positive, got {mean_block_size}"
            )));
        }
        self.mean_block_size = Some(mean_block_size);
        Ok(self)
    }

    pub fn with_random_state(mut self, seed: u64) -> Self {
        self.random_state = Some(seed);
        self
    }

    /// Mean block length in rows for a sample of `n` rows.
    pub fn block_size_for(&self, n: usize) -> f64 {
        let size = match self.mean_block_size {
            None => (n as f64).sqrt(),
            Some(fraction) if fraction < 1.0 => fraction * n as f64,
            Some(rows) => rows,
        };
        size.clamp(1.0, n.max(1) as f64)
    }
}

impl CrossValidator for StationaryBootstrapCV {
    fn split(&self, features: &Features, _target: &Array1<f64>) -> CrossfitResult<Vec<Split>> {
        check_n_splits(self.n_splits, 1)?;
        let n = features.nrows();
        let p_new_block = 1.0 / self.block_size_for(n);
        bootstrap_splits(n, self.n_splits, self.random_state, |rng, n| {
            let mut rows = Vec::with_capacity(n);
            let mut current = rng.random_range(0..n);
            rows.push(current);
            for _ in 1..n {
                current = if rng.random::<f64>() < p_new_block {
                    rng.random_range(0..n)
                } else {
                    (current + 1) % n
                };
                rows.push(current);
            }
            rows
        })
    }
}
