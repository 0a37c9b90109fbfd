//! Parallel execution of independent per-split tasks.
//!
//! [`ParallelConfig`] is plain configuration (serde-friendly); [`Executor`] is
//! built from it on every call that dispatches work. Threaded execution runs on
//! a dedicated rayon pool so the caller's global pool is left alone.

use crate::error::{CrossfitError, CrossfitResult};
use log::debug;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::time::Instant;

/// Where tasks run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Backend {
    /// A rayon thread pool with one worker per job.
    #[default]
    Threads,
    /// A plain loop on the calling thread.
    Sequential,
}

/// Worker count, backend, dispatch granularity and verbosity.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ParallelConfig {
    /// Number of workers. `None` or `1` runs sequentially; negative values
    /// count back from the number of CPUs (`-1` uses all of them).
    pub n_jobs: Option<isize>,
    pub backend: Backend,
    /// Minimum number of tasks a worker takes per chunk (rayon `with_min_len`).
    /// Controls split granularity only; tasks are not queued ahead of workers.
    pub pre_dispatch: Option<usize>,
    /// `0` is quiet, `>= 1` logs each task, `>= 10` also logs task timings.
    pub verbose: u32,
}

impl ParallelConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_n_jobs(mut self, n_jobs: isize) -> Self {
        self.n_jobs = Some(n_jobs);
        self
    }

    pub fn with_backend(mut self, backend: Backend) -> Self {
        self.backend = backend;
        self
    }

    pub fn with_pre_dispatch(mut self, pre_dispatch: usize) -> Self {
        self.pre_dispatch = Some(pre_dispatch);
        self
    }

    pub fn with_verbose(mut self, verbose: u32) -> Self {
        self.verbose = verbose;
        self
    }

    /// Resolve `n_jobs` to a concrete worker count.
    pub fn effective_n_jobs(&self) -> CrossfitResult<usize> {
        match self.n_jobs {
            None => Ok(1),
            Some(0) => Err(CrossfitError::Configuration(
                "n_jobs == 0 has no meaning".to_string(),
            )),
            Some(n) if n > 0 => Ok(n as usize),
            Some(n) => {
                let cpus = std::thread::available_parallelism().map_or(1, |c| c.get()) as isize;
                Ok((cpus + 1 + n).max(1) as usize)
            }
        }
    }
}

/// Runs tasks and hands back their results in submission order.
pub struct Executor {
    pool: Option<rayon::ThreadPool>,
    min_len: usize,
    verbose: u32,
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("n_workers", &self.n_workers())
            .field("min_len", &self.min_len)
            .field("verbose", &self.verbose)
            .finish()
    }
}

impl Executor {
    pub fn new(config: &ParallelConfig) -> CrossfitResult<Self> {
        let n_jobs = config.effective_n_jobs()?;
        let pool = if config.backend == Backend::Threads && n_jobs > 1 {
            let pool = rayon::ThreadPoolBuilder::new()
                .num_threads(n_jobs)
                .build()
                .map_err(|e| {
                    CrossfitError::Configuration(format!("cannot start thread pool: {e}"))
                })?;
            Some(pool)
        } else {
            None
        };
        Ok(Self {
            pool,
            min_len: config.pre_dispatch.unwrap_or(1).max(1),
            verbose: config.verbose,
        })
    }

    pub fn n_workers(&self) -> usize {
        self.pool.as_ref().map_or(1, |p| p.current_num_threads())
    }

    /// Apply `f` to every task with its position; results keep task order.
    ///
    /// Stops at the first error. With several workers, tasks already running
    /// when the error occurs still finish, but their results are dropped.
    pub fn map_ordered<T, R, F>(&self, tasks: Vec<T>, f: F) -> CrossfitResult<Vec<R>>
    where
        T: Send,
        R: Send,
        F: Fn(usize, T) -> CrossfitResult<R> + Send + Sync,
    {
        let n_tasks = tasks.len();
        let verbose = self.verbose;
        let run = |index: usize, task: T| {
            let start = Instant::now();
            if verbose >= 1 {
                debug!("task {}/{} started", index + 1, n_tasks);
            }
            let result = f(index, task);
            if verbose >= 10 {
                debug!(
                    "task {}/{} done in {:.3?}",
                    index + 1,
                    n_tasks,
                    start.elapsed()
                );
            } else if verbose >= 1 {
                debug!("task {}/{} done", index + 1, n_tasks);
            }
            result
        };

        match &self.pool {
            Some(pool) => pool.install(|| {
                tasks
                    .into_par_iter()
                    .enumerate()
                    .with_min_len(self.min_len)
                    .map(|(i, task)| run(i, task))
                    .collect()
            }),
            None => tasks
                .into_iter()
                .enumerate()
                .map(|(i, task)| run(i, task))
                .collect(),
        }
    }
}

/// Something that dispatches work through an [`Executor`].
pub trait Parallelizable {
    fn parallel_config(&self) -> &ParallelConfig;

    fn executor(&self) -> CrossfitResult<Executor> {
        Executor::new(self.parallel_config())
    }
}
