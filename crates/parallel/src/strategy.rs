//! Parallel processing strategies
//!
//! Without the `parallel` feature every mode runs sequentially.

#[cfg(feature = "parallel")]
use rayon::prelude::*;
use sarflood_core::{Error, Result};

/// Processing mode for data-parallel stages
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum ProcessingMode {
    /// Single-threaded processing
    Sequential,
    /// Parallel processing using all available cores
    #[default]
    Parallel,
    /// Parallel with specified number of worker threads
    ParallelWith(usize),
}

impl ProcessingMode {
    /// Mode for a configured worker count: 0 = all cores, 1 = sequential
    pub fn from_workers(workers: usize) -> Self {
        match workers {
            0 => ProcessingMode::Parallel,
            1 => ProcessingMode::Sequential,
            n => ProcessingMode::ParallelWith(n),
        }
    }
}

/// Strategy for parallel execution
pub trait ParallelStrategy {
    /// Map a function over items and collect results in input order
    fn par_map<I, T, F>(&self, items: Vec<I>, f: F) -> Result<Vec<T>>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync + Send;
}

impl ParallelStrategy for ProcessingMode {
    #[cfg(feature = "parallel")]
    fn par_map<I, T, F>(&self, items: Vec<I>, f: F) -> Result<Vec<T>>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync + Send,
    {
        match self {
            ProcessingMode::Sequential => Ok(items.into_iter().map(f).collect()),
            ProcessingMode::Parallel => Ok(items.into_par_iter().map(f).collect()),
            ProcessingMode::ParallelWith(threads) => {
                let pool = rayon::ThreadPoolBuilder::new()
                    .num_threads(*threads)
                    .build()
                    .map_err(|e| Error::Other(format!("Failed to build thread pool: {}", e)))?;
                Ok(pool.install(|| items.into_par_iter().map(f).collect()))
            }
        }
    }

    #[cfg(not(feature = "parallel"))]
    fn par_map<I, T, F>(&self, items: Vec<I>, f: F) -> Result<Vec<T>>
    where
        I: Send,
        T: Send,
        F: Fn(I) -> T + Sync + Send,
    {
        if let ProcessingMode::ParallelWith(0) = self {
            return Err(Error::Other("Worker pool needs at least one thread".into()));
        }
        Ok(items.into_iter().map(f).collect())
    }
}

/// Number of worker threads the default pool would use
#[cfg(feature = "parallel")]
pub fn num_cpus() -> usize {
    rayon::current_num_threads()
}

/// Number of worker threads the default pool would use
#[cfg(not(feature = "parallel"))]
pub fn num_cpus() -> usize {
    1
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_workers() {
        assert_eq!(ProcessingMode::from_workers(0), ProcessingMode::Parallel);
        assert_eq!(ProcessingMode::from_workers(1), ProcessingMode::Sequential);
        assert_eq!(ProcessingMode::from_workers(6), ProcessingMode::ParallelWith(6));
    }

    #[test]
    fn test_par_map_preserves_order() {
        let items: Vec<usize> = (0..500).collect();
        for mode in [
            ProcessingMode::Sequential,
            ProcessingMode::Parallel,
            ProcessingMode::ParallelWith(3),
        ] {
            let out = mode.par_map(items.clone(), |i| i * 2).unwrap();
            assert_eq!(out, (0..500).map(|i| i * 2).collect::<Vec<_>>(), "{mode:?}");
        }
    }
}
