//! Degree-of-parallelism configuration for bulk operations
//!
//! Only bulk fan-out work (materialization from triples, whole-file decoding)
//! consults these options. Everything else runs on the calling thread.

use serde::{Deserialize, Serialize};

use crate::error::{MatrixError, MatrixResult};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ParallelOptions {
    /// Worker threads for bulk operations; 1 runs inline
    #[serde(default = "default_threads")]
    pub threads: usize,
}

fn default_threads() -> usize {
    rayon::current_num_threads()
}

impl Default for ParallelOptions {
    fn default() -> Self {
        Self {
            threads: default_threads(),
        }
    }
}

impl ParallelOptions {
    pub fn new(threads: usize) -> Self {
        Self {
            threads: threads.max(1),
        }
    }

    pub fn sequential() -> Self {
        Self::new(1)
    }

    pub fn is_sequential(&self) -> bool {
        self.threads <= 1
    }

    /// Run `op` on a pool sized by these options
    pub fn install<R, F>(&self, op: F) -> MatrixResult<R>
    where
        F: FnOnce() -> R + Send,
        R: Send,
    {
        if self.is_sequential() {
            return Ok(op());
        }
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(self.threads)
            .build()
            .map_err(|e| MatrixError::usage(format!("Failed to build thread pool: {}", e)))?;
        Ok(pool.install(op))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sequential_runs_inline() {
        let options = ParallelOptions::sequential();
        assert!(options.is_sequential());
        assert_eq!(options.install(|| 2 + 2).unwrap(), 4);
    }

    #[test]
    fn test_pool_uses_requested_threads() {
        let options = ParallelOptions::new(3);
        let threads = options.install(rayon::current_num_threads).unwrap();
        assert_eq!(threads, 3);
    }

    #[test]
    fn test_zero_threads_clamps_to_one() {
        assert_eq!(ParallelOptions::new(0).threads, 1);
    }
}
