//! Execution engines for controlling how broadcast positions are evaluated
//!
//! This module provides the execution engine abstraction that decides
//! whether the independent positions of one broadcast call run on the
//! calling thread or fan out over a thread pool.
//!
//! # Design Philosophy
//!
//! - **Unified Control**: A single type parameter selects the strategy
//! - **Zero-Cost**: All decisions made at compile time
//! - **Thread Pool Integration**: Works with the global Rayon pool or a dedicated one
//! - **Opaque Parallelism**: Callers see one blocking call either way

#[cfg(feature = "parallel")]
use crate::Result;

/// Execution strategy for one broadcast call
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum ExecutionStrategy {
    Sequential,
    Parallel,
}

/// Chunking policy fixed by the engine type
pub trait ExecutionMode {
    /// Positions per chunk for `n_items` positions on `n_threads` threads
    fn chunk_size(n_items: usize, n_threads: usize) -> usize;
}

/// How the chunks of one broadcast call are scheduled
pub trait ExecutionEngine: Clone + Send + Sync + ExecutionMode {
    /// Execute `count` independent tasks, results in task order
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send;

    /// Get the execution strategy
    fn strategy(&self) -> ExecutionStrategy;

    /// Check if parallel execution is available
    fn is_parallel(&self) -> bool {
        matches!(self.strategy(), ExecutionStrategy::Parallel)
    }

    /// Get the number of threads available
    fn num_threads(&self) -> usize;

    /// Chunk size this engine prefers for `n_items` positions
    fn preferred_chunk(&self, n_items: usize) -> usize {
        Self::chunk_size(n_items, self.num_threads())
    }
}

/// Runs every chunk on the calling thread
#[derive(Clone, Copy, Debug, Default)]
pub struct SequentialEngine;

impl SequentialEngine {
    pub fn new() -> Self {
        Self
    }
}

impl ExecutionMode for SequentialEngine {
    fn chunk_size(_n_items: usize, _n_threads: usize) -> usize {
        // one chunk
        usize::MAX
    }
}

impl ExecutionEngine for SequentialEngine {
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        (0..count).map(f).collect()
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Sequential
    }

    fn num_threads(&self) -> usize {
        1
    }
}

/// Fans chunks out over a Rayon pool, the global one unless built with
/// [`ParallelEngine::with_num_threads`]
#[cfg(feature = "parallel")]
#[derive(Clone, Debug, Default)]
pub struct ParallelEngine {
    thread_pool: Option<std::sync::Arc<rayon::ThreadPool>>,
}

#[cfg(feature = "parallel")]
impl ParallelEngine {
    /// Create a new parallel engine with default thread pool
    pub fn new() -> Self {
        Self { thread_pool: None }
    }

    /// Create with a specific number of threads
    pub fn with_num_threads(num_threads: usize) -> Result<Self> {
        let pool = rayon::ThreadPoolBuilder::new()
            .num_threads(num_threads)
            .build()
            .map_err(|e| anyhow::anyhow!("Failed to create thread pool: {e}"))?;

        Ok(Self {
            thread_pool: Some(std::sync::Arc::new(pool)),
        })
    }
}

#[cfg(feature = "parallel")]
impl ExecutionMode for ParallelEngine {
    fn chunk_size(n_items: usize, n_threads: usize) -> usize {
        let target_chunks = n_threads * 6;
        let chunk_size = n_items.div_ceil(target_chunks.max(1));
        chunk_size.max(1024).min(n_items.max(1))
    }
}

#[cfg(feature = "parallel")]
impl ExecutionEngine for ParallelEngine {
    fn execute_batch<F, R>(&self, count: usize, f: F) -> Vec<R>
    where
        F: Fn(usize) -> R + Sync + Send,
        R: Send,
    {
        use rayon::prelude::*;

        if let Some(pool) = &self.thread_pool {
            pool.install(|| (0..count).into_par_iter().map(f).collect())
        } else {
            (0..count).into_par_iter().map(f).collect()
        }
    }

    fn strategy(&self) -> ExecutionStrategy {
        ExecutionStrategy::Parallel
    }

    fn num_threads(&self) -> usize {
        if let Some(pool) = &self.thread_pool {
            pool.current_num_threads()
        } else {
            rayon::current_num_threads()
        }
    }
}

/// Create a sequential engine
pub fn sequential() -> SequentialEngine {
    SequentialEngine::new()
}

/// Create a parallel engine on the global Rayon pool
#[cfg(feature = "parallel")]
pub fn parallel() -> ParallelEngine {
    ParallelEngine::new()
}

/// Split `0..n_items` into consecutive ranges of at most `chunk` positions
pub fn chunk_ranges(n_items: usize, chunk: usize) -> impl Iterator<Item = std::ops::Range<usize>> {
    let chunk = chunk.max(1);
    let count = n_items.div_ceil(chunk);
    (0..count).map(move |i| {
        let start = i * chunk;
        start..n_items.min(start.saturating_add(chunk))
    })
}
