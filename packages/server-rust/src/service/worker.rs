//! Bounded worker pool for chunk validation.
//!
//! Each submitted chunk becomes one blocking task on the tokio blocking pool.
//! A semaphore caps how many run at once; `join` is the barrier that waits
//! for every task before results are handed back.

use std::sync::Arc;

use csvcheck_core::{Chunk, ChunkValidator, Violation};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

/// Errors from the worker pool.
#[derive(Debug, thiserror::Error)]
pub enum PoolError {
    #[error("worker pool closed")]
    Closed,
    #[error("validation worker failed: {0}")]
    Worker(String),
}

/// Result of one chunk: its submission sequence and its violations.
pub type ChunkResult = (usize, Vec<Violation>);

/// Runs chunk validations concurrently, at most `workers` at a time.
pub struct ChunkWorkerPool {
    validator: Arc<ChunkValidator>,
    permits: Arc<Semaphore>,
    tasks: JoinSet<ChunkResult>,
    submitted: usize,
}

impl ChunkWorkerPool {
    /// Creates a pool. A worker count of 0 is treated as 1.
    #[must_use]
    pub fn new(validator: Arc<ChunkValidator>, workers: usize) -> Self {
        Self {
            validator,
            permits: Arc::new(Semaphore::new(workers.max(1))),
            tasks: JoinSet::new(),
            submitted: 0,
        }
    }

    /// Number of chunks submitted so far.
    #[must_use]
    pub fn submitted(&self) -> usize {
        self.submitted
    }

    /// Schedules `chunk` for validation.
    ///
    /// Waits for a free worker slot first, so a caller feeding chunks from a
    /// bounded channel stops pulling while every worker is busy.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Closed`] if the semaphore has been closed.
    pub async fn submit(&mut self, chunk: Chunk) -> Result<(), PoolError> {
        let permit = Arc::clone(&self.permits)
            .acquire_owned()
            .await
            .map_err(|_| PoolError::Closed)?;
        let validator = Arc::clone(&self.validator);
        self.tasks.spawn_blocking(move || {
            let _permit = permit;
            (chunk.sequence(), validator.validate(&chunk))
        });
        self.submitted += 1;
        Ok(())
    }

    /// Waits for every submitted chunk and returns the results in completion
    /// order.
    ///
    /// All tasks are drained even if one fails.
    ///
    /// # Errors
    ///
    /// Returns [`PoolError::Worker`] for the first task that panicked.
    pub async fn join(mut self) -> Result<Vec<ChunkResult>, PoolError> {
        let mut results = Vec::with_capacity(self.submitted);
        let mut failure = None;
        while let Some(joined) = self.tasks.join_next().await {
            match joined {
                Ok(result) => results.push(result),
                Err(err) => {
                    failure.get_or_insert(PoolError::Worker(err.to_string()));
                }
            }
        }
        match failure {
            Some(err) => Err(err),
            None => Ok(results),
        }
    }
}
