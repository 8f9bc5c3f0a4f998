use std::num::NonZeroUsize;

use csvcheck_core::{RowIndexing, DEFAULT_CHUNK_BYTES};

/// Tuning for the validation pipeline.
///
/// Controls chunk size, worker parallelism, and how many materialized chunks
/// may wait for a worker.
#[derive(Debug, Clone)]
pub struct ValidationConfig {
    /// Approximate raw bytes per chunk.
    pub chunk_bytes: usize,
    /// Maximum number of chunks validated concurrently.
    pub workers: usize,
    /// Chunks the reader may buffer ahead of the workers.
    pub queue_depth: usize,
    /// Numbering scheme for violation row indices.
    pub row_indexing: RowIndexing,
}

impl Default for ValidationConfig {
    fn default() -> Self {
        Self {
            chunk_bytes: DEFAULT_CHUNK_BYTES,
            workers: std::thread::available_parallelism().map_or(4, NonZeroUsize::get),
            queue_depth: 2,
            row_indexing: RowIndexing::Global,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_config_defaults() {
        let config = ValidationConfig::default();
        assert_eq!(config.chunk_bytes, 20_000_000);
        assert!(config.workers >= 1);
        assert_eq!(config.queue_depth, 2);
        assert_eq!(config.row_indexing, RowIndexing::Global);
    }
}
