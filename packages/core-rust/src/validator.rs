use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::chunk::Chunk;
use crate::schema::Schema;
use crate::types::Violation;

/// How violation row indices are numbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RowIndexing {
    /// 0-based data-row index within the whole file.
    #[default]
    Global,
    /// 0-based index within the chunk. Indices from different chunks overlap.
    ChunkLocal,
}

/// Applies a shared schema to one chunk at a time.
///
/// Holds no mutable state, so one validator can serve any number of
/// concurrent chunks.
#[derive(Debug, Clone)]
pub struct ChunkValidator {
    schema: Arc<Schema>,
    indexing: RowIndexing,
}

impl ChunkValidator {
    #[must_use]
    pub fn new(schema: Arc<Schema>, indexing: RowIndexing) -> Self {
        Self { schema, indexing }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        &self.schema
    }

    #[must_use]
    pub fn indexing(&self) -> RowIndexing {
        self.indexing
    }

    /// Returns every violation in `chunk`, numbered per the configured indexing.
    #[must_use]
    pub fn validate(&self, chunk: &Chunk) -> Vec<Violation> {
        let thread = std::thread::current();
        debug!(
            sequence = chunk.sequence(),
            rows = chunk.len(),
            thread = thread.name().unwrap_or("unnamed"),
            "chunk validation started"
        );

        let mut violations = self.schema.validate(chunk);
        if self.indexing == RowIndexing::Global && chunk.row_offset() > 0 {
            let offset = chunk.row_offset();
            violations = violations.into_iter().map(|v| v.shifted(offset)).collect();
        }

        debug!(
            sequence = chunk.sequence(),
            violations = violations.len(),
            "chunk validation finished"
        );
        violations
    }
}
