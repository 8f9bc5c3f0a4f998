//! csvcheck core: column schema model, chunked CSV reader, chunk validation,
//! and report aggregation.

pub mod chunk;
pub mod claims;
pub mod date;
pub mod reader;
pub mod report;
pub mod schema;
pub mod types;
pub mod validator;

pub use chunk::{Chunk, ChunkBuilder, ColumnData, Header, ReadProfile};
pub use reader::{ChunkReader, ReadError, DEFAULT_CHUNK_BYTES};
pub use report::{Aggregator, ReportStatus, ValidationReport};
pub use schema::{ColumnKind, ColumnRule, Constraint, CustomCheck, Schema, SchemaError};
pub use types::{Cell, Violation};
pub use validator::{ChunkValidator, RowIndexing};
