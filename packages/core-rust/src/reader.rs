//! Lazy, byte-bounded partitioning of a CSV file into chunks.
//!
//! [`ChunkReader`] streams records with the `csv` crate and cuts a new chunk
//! whenever the raw bytes consumed since the last cut reach the configured
//! threshold. Only the chunk under construction is held in memory.

use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::chunk::{Chunk, ChunkBuilder, Header, ReadProfile};

/// Default partition size: roughly 20 MB of raw CSV per chunk.
pub const DEFAULT_CHUNK_BYTES: usize = 20_000_000;

/// Errors raised while opening or reading a CSV file.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
    #[error("file not found: {}", path.display())]
    NotFound { path: PathBuf },
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
    #[error("No columns to parse from file")]
    NoColumns,
    #[error("CSV parse error: {0}")]
    Csv(#[from] csv::Error),
    #[error("row {row}: expected {expected} fields, found {found}")]
    FieldCount {
        row: u64,
        expected: usize,
        found: usize,
    },
    #[error("could not convert string to float: '{value}' (column {column}, row {row})")]
    Coercion {
        row: u64,
        column: String,
        value: String,
    },
}

/// Iterator over the chunks of one CSV source.
///
/// Finite and non-restartable: it yields each data row exactly once, in file
/// order, and stops for good after the last chunk or the first error.
pub struct ChunkReader<R: io::Read = File> {
    records: csv::Reader<R>,
    record: csv::StringRecord,
    header: Arc<Header>,
    profile: Arc<ReadProfile>,
    chunk_bytes: usize,
    next_sequence: usize,
    rows_read: u64,
    finished: bool,
}

impl ChunkReader<File> {
    /// Opens `path` and reads its header row.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::NotFound`] if the path does not exist, otherwise
    /// I/O or CSV errors from reading the header.
    pub fn open(path: &Path, profile: Arc<ReadProfile>, chunk_bytes: usize) -> Result<Self, ReadError> {
        if !path.exists() {
            return Err(ReadError::NotFound {
                path: path.to_path_buf(),
            });
        }
        let file = File::open(path)?;
        Self::from_reader(file, profile, chunk_bytes)
    }
}

impl<R: io::Read> ChunkReader<R> {
    /// Wraps any byte source. The first record is taken as the header.
    ///
    /// # Errors
    ///
    /// Returns a CSV error if the header row cannot be read, or
    /// [`ReadError::NoColumns`] if the source has no header at all.
    pub fn from_reader(source: R, profile: Arc<ReadProfile>, chunk_bytes: usize) -> Result<Self, ReadError> {
        let mut records = csv::ReaderBuilder::new().has_headers(true).from_reader(source);
        let names: Vec<String> = records.headers()?.iter().map(str::to_owned).collect();
        if names.is_empty() {
            return Err(ReadError::NoColumns);
        }
        Ok(Self {
            records,
            record: csv::StringRecord::new(),
            header: Arc::new(Header::new(names)),
            profile,
            chunk_bytes: chunk_bytes.max(1),
            next_sequence: 0,
            rows_read: 0,
            finished: false,
        })
    }

    #[must_use]
    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    /// Data rows consumed so far across all yielded chunks.
    #[must_use]
    pub fn rows_read(&self) -> u64 {
        self.rows_read
    }

    fn next_chunk(&mut self) -> Result<Option<Chunk>, ReadError> {
        let mut builder = ChunkBuilder::new(
            Arc::clone(&self.header),
            Arc::clone(&self.profile),
            self.next_sequence,
            self.rows_read,
        );
        let mut bytes = 0;
        while bytes < self.chunk_bytes {
            if !self.records.read_record(&mut self.record)? {
                break;
            }
            // Field bytes plus one delimiter/terminator per field.
            bytes += self.record.as_slice().len() + self.record.len();
            builder.push_row(self.record.iter())?;
            self.rows_read += 1;
        }
        if builder.is_empty() {
            return Ok(None);
        }
        let chunk = builder.finish();
        debug!(
            sequence = chunk.sequence(),
            rows = chunk.len(),
            row_offset = chunk.row_offset(),
            bytes,
            "chunk materialized"
        );
        self.next_sequence += 1;
        Ok(Some(chunk))
    }
}

impl<R: io::Read> Iterator for ChunkReader<R> {
    type Item = Result<Chunk, ReadError>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.finished {
            return None;
        }
        match self.next_chunk() {
            Ok(Some(chunk)) => Some(Ok(chunk)),
            Ok(None) => {
                self.finished = true;
                None
            }
            Err(err) => {
                self.finished = true;
                Some(Err(err))
            }
        }
    }
}
