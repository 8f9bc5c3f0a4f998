//! End-to-end validation of one CSV file.
//!
//! Pipeline:
//! 1. **Precondition**: the path must be non-empty and exist.
//! 2. **Read**: a blocking task streams chunks into a bounded channel.
//! 3. **Validate**: each chunk is handed to the [`ChunkWorkerPool`].
//! 4. **Barrier**: every worker is joined before anything is reported.
//! 5. **Aggregate**: results are merged in submission order.
//!
//! Processing failures never escape `run`; they become a `Failure` report.

use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Instant;

use csvcheck_core::{
    Aggregator, Chunk, ChunkReader, ChunkValidator, ReadError, ReadProfile, ReportStatus, Schema,
    ValidationReport, Violation,
};
use tokio::sync::mpsc;
use tracing::{info, warn};

use super::config::ValidationConfig;
use super::worker::{ChunkWorkerPool, PoolError};

/// Errors that stop a validation run.
///
/// `MissingPath` and `NotFound` are precondition failures reported to the
/// client; the rest are processing failures folded into a `Failure` report.
#[derive(Debug, thiserror::Error)]
pub enum ValidateError {
    #[error("File path not provided")]
    MissingPath,
    #[error("File not found")]
    NotFound { path: PathBuf },
    #[error(transparent)]
    Read(#[from] ReadError),
    #[error(transparent)]
    Pool(#[from] PoolError),
    #[error("reader task failed: {0}")]
    Reader(#[from] tokio::task::JoinError),
}

/// Drives reader, worker pool, and aggregator for one file at a time.
///
/// Holds only immutable, shared state, so one orchestrator serves concurrent
/// requests.
#[derive(Debug)]
pub struct ValidationOrchestrator {
    validator: Arc<ChunkValidator>,
    profile: Arc<ReadProfile>,
    config: ValidationConfig,
}

impl ValidationOrchestrator {
    #[must_use]
    pub fn new(schema: Arc<Schema>, profile: Arc<ReadProfile>, config: ValidationConfig) -> Self {
        let validator = Arc::new(ChunkValidator::new(schema, config.row_indexing));
        Self {
            validator,
            profile,
            config,
        }
    }

    #[must_use]
    pub fn schema(&self) -> &Arc<Schema> {
        self.validator.schema()
    }

    #[must_use]
    pub fn config(&self) -> &ValidationConfig {
        &self.config
    }

    /// Resolves a client-supplied path.
    ///
    /// # Errors
    ///
    /// [`ValidateError::MissingPath`] for a missing or empty path,
    /// [`ValidateError::NotFound`] if nothing exists at it.
    pub fn check_path(raw: Option<&str>) -> Result<PathBuf, ValidateError> {
        let raw = raw.filter(|p| !p.is_empty()).ok_or(ValidateError::MissingPath)?;
        let path = PathBuf::from(raw);
        if path.exists() {
            Ok(path)
        } else {
            Err(ValidateError::NotFound { path })
        }
    }

    /// Validates the file at `path` and returns the finished report.
    ///
    /// Never fails: processing errors are reported as `Failure` with the
    /// elapsed time.
    pub async fn run(&self, path: &Path) -> ValidationReport {
        let started = Instant::now();
        info!(path = %path.display(), "validation started");

        let report = match self.scan(path).await {
            Ok(violations) => ValidationReport::from_violations(violations, started.elapsed()),
            Err(err) => {
                warn!(path = %path.display(), error = %err, "validation failed");
                ValidationReport::failure(err.to_string(), started.elapsed())
            }
        };

        record_metrics(&report);
        info!(
            path = %path.display(),
            status = report.status().as_str(),
            violations = report.violations().len(),
            elapsed_ms = u64::try_from(report.elapsed().as_millis()).unwrap_or(u64::MAX),
            "validation finished"
        );
        report
    }

    async fn scan(&self, path: &Path) -> Result<Vec<Violation>, ValidateError> {
        if !path.exists() {
            return Err(ValidateError::NotFound {
                path: path.to_path_buf(),
            });
        }

        let owned = path.to_path_buf();
        let profile = Arc::clone(&self.profile);
        let chunk_bytes = self.config.chunk_bytes;
        let reader =
            tokio::task::spawn_blocking(move || ChunkReader::open(&owned, profile, chunk_bytes))
                .await??;

        let header_violations = self.validator.schema().check_columns(reader.header());

        let (tx, mut rx) = mpsc::channel::<Result<Chunk, ReadError>>(self.config.queue_depth.max(1));
        let producer = tokio::task::spawn_blocking(move || {
            for item in reader {
                let failed = item.is_err();
                if tx.blocking_send(item).is_err() || failed {
                    break;
                }
            }
        });

        let mut pool = ChunkWorkerPool::new(Arc::clone(&self.validator), self.config.workers);
        let mut read_failure = None;
        while let Some(item) = rx.recv().await {
            match item {
                Ok(chunk) => pool.submit(chunk).await?,
                Err(err) => {
                    read_failure = Some(err);
                    break;
                }
            }
        }
        // Unblocks the producer if we stopped early.
        drop(rx);

        let chunks = pool.submitted();
        let results = pool.join().await;
        producer.await?;
        if let Some(err) = read_failure {
            return Err(err.into());
        }

        let mut aggregator = Aggregator::with_header(header_violations);
        for (sequence, violations) in results? {
            aggregator.add(sequence, violations);
        }
        metrics::counter!("csvcheck_chunks_total").increment(chunks as u64);
        Ok(aggregator.finish())
    }
}

fn record_metrics(report: &ValidationReport) {
    metrics::counter!("csvcheck_validations_total", "status" => report.status().as_str()).increment(1);
    metrics::histogram!("csvcheck_validation_seconds").record(report.elapsed().as_secs_f64());
    if report.status() == ReportStatus::Errors {
        metrics::counter!("csvcheck_violations_total").increment(report.violations().len() as u64);
    }
}

#[cfg(test)]
mod tests {
    use std::io::Write;

    use csvcheck_core::claims::{self, COLUMNS};
    use csvcheck_core::schema::COLUMN_IN_DATAFRAME;
    use csvcheck_core::{ColumnKind, RowIndexing};
    use tempfile::NamedTempFile;

    use super::*;

    fn claims_orchestrator(config: ValidationConfig) -> ValidationOrchestrator {
        let schema = claims::claims_schema().unwrap();
        let profile = claims::claims_profile(&schema);
        ValidationOrchestrator::new(Arc::new(schema), Arc::new(profile), config)
    }

    fn small_chunks() -> ValidationConfig {
        ValidationConfig {
            chunk_bytes: 512,
            workers: 3,
            queue_depth: 1,
            row_indexing: RowIndexing::Global,
        }
    }

    fn valid_value(column: &str) -> String {
        match claims::column_kind(column) {
            ColumnKind::Timestamp => "03-15-2023".to_string(),
            ColumnKind::Number => "42.5".to_string(),
            ColumnKind::Text => "X_1".to_string(),
        }
    }

    /// Writes a claims CSV with `rows` valid rows, applying `edit` to each
    /// row's (column, value) pairs first.
    fn claims_file(rows: usize, edit: impl Fn(usize, &str, String) -> String) -> NamedTempFile {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", COLUMNS.join(",")).unwrap();
        for row in 0..rows {
            let fields: Vec<String> = COLUMNS
                .iter()
                .map(|&c| edit(row, c, valid_value(c)))
                .collect();
            writeln!(file, "{}", fields.join(",")).unwrap();
        }
        file.flush().unwrap();
        file
    }

    #[test]
    fn check_path_rejects_missing_and_empty() {
        assert!(matches!(
            ValidationOrchestrator::check_path(None),
            Err(ValidateError::MissingPath)
        ));
        assert!(matches!(
            ValidationOrchestrator::check_path(Some("")),
            Err(ValidateError::MissingPath)
        ));
        let err = ValidationOrchestrator::check_path(Some("/no/such/file.csv")).unwrap_err();
        assert!(matches!(err, ValidateError::NotFound { .. }));
        assert_eq!(err.to_string(), "File not found");
    }

    #[tokio::test]
    async fn all_valid_file_is_success() {
        let file = claims_file(200, |_, _, v| v);
        let report = claims_orchestrator(small_chunks()).run(file.path()).await;
        assert_eq!(report.status(), ReportStatus::Success, "{:?}", report.error());
        assert!(report.violations().is_empty());
    }

    #[tokio::test]
    async fn single_negative_covered_amount_is_one_error() {
        let file = claims_file(50, |row, col, v| {
            if row == 37 && col == "COVERED_AMOUNT" {
                "-1.25".to_string()
            } else {
                v
            }
        });
        let report = claims_orchestrator(small_chunks()).run(file.path()).await;
        assert_eq!(report.status(), ReportStatus::Errors);
        assert_eq!(report.violations().len(), 1);
        let v = &report.violations()[0];
        assert_eq!(v.column, "COVERED_AMOUNT");
        assert_eq!(v.index, Some(37));
    }

    #[tokio::test]
    async fn violations_follow_file_order_across_chunks() {
        let file = claims_file(120, |row, col, v| {
            if row % 10 == 0 && col == "CLAIM_STATUS" {
                "bad value".to_string()
            } else {
                v
            }
        });
        let report = claims_orchestrator(small_chunks()).run(file.path()).await;
        let rows: Vec<u64> = report.violations().iter().filter_map(|v| v.index).collect();
        assert_eq!(rows, (0..120).step_by(10).collect::<Vec<u64>>());
    }

    #[tokio::test]
    async fn chunk_local_indexing_restarts_per_chunk() {
        let file = claims_file(120, |_, col, v| {
            if col == "CLAIM_TYPE" {
                "bad value".to_string()
            } else {
                v
            }
        });
        let config = ValidationConfig {
            row_indexing: RowIndexing::ChunkLocal,
            ..small_chunks()
        };
        let report = claims_orchestrator(config).run(file.path()).await;
        assert_eq!(report.violations().len(), 120);
        let zeros = report.violations().iter().filter(|v| v.index == Some(0)).count();
        assert!(zeros > 1, "each chunk restarts at row 0");
    }

    #[tokio::test]
    async fn missing_declared_column_reported_once() {
        let mut file = NamedTempFile::new().unwrap();
        let header: Vec<&str> = COLUMNS.iter().copied().filter(|c| *c != "NETWORK").collect();
        writeln!(file, "{}", header.join(",")).unwrap();
        for _ in 0..40 {
            let row: Vec<String> = header.iter().map(|c| valid_value(c)).collect();
            writeln!(file, "{}", row.join(",")).unwrap();
        }
        file.flush().unwrap();

        let report = claims_orchestrator(small_chunks()).run(file.path()).await;
        assert_eq!(report.violations().len(), 1);
        assert_eq!(report.violations()[0].column, "NETWORK");
        assert_eq!(report.violations()[0].check, COLUMN_IN_DATAFRAME);
        assert_eq!(report.violations()[0].index, None);
    }

    #[tokio::test]
    async fn unparseable_amount_is_a_failure_report() {
        let file = claims_file(30, |row, col, v| {
            if row == 25 && col == "CHARGED_AMOUNT" {
                "twelve".to_string()
            } else {
                v
            }
        });
        let report = claims_orchestrator(small_chunks()).run(file.path()).await;
        assert_eq!(report.status(), ReportStatus::Failure);
        assert!(report.violations().is_empty());
        assert!(report.error().unwrap().contains("twelve"));
    }

    #[tokio::test]
    async fn ragged_row_is_a_failure_report() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "EMPLOYER_ID,COVERED_AMOUNT").unwrap();
        writeln!(file, "E1,1").unwrap();
        writeln!(file, "E2").unwrap();
        file.flush().unwrap();

        let report = claims_orchestrator(small_chunks()).run(file.path()).await;
        assert_eq!(report.status(), ReportStatus::Failure);
    }

    #[tokio::test]
    async fn vanished_file_is_a_failure_report() {
        let report = claims_orchestrator(small_chunks())
            .run(Path::new("/no/such/file.csv"))
            .await;
        assert_eq!(report.status(), ReportStatus::Failure);
        assert_eq!(report.error(), Some("File not found"));
    }

    #[tokio::test]
    async fn header_only_file_is_success() {
        let mut file = NamedTempFile::new().unwrap();
        writeln!(file, "{}", COLUMNS.join(",")).unwrap();
        file.flush().unwrap();
        let report = claims_orchestrator(ValidationConfig::default()).run(file.path()).await;
        assert_eq!(report.status(), ReportStatus::Success);
    }

    #[tokio::test]
    async fn empty_file_is_a_failure_report() {
        let file = NamedTempFile::new().unwrap();
        let report = claims_orchestrator(small_chunks()).run(file.path()).await;
        assert_eq!(report.status(), ReportStatus::Failure);
        assert!(report.violations().is_empty());
        assert_eq!(report.error(), Some("No columns to parse from file"));
    }
}
