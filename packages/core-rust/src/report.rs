//! Merging per-chunk results into one validation report.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::Violation;

/// Outcome of one validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ReportStatus {
    /// Every chunk validated cleanly.
    Success,
    /// At least one violation was found.
    Errors,
    /// Processing failed; no violations are reported.
    Failure,
}

impl ReportStatus {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            ReportStatus::Success => "success",
            ReportStatus::Errors => "errors",
            ReportStatus::Failure => "failure",
        }
    }
}

/// Final, immutable result of validating one file.
#[derive(Debug, Clone, PartialEq)]
pub struct ValidationReport {
    status: ReportStatus,
    violations: Vec<Violation>,
    error: Option<String>,
    elapsed: Duration,
}

impl ValidationReport {
    /// `Success` when `violations` is empty, `Errors` otherwise.
    #[must_use]
    pub fn from_violations(violations: Vec<Violation>, elapsed: Duration) -> Self {
        let status = if violations.is_empty() {
            ReportStatus::Success
        } else {
            ReportStatus::Errors
        };
        Self {
            status,
            violations,
            error: None,
            elapsed,
        }
    }

    #[must_use]
    pub fn failure(message: impl Into<String>, elapsed: Duration) -> Self {
        Self {
            status: ReportStatus::Failure,
            violations: Vec::new(),
            error: Some(message.into()),
            elapsed,
        }
    }

    #[must_use]
    pub fn status(&self) -> ReportStatus {
        self.status
    }

    #[must_use]
    pub fn violations(&self) -> &[Violation] {
        &self.violations
    }

    /// Failure message; `None` unless the status is `Failure`.
    #[must_use]
    pub fn error(&self) -> Option<&str> {
        self.error.as_deref()
    }

    #[must_use]
    pub fn elapsed(&self) -> Duration {
        self.elapsed
    }
}

/// Collects per-chunk violation lists as they complete and concatenates them
/// in submission order.
///
/// The merge is a plain concatenation: no de-duplication and no re-indexing.
/// Column-level violations from the header check come first.
#[derive(Debug, Default)]
pub struct Aggregator {
    header: Vec<Violation>,
    chunks: Vec<(usize, Vec<Violation>)>,
}

impl Aggregator {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_header(header: Vec<Violation>) -> Self {
        Self {
            header,
            chunks: Vec::new(),
        }
    }

    /// Records the result of the chunk with submission number `sequence`.
    pub fn add(&mut self, sequence: usize, violations: Vec<Violation>) {
        self.chunks.push((sequence, violations));
    }

    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.chunks.len()
    }

    /// Concatenates header violations and chunk results ordered by sequence.
    #[must_use]
    pub fn finish(mut self) -> Vec<Violation> {
        self.chunks.sort_by_key(|(sequence, _)| *sequence);
        let total = self.header.len() + self.chunks.iter().map(|(_, v)| v.len()).sum::<usize>();
        let mut merged = Vec::with_capacity(total);
        merged.append(&mut self.header);
        for (_, mut violations) in self.chunks {
            merged.append(&mut violations);
        }
        merged
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn v(index: u64, column: &str) -> Violation {
        Violation::at_row(index, column, "check", serde_json::Value::Null)
    }

    #[test]
    fn finish_orders_by_sequence_not_arrival() {
        let mut agg = Aggregator::new();
        agg.add(2, vec![v(20, "C")]);
        agg.add(0, vec![v(0, "A"), v(1, "A")]);
        agg.add(1, vec![]);
        assert_eq!(agg.chunk_count(), 3);

        let merged = agg.finish();
        let indices: Vec<_> = merged.iter().map(|x| x.index).collect();
        assert_eq!(indices, vec![Some(0), Some(1), Some(20)]);
    }

    #[test]
    fn header_violations_come_first() {
        let header = vec![Violation::for_column("MISSING", "column_in_dataframe", "MISSING".into())];
        let mut agg = Aggregator::with_header(header);
        agg.add(0, vec![v(0, "A")]);
        let merged = agg.finish();
        assert_eq!(merged[0].column, "MISSING");
        assert_eq!(merged[1].column, "A");
    }

    #[test]
    fn duplicates_are_kept() {
        let mut agg = Aggregator::new();
        agg.add(0, vec![v(0, "A")]);
        agg.add(1, vec![v(0, "A")]);
        assert_eq!(agg.finish().len(), 2);
    }

    #[test]
    fn empty_merge_is_success() {
        let report = ValidationReport::from_violations(Aggregator::new().finish(), Duration::from_millis(5));
        assert_eq!(report.status(), ReportStatus::Success);
        assert!(report.violations().is_empty());
        assert!(report.error().is_none());
        assert_eq!(report.elapsed(), Duration::from_millis(5));
    }

    #[test]
    fn non_empty_merge_is_errors() {
        let report = ValidationReport::from_violations(vec![v(0, "A")], Duration::ZERO);
        assert_eq!(report.status(), ReportStatus::Errors);
        assert_eq!(report.violations().len(), 1);
    }

    #[test]
    fn failure_carries_message_and_no_violations() {
        let report = ValidationReport::failure("CSV parse error", Duration::from_secs(1));
        assert_eq!(report.status(), ReportStatus::Failure);
        assert_eq!(report.error(), Some("CSV parse error"));
        assert!(report.violations().is_empty());
        assert_eq!(report.status().as_str(), "failure");
    }
}
