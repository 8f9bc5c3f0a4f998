use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// Borrowed view of a single materialized cell.
///
/// Chunks store columns in typed buffers; a `Cell` is what the schema sees
/// when it walks one row of one column. Text cells borrow from the chunk, so
/// validating a column allocates nothing for values that pass.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Cell<'a> {
    /// Missing value (empty field or a recognized NA marker).
    Null,
    /// Free-form or categorical text.
    Text(&'a str),
    /// Floating-point value from an amount column.
    Number(f64),
    /// Calendar date produced by the date normalizer.
    Date(NaiveDate),
}

impl Cell<'_> {
    /// Returns `true` for `Cell::Null`.
    #[must_use]
    pub fn is_null(&self) -> bool {
        matches!(self, Cell::Null)
    }

    /// Numeric reading of the cell.
    ///
    /// Numbers are returned as-is (NaN excluded); text is parsed after
    /// trimming. Dates and nulls have no numeric reading.
    #[must_use]
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Cell::Number(n) if !n.is_nan() => Some(*n),
            Cell::Text(s) => s.trim().parse::<f64>().ok().filter(|n| !n.is_nan()),
            _ => None,
        }
    }

    /// Converts the cell into the JSON value reported as a failure case.
    ///
    /// Non-finite numbers have no JSON representation and are reported as
    /// their display string.
    #[must_use]
    pub fn to_json(&self) -> serde_json::Value {
        match self {
            Cell::Null => serde_json::Value::Null,
            Cell::Text(s) => serde_json::Value::String((*s).to_string()),
            Cell::Number(n) => serde_json::Number::from_f64(*n)
                .map_or_else(|| serde_json::Value::String(n.to_string()), serde_json::Value::Number),
            Cell::Date(d) => serde_json::Value::String(d.format("%Y-%m-%d").to_string()),
        }
    }
}

/// Stringified form used by pattern and custom checks.
impl fmt::Display for Cell<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Cell::Null => Ok(()),
            Cell::Text(s) => f.write_str(s),
            Cell::Number(n) => write!(f, "{n}"),
            Cell::Date(d) => write!(f, "{}", d.format("%Y-%m-%d")),
        }
    }
}

/// A single rule failure for one cell (or, for header checks, one column).
///
/// Serializes to the `{"index", "column", "check", "error"}` object returned
/// by the HTTP endpoint.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Violation {
    /// Row index of the failing cell. `None` for column-level failures.
    pub index: Option<u64>,
    /// Column the failing rule belongs to.
    pub column: String,
    /// Name of the rule that failed, e.g. `not_nullable`.
    pub check: String,
    /// The offending raw value; JSON null when the value is missing.
    pub error: serde_json::Value,
}

impl Violation {
    /// Creates a row-level violation.
    #[must_use]
    pub fn at_row(
        index: u64,
        column: impl Into<String>,
        check: impl Into<String>,
        error: serde_json::Value,
    ) -> Self {
        Self {
            index: Some(index),
            column: column.into(),
            check: check.into(),
            error,
        }
    }

    /// Creates a column-level violation that has no row.
    #[must_use]
    pub fn for_column(
        column: impl Into<String>,
        check: impl Into<String>,
        error: serde_json::Value,
    ) -> Self {
        Self {
            index: None,
            column: column.into(),
            check: check.into(),
            error,
        }
    }

    /// Shifts the row index by `offset`. Column-level violations are unchanged.
    #[must_use]
    pub fn shifted(mut self, offset: u64) -> Self {
        if let Some(index) = self.index.as_mut() {
            *index += offset;
        }
        self
    }
}
