//! Heuristic normalizer for ambiguous date text.
//!
//! Claims exports mix `01/02/2023` and `01-02-2023`. Both are read as
//! month/day/year; anything else degrades to a missing date instead of an
//! error, so a single malformed date never fails a whole file.

use chrono::NaiveDate;

use crate::types::Cell;

/// Format every normalized date string is parsed with.
pub const DATE_FORMAT: &str = "%m/%d/%Y";

/// Normalizes a raw cell into a calendar date.
///
/// Only text cells are considered. Already-typed dates, numbers and nulls
/// yield `None`, as does text that does not parse.
#[must_use]
pub fn normalize_date(cell: Cell<'_>) -> Option<NaiveDate> {
    match cell {
        Cell::Text(raw) => parse_date_text(raw),
        _ => None,
    }
}

/// Parses `month/day/year` text, accepting `-` as the separator.
///
/// `/` wins when both separators appear, so `01/02-2023` is rejected rather
/// than rewritten. The year must be written with four digits.
#[must_use]
pub fn parse_date_text(raw: &str) -> Option<NaiveDate> {
    let text = if raw.contains('/') {
        raw.to_owned()
    } else if raw.contains('-') {
        raw.replace('-', "/")
    } else {
        return None;
    };
    if !has_four_digit_year(&text) {
        return None;
    }
    NaiveDate::parse_from_str(&text, DATE_FORMAT).ok()
}

// chrono's `%Y` also takes one to three digit years.
fn has_four_digit_year(text: &str) -> bool {
    text.rsplit('/')
        .next()
        .is_some_and(|year| year.len() == 4 && year.bytes().all(|b| b.is_ascii_digit()))
}
