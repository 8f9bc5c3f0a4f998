//! Columnar, type-coerced slices of a CSV file.
//!
//! A [`Chunk`] holds one contiguous run of data rows. Each column is stored in
//! the representation chosen by the [`ReadProfile`]: free text, a dictionary
//! encoded categorical, `f64`, or normalized dates.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;

use chrono::NaiveDate;

use crate::date::normalize_date;
use crate::reader::ReadError;
use crate::schema::{ColumnKind, Schema};
use crate::types::Cell;

/// Tokens read as missing values, matching common dataframe CSV defaults.
pub const DEFAULT_NA_VALUES: &[&str] = &[
    "", "#N/A", "#N/A N/A", "#NA", "-1.#IND", "-1.#QNAN", "-NaN", "-nan", "1.#IND", "1.#QNAN",
    "<NA>", "N/A", "NA", "NULL", "NaN", "None", "n/a", "nan", "null",
];

// ---------------------------------------------------------------------------
// Header
// ---------------------------------------------------------------------------

/// Column names of a file, with duplicate names made unique.
///
/// A repeated name gets a `.N` suffix (`A`, `A.1`, `A.2`), so every column
/// stays addressable and a schema rule binds to the first occurrence.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Header {
    names: Vec<String>,
    positions: HashMap<String, usize>,
}

impl Header {
    #[must_use]
    pub fn new(raw: Vec<String>) -> Self {
        let mut names = Vec::with_capacity(raw.len());
        let mut positions = HashMap::with_capacity(raw.len());
        for name in raw {
            let mut unique = name.clone();
            let mut suffix = 0;
            while positions.contains_key(&unique) {
                suffix += 1;
                unique = format!("{name}.{suffix}");
            }
            positions.insert(unique.clone(), names.len());
            names.push(unique);
        }
        Self { names, positions }
    }

    #[must_use]
    pub fn names(&self) -> &[String] {
        &self.names
    }

    #[must_use]
    pub fn position(&self, name: &str) -> Option<usize> {
        self.positions.get(name).copied()
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.names.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}

// ---------------------------------------------------------------------------
// ReadProfile
// ---------------------------------------------------------------------------

/// Storage representation chosen for a column during materialization.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Coercion {
    Text,
    Categorical,
    Float,
    Date,
}

/// Per-column coercion plan plus the set of NA tokens.
///
/// Columns without an explicit coercion are read as text.
#[derive(Debug, Clone)]
pub struct ReadProfile {
    coercions: HashMap<String, Coercion>,
    na_values: HashSet<String>,
}

impl ReadProfile {
    /// Empty profile with the default NA tokens.
    #[must_use]
    pub fn new() -> Self {
        Self {
            coercions: HashMap::new(),
            na_values: DEFAULT_NA_VALUES.iter().map(|s| (*s).to_string()).collect(),
        }
    }

    /// Profile derived from a schema's kinds: numbers become floats and
    /// timestamps become dates.
    #[must_use]
    pub fn from_schema(schema: &Schema) -> Self {
        let mut profile = Self::new();
        for rule in schema.rules() {
            let coercion = match rule.kind {
                ColumnKind::Text => continue,
                ColumnKind::Number => Coercion::Float,
                ColumnKind::Timestamp => Coercion::Date,
            };
            profile.coercions.insert(rule.name.clone(), coercion);
        }
        profile
    }

    #[must_use]
    pub fn categorical<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(columns, Coercion::Categorical)
    }

    #[must_use]
    pub fn floats<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(columns, Coercion::Float)
    }

    #[must_use]
    pub fn dates<I, S>(self, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.with(columns, Coercion::Date)
    }

    /// Replaces the NA token set.
    #[must_use]
    pub fn na_values<I, S>(mut self, tokens: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.na_values = tokens.into_iter().map(Into::into).collect();
        self
    }

    fn with<I, S>(mut self, columns: I, coercion: Coercion) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for column in columns {
            self.coercions.insert(column.into(), coercion);
        }
        self
    }

    #[must_use]
    pub fn coercion(&self, column: &str) -> Coercion {
        self.coercions.get(column).copied().unwrap_or(Coercion::Text)
    }

    #[must_use]
    pub fn is_na(&self, raw: &str) -> bool {
        self.na_values.contains(raw)
    }
}

impl Default for ReadProfile {
    fn default() -> Self {
        Self::new()
    }
}

// ---------------------------------------------------------------------------
// Column storage
// ---------------------------------------------------------------------------

/// Dictionary-encoded text column: each distinct value is stored once.
#[derive(Debug, Clone, PartialEq)]
pub struct Categorical {
    categories: Vec<String>,
    codes: Vec<Option<u32>>,
}

impl Categorical {
    #[must_use]
    pub fn categories(&self) -> &[String] {
        &self.categories
    }

    #[must_use]
    pub fn codes(&self) -> &[Option<u32>] {
        &self.codes
    }

    #[must_use]
    pub fn category(&self, code: u32) -> &str {
        &self.categories[code as usize]
    }
}

/// One materialized column of a chunk.
#[derive(Debug, Clone, PartialEq)]
pub enum ColumnData {
    Text(Vec<Option<String>>),
    Categorical(Categorical),
    Float(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnData {
    #[must_use]
    pub fn len(&self) -> usize {
        match self {
            ColumnData::Text(v) => v.len(),
            ColumnData::Categorical(c) => c.codes.len(),
            ColumnData::Float(v) => v.len(),
            ColumnData::Date(v) => v.len(),
        }
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Cell at `row`.
    ///
    /// # Panics
    ///
    /// Panics if `row` is out of bounds.
    #[must_use]
    pub fn get(&self, row: usize) -> Cell<'_> {
        match self {
            ColumnData::Text(v) => v[row].as_deref().map_or(Cell::Null, Cell::Text),
            ColumnData::Categorical(c) => c.codes[row].map_or(Cell::Null, |code| Cell::Text(c.category(code))),
            ColumnData::Float(v) => v[row].map_or(Cell::Null, Cell::Number),
            ColumnData::Date(v) => v[row].map_or(Cell::Null, Cell::Date),
        }
    }
}

enum ColumnBuilder {
    Text(Vec<Option<String>>),
    Categorical {
        lookup: HashMap<String, u32>,
        categories: Vec<String>,
        codes: Vec<Option<u32>>,
    },
    Float(Vec<Option<f64>>),
    Date(Vec<Option<NaiveDate>>),
}

impl ColumnBuilder {
    fn new(coercion: Coercion) -> Self {
        match coercion {
            Coercion::Text => ColumnBuilder::Text(Vec::new()),
            Coercion::Categorical => ColumnBuilder::Categorical {
                lookup: HashMap::new(),
                categories: Vec::new(),
                codes: Vec::new(),
            },
            Coercion::Float => ColumnBuilder::Float(Vec::new()),
            Coercion::Date => ColumnBuilder::Date(Vec::new()),
        }
    }

    /// Appends one field. `raw` is `None` for a missing value. Returns the raw
    /// text back when it cannot be coerced.
    fn push<'r>(&mut self, raw: Option<&'r str>) -> Result<(), &'r str> {
        match self {
            ColumnBuilder::Text(v) => v.push(raw.map(str::to_owned)),
            ColumnBuilder::Categorical {
                lookup,
                categories,
                codes,
            } => {
                let code = raw.map(|value| {
                    if let Some(code) = lookup.get(value) {
                        *code
                    } else {
                        #[allow(clippy::cast_possible_truncation)]
                        let code = categories.len() as u32;
                        categories.push(value.to_owned());
                        lookup.insert(value.to_owned(), code);
                        code
                    }
                });
                codes.push(code);
            }
            ColumnBuilder::Float(v) => match raw {
                None => v.push(None),
                Some(text) => {
                    let value = text.trim().parse::<f64>().map_err(|_| text)?;
                    v.push(if value.is_nan() { None } else { Some(value) });
                }
            },
            ColumnBuilder::Date(v) => v.push(raw.and_then(|text| normalize_date(Cell::Text(text)))),
        }
        Ok(())
    }

    fn finish(self) -> ColumnData {
        match self {
            ColumnBuilder::Text(v) => ColumnData::Text(v),
            ColumnBuilder::Categorical {
                categories, codes, ..
            } => ColumnData::Categorical(Categorical { categories, codes }),
            ColumnBuilder::Float(v) => ColumnData::Float(v),
            ColumnBuilder::Date(v) => ColumnData::Date(v),
        }
    }
}

// ---------------------------------------------------------------------------
// Chunk
// ---------------------------------------------------------------------------

/// A contiguous run of data rows, materialized column by column.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    sequence: usize,
    row_offset: u64,
    rows: usize,
    header: Arc<Header>,
    columns: Vec<ColumnData>,
}

impl Chunk {
    /// Submission order of this chunk within its file, starting at 0.
    #[must_use]
    pub fn sequence(&self) -> usize {
        self.sequence
    }

    /// Global index of this chunk's first data row.
    #[must_use]
    pub fn row_offset(&self) -> u64 {
        self.row_offset
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[must_use]
    pub fn header(&self) -> &Arc<Header> {
        &self.header
    }

    #[must_use]
    pub fn column(&self, name: &str) -> Option<&ColumnData> {
        self.header.position(name).map(|i| &self.columns[i])
    }
}

/// Accumulates raw rows and coerces them into a [`Chunk`].
pub struct ChunkBuilder {
    sequence: usize,
    row_offset: u64,
    rows: usize,
    header: Arc<Header>,
    profile: Arc<ReadProfile>,
    columns: Vec<ColumnBuilder>,
}

impl ChunkBuilder {
    #[must_use]
    pub fn new(header: Arc<Header>, profile: Arc<ReadProfile>, sequence: usize, row_offset: u64) -> Self {
        let columns = header
            .names()
            .iter()
            .map(|name| ColumnBuilder::new(profile.coercion(name)))
            .collect();
        Self {
            sequence,
            row_offset,
            rows: 0,
            header,
            profile,
            columns,
        }
    }

    /// Appends one row of raw fields.
    ///
    /// # Errors
    ///
    /// Returns [`ReadError::FieldCount`] if the row width differs from the
    /// header, or [`ReadError::Coercion`] if a float column holds text that is
    /// not a number. The builder must not be reused after an error.
    pub fn push_row<'r, I>(&mut self, fields: I) -> Result<(), ReadError>
    where
        I: IntoIterator<Item = &'r str>,
    {
        let row = self.row_offset + self.rows as u64;
        let mut found = 0;
        for raw in fields {
            let Some(column) = self.columns.get_mut(found) else {
                found += 1;
                continue;
            };
            let value = if self.profile.is_na(raw) { None } else { Some(raw) };
            column.push(value).map_err(|value| ReadError::Coercion {
                row,
                column: self.header.names()[found].clone(),
                value: value.to_owned(),
            })?;
            found += 1;
        }
        if found != self.columns.len() {
            return Err(ReadError::FieldCount {
                row,
                expected: self.columns.len(),
                found,
            });
        }
        self.rows += 1;
        Ok(())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rows
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rows == 0
    }

    #[must_use]
    pub fn finish(self) -> Chunk {
        Chunk {
            sequence: self.sequence,
            row_offset: self.row_offset,
            rows: self.rows,
            header: self.header,
            columns: self.columns.into_iter().map(ColumnBuilder::finish).collect(),
        }
    }
}
