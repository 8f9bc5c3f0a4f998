//! Declarative column schema and batch rule evaluation.
//!
//! A [`Schema`] is an ordered list of [`ColumnRule`]s. Each rule declares the
//! column's kind, whether it may hold nulls, and a list of [`Constraint`]s.
//! Validation is lazy: every rule is evaluated against every row of a chunk
//! and all failures are returned together.

use std::collections::HashSet;
use std::fmt;
use std::path::{Path, PathBuf};

use regex::Regex;
use serde::{Deserialize, Deserializer, Serialize, Serializer};

use crate::chunk::{Chunk, ColumnData, Header};
use crate::types::{Cell, Violation};

/// Check name reported for a missing value in a non-nullable column.
pub const NOT_NULLABLE: &str = "not_nullable";

/// Check name reported for a declared column absent from the file header.
pub const COLUMN_IN_DATAFRAME: &str = "column_in_dataframe";

/// Errors raised while building or loading a schema.
#[derive(Debug, thiserror::Error)]
pub enum SchemaError {
    #[error("duplicate rule for column {name}")]
    DuplicateColumn { name: String },
    #[error("range check on column {column} has min {min} greater than max {max}")]
    InvertedRange { column: String, min: f64, max: f64 },
    #[error("invalid pattern: {0}")]
    Pattern(#[from] regex::Error),
    #[error("invalid schema definition: {0}")]
    Json(#[from] serde_json::Error),
    #[error("cannot read schema file {}: {source}", path.display())]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

// ---------------------------------------------------------------------------
// Column kinds
// ---------------------------------------------------------------------------

/// Declared logical type of a column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ColumnKind {
    Text,
    Number,
    Timestamp,
}

impl ColumnKind {
    /// Returns whether a non-null cell has the representation this kind expects.
    #[must_use]
    pub fn accepts(self, cell: Cell<'_>) -> bool {
        matches!(
            (self, cell),
            (ColumnKind::Text, Cell::Text(_))
                | (ColumnKind::Number, Cell::Number(_))
                | (ColumnKind::Timestamp, Cell::Date(_))
        )
    }

    /// Name of the dtype check reported when a cell has the wrong representation.
    #[must_use]
    pub fn dtype_check(self) -> &'static str {
        match self {
            ColumnKind::Text => "dtype('str')",
            ColumnKind::Number => "dtype('float64')",
            ColumnKind::Timestamp => "dtype('datetime64[ns]')",
        }
    }
}

// ---------------------------------------------------------------------------
// Constraints
// ---------------------------------------------------------------------------

/// Compiled regular expression that serializes as its source text.
#[derive(Debug, Clone)]
pub struct Pattern(Regex);

impl Pattern {
    /// Compiles `source` into a pattern.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Pattern`] if `source` is not a valid regex.
    pub fn new(source: &str) -> Result<Self, SchemaError> {
        Ok(Self(Regex::new(source)?))
    }

    #[must_use]
    pub fn as_str(&self) -> &str {
        self.0.as_str()
    }

    #[must_use]
    pub fn is_match(&self, text: &str) -> bool {
        self.0.is_match(text)
    }
}

impl PartialEq for Pattern {
    fn eq(&self, other: &Self) -> bool {
        self.as_str() == other.as_str()
    }
}

impl Serialize for Pattern {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for Pattern {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let source = String::deserialize(deserializer)?;
        Pattern::new(&source).map_err(serde::de::Error::custom)
    }
}

/// Named predicates outside the regex/range families.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "name", rename_all = "snake_case")]
pub enum CustomCheck {
    /// Value must contain at least one non-whitespace character.
    NotBlank,
    /// Value must be at most `limit` characters long.
    MaxLength { limit: usize },
    /// Value must equal one of `values` exactly.
    OneOf { values: Vec<String> },
}

impl CustomCheck {
    fn holds(&self, text: &str) -> bool {
        match self {
            CustomCheck::NotBlank => !text.trim().is_empty(),
            CustomCheck::MaxLength { limit } => text.chars().count() <= *limit,
            CustomCheck::OneOf { values } => values.iter().any(|v| v == text),
        }
    }
}

/// A single rule applied to every non-null value of a column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Constraint {
    /// The stringified value must match `pattern`.
    Matches { pattern: Pattern },
    /// The value must be numeric and within the inclusive bounds.
    Range {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        min: Option<f64>,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        max: Option<f64>,
    },
    /// A named predicate over the stringified value.
    Custom { check: CustomCheck },
}

impl Constraint {
    /// Pattern constraint.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Pattern`] if `pattern` does not compile.
    pub fn matches(pattern: &str) -> Result<Self, SchemaError> {
        Ok(Constraint::Matches {
            pattern: Pattern::new(pattern)?,
        })
    }

    /// `value >= 0`.
    #[must_use]
    pub fn non_negative() -> Self {
        Constraint::Range {
            min: Some(0.0),
            max: None,
        }
    }

    /// Returns whether a non-null cell satisfies the constraint.
    #[must_use]
    pub fn holds(&self, cell: Cell<'_>) -> bool {
        match self {
            Constraint::Matches { pattern } => match cell {
                Cell::Text(text) => pattern.is_match(text),
                other => pattern.is_match(&other.to_string()),
            },
            Constraint::Range { min, max } => cell.as_f64().is_some_and(|value| {
                min.is_none_or(|lo| value >= lo) && max.is_none_or(|hi| value <= hi)
            }),
            Constraint::Custom { check } => match cell {
                Cell::Text(text) => check.holds(text),
                other => check.holds(&other.to_string()),
            },
        }
    }
}

/// Check name, as reported in each violation's `check` field.
impl fmt::Display for Constraint {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Constraint::Matches { pattern } => write!(f, "str_matches('{}')", pattern.as_str()),
            Constraint::Range {
                min: Some(lo),
                max: Some(hi),
            } => write!(f, "in_range({lo}, {hi})"),
            Constraint::Range {
                min: Some(lo),
                max: None,
            } => write!(f, "greater_than_or_equal_to({lo})"),
            Constraint::Range {
                min: None,
                max: Some(hi),
            } => write!(f, "less_than_or_equal_to({hi})"),
            Constraint::Range {
                min: None,
                max: None,
            } => f.write_str("is_number"),
            Constraint::Custom { check } => match check {
                CustomCheck::NotBlank => f.write_str("not_blank"),
                CustomCheck::MaxLength { limit } => write!(f, "str_length(max={limit})"),
                CustomCheck::OneOf { values } => write!(f, "isin({values:?})"),
            },
        }
    }
}

// ---------------------------------------------------------------------------
// ColumnRule
// ---------------------------------------------------------------------------

fn default_required() -> bool {
    true
}

/// Validation rule for one named column.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ColumnRule {
    /// Column name as it appears in the file header.
    pub name: String,
    /// Declared logical type.
    pub kind: ColumnKind,
    /// Whether missing values are allowed.
    #[serde(default)]
    pub nullable: bool,
    /// Whether the column must appear in the file header.
    #[serde(default = "default_required")]
    pub required: bool,
    /// Constraints evaluated in order against every non-null value.
    #[serde(default)]
    pub constraints: Vec<Constraint>,
}

impl ColumnRule {
    /// A required, non-nullable rule with no constraints.
    #[must_use]
    pub fn new(name: impl Into<String>, kind: ColumnKind) -> Self {
        Self {
            name: name.into(),
            kind,
            nullable: false,
            required: true,
            constraints: Vec::new(),
        }
    }

    #[must_use]
    pub fn nullable(mut self, nullable: bool) -> Self {
        self.nullable = nullable;
        self
    }

    #[must_use]
    pub fn required(mut self, required: bool) -> Self {
        self.required = required;
        self
    }

    #[must_use]
    pub fn check(mut self, constraint: Constraint) -> Self {
        self.constraints.push(constraint);
        self
    }

    /// Evaluates this rule against one column, appending failures to `out`.
    ///
    /// Order: nullability, dtype, then each constraint; rows ascending within
    /// each pass. Row indices are local to the column.
    fn check_column(&self, column: &ColumnData, out: &mut Vec<Violation>) {
        let rows = column.len();

        if !self.nullable {
            for row in 0..rows {
                if column.get(row).is_null() {
                    out.push(Violation::at_row(
                        row as u64,
                        &self.name,
                        NOT_NULLABLE,
                        serde_json::Value::Null,
                    ));
                }
            }
        }

        for row in 0..rows {
            let cell = column.get(row);
            if !cell.is_null() && !self.kind.accepts(cell) {
                out.push(Violation::at_row(
                    row as u64,
                    &self.name,
                    self.kind.dtype_check(),
                    cell.to_json(),
                ));
            }
        }

        for constraint in &self.constraints {
            let check = constraint.to_string();
            let mut fail = |row: usize, cell: Cell<'_>| {
                out.push(Violation::at_row(row as u64, &self.name, check.as_str(), cell.to_json()));
            };

            match column {
                // Each distinct category is evaluated once.
                ColumnData::Categorical(cat) => {
                    let verdicts: Vec<bool> = cat
                        .categories()
                        .iter()
                        .map(|c| constraint.holds(Cell::Text(c)))
                        .collect();
                    for (row, code) in cat.codes().iter().enumerate() {
                        if let Some(code) = *code {
                            if !verdicts[code as usize] {
                                fail(row, Cell::Text(cat.category(code)));
                            }
                        }
                    }
                }
                _ => {
                    for row in 0..rows {
                        let cell = column.get(row);
                        if !cell.is_null() && !constraint.holds(cell) {
                            fail(row, cell);
                        }
                    }
                }
            }
        }
    }
}

// ---------------------------------------------------------------------------
// Schema
// ---------------------------------------------------------------------------

/// Immutable, ordered set of column rules.
///
/// Serializes as a JSON array of [`ColumnRule`]s; deserialization rejects
/// duplicate column names and inverted ranges.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<ColumnRule>", into = "Vec<ColumnRule>")]
pub struct Schema {
    rules: Vec<ColumnRule>,
}

impl Schema {
    /// Builds a schema, enforcing one rule per column name.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::DuplicateColumn`] when two rules share a name and
    /// [`SchemaError::InvertedRange`] when a range has `min > max`.
    pub fn new(rules: Vec<ColumnRule>) -> Result<Self, SchemaError> {
        let mut seen = HashSet::with_capacity(rules.len());
        for rule in &rules {
            if !seen.insert(rule.name.as_str()) {
                return Err(SchemaError::DuplicateColumn {
                    name: rule.name.clone(),
                });
            }
            for constraint in &rule.constraints {
                if let Constraint::Range {
                    min: Some(min),
                    max: Some(max),
                } = constraint
                {
                    if min > max {
                        return Err(SchemaError::InvertedRange {
                            column: rule.name.clone(),
                            min: *min,
                            max: *max,
                        });
                    }
                }
            }
        }
        Ok(Self { rules })
    }

    /// Parses a schema from its JSON form.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Json`] for malformed JSON, bad patterns, or any
    /// rule-level error surfaced during deserialization.
    pub fn from_json(json: &str) -> Result<Self, SchemaError> {
        Ok(serde_json::from_str(json)?)
    }

    /// Reads and parses a schema file.
    ///
    /// # Errors
    ///
    /// Returns [`SchemaError::Io`] if the file cannot be read, otherwise the
    /// errors of [`Schema::from_json`].
    pub fn load(path: &Path) -> Result<Self, SchemaError> {
        let json = std::fs::read_to_string(path).map_err(|source| SchemaError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json(&json)
    }

    #[must_use]
    pub fn rules(&self) -> &[ColumnRule] {
        &self.rules
    }

    #[must_use]
    pub fn rule(&self, name: &str) -> Option<&ColumnRule> {
        self.rules.iter().find(|r| r.name == name)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.rules.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.rules.is_empty()
    }

    /// Reports every required column missing from `header`.
    ///
    /// Runs once per file; the returned violations carry no row index.
    #[must_use]
    pub fn check_columns(&self, header: &Header) -> Vec<Violation> {
        self.rules
            .iter()
            .filter(|rule| rule.required && header.position(&rule.name).is_none())
            .map(|rule| {
                Violation::for_column(
                    &rule.name,
                    COLUMN_IN_DATAFRAME,
                    serde_json::Value::String(rule.name.clone()),
                )
            })
            .collect()
    }

    /// Validates every schema column present in `chunk`.
    ///
    /// Returns all failures at once, with chunk-local row indices. Columns the
    /// schema does not mention, and schema columns the chunk lacks, are skipped.
    ///
    /// Violations are row-major: ascending row, then schema column order,
    /// then nullability, dtype and constraint order. Concatenating the results
    /// of consecutive chunks therefore matches validating them as one chunk.
    #[must_use]
    pub fn validate(&self, chunk: &Chunk) -> Vec<Violation> {
        let mut ranked: Vec<(usize, Violation)> = Vec::new();
        let mut scratch = Vec::new();
        for (position, rule) in self.rules.iter().enumerate() {
            if let Some(column) = chunk.column(&rule.name) {
                rule.check_column(column, &mut scratch);
                ranked.extend(scratch.drain(..).map(|v| (position, v)));
            }
        }
        // Stable, so the per-rule check order survives within a cell.
        ranked.sort_by_key(|(position, v)| (v.index, *position));
        ranked.into_iter().map(|(_, v)| v).collect()
    }
}

impl TryFrom<Vec<ColumnRule>> for Schema {
    type Error = SchemaError;

    fn try_from(rules: Vec<ColumnRule>) -> Result<Self, Self::Error> {
        Schema::new(rules)
    }
}

impl From<Schema> for Vec<ColumnRule> {
    fn from(schema: Schema) -> Self {
        schema.rules
    }
}
