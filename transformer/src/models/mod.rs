//! Domain models for the starload pipeline.
//!
//! - [`Value`] - typed scalar read from the extract
//! - [`ColumnType`] - declared type of an input column
//! - [`RawRecord`] - one typed input row
//! - [`SurrogateKey`] - generated dimension / fact key
//! - [`DimensionTable`], [`FactTable`], [`StarSchema`] - transformation output

use chrono::{NaiveDate, NaiveDateTime};
use serde::{Deserialize, Serialize};

/// Canonical output format for dates.
pub const DATE_FORMAT: &str = "%Y-%m-%d";

/// Canonical output format for timestamps.
pub const TIMESTAMP_FORMAT: &str = "%Y-%m-%d %H:%M:%S";

// =============================================================================
// Scalar values
// =============================================================================

/// Declared type of an input column.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum ColumnType {
    Text,
    Integer,
    Float,
    Boolean,
    Date,
    Timestamp,
}

impl ColumnType {
    pub fn is_temporal(self) -> bool {
        matches!(self, ColumnType::Date | ColumnType::Timestamp)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            ColumnType::Text => "text",
            ColumnType::Integer => "integer",
            ColumnType::Float => "float",
            ColumnType::Boolean => "boolean",
            ColumnType::Date => "date",
            ColumnType::Timestamp => "timestamp",
        }
    }
}

impl std::fmt::Display for ColumnType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A typed scalar value.
///
/// Every value has exactly one textual rendering ([`Value::render`]), used both
/// to compare natural keys and to write output fields. Null renders as an
/// empty field.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Text(String),
    Integer(i64),
    Float(f64),
    Boolean(bool),
    Date(NaiveDate),
    Timestamp(NaiveDateTime),
}

impl Value {
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Canonical text form.
    pub fn render(&self) -> String {
        match self {
            Value::Null => String::new(),
            Value::Text(s) => s.clone(),
            Value::Integer(i) => i.to_string(),
            // -0.0 and 0.0 share one rendering
            Value::Float(f) if *f == 0.0 => "0".to_string(),
            // Display gives the shortest string that round-trips
            Value::Float(f) => f.to_string(),
            Value::Boolean(b) => b.to_string(),
            Value::Date(d) => d.format(DATE_FORMAT).to_string(),
            Value::Timestamp(t) => t.format(TIMESTAMP_FORMAT).to_string(),
        }
    }
}

impl From<&str> for Value {
    fn from(s: &str) -> Self {
        Value::Text(s.to_string())
    }
}

impl From<i64> for Value {
    fn from(i: i64) -> Self {
        Value::Integer(i)
    }
}

impl From<f64> for Value {
    fn from(f: f64) -> Self {
        Value::Float(f)
    }
}

// =============================================================================
// Input records
// =============================================================================

/// One row of the source extract, typed against the input schema.
///
/// `values` is aligned with the schema's column order.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRecord {
    /// 1-based line in the input file (header is line 1).
    pub line: u64,
    pub values: Vec<Value>,
}

impl RawRecord {
    pub fn new(line: u64, values: Vec<Value>) -> Self {
        Self { line, values }
    }

    pub fn get(&self, index: usize) -> &Value {
        self.values.get(index).unwrap_or(&Value::Null)
    }
}

// =============================================================================
// Keys
// =============================================================================

/// System-generated identifier for a dimension or fact row.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SurrogateKey(pub u64);

impl SurrogateKey {
    /// Key reserved for a dimension's unknown member.
    pub const UNKNOWN: SurrogateKey = SurrogateKey(0);

    pub fn value(self) -> u64 {
        self.0
    }
}

impl std::fmt::Display for SurrogateKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Tuple of canonical renderings identifying one entity instance.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct NaturalKey(pub Vec<String>);

impl std::fmt::Display for NaturalKey {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0.join(", "))
    }
}

// =============================================================================
// Output tables
// =============================================================================

/// A deduplicated entity instance.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionRow {
    pub key: SurrogateKey,
    /// Aligned with [`DimensionTable::attributes`].
    pub values: Vec<Value>,
}

/// One dimension table, rows ordered by surrogate key.
#[derive(Debug, Clone, PartialEq)]
pub struct DimensionTable {
    /// Logical dimension name (e.g. `station`).
    pub name: String,
    /// Output table name / file stem (e.g. `dim_station`).
    pub table: String,
    pub key_column: String,
    pub attributes: Vec<String>,
    /// Indices into `attributes` forming the natural key.
    pub natural_key: Vec<usize>,
    pub rows: Vec<DimensionRow>,
}

impl DimensionTable {
    pub fn header(&self) -> Vec<String> {
        std::iter::once(self.key_column.clone())
            .chain(self.attributes.iter().cloned())
            .collect()
    }

    pub fn natural_key_of(&self, row: &DimensionRow) -> NaturalKey {
        NaturalKey(self.natural_key.iter().map(|&i| row.values[i].render()).collect())
    }

    pub fn find(&self, key: SurrogateKey) -> Option<&DimensionRow> {
        self.rows.iter().find(|r| r.key == key)
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// One row per input record.
#[derive(Debug, Clone, PartialEq)]
pub struct FactRow {
    pub key: SurrogateKey,
    /// One per dimension, in model order. `None` when the natural key was
    /// null and the dimension excludes nulls.
    pub foreign_keys: Vec<Option<SurrogateKey>>,
    pub measures: Vec<Value>,
}

/// The fact table, rows in input order.
#[derive(Debug, Clone, PartialEq)]
pub struct FactTable {
    pub table: String,
    pub key_column: String,
    /// Foreign key column names, one per dimension.
    pub foreign_key_columns: Vec<String>,
    pub measure_columns: Vec<String>,
    pub rows: Vec<FactRow>,
}

impl FactTable {
    pub fn header(&self) -> Vec<String> {
        std::iter::once(self.key_column.clone())
            .chain(self.foreign_key_columns.iter().cloned())
            .chain(self.measure_columns.iter().cloned())
            .collect()
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Complete transformation output.
#[derive(Debug, Clone, PartialEq)]
pub struct StarSchema {
    pub dimensions: Vec<DimensionTable>,
    pub fact: FactTable,
}

impl StarSchema {
    pub fn dimension(&self, name: &str) -> Option<&DimensionTable> {
        self.dimensions.iter().find(|d| d.name == name)
    }
}
