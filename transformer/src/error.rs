//! Error types for the starload transformation pipeline.
//!
//! One error type per stage:
//!
//! - [`CsvError`] - reading and typing the input extract (carries line/column)
//! - [`SchemaError`] - header does not match the declared input schema
//! - [`ModelError`] - invalid star model description
//! - [`IntegrityError`] - uniqueness / referential integrity violations
//! - [`OutputError`] - writing tables to disk
//! - [`PipelineError`] - top-level orchestration errors
//!
//! Error conversion is automatic via `From` implementations,
//! allowing `?` to work across error boundaries.

use std::path::PathBuf;

use thiserror::Error;

// =============================================================================
// Input Errors
// =============================================================================

/// Input parsing error with source position.
///
/// `line` is the 1-based physical line in the input file (the header is line 1).
/// A line of 0 means the error is not tied to a row (unreadable file, bad encoding).
#[derive(Debug, Clone, PartialEq)]
pub struct CsvError {
    pub line: u64,
    pub column: Option<String>,
    pub value: Option<String>,
    pub message: String,
}

impl std::fmt::Display for CsvError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match (&self.column, &self.value) {
            (Some(col), Some(val)) => {
                write!(f, "Line {}, column '{}' (value '{}'): {}", self.line, col, val, self.message)
            }
            (Some(col), None) => {
                write!(f, "Line {}, column '{}': {}", self.line, col, self.message)
            }
            _ if self.line == 0 => write!(f, "{}", self.message),
            _ => write!(f, "Line {}: {}", self.line, self.message),
        }
    }
}

impl std::error::Error for CsvError {}

impl CsvError {
    pub fn new(line: u64, message: impl Into<String>) -> Self {
        Self {
            line,
            column: None,
            value: None,
            message: message.into(),
        }
    }

    pub fn with_column(mut self, column: impl Into<String>) -> Self {
        self.column = Some(column.into());
        self
    }

    pub fn with_value(mut self, value: impl Into<String>) -> Self {
        self.value = Some(value.into());
        self
    }
}

impl From<csv::Error> for CsvError {
    fn from(err: csv::Error) -> Self {
        let line = err.position().map(|p| p.line()).unwrap_or(0);
        match err.kind() {
            csv::ErrorKind::UnequalLengths { expected_len, len, .. } => CsvError::new(
                line,
                format!("expected {} fields, found {}", expected_len, len),
            ),
            _ => CsvError::new(line, format!("Invalid CSV: {}", err)),
        }
    }
}

// =============================================================================
// Schema Errors
// =============================================================================

/// The input header does not satisfy the declared column schema.
#[derive(Debug, Error, PartialEq)]
pub enum SchemaError {
    /// Declared columns absent from the header.
    #[error("Missing input columns: {}", .0.join(", "))]
    MissingColumns(Vec<String>),

    /// Header columns not declared in the schema (strict mode only).
    #[error("Undeclared input columns: {}", .0.join(", "))]
    UnexpectedColumns(Vec<String>),

    /// The same header name appears more than once.
    #[error("Duplicate header column: {0}")]
    DuplicateHeader(String),
}

// =============================================================================
// Model Errors
// =============================================================================

/// The star model description is malformed.
#[derive(Debug, Error)]
pub enum ModelError {
    /// JSON could not be parsed into a model.
    #[error("Invalid model JSON: {0}")]
    Json(#[from] serde_json::Error),

    /// Model file could not be read.
    #[error("Cannot read model file: {0}")]
    Io(#[from] std::io::Error),

    /// Structural problem found by validation.
    #[error("Invalid model: {0}")]
    Invalid(String),
}

// =============================================================================
// Integrity Errors
// =============================================================================

/// A built star schema broke one of its invariants.
///
/// These indicate a transformation bug (or a hand-edited output directory),
/// never a recoverable runtime condition.
#[derive(Debug, Error, PartialEq)]
pub enum IntegrityError {
    /// Two rows of a dimension share a surrogate key.
    #[error("Dimension '{table}': duplicate surrogate key {key}")]
    DuplicateKey { table: String, key: String },

    /// Two rows of a dimension share a natural key.
    #[error("Dimension '{table}': duplicate natural key ({natural_key})")]
    DuplicateNaturalKey { table: String, natural_key: String },

    /// A fact foreign key has no matching dimension row.
    #[error("Fact row {row}: {column}={key} not found in '{table}'")]
    DanglingForeignKey {
        row: usize,
        column: String,
        key: String,
        table: String,
    },

    /// Fact row count differs from input record count.
    #[error("Fact table has {facts} rows but input had {records} records")]
    RowCountMismatch { facts: usize, records: usize },

    /// A table file lacks an expected column.
    #[error("Table '{table}' has no column '{column}'")]
    MissingColumn { table: String, column: String },
}

// =============================================================================
// Output Errors
// =============================================================================

/// Errors while writing output tables.
#[derive(Debug, Error)]
pub enum OutputError {
    /// Output directory could not be created.
    #[error("Cannot create output directory {path}: {source}")]
    CreateDir {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A previously written file could not be read back.
    #[error("Cannot read {path}: {source}")]
    Read {
        path: PathBuf,
        source: std::io::Error,
    },

    /// A file could not be created or written.
    #[error("Cannot write {path}: {source}")]
    Write {
        path: PathBuf,
        source: std::io::Error,
    },

    /// The CSV writer failed.
    #[error("CSV write error in {path}: {source}")]
    Csv { path: PathBuf, source: csv::Error },

    /// Manifest serialization failed.
    #[error("Manifest serialization failed: {0}")]
    Manifest(#[from] serde_json::Error),
}

// =============================================================================
// Pipeline Errors (top-level)
// =============================================================================

/// Top-level pipeline errors.
///
/// This is the error type returned by [`crate::transform::pipeline::run`].
#[derive(Debug, Error)]
pub enum PipelineError {
    /// Input parsing error.
    #[error("Input error: {0}")]
    Csv(#[from] CsvError),

    /// Header / schema mismatch.
    #[error("Schema error: {0}")]
    Schema(#[from] SchemaError),

    /// Model error.
    #[error("Model error: {0}")]
    Model(#[from] ModelError),

    /// Integrity check failed.
    #[error("Integrity error: {0}")]
    Integrity(#[from] IntegrityError),

    /// Output error.
    #[error("Output error: {0}")]
    Output(#[from] OutputError),
}

// =============================================================================
// Result Type Aliases
// =============================================================================

/// Result type for input parsing.
pub type CsvResult<T> = Result<T, CsvError>;

/// Result type for model loading.
pub type ModelResult<T> = Result<T, ModelError>;

/// Result type for integrity checks.
pub type IntegrityResult<T> = Result<T, IntegrityError>;

/// Result type for output operations.
pub type OutputResult<T> = Result<T, OutputError>;

/// Result type for pipeline operations.
pub type PipelineResult<T> = Result<T, PipelineError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_conversion_chain() {
        let csv_err = CsvError::new(3, "boom");
        let pipeline_err: PipelineError = csv_err.into();
        assert!(pipeline_err.to_string().contains("Line 3"));

        let schema_err = SchemaError::MissingColumns(vec!["Operator".into(), "ObjId".into()]);
        let pipeline_err: PipelineError = schema_err.into();
        assert!(pipeline_err.to_string().contains("Operator, ObjId"));
    }

    #[test]
    fn test_csv_error_format() {
        let err = CsvError::new(5, "expected integer")
            .with_column("Number of plugs")
            .with_value("abc");

        let msg = err.to_string();
        assert!(msg.contains("Line 5"));
        assert!(msg.contains("column 'Number of plugs'"));
        assert!(msg.contains("value 'abc'"));
    }

    #[test]
    fn test_csv_error_without_line() {
        let err = CsvError::new(0, "Cannot read file");
        assert_eq!(err.to_string(), "Cannot read file");
    }

    #[test]
    fn test_dangling_key_format() {
        let err = IntegrityError::DanglingForeignKey {
            row: 4,
            column: "station_id".into(),
            key: "9".into(),
            table: "dim_station".into(),
        };
        assert_eq!(err.to_string(), "Fact row 4: station_id=9 not found in 'dim_station'");
    }
}
