//! CSV reader with encoding and delimiter auto-detection.
//!
//! Reading happens in two steps:
//!
//! 1. [`read_file`] / [`read_bytes`] decode the file and split it into raw
//!    string rows with the `csv` crate (no schema knowledge).
//! 2. [`type_records`] matches the header against an [`InputSchema`] and
//!    converts every field to a typed [`Value`], failing on the first bad field.

use chrono::{DateTime, NaiveDate, NaiveDateTime};
use csv::{ReaderBuilder, StringRecord, Trim};
use std::path::Path;
use tracing::{debug, warn};

use crate::error::{CsvError, CsvResult, PipelineResult};
use crate::models::{ColumnType, RawRecord, Value};
use crate::schema::{ColumnDef, InputSchema};

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%d/%m/%Y", "%Y/%m/%d"];

const TIMESTAMP_FORMATS: &[&str] = &[
    "%Y-%m-%d %H:%M:%S",
    "%Y-%m-%d %H:%M:%S%.f",
    "%Y-%m-%dT%H:%M:%S",
    "%Y-%m-%dT%H:%M:%S%.f",
    "%Y-%m-%d %H:%M",
    "%Y-%m-%dT%H:%M",
    "%d/%m/%Y %H:%M:%S",
    "%d/%m/%Y %H:%M",
];

/// Untyped rows with detection metadata
#[derive(Debug, Clone)]
pub struct RawTable {
    /// Detected or used encoding
    pub encoding: String,
    /// Detected or used delimiter
    pub delimiter: char,
    /// Column headers
    pub headers: Vec<String>,
    /// Data rows with their 1-based starting line
    pub rows: Vec<(u64, StringRecord)>,
}

/// Typed input ready for transformation
#[derive(Debug, Clone)]
pub struct TypedInput {
    pub records: Vec<RawRecord>,
    /// Header columns not declared in the schema
    pub ignored_columns: Vec<String>,
}

/// Detect the encoding of raw bytes using chardet
pub fn detect_encoding(bytes: &[u8]) -> String {
    let result = chardet::detect(bytes);
    let charset = result.0;

    match charset.to_lowercase().as_str() {
        "ascii" | "utf-8" | "utf8" | "" => "utf-8".to_string(),
        "iso-8859-1" | "latin-1" | "latin1" => "iso-8859-1".to_string(),
        "windows-1252" | "cp1252" => "windows-1252".to_string(),
        _ => charset,
    }
}

/// Decode bytes to string using the specified encoding.
///
/// Any WHATWG label known to `encoding_rs` is accepted. Unknown labels and
/// malformed byte sequences are errors, never replacement characters.
pub fn decode_content(bytes: &[u8], encoding: &str) -> CsvResult<String> {
    let label = match encoding.to_lowercase().as_str() {
        "utf8" | "ascii" => "utf-8".to_string(),
        "latin-1" => "latin1".to_string(),
        other => other.to_string(),
    };

    let decoded = if label == "utf-8" {
        String::from_utf8(bytes.to_vec())
            .map_err(|e| CsvError::new(0, format!("Encoding error: {}", e)))?
    } else {
        let codec = encoding_rs::Encoding::for_label(label.as_bytes())
            .ok_or_else(|| CsvError::new(0, format!("Unsupported encoding '{}'", encoding)))?;
        let (text, _, had_errors) = codec.decode(bytes);
        if had_errors {
            return Err(CsvError::new(
                0,
                format!("Input is not valid {}", codec.name()),
            ));
        }
        text.into_owned()
    };

    Ok(decoded.trim_start_matches('\u{feff}').to_string())
}

/// Detect the delimiter by counting occurrences in the first line
pub fn detect_delimiter(content: &str) -> char {
    let first_line = content.lines().next().unwrap_or("");

    let separators = [',', ';', '\t', '|'];
    let mut best_sep = ',';
    let mut best_count = 0;

    for &sep in &separators {
        let count = first_line.matches(sep).count();
        if count > best_count {
            best_count = count;
            best_sep = sep;
        }
    }

    best_sep
}

/// Read a CSV file, detecting encoding and (unless given) the delimiter.
pub fn read_file<P: AsRef<Path>>(path: P, delimiter: Option<char>) -> CsvResult<RawTable> {
    let path = path.as_ref();
    let bytes = std::fs::read(path)
        .map_err(|e| CsvError::new(0, format!("Cannot read file '{}': {}", path.display(), e)))?;

    read_bytes(&bytes, delimiter)
}

/// Read CSV bytes, detecting encoding and (unless given) the delimiter.
pub fn read_bytes(bytes: &[u8], delimiter: Option<char>) -> CsvResult<RawTable> {
    let encoding = detect_encoding(bytes);
    let content = decode_content(bytes, &encoding)?;
    let delimiter = delimiter.unwrap_or_else(|| detect_delimiter(&content));

    debug!(%encoding, delimiter = %format_delimiter(delimiter), "decoded input");
    read_str(&content, delimiter, encoding)
}

/// Split already-decoded CSV text into raw rows.
pub fn read_str(content: &str, delimiter: char, encoding: String) -> CsvResult<RawTable> {
    if !delimiter.is_ascii() {
        return Err(CsvError::new(0, format!("Delimiter '{}' is not ASCII", delimiter)));
    }

    let mut reader = ReaderBuilder::new()
        .delimiter(delimiter as u8)
        .trim(Trim::All)
        .from_reader(content.as_bytes());

    let headers: Vec<String> = reader.headers()?.iter().map(str::to_string).collect();
    if headers.is_empty() {
        return Err(CsvError::new(1, "Empty CSV file"));
    }

    let mut rows = Vec::new();
    for result in reader.records() {
        let record = result?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        rows.push((line, record));
    }

    Ok(RawTable {
        encoding,
        delimiter,
        headers,
        rows,
    })
}

/// Convert raw rows into typed records following `schema`.
///
/// Fails on the first header mismatch or unparseable field; nothing is
/// skipped.
pub fn type_records(
    table: &RawTable,
    schema: &InputSchema,
    strict: bool,
) -> PipelineResult<TypedInput> {
    let binding = schema.bind(&table.headers, strict)?;
    if !binding.ignored.is_empty() {
        warn!(columns = ?binding.ignored, "ignoring undeclared input columns");
    }

    let mut records = Vec::with_capacity(table.rows.len());
    for (line, row) in &table.rows {
        let values = schema
            .columns
            .iter()
            .zip(&binding.field_positions)
            .map(|(column, &pos)| {
                let raw = row.get(pos).unwrap_or("");
                parse_value(raw, column, schema, *line)
            })
            .collect::<CsvResult<Vec<Value>>>()?;
        records.push(RawRecord::new(*line, values));
    }

    Ok(TypedInput {
        records,
        ignored_columns: binding.ignored,
    })
}

/// Parse one field according to its column definition.
pub fn parse_value(raw: &str, column: &ColumnDef, schema: &InputSchema, line: u64) -> CsvResult<Value> {
    let invalid = |message: String| {
        CsvError::new(line, message)
            .with_column(&column.name)
            .with_value(raw)
    };

    if schema.is_null_token(raw) {
        if column.nullable {
            return Ok(Value::Null);
        }
        return Err(CsvError::new(line, "Null value in non-nullable column").with_column(&column.name));
    }

    match column.column_type {
        ColumnType::Text => Ok(Value::Text(raw.to_string())),
        ColumnType::Integer => parse_integer(raw)
            .map(Value::Integer)
            .ok_or_else(|| invalid("expected integer".into())),
        ColumnType::Float => raw
            .parse::<f64>()
            .ok()
            .filter(|f| f.is_finite())
            .map(Value::Float)
            .ok_or_else(|| invalid("expected finite number".into())),
        ColumnType::Boolean => parse_boolean(raw)
            .map(Value::Boolean)
            .ok_or_else(|| invalid("expected boolean (true/false, yes/no, 1/0)".into())),
        ColumnType::Date => parse_date(raw, column.format.as_deref())
            .map(Value::Date)
            .ok_or_else(|| invalid(format!("expected date{}", format_hint(column)))),
        ColumnType::Timestamp => parse_timestamp(raw, column.format.as_deref())
            .map(Value::Timestamp)
            .ok_or_else(|| invalid(format!("expected timestamp{}", format_hint(column)))),
    }
}

fn format_hint(column: &ColumnDef) -> String {
    column
        .format
        .as_ref()
        .map(|f| format!(" in format '{}'", f))
        .unwrap_or_default()
}

/// Integers, also written with an all-zero fraction ("3.0").
fn parse_integer(raw: &str) -> Option<i64> {
    if let Ok(i) = raw.parse::<i64>() {
        return Some(i);
    }
    let (whole, fraction) = raw.split_once('.')?;
    if fraction.is_empty() || !fraction.chars().all(|c| c == '0') {
        return None;
    }
    whole.parse::<i64>().ok()
}

fn parse_boolean(raw: &str) -> Option<bool> {
    match raw.to_lowercase().as_str() {
        "true" | "t" | "yes" | "y" | "1" => Some(true),
        "false" | "f" | "no" | "n" | "0" => Some(false),
        _ => None,
    }
}

fn parse_date(raw: &str, format: Option<&str>) -> Option<NaiveDate> {
    match format {
        Some(f) => NaiveDate::parse_from_str(raw, f).ok(),
        None => DATE_FORMATS
            .iter()
            .find_map(|f| NaiveDate::parse_from_str(raw, f).ok()),
    }
}

fn parse_timestamp(raw: &str, format: Option<&str>) -> Option<NaiveDateTime> {
    if let Some(f) = format {
        return NaiveDateTime::parse_from_str(raw, f).ok();
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.naive_utc());
    }
    TIMESTAMP_FORMATS
        .iter()
        .find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok())
}

/// Format delimiter for display
pub fn format_delimiter(d: char) -> String {
    match d {
        '\t' => "\\t".to_string(),
        c => c.to_string(),
    }
}
