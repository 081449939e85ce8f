//! # Starload - CSV extract to star schema
//!
//! Starload turns a flat CSV extract into a star schema: deduplicated
//! dimension tables with sequential surrogate keys and a fact table that
//! references them, written as one CSV per table.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────┐     ┌─────────────┐     ┌─────────────┐     ┌─────────────┐
//! │   CSV File  │────▶│   Parser    │────▶│  Transform  │────▶│  Star CSVs  │
//! │  (any enc)  │     │ (typed rows)│     │ (dims+fact) │     │ + manifest  │
//! └─────────────┘     └─────────────┘     └─────────────┘     └─────────────┘
//!                            ▲                   │
//!                      StarModel (JSON)     validation
//! ```
//!
//! ## Quick Start
//!
//! ```rust,ignore
//! use starload::{ev_charger_model, run, TransformOptions};
//! use std::path::Path;
//!
//! let report = run(Path::new("fast_chargers.csv"), &ev_charger_model(), &TransformOptions::default())?;
//! println!("Wrote {} fact rows", report.schema.fact.len());
//! ```
//!
//! ## Modules
//!
//! - [`error`] - Hierarchical error types
//! - [`models`] - Values, surrogate keys, star schema tables
//! - [`schema`] - Input schema and star model description
//! - [`parser`] - CSV reading with encoding / delimiter detection and typing
//! - [`transform`] - Dimension building, fact assembly, pipeline
//! - [`validation`] - Integrity checks
//! - [`writer`] - CSV and manifest output
//! - [`config`] - Options from CLI flags and environment
//! - [`logging`] - Tracing subscriber setup

// Core modules
pub mod error;
pub mod models;
pub mod schema;

// Parsing
pub mod parser;

// Transformation
pub mod transform;

// Validation
pub mod validation;

// Output
pub mod writer;

// Ambient
pub mod config;
pub mod logging;

// =============================================================================
// Re-exports - Error types
// =============================================================================

pub use error::{
    CsvError, CsvResult, IntegrityError, IntegrityResult, ModelError, ModelResult, OutputError,
    OutputResult, PipelineError, PipelineResult, SchemaError,
};

// =============================================================================
// Re-exports - Models
// =============================================================================

pub use models::{
    ColumnType, DimensionRow, DimensionTable, FactRow, FactTable, NaturalKey, RawRecord,
    StarSchema, SurrogateKey, Value,
};

// =============================================================================
// Re-exports - Schema
// =============================================================================

pub use schema::{
    ev_charger_model, AttributeSpec, ColumnDef, Derivation, DimensionSpec, FactSpec,
    InputSchema, MeasureSpec, NullPolicy, StarModel,
};

// =============================================================================
// Re-exports - CSV Parsing
// =============================================================================

pub use parser::{
    decode_content, detect_delimiter, detect_encoding, parse_value, read_bytes, read_file,
    type_records, RawTable, TypedInput,
};

// =============================================================================
// Re-exports - Pipeline
// =============================================================================

pub use transform::{
    run, transform, transform_bytes, InputInfo, TransformContext, TransformOptions,
    TransformReport,
};

// =============================================================================
// Re-exports - Validation / Output
// =============================================================================

pub use validation::{check_star_schema, verify_output_dir, VerifyReport};
pub use writer::{read_manifest, write_manifest, write_star_schema, Manifest, WrittenTable};
