//! Input schema and star model descriptions.
//!
//! - [`InputSchema`] - ordered list of input columns with their types
//! - [`StarModel`] - how input columns are split into dimensions and a fact
//! - [`ev_charger_model`] - built-in model for the EV fast-charger extract

pub mod builtin;
pub mod model;

pub use builtin::ev_charger_model;
pub use model::{
    AttributeSpec, Derivation, DimensionSpec, FactSpec, MeasureSpec, NullPolicy, StarModel,
};

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::SchemaError;
use crate::models::ColumnType;

/// One declared input column.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct ColumnDef {
    /// Header name in the input file.
    pub name: String,

    #[serde(rename = "type")]
    pub column_type: ColumnType,

    /// Whether the column may hold null tokens.
    #[serde(default = "default_nullable")]
    pub nullable: bool,

    /// chrono format string for date/timestamp columns.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub format: Option<String>,
}

fn default_nullable() -> bool {
    true
}

impl ColumnDef {
    pub fn new(name: impl Into<String>, column_type: ColumnType) -> Self {
        Self {
            name: name.into(),
            column_type,
            nullable: true,
            format: None,
        }
    }

    pub fn required(mut self) -> Self {
        self.nullable = false;
        self
    }

    pub fn with_format(mut self, format: impl Into<String>) -> Self {
        self.format = Some(format.into());
        self
    }
}

/// Ordered column schema of the input extract.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct InputSchema {
    pub columns: Vec<ColumnDef>,

    /// Field contents (after trimming) read as null.
    #[serde(default = "default_null_values")]
    pub null_values: Vec<String>,
}

fn default_null_values() -> Vec<String> {
    vec![String::new()]
}

impl InputSchema {
    pub fn new(columns: Vec<ColumnDef>) -> Self {
        Self {
            columns,
            null_values: default_null_values(),
        }
    }

    /// Position of a declared column.
    pub fn index_of(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn column(&self, name: &str) -> Option<&ColumnDef> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn is_null_token(&self, field: &str) -> bool {
        self.null_values.iter().any(|n| n == field)
    }

    /// Match the file header against the schema.
    ///
    /// Every declared column must be present. Extra header columns are
    /// reported in the binding and rejected only when `strict` is set.
    pub fn bind(&self, headers: &[String], strict: bool) -> Result<ColumnBinding, SchemaError> {
        let mut positions: HashMap<&str, usize> = HashMap::new();
        for (i, h) in headers.iter().enumerate() {
            if positions.insert(h.as_str(), i).is_some() {
                return Err(SchemaError::DuplicateHeader(h.clone()));
            }
        }

        let missing: Vec<String> = self
            .columns
            .iter()
            .filter(|c| !positions.contains_key(c.name.as_str()))
            .map(|c| c.name.clone())
            .collect();
        if !missing.is_empty() {
            return Err(SchemaError::MissingColumns(missing));
        }

        let declared: HashSet<&str> = self.columns.iter().map(|c| c.name.as_str()).collect();
        let ignored: Vec<String> = headers
            .iter()
            .filter(|h| !declared.contains(h.as_str()))
            .cloned()
            .collect();
        if strict && !ignored.is_empty() {
            return Err(SchemaError::UnexpectedColumns(ignored));
        }

        let field_positions = self
            .columns
            .iter()
            .map(|c| positions[c.name.as_str()])
            .collect();

        Ok(ColumnBinding {
            field_positions,
            ignored,
        })
    }
}

/// Result of matching a header against an [`InputSchema`].
#[derive(Debug, Clone, PartialEq)]
pub struct ColumnBinding {
    /// For each schema column (in schema order), its field position in the file.
    pub field_positions: Vec<usize>,
    /// Header columns not declared in the schema.
    pub ignored: Vec<String>,
}
