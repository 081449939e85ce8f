//! Star model definition
//!
//! The model says which input columns form each dimension, which attributes
//! identify an entity (natural key), and which columns are copied to the fact
//! table as measures.

use chrono::{Datelike, Timelike};
use regex::Regex;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::Path;

use super::InputSchema;
use crate::error::{ModelError, ModelResult};
use crate::models::{ColumnType, Value};

/// A complete star model
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct StarModel {
    /// Version of the model format
    #[serde(default = "default_version")]
    pub version: String,

    pub name: String,

    #[serde(default)]
    pub description: String,

    /// Declared input columns
    pub input: InputSchema,

    /// First surrogate key handed out in every dimension
    #[serde(default = "default_key_base")]
    pub key_base: u64,

    pub dimensions: Vec<DimensionSpec>,

    pub fact: FactSpec,
}

fn default_version() -> String {
    "1.0".to_string()
}

fn default_key_base() -> u64 {
    1
}

/// What happens to a record whose natural key for a dimension has a null part.
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum NullPolicy {
    /// Reference the dimension's unknown member (key 0).
    #[default]
    Unknown,
    /// Leave the foreign key empty; the record does not populate the dimension.
    Exclude,
}

/// One dimension table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct DimensionSpec {
    /// Logical name (e.g. "station")
    pub name: String,

    /// Output table name, default `dim_<name>`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub table: Option<String>,

    /// Surrogate key column, default `<name>_key`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub key_column: Option<String>,

    pub attributes: Vec<AttributeSpec>,

    /// Attribute names identifying an entity instance
    pub natural_key: Vec<String>,

    #[serde(default)]
    pub null_policy: NullPolicy,

    /// Text written into the unknown member's text attributes
    #[serde(default = "default_unknown_label")]
    pub unknown_label: String,

    /// Emit the unknown member even if no record references it
    #[serde(default)]
    pub always_include_unknown: bool,
}

fn default_unknown_label() -> String {
    "Unknown".to_string()
}

/// One dimension attribute
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct AttributeSpec {
    /// Output column name
    pub name: String,

    /// Input column name
    pub source: String,

    /// Optional part extracted from a date/timestamp source
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub derive: Option<Derivation>,
}

/// The fact table
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct FactSpec {
    pub table: String,

    /// Row key column
    #[serde(default = "default_fact_key")]
    pub key_column: String,

    /// Columns copied unchanged from each record
    #[serde(default)]
    pub measures: Vec<MeasureSpec>,
}

fn default_fact_key() -> String {
    "record_id".to_string()
}

/// One fact measure
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct MeasureSpec {
    pub name: String,
    pub source: String,
}

/// Calendar part derived from a date or timestamp.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Derivation {
    /// Calendar date (drops the time of day)
    Date,
    Year,
    /// 1-4
    Quarter,
    /// 1-12
    Month,
    /// Day of month
    Day,
    /// English weekday name
    Weekday,
    /// 0-23, timestamps only
    Hour,
}

impl Derivation {
    /// Extract this part from a date or timestamp. Null stays null.
    pub fn apply(self, value: &Value) -> Value {
        let (date, hour) = match value {
            Value::Date(d) => (*d, None),
            Value::Timestamp(t) => (t.date(), Some(t.hour())),
            _ => return Value::Null,
        };

        match self {
            Derivation::Date => Value::Date(date),
            Derivation::Year => Value::Integer(i64::from(date.year())),
            Derivation::Quarter => Value::Integer(i64::from(date.month0() / 3 + 1)),
            Derivation::Month => Value::Integer(i64::from(date.month())),
            Derivation::Day => Value::Integer(i64::from(date.day())),
            Derivation::Weekday => Value::Text(date.format("%A").to_string()),
            Derivation::Hour => hour.map(|h| Value::Integer(i64::from(h))).unwrap_or(Value::Null),
        }
    }

    /// Type of the derived value.
    pub fn output_type(self) -> ColumnType {
        match self {
            Derivation::Date => ColumnType::Date,
            Derivation::Weekday => ColumnType::Text,
            _ => ColumnType::Integer,
        }
    }
}

impl DimensionSpec {
    pub fn table_name(&self) -> String {
        self.table.clone().unwrap_or_else(|| format!("dim_{}", self.name))
    }

    pub fn key_column_name(&self) -> String {
        self.key_column
            .clone()
            .unwrap_or_else(|| format!("{}_key", self.name))
    }

    /// Positions of the natural-key attributes within `attributes`.
    pub fn natural_key_indices(&self) -> ModelResult<Vec<usize>> {
        self.natural_key
            .iter()
            .map(|k| {
                self.attributes
                    .iter()
                    .position(|a| &a.name == k)
                    .ok_or_else(|| {
                        ModelError::Invalid(format!(
                            "dimension '{}': natural key '{}' is not an attribute",
                            self.name, k
                        ))
                    })
            })
            .collect()
    }
}

impl StarModel {
    /// Parse a model from JSON string
    pub fn from_json(json: &str) -> ModelResult<Self> {
        let model: StarModel = serde_json::from_str(json)?;
        model.validate()?;
        Ok(model)
    }

    /// Read and validate a model file
    pub fn from_file(path: impl AsRef<Path>) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_json(&content)
    }

    /// Serialize to JSON string
    pub fn to_json(&self) -> ModelResult<String> {
        Ok(serde_json::to_string_pretty(self)?)
    }

    /// Every input column referenced by an attribute or measure.
    pub fn source_columns(&self) -> Vec<String> {
        let mut columns: Vec<String> = self
            .dimensions
            .iter()
            .flat_map(|d| d.attributes.iter().map(|a| a.source.clone()))
            .chain(self.fact.measures.iter().map(|m| m.source.clone()))
            .collect();
        columns.sort();
        columns.dedup();
        columns
    }

    /// Output table names, dimensions first.
    pub fn table_names(&self) -> Vec<String> {
        self.dimensions
            .iter()
            .map(|d| d.table_name())
            .chain(std::iter::once(self.fact.table.clone()))
            .collect()
    }

    /// Check the model for structural errors.
    pub fn validate(&self) -> ModelResult<()> {
        let identifier = Regex::new(r"^[A-Za-z_][A-Za-z0-9_]*$")
            .map_err(|e| ModelError::Invalid(e.to_string()))?;
        let check_ident = |what: &str, name: &str| {
            if identifier.is_match(name) {
                Ok(())
            } else {
                Err(ModelError::Invalid(format!(
                    "{} '{}' must be an identifier ([A-Za-z_][A-Za-z0-9_]*)",
                    what, name
                )))
            }
        };

        if self.key_base == 0 {
            return Err(ModelError::Invalid(
                "key_base must be at least 1 (0 is the unknown member)".into(),
            ));
        }
        if self.input.columns.is_empty() {
            return Err(ModelError::Invalid("input schema declares no columns".into()));
        }
        if self.dimensions.is_empty() {
            return Err(ModelError::Invalid("model declares no dimensions".into()));
        }

        let mut seen_columns = HashSet::new();
        for col in &self.input.columns {
            if !seen_columns.insert(col.name.as_str()) {
                return Err(ModelError::Invalid(format!(
                    "input column '{}' declared twice",
                    col.name
                )));
            }
        }

        let mut dim_names = HashSet::new();
        let mut tables = HashSet::new();
        for dim in &self.dimensions {
            if !dim_names.insert(dim.name.as_str()) {
                return Err(ModelError::Invalid(format!("dimension '{}' declared twice", dim.name)));
            }
            self.validate_dimension(dim, &check_ident)?;
            if !tables.insert(dim.table_name()) {
                return Err(ModelError::Invalid(format!(
                    "table '{}' used more than once",
                    dim.table_name()
                )));
            }
        }

        check_ident("fact table", &self.fact.table)?;
        check_ident("fact key column", &self.fact.key_column)?;
        if !tables.insert(self.fact.table.clone()) {
            return Err(ModelError::Invalid(format!(
                "table '{}' used more than once",
                self.fact.table
            )));
        }

        let mut fact_columns = HashSet::new();
        let fact_names = std::iter::once(self.fact.key_column.clone())
            .chain(self.dimensions.iter().map(|d| d.key_column_name()))
            .chain(self.fact.measures.iter().map(|m| m.name.clone()));
        for name in fact_names {
            if !fact_columns.insert(name.clone()) {
                return Err(ModelError::Invalid(format!(
                    "fact table '{}': column '{}' appears twice",
                    self.fact.table, name
                )));
            }
        }
        for measure in &self.fact.measures {
            if self.input.column(&measure.source).is_none() {
                return Err(ModelError::Invalid(format!(
                    "measure '{}': source column '{}' is not declared",
                    measure.name, measure.source
                )));
            }
        }

        Ok(())
    }

    fn validate_dimension(
        &self,
        dim: &DimensionSpec,
        check_ident: &dyn Fn(&str, &str) -> ModelResult<()>,
    ) -> ModelResult<()> {
        check_ident("dimension table", &dim.table_name())?;
        check_ident("key column", &dim.key_column_name())?;

        if dim.attributes.is_empty() {
            return Err(ModelError::Invalid(format!("dimension '{}' has no attributes", dim.name)));
        }
        if dim.natural_key.is_empty() {
            return Err(ModelError::Invalid(format!("dimension '{}' has no natural key", dim.name)));
        }
        if dim.always_include_unknown && dim.null_policy == NullPolicy::Exclude {
            return Err(ModelError::Invalid(format!(
                "dimension '{}': always_include_unknown needs null_policy \"unknown\"",
                dim.name
            )));
        }

        let mut columns = HashSet::new();
        columns.insert(dim.key_column_name());
        for attr in &dim.attributes {
            if !columns.insert(attr.name.clone()) {
                return Err(ModelError::Invalid(format!(
                    "dimension '{}': column '{}' appears twice",
                    dim.name, attr.name
                )));
            }

            let source = self.input.column(&attr.source).ok_or_else(|| {
                ModelError::Invalid(format!(
                    "dimension '{}': attribute '{}' reads undeclared column '{}'",
                    dim.name, attr.name, attr.source
                ))
            })?;

            match attr.derive {
                Some(Derivation::Hour) if source.column_type != ColumnType::Timestamp => {
                    return Err(ModelError::Invalid(format!(
                        "dimension '{}': attribute '{}' derives hour from non-timestamp column '{}'",
                        dim.name, attr.name, attr.source
                    )));
                }
                Some(_) if !source.column_type.is_temporal() => {
                    return Err(ModelError::Invalid(format!(
                        "dimension '{}': attribute '{}' derives from non-temporal column '{}'",
                        dim.name, attr.name, attr.source
                    )));
                }
                _ => {}
            }
        }

        let indices = dim.natural_key_indices()?;
        let unique: HashSet<usize> = indices.iter().copied().collect();
        if unique.len() != indices.len() {
            return Err(ModelError::Invalid(format!(
                "dimension '{}': natural key lists an attribute twice",
                dim.name
            )));
        }

        Ok(())
    }
}
