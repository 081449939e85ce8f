//! Accumulates the rows of one dimension while records stream through.

use tracing::{debug, warn};

use super::keys::{KeyRegistry, Resolved};
use crate::error::{ModelError, ModelResult};
use crate::models::{
    ColumnType, DimensionRow, DimensionTable, NaturalKey, RawRecord, SurrogateKey, Value,
};
use crate::schema::{Derivation, DimensionSpec, InputSchema, NullPolicy};

/// Where one attribute comes from.
#[derive(Debug, Clone)]
struct AttributeSource {
    index: usize,
    derive: Option<Derivation>,
}

/// Builder for one dimension table.
#[derive(Debug)]
pub struct DimensionBuilder {
    name: String,
    table: String,
    key_column: String,
    attributes: Vec<String>,
    sources: Vec<AttributeSource>,
    natural_key: Vec<usize>,
    null_policy: NullPolicy,
    key_base: u64,
    registry: KeyRegistry,
    rows: Vec<DimensionRow>,
    unknown_row: Option<DimensionRow>,
    unknown_key: Option<NaturalKey>,
    unknown_referenced: bool,
    always_include_unknown: bool,
    conflicts: usize,
}

impl DimensionBuilder {
    pub fn new(spec: &DimensionSpec, schema: &InputSchema, key_base: u64) -> ModelResult<Self> {
        let mut sources = Vec::with_capacity(spec.attributes.len());
        let mut types = Vec::with_capacity(spec.attributes.len());
        for attr in &spec.attributes {
            let index = schema.index_of(&attr.source).ok_or_else(|| {
                ModelError::Invalid(format!(
                    "dimension '{}': column '{}' not in input schema",
                    spec.name, attr.source
                ))
            })?;
            let source_type = schema.columns[index].column_type;
            types.push(attr.derive.map(|d| d.output_type()).unwrap_or(source_type));
            sources.push(AttributeSource {
                index,
                derive: attr.derive,
            });
        }
        let natural_key = spec.natural_key_indices()?;

        let (unknown_row, unknown_key) = match spec.null_policy {
            NullPolicy::Unknown => {
                let values: Vec<Value> = types
                    .iter()
                    .map(|t| match t {
                        ColumnType::Text => Value::Text(spec.unknown_label.clone()),
                        _ => Value::Null,
                    })
                    .collect();
                let key = NaturalKey(natural_key.iter().map(|&i| values[i].render()).collect());
                let row = DimensionRow {
                    key: SurrogateKey::UNKNOWN,
                    values,
                };
                (Some(row), Some(key))
            }
            NullPolicy::Exclude => (None, None),
        };

        Ok(Self {
            name: spec.name.clone(),
            table: spec.table_name(),
            key_column: spec.key_column_name(),
            attributes: spec.attributes.iter().map(|a| a.name.clone()).collect(),
            sources,
            natural_key,
            null_policy: spec.null_policy,
            key_base,
            registry: KeyRegistry::new(key_base),
            rows: Vec::new(),
            unknown_row,
            unknown_key,
            unknown_referenced: false,
            always_include_unknown: spec.always_include_unknown,
            conflicts: 0,
        })
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn key_column(&self) -> &str {
        &self.key_column
    }

    /// Resolve the record's foreign key into this dimension, adding a row on
    /// first occurrence of its natural key.
    pub fn resolve(&mut self, record: &RawRecord) -> Option<SurrogateKey> {
        let values: Vec<Value> = self
            .sources
            .iter()
            .map(|s| {
                let raw = record.get(s.index);
                match s.derive {
                    Some(d) => d.apply(raw),
                    None => raw.clone(),
                }
            })
            .collect();

        if self.natural_key.iter().any(|&i| values[i].is_null()) {
            return match self.null_policy {
                NullPolicy::Unknown => {
                    self.unknown_referenced = true;
                    Some(SurrogateKey::UNKNOWN)
                }
                NullPolicy::Exclude => None,
            };
        }

        let natural_key = NaturalKey(self.natural_key.iter().map(|&i| values[i].render()).collect());

        // A record spelling out the unknown label is the unknown member.
        if self.unknown_key.as_ref() == Some(&natural_key) {
            self.unknown_referenced = true;
            return Some(SurrogateKey::UNKNOWN);
        }

        match self.registry.resolve(natural_key) {
            Resolved::New(key) => {
                self.rows.push(DimensionRow { key, values });
                Some(key)
            }
            Resolved::Existing(key) => {
                let index = (key.value() - self.key_base) as usize;
                if self.rows[index].values != values {
                    self.conflicts += 1;
                    debug!(
                        dimension = %self.name,
                        line = record.line,
                        key = %key,
                        "attribute values differ from first occurrence"
                    );
                }
                Some(key)
            }
        }
    }

    /// Number of records whose non-key attributes disagreed with the first
    /// occurrence of their natural key.
    pub fn conflicts(&self) -> usize {
        self.conflicts
    }

    pub fn finish(self) -> DimensionTable {
        if self.conflicts > 0 {
            warn!(
                dimension = %self.name,
                conflicts = self.conflicts,
                "records disagreed with first-seen attributes; first occurrence kept"
            );
        }

        let mut rows = Vec::with_capacity(self.rows.len() + 1);
        if let Some(unknown) = self.unknown_row {
            if self.unknown_referenced || self.always_include_unknown {
                rows.push(unknown);
            }
        }
        rows.extend(self.rows);

        DimensionTable {
            name: self.name,
            table: self.table,
            key_column: self.key_column,
            attributes: self.attributes,
            natural_key: self.natural_key,
            rows,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::schema::{AttributeSpec, ColumnDef};
    use chrono::NaiveDate;

    fn schema() -> InputSchema {
        InputSchema::new(vec![
            ColumnDef::new("operator", ColumnType::Text),
            ColumnDef::new("plugs", ColumnType::Integer),
            ColumnDef::new("at", ColumnType::Timestamp),
        ])
    }

    fn spec(policy: NullPolicy) -> DimensionSpec {
        DimensionSpec {
            name: "operator".into(),
            table: None,
            key_column: None,
            attributes: vec![
                AttributeSpec { name: "operator_name".into(), source: "operator".into(), derive: None },
                AttributeSpec { name: "plugs".into(), source: "plugs".into(), derive: None },
            ],
            natural_key: vec!["operator_name".into()],
            null_policy: policy,
            unknown_label: "Unknown".into(),
            always_include_unknown: false,
        }
    }

    fn record(line: u64, operator: Option<&str>, plugs: i64) -> RawRecord {
        RawRecord::new(
            line,
            vec![
                operator.map(Value::from).unwrap_or(Value::Null),
                Value::Integer(plugs),
                Value::Null,
            ],
        )
    }

    #[test]
    fn test_dedup_and_first_occurrence_wins() {
        let mut b = DimensionBuilder::new(&spec(NullPolicy::Unknown), &schema(), 1).unwrap();
        assert_eq!(b.resolve(&record(2, Some("Ionity"), 4)), Some(SurrogateKey(1)));
        assert_eq!(b.resolve(&record(3, Some("Tesla"), 8)), Some(SurrogateKey(2)));
        assert_eq!(b.resolve(&record(4, Some("Ionity"), 6)), Some(SurrogateKey(1)));
        assert_eq!(b.conflicts(), 1);

        let table = b.finish();
        assert_eq!(table.table, "dim_operator");
        assert_eq!(table.key_column, "operator_key");
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].values, vec![Value::from("Ionity"), Value::Integer(4)]);
    }

    #[test]
    fn test_unknown_member_only_when_referenced() {
        let mut b = DimensionBuilder::new(&spec(NullPolicy::Unknown), &schema(), 1).unwrap();
        b.resolve(&record(2, Some("Ionity"), 4));
        assert_eq!(b.finish().rows.len(), 1);

        let mut b = DimensionBuilder::new(&spec(NullPolicy::Unknown), &schema(), 1).unwrap();
        b.resolve(&record(2, Some("Ionity"), 4));
        assert_eq!(b.resolve(&record(3, None, 2)), Some(SurrogateKey::UNKNOWN));
        let table = b.finish();
        assert_eq!(table.rows.len(), 2);
        assert_eq!(table.rows[0].key, SurrogateKey::UNKNOWN);
        assert_eq!(table.rows[0].values, vec![Value::from("Unknown"), Value::Null]);
        assert_eq!(table.rows[1].key, SurrogateKey(1));
    }

    #[test]
    fn test_always_include_unknown() {
        let mut s = spec(NullPolicy::Unknown);
        s.always_include_unknown = true;
        let b = DimensionBuilder::new(&s, &schema(), 1).unwrap();
        let table = b.finish();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].key, SurrogateKey::UNKNOWN);
    }

    #[test]
    fn test_literal_unknown_maps_to_unknown_member() {
        let mut b = DimensionBuilder::new(&spec(NullPolicy::Unknown), &schema(), 1).unwrap();
        assert_eq!(b.resolve(&record(2, Some("Unknown"), 1)), Some(SurrogateKey::UNKNOWN));
        assert_eq!(b.resolve(&record(3, Some("Ionity"), 1)), Some(SurrogateKey(1)));
        assert_eq!(b.finish().rows.len(), 2);
    }

    #[test]
    fn test_exclude_policy() {
        let mut b = DimensionBuilder::new(&spec(NullPolicy::Exclude), &schema(), 1).unwrap();
        assert_eq!(b.resolve(&record(2, None, 4)), None);
        assert_eq!(b.resolve(&record(3, Some("Unknown"), 4)), Some(SurrogateKey(1)));
        let table = b.finish();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].key, SurrogateKey(1));
    }

    #[test]
    fn test_derived_attributes() {
        let s = DimensionSpec {
            name: "day".into(),
            table: None,
            key_column: None,
            attributes: vec![
                AttributeSpec { name: "date".into(), source: "at".into(), derive: Some(Derivation::Date) },
                AttributeSpec { name: "weekday".into(), source: "at".into(), derive: Some(Derivation::Weekday) },
            ],
            natural_key: vec!["date".into()],
            null_policy: NullPolicy::Unknown,
            unknown_label: "Unknown".into(),
            always_include_unknown: false,
        };
        let mut b = DimensionBuilder::new(&s, &schema(), 1).unwrap();

        let day = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        let at = |h| RawRecord::new(2, vec![Value::Null, Value::Null, Value::Timestamp(day.and_hms_opt(h, 0, 0).unwrap())]);

        assert_eq!(b.resolve(&at(8)), Some(SurrogateKey(1)));
        assert_eq!(b.resolve(&at(17)), Some(SurrogateKey(1)));
        let table = b.finish();
        assert_eq!(table.rows.len(), 1);
        assert_eq!(table.rows[0].values, vec![Value::Date(day), Value::from("Monday")]);
    }
}
