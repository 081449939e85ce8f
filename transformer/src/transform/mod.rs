//! Transformation module.
//!
//! Splits typed records into dimension and fact tables:
//! - `keys`: natural key → surrogate key registry
//! - `dimension`: per-dimension row accumulation
//! - `context`: state owned by one transformation run
//! - `pipeline`: read → transform → check → write
//!
//! ```text
//! Records (flat)                       Star schema
//! ┌──────────────────────────┐        ┌───────────────────────┐
//! │ station A, V1, kwh 10    │        │ dim_station  1 A      │
//! │ station A, V2, kwh 5     │   →    │ dim_vehicle  1 V1     │
//! └──────────────────────────┘        │              2 V2     │
//!                                     │ fact  1 1 1 10        │
//!                                     │       2 1 2 5         │
//!                                     └───────────────────────┘
//! ```

pub mod context;
pub mod dimension;
pub mod keys;
pub mod pipeline;

pub use context::TransformContext;
pub use dimension::DimensionBuilder;
pub use keys::{KeyRegistry, Resolved};
pub use pipeline::*;

use crate::error::ModelResult;
use crate::models::{RawRecord, StarSchema};
use crate::schema::StarModel;

/// Build the star schema for `records` in one pass, in input order.
pub fn transform(records: &[RawRecord], model: &StarModel) -> ModelResult<StarSchema> {
    let mut context = TransformContext::new(model)?;
    for record in records {
        context.push(record);
    }
    Ok(context.finish())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::{SurrogateKey, Value};
    use crate::schema::{
        AttributeSpec, ColumnDef, DimensionSpec, FactSpec, InputSchema, MeasureSpec, NullPolicy,
    };
    use crate::models::ColumnType;

    fn dim(name: &str, policy: NullPolicy) -> DimensionSpec {
        DimensionSpec {
            name: name.into(),
            table: None,
            key_column: None,
            attributes: vec![AttributeSpec {
                name: name.into(),
                source: name.into(),
                derive: None,
            }],
            natural_key: vec![name.into()],
            null_policy: policy,
            unknown_label: "Unknown".into(),
            always_include_unknown: false,
        }
    }

    fn session_model(vehicle_policy: NullPolicy) -> StarModel {
        StarModel {
            version: "1.0".into(),
            name: "sessions".into(),
            description: String::new(),
            input: InputSchema::new(vec![
                ColumnDef::new("station", ColumnType::Text),
                ColumnDef::new("vehicle", ColumnType::Text),
                ColumnDef::new("kwh", ColumnType::Float),
            ]),
            key_base: 1,
            dimensions: vec![dim("station", NullPolicy::Unknown), dim("vehicle", vehicle_policy)],
            fact: FactSpec {
                table: "fact_session".into(),
                key_column: "session_id".into(),
                measures: vec![MeasureSpec {
                    name: "kwh".into(),
                    source: "kwh".into(),
                }],
            },
        }
    }

    fn rec(line: u64, station: Option<&str>, vehicle: Option<&str>, kwh: f64) -> RawRecord {
        let text = |v: Option<&str>| v.map(Value::from).unwrap_or(Value::Null);
        RawRecord::new(line, vec![text(station), text(vehicle), Value::Float(kwh)])
    }

    #[test]
    fn test_two_sessions_one_station() {
        let records = vec![
            rec(2, Some("A"), Some("V1"), 10.0),
            rec(3, Some("A"), Some("V2"), 5.0),
        ];
        let star = transform(&records, &session_model(NullPolicy::Unknown)).unwrap();

        let station = star.dimension("station").unwrap();
        assert_eq!(station.rows.len(), 1);
        assert_eq!(station.rows[0].key, SurrogateKey(1));
        assert_eq!(station.rows[0].values, vec![Value::from("A")]);

        let vehicle = star.dimension("vehicle").unwrap();
        let keys: Vec<_> = vehicle.rows.iter().map(|r| (r.key.value(), r.values[0].render())).collect();
        assert_eq!(keys, vec![(1, "V1".to_string()), (2, "V2".to_string())]);

        let facts: Vec<_> = star
            .fact
            .rows
            .iter()
            .map(|f| (f.foreign_keys.clone(), f.measures.clone()))
            .collect();
        assert_eq!(
            facts,
            vec![
                (vec![Some(SurrogateKey(1)), Some(SurrogateKey(1))], vec![Value::Float(10.0)]),
                (vec![Some(SurrogateKey(1)), Some(SurrogateKey(2))], vec![Value::Float(5.0)]),
            ]
        );
        assert_eq!(star.fact.header(), vec!["session_id", "station_key", "vehicle_key", "kwh"]);
    }

    #[test]
    fn test_duplicate_records_keep_every_fact() {
        let records = vec![
            rec(2, Some("A"), Some("V1"), 1.0),
            rec(3, Some("A"), Some("V1"), 1.0),
            rec(4, Some("A"), Some("V1"), 1.0),
        ];
        let star = transform(&records, &session_model(NullPolicy::Unknown)).unwrap();

        assert_eq!(star.fact.rows.len(), 3);
        assert_eq!(star.dimension("station").unwrap().len(), 1);
        assert_eq!(star.dimension("vehicle").unwrap().len(), 1);
        assert!(star
            .fact
            .rows
            .iter()
            .all(|f| f.foreign_keys == vec![Some(SurrogateKey(1)), Some(SurrogateKey(1))]));
        let fact_keys: Vec<u64> = star.fact.rows.iter().map(|f| f.key.value()).collect();
        assert_eq!(fact_keys, vec![1, 2, 3]);
    }

    #[test]
    fn test_null_policies() {
        let records = vec![
            rec(2, None, None, 1.0),
            rec(3, Some("A"), Some("V1"), 2.0),
        ];

        let star = transform(&records, &session_model(NullPolicy::Exclude)).unwrap();
        assert_eq!(star.fact.rows[0].foreign_keys, vec![Some(SurrogateKey::UNKNOWN), None]);
        assert_eq!(star.fact.rows[1].foreign_keys, vec![Some(SurrogateKey(1)), Some(SurrogateKey(1))]);

        let station = star.dimension("station").unwrap();
        assert_eq!(station.rows[0].key, SurrogateKey::UNKNOWN);
        assert_eq!(station.rows[0].values, vec![Value::from("Unknown")]);
        assert_eq!(star.dimension("vehicle").unwrap().len(), 1);
    }

    #[test]
    fn test_empty_input() {
        let star = transform(&[], &session_model(NullPolicy::Unknown)).unwrap();
        assert!(star.fact.is_empty());
        assert!(star.dimensions.iter().all(|d| d.is_empty()));
    }

    #[test]
    fn test_transform_is_deterministic() {
        let records: Vec<_> = (0..50)
            .map(|i| {
                let station = format!("S{}", i % 7);
                let vehicle = format!("V{}", i % 11);
                rec(i + 2, Some(&station), Some(&vehicle), i as f64)
            })
            .collect();
        let model = session_model(NullPolicy::Unknown);

        assert_eq!(transform(&records, &model).unwrap(), transform(&records, &model).unwrap());
    }

    #[test]
    fn test_key_base_applies_to_dimensions_and_facts() {
        let mut model = session_model(NullPolicy::Unknown);
        model.key_base = 10;
        let star = transform(&[rec(2, Some("A"), Some("V1"), 1.0)], &model).unwrap();

        assert_eq!(star.dimension("station").unwrap().rows[0].key, SurrogateKey(10));
        assert_eq!(star.fact.rows[0].key, SurrogateKey(10));
    }
}
