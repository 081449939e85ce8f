//! Built-in model for the EV fast-charger extract.

use super::model::{AttributeSpec, DimensionSpec, FactSpec, MeasureSpec, NullPolicy, StarModel};
use super::{ColumnDef, InputSchema};
use crate::models::ColumnType;

fn attr(name: &str, source: &str) -> AttributeSpec {
    AttributeSpec {
        name: name.to_string(),
        source: source.to_string(),
        derive: None,
    }
}

fn measure(name: &str, source: &str) -> MeasureSpec {
    MeasureSpec {
        name: name.to_string(),
        source: source.to_string(),
    }
}

/// Stations, operators and one fact row per charger record.
///
/// ```text
/// dim_station(station_id, station_name, num_of_charging_stations, lat, long)
/// dim_operator(operator_id, operator_name)
/// fact_ev_charger(record_id, station_id, operator_id, charger_id,
///                 chademo_plug_count, ccs_sae_plug_count, tesla_plug_count, total_plug_count)
/// ```
///
/// Records without a station name get an empty `station_id`; records without
/// an operator point at the `Unknown` operator, which is always present.
pub fn ev_charger_model() -> StarModel {
    let mut input = InputSchema::new(vec![
        ColumnDef::new("ObjId", ColumnType::Integer).required(),
        ColumnDef::new("Station name", ColumnType::Text),
        ColumnDef::new("Station address", ColumnType::Text),
        ColumnDef::new("Latitude", ColumnType::Float),
        ColumnDef::new("Longitude", ColumnType::Float),
        ColumnDef::new("Number of station", ColumnType::Integer),
        ColumnDef::new("Operator", ColumnType::Text),
        ColumnDef::new("Number of plugs", ColumnType::Integer),
        ColumnDef::new("CHAdeMO", ColumnType::Integer),
        ColumnDef::new("CCS/SAE", ColumnType::Integer),
        ColumnDef::new("Tesla(Fast)", ColumnType::Integer),
    ]);
    input.null_values = vec![String::new(), "NA".into(), "N/A".into(), "null".into()];

    StarModel {
        version: "1.0".to_string(),
        name: "ev_chargers".to_string(),
        description: "EV fast chargers: station and operator dimensions, one fact per charger record"
            .to_string(),
        input,
        key_base: 1,
        dimensions: vec![
            DimensionSpec {
                name: "station".to_string(),
                table: Some("dim_station".to_string()),
                key_column: Some("station_id".to_string()),
                attributes: vec![
                    attr("station_name", "Station name"),
                    attr("num_of_charging_stations", "Number of station"),
                    attr("lat", "Latitude"),
                    attr("long", "Longitude"),
                ],
                natural_key: vec!["station_name".to_string()],
                null_policy: NullPolicy::Exclude,
                unknown_label: "Unknown".to_string(),
                always_include_unknown: false,
            },
            DimensionSpec {
                name: "operator".to_string(),
                table: Some("dim_operator".to_string()),
                key_column: Some("operator_id".to_string()),
                attributes: vec![attr("operator_name", "Operator")],
                natural_key: vec!["operator_name".to_string()],
                null_policy: NullPolicy::Unknown,
                unknown_label: "Unknown".to_string(),
                always_include_unknown: true,
            },
        ],
        fact: FactSpec {
            table: "fact_ev_charger".to_string(),
            key_column: "record_id".to_string(),
            measures: vec![
                measure("charger_id", "ObjId"),
                measure("chademo_plug_count", "CHAdeMO"),
                measure("ccs_sae_plug_count", "CCS/SAE"),
                measure("tesla_plug_count", "Tesla(Fast)"),
                measure("total_plug_count", "Number of plugs"),
            ],
        },
    }
}
