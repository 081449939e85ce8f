//! High-level pipeline API: CSV extract in, star-schema CSV files out.
//!
//! # Example
//!
//! ```rust,ignore
//! use starload::{ev_charger_model, run, TransformOptions};
//! use std::path::Path;
//!
//! let report = run(
//!     Path::new("raw_data/fast_chargers.csv"),
//!     &ev_charger_model(),
//!     &TransformOptions::default(),
//! )?;
//! println!("Wrote {} tables", report.tables.len());
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, info_span};

use super::transform;
use crate::error::PipelineResult;
use crate::models::StarSchema;
use crate::parser::{format_delimiter, read_bytes, read_file, type_records, RawTable};
use crate::schema::StarModel;
use crate::validation::check_star_schema;
use crate::writer::{write_manifest, write_star_schema, Manifest, WrittenTable};

/// Default output directory
pub const DEFAULT_OUTPUT_DIR: &str = "data_file_output";

/// Options for the transformation pipeline
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct TransformOptions {
    /// Directory receiving the table files
    pub output_dir: PathBuf,

    /// Input delimiter, auto-detected when unset
    pub delimiter: Option<char>,

    /// Reject header columns not declared in the model
    pub strict_columns: bool,

    /// Write manifest.json next to the tables
    pub write_manifest: bool,
}

impl Default for TransformOptions {
    fn default() -> Self {
        Self {
            output_dir: PathBuf::from(DEFAULT_OUTPUT_DIR),
            delimiter: None,
            strict_columns: false,
            write_manifest: true,
        }
    }
}

/// Input file information
#[derive(Debug, Clone, Serialize)]
pub struct InputInfo {
    pub encoding: String,
    pub delimiter: char,
    pub headers: Vec<String>,
    pub row_count: usize,
    /// Header columns not declared in the model
    pub ignored_columns: Vec<String>,
}

/// Result of a complete pipeline run
#[derive(Debug, Clone)]
pub struct TransformReport {
    pub input: InputInfo,
    pub schema: StarSchema,
    /// Tables in the order they were written
    pub tables: Vec<WrittenTable>,
    /// Manifest path, when one was written
    pub manifest: Option<PathBuf>,
}

/// Transform a CSV file and write the star schema.
///
/// 1. Reads the file with encoding / delimiter detection
/// 2. Types every field against the model's input schema
/// 3. Builds dimensions and fact table
/// 4. Checks uniqueness, referential integrity and row counts
/// 5. Writes one CSV per table (and the manifest)
///
/// Nothing is written unless steps 1-4 succeed.
pub fn run(input: &Path, model: &StarModel, options: &TransformOptions) -> PipelineResult<TransformReport> {
    let span = info_span!("transform", model = %model.name, input = %input.display());
    let _guard = span.enter();

    let table = read_file(input, options.delimiter)?;
    let (info, schema) = build(table, model, options)?;

    let tables = write_star_schema(&options.output_dir, &schema)?;
    let manifest = if options.write_manifest {
        let manifest = Manifest {
            model: model.name.clone(),
            input_rows: info.row_count,
            tables: tables.clone(),
        };
        Some(write_manifest(&options.output_dir, &manifest)?)
    } else {
        None
    };

    info!(
        output = %options.output_dir.display(),
        tables = tables.len(),
        "star schema written"
    );

    Ok(TransformReport {
        input: info,
        schema,
        tables,
        manifest,
    })
}

/// Transform CSV bytes in memory, without writing anything.
pub fn transform_bytes(
    bytes: &[u8],
    model: &StarModel,
    options: &TransformOptions,
) -> PipelineResult<(InputInfo, StarSchema)> {
    let table = read_bytes(bytes, options.delimiter)?;
    build(table, model, options)
}

/// Internal: type, transform and check already-read rows
fn build(
    table: RawTable,
    model: &StarModel,
    options: &TransformOptions,
) -> PipelineResult<(InputInfo, StarSchema)> {
    info!(
        encoding = %table.encoding,
        delimiter = %format_delimiter(table.delimiter),
        rows = table.rows.len(),
        columns = table.headers.len(),
        "read input"
    );

    let typed = type_records(&table, &model.input, options.strict_columns)?;
    let schema = transform(&typed.records, model)?;
    check_star_schema(&schema, typed.records.len())?;

    let info = InputInfo {
        encoding: table.encoding,
        delimiter: table.delimiter,
        headers: table.headers,
        row_count: typed.records.len(),
        ignored_columns: typed.ignored_columns,
    };
    Ok((info, schema))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::PipelineError;
    use crate::models::{SurrogateKey, Value};
    use crate::schema::ev_charger_model;
    use crate::validation::verify_output_dir;
    use crate::writer::read_manifest;
    use std::fs;

    const CHARGERS: &str = "\
ObjId,Station name,Station address,Latitude,Longitude,Number of station,Operator,Number of plugs,CHAdeMO,CCS/SAE,Tesla(Fast)
101,Central,Main St 1,59.33,18.06,2,Ionity,4,1,2,1
102,Central,Main St 1,59.33,18.06,2,Ionity,2,0,2,0
103,Harbor,Dock 3,57.70,11.97,1,,2,1,1,0
104,,Nowhere,,,,Tesla,8,0,0,8
";

    fn options(dir: &Path) -> TransformOptions {
        TransformOptions {
            output_dir: dir.to_path_buf(),
            ..TransformOptions::default()
        }
    }

    #[test]
    fn test_default_options() {
        let opts = TransformOptions::default();
        assert_eq!(opts.output_dir, PathBuf::from("data_file_output"));
        assert!(opts.delimiter.is_none());
        assert!(!opts.strict_columns);
        assert!(opts.write_manifest);
    }

    #[test]
    fn test_ev_charger_in_memory() {
        let (info, star) =
            transform_bytes(CHARGERS.as_bytes(), &ev_charger_model(), &TransformOptions::default()).unwrap();
        assert_eq!(info.row_count, 4);
        assert_eq!(info.delimiter, ',');

        let stations = star.dimension("station").unwrap();
        let names: Vec<String> = stations.rows.iter().map(|r| r.values[0].render()).collect();
        assert_eq!(names, vec!["Central", "Harbor"]);

        let operators = star.dimension("operator").unwrap();
        let names: Vec<(u64, String)> = operators
            .rows
            .iter()
            .map(|r| (r.key.value(), r.values[0].render()))
            .collect();
        assert_eq!(
            names,
            vec![(0, "Unknown".into()), (1, "Ionity".into()), (2, "Tesla".into())]
        );

        let fks: Vec<_> = star.fact.rows.iter().map(|f| f.foreign_keys.clone()).collect();
        assert_eq!(
            fks,
            vec![
                vec![Some(SurrogateKey(1)), Some(SurrogateKey(1))],
                vec![Some(SurrogateKey(1)), Some(SurrogateKey(1))],
                vec![Some(SurrogateKey(2)), Some(SurrogateKey::UNKNOWN)],
                vec![None, Some(SurrogateKey(2))],
            ]
        );
        assert_eq!(star.fact.rows[0].measures[0], Value::Integer(101));
    }

    #[test]
    fn test_run_writes_tables_and_manifest() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("fast_chargers.csv");
        fs::write(&input, CHARGERS).unwrap();
        let out = dir.path().join("out");

        let report = run(&input, &ev_charger_model(), &options(&out)).unwrap();
        assert_eq!(report.tables.len(), 3);
        assert!(report.manifest.is_some());

        let fact = fs::read_to_string(out.join("fact_ev_charger.csv")).unwrap();
        let mut lines = fact.lines();
        assert_eq!(
            lines.next(),
            Some("record_id,station_id,operator_id,charger_id,chademo_plug_count,ccs_sae_plug_count,tesla_plug_count,total_plug_count")
        );
        assert_eq!(lines.next(), Some("1,1,1,101,1,2,1,4"));
        assert_eq!(lines.last(), Some("4,,2,104,0,0,8,8"));

        let stations = fs::read_to_string(out.join("dim_station.csv")).unwrap();
        assert_eq!(
            stations,
            "station_id,station_name,num_of_charging_stations,lat,long\n1,Central,2,59.33,18.06\n2,Harbor,1,57.7,11.97\n"
        );

        let manifest = read_manifest(&out).unwrap();
        assert_eq!(manifest.input_rows, 4);
        assert_eq!(manifest.tables[2].rows, 4);

        let verified = verify_output_dir(&out, &ev_charger_model()).unwrap();
        assert_eq!(verified.fact_rows, 4);
        assert_eq!(verified.null_foreign_keys, 1);
    }

    #[test]
    fn test_runs_are_byte_identical() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        fs::write(&input, CHARGERS).unwrap();

        let a = dir.path().join("a");
        let b = dir.path().join("b");
        run(&input, &ev_charger_model(), &options(&a)).unwrap();
        run(&input, &ev_charger_model(), &options(&b)).unwrap();

        for file in ["dim_station.csv", "dim_operator.csv", "fact_ev_charger.csv", "manifest.json"] {
            assert_eq!(fs::read(a.join(file)).unwrap(), fs::read(b.join(file)).unwrap(), "{file}");
        }
    }

    #[test]
    fn test_malformed_value_writes_nothing() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("in.csv");
        let bad = CHARGERS.replace("57.70", "fifty-seven");
        fs::write(&input, bad).unwrap();
        let out = dir.path().join("out");

        let err = run(&input, &ev_charger_model(), &options(&out)).unwrap_err();
        match err {
            PipelineError::Csv(e) => {
                assert_eq!(e.line, 4);
                assert_eq!(e.column.as_deref(), Some("Latitude"));
            }
            other => panic!("unexpected error: {other}"),
        }
        assert!(!out.exists());
    }

    #[test]
    fn test_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let err = run(&dir.path().join("absent.csv"), &ev_charger_model(), &options(dir.path())).unwrap_err();
        assert!(err.to_string().contains("Cannot read file"));
    }

    #[test]
    fn test_strict_columns() {
        let with_comment = CHARGERS
            .lines()
            .enumerate()
            .map(|(i, l)| if i == 0 { format!("{},Comment", l) } else { format!("{},note", l) })
            .collect::<Vec<_>>()
            .join("\n");
        let mut opts = TransformOptions::default();

        let (info, _) = transform_bytes(with_comment.as_bytes(), &ev_charger_model(), &opts).unwrap();
        assert_eq!(info.ignored_columns, vec!["Comment"]);

        opts.strict_columns = true;
        let err = transform_bytes(with_comment.as_bytes(), &ev_charger_model(), &opts).unwrap_err();
        assert!(matches!(err, PipelineError::Schema(_)));
    }
}
