//! CSV output for star schemas.
//!
//! Each table becomes `<table>.csv` with a header row and its surrogate key
//! as the leftmost column. Output is a pure function of the schema, so the
//! same input always produces byte-identical files.

use serde::{Deserialize, Serialize};
use std::fs::{self, File};
use std::io::BufWriter;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::error::{OutputError, OutputResult};
use crate::models::{DimensionTable, FactTable, StarSchema};

/// Name of the run manifest written next to the tables.
pub const MANIFEST_FILE: &str = "manifest.json";

/// One table written to disk.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct WrittenTable {
    pub table: String,
    /// File name relative to the output directory
    pub file: String,
    pub columns: Vec<String>,
    pub rows: usize,
}

/// Summary of one run, written as `manifest.json`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Manifest {
    pub model: String,
    pub input_rows: usize,
    pub tables: Vec<WrittenTable>,
}

fn dimension_rows(dim: &DimensionTable) -> impl Iterator<Item = Vec<String>> + '_ {
    dim.rows.iter().map(|row| {
        std::iter::once(row.key.to_string())
            .chain(row.values.iter().map(|v| v.render()))
            .collect()
    })
}

fn fact_rows(fact: &FactTable) -> impl Iterator<Item = Vec<String>> + '_ {
    fact.rows.iter().map(|row| {
        std::iter::once(row.key.to_string())
            .chain(
                row.foreign_keys
                    .iter()
                    .map(|fk| fk.map(|k| k.to_string()).unwrap_or_default()),
            )
            .chain(row.measures.iter().map(|v| v.render()))
            .collect()
    })
}

/// Write one table as CSV.
pub fn write_table<I>(path: &Path, header: &[String], rows: I) -> OutputResult<usize>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let file = File::create(path).map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })?;
    let mut writer = csv::Writer::from_writer(BufWriter::new(file));
    let csv_err = |source| OutputError::Csv {
        path: path.to_path_buf(),
        source,
    };

    writer.write_record(header).map_err(csv_err)?;
    let mut count = 0;
    for row in rows {
        writer.write_record(&row).map_err(csv_err)?;
        count += 1;
    }
    writer.flush().map_err(|source| OutputError::Write {
        path: path.to_path_buf(),
        source,
    })?;

    Ok(count)
}

fn ensure_dir(dir: &Path) -> OutputResult<()> {
    fs::create_dir_all(dir).map_err(|source| OutputError::CreateDir {
        path: dir.to_path_buf(),
        source,
    })
}

/// Write every table of `schema` into `dir`, dimensions first.
pub fn write_star_schema(dir: &Path, schema: &StarSchema) -> OutputResult<Vec<WrittenTable>> {
    ensure_dir(dir)?;
    let mut written = Vec::with_capacity(schema.dimensions.len() + 1);

    for dim in &schema.dimensions {
        let file = format!("{}.csv", dim.table);
        let header = dim.header();
        let rows = write_table(&dir.join(&file), &header, dimension_rows(dim))?;
        info!(table = %dim.table, rows, "wrote dimension");
        written.push(WrittenTable {
            table: dim.table.clone(),
            file,
            columns: header,
            rows,
        });
    }

    let fact = &schema.fact;
    let file = format!("{}.csv", fact.table);
    let header = fact.header();
    let rows = write_table(&dir.join(&file), &header, fact_rows(fact))?;
    info!(table = %fact.table, rows, "wrote fact table");
    written.push(WrittenTable {
        table: fact.table.clone(),
        file,
        columns: header,
        rows,
    });

    Ok(written)
}

/// Write `manifest.json` into `dir`.
pub fn write_manifest(dir: &Path, manifest: &Manifest) -> OutputResult<PathBuf> {
    let path = dir.join(MANIFEST_FILE);
    let mut json = serde_json::to_string_pretty(manifest)?;
    json.push('\n');
    fs::write(&path, json).map_err(|source| OutputError::Write {
        path: path.clone(),
        source,
    })?;
    Ok(path)
}

/// Read a manifest back.
pub fn read_manifest(dir: &Path) -> OutputResult<Manifest> {
    let path = dir.join(MANIFEST_FILE);
    let content = fs::read_to_string(&path).map_err(|source| OutputError::Read {
        path: path.clone(),
        source,
    })?;
    Ok(serde_json::from_str(&content)?)
}

/// Render a table to an in-memory CSV string.
pub fn table_to_string<I>(header: &[String], rows: I) -> Result<String, csv::Error>
where
    I: IntoIterator<Item = Vec<String>>,
{
    let mut writer = csv::Writer::from_writer(Vec::new());
    writer.write_record(header)?;
    for row in rows {
        writer.write_record(&row)?;
    }
    writer.flush()?;
    let bytes = writer
        .into_inner()
        .map_err(|e| csv::Error::from(e.into_error()))?;
    Ok(String::from_utf8_lossy(&bytes).into_owned())
}

/// Render every table of `schema` as (file name, CSV text) without touching disk.
pub fn render_star_schema(schema: &StarSchema) -> Result<Vec<(String, String)>, csv::Error> {
    let mut out = Vec::with_capacity(schema.dimensions.len() + 1);
    for dim in &schema.dimensions {
        out.push((
            format!("{}.csv", dim.table),
            table_to_string(&dim.header(), dimension_rows(dim))?,
        ));
    }
    out.push((
        format!("{}.csv", schema.fact.table),
        table_to_string(&schema.fact.header(), fact_rows(&schema.fact))?,
    ));
    Ok(out)
}
