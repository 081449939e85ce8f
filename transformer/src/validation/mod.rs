//! Integrity checks for star schemas.
//!
//! The same three invariants are checked on an in-memory [`StarSchema`]
//! (right after transformation) and on a directory of written tables
//! (`starload verify`):
//!
//! - surrogate keys and natural keys are unique within each dimension
//! - every non-empty fact foreign key exists in its dimension
//! - the fact table has one row per input record (in-memory only)

use std::collections::HashSet;
use std::path::Path;

use crate::error::{IntegrityError, IntegrityResult, PipelineResult};
use crate::models::{NaturalKey, StarSchema};
use crate::parser::read_file;
use crate::schema::StarModel;

/// Counts gathered while verifying a written output directory.
#[derive(Debug, Clone, PartialEq)]
pub struct VerifyReport {
    /// (table, row count) for every dimension
    pub dimensions: Vec<(String, usize)>,
    pub fact_rows: usize,
    /// Fact foreign keys left empty
    pub null_foreign_keys: usize,
}

/// Collect surrogate keys, rejecting duplicate surrogate or natural keys.
///
/// Natural keys are compared as tuples, never as joined text.
fn unique_keys<I>(table: &str, rows: I) -> IntegrityResult<HashSet<String>>
where
    I: IntoIterator<Item = (String, NaturalKey)>,
{
    let mut keys = HashSet::new();
    let mut natural_keys = HashSet::new();

    for (key, natural_key) in rows {
        if natural_keys.contains(&natural_key) {
            return Err(IntegrityError::DuplicateNaturalKey {
                table: table.to_string(),
                natural_key: natural_key.to_string(),
            });
        }
        natural_keys.insert(natural_key);
        if !keys.insert(key.clone()) {
            return Err(IntegrityError::DuplicateKey {
                table: table.to_string(),
                key,
            });
        }
    }

    Ok(keys)
}

/// Check every invariant of a freshly built star schema.
pub fn check_star_schema(schema: &StarSchema, input_records: usize) -> IntegrityResult<()> {
    if schema.fact.rows.len() != input_records {
        return Err(IntegrityError::RowCountMismatch {
            facts: schema.fact.rows.len(),
            records: input_records,
        });
    }

    let key_sets = schema
        .dimensions
        .iter()
        .map(|dim| {
            unique_keys(
                &dim.table,
                dim.rows
                    .iter()
                    .map(|row| (row.key.to_string(), dim.natural_key_of(row))),
            )
        })
        .collect::<IntegrityResult<Vec<_>>>()?;

    for (row_idx, fact) in schema.fact.rows.iter().enumerate() {
        for ((fk, keys), dim) in fact.foreign_keys.iter().zip(&key_sets).zip(&schema.dimensions) {
            if let Some(key) = fk {
                let key = key.to_string();
                if !keys.contains(&key) {
                    return Err(IntegrityError::DanglingForeignKey {
                        row: row_idx + 1,
                        column: dim.key_column.clone(),
                        key,
                        table: dim.table.clone(),
                    });
                }
            }
        }
    }

    Ok(())
}

fn column_position(headers: &[String], table: &str, column: &str) -> IntegrityResult<usize> {
    headers
        .iter()
        .position(|h| h == column)
        .ok_or_else(|| IntegrityError::MissingColumn {
            table: table.to_string(),
            column: column.to_string(),
        })
}

/// Re-read the tables written for `model` under `dir` and check them.
pub fn verify_output_dir(dir: &Path, model: &StarModel) -> PipelineResult<VerifyReport> {
    let mut key_sets = Vec::with_capacity(model.dimensions.len());
    let mut dimensions = Vec::with_capacity(model.dimensions.len());

    for spec in &model.dimensions {
        let table_name = spec.table_name();
        let table = read_file(dir.join(format!("{}.csv", table_name)), Some(','))?;

        let key_pos = column_position(&table.headers, &table_name, &spec.key_column_name())?;
        let natural_pos = spec
            .natural_key
            .iter()
            .map(|k| column_position(&table.headers, &table_name, k))
            .collect::<IntegrityResult<Vec<_>>>()?;

        let rows = table.rows.iter().map(|(_, record)| {
            let key = record.get(key_pos).unwrap_or("").to_string();
            let natural = NaturalKey(
                natural_pos
                    .iter()
                    .map(|&p| record.get(p).unwrap_or("").to_string())
                    .collect(),
            );
            (key, natural)
        });
        key_sets.push(unique_keys(&table_name, rows)?);
        dimensions.push((table_name, table.rows.len()));
    }

    let fact = read_file(dir.join(format!("{}.csv", model.fact.table)), Some(','))?;
    let fk_positions = model
        .dimensions
        .iter()
        .map(|spec| column_position(&fact.headers, &model.fact.table, &spec.key_column_name()))
        .collect::<IntegrityResult<Vec<_>>>()?;

    let mut null_foreign_keys = 0;
    for (row_idx, (_, record)) in fact.rows.iter().enumerate() {
        for ((&pos, keys), spec) in fk_positions.iter().zip(&key_sets).zip(&model.dimensions) {
            let value = record.get(pos).unwrap_or("");
            if value.is_empty() {
                null_foreign_keys += 1;
            } else if !keys.contains(value) {
                return Err(IntegrityError::DanglingForeignKey {
                    row: row_idx + 1,
                    column: spec.key_column_name(),
                    key: value.to_string(),
                    table: spec.table_name(),
                }
                .into());
            }
        }
    }

    Ok(VerifyReport {
        dimensions,
        fact_rows: fact.rows.len(),
        null_foreign_keys,
    })
}
