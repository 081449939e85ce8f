//! Per-invocation transformation state.

use tracing::info;

use super::dimension::DimensionBuilder;
use crate::error::{ModelError, ModelResult};
use crate::models::{FactRow, FactTable, RawRecord, StarSchema, SurrogateKey};
use crate::schema::StarModel;

/// Owns every key registry and partially built table of one run.
///
/// Created by [`TransformContext::new`], fed records in input order with
/// [`TransformContext::push`], consumed by [`TransformContext::finish`].
#[derive(Debug)]
pub struct TransformContext {
    dimensions: Vec<DimensionBuilder>,
    fact_table: String,
    fact_key_column: String,
    measure_columns: Vec<String>,
    measure_sources: Vec<usize>,
    facts: Vec<FactRow>,
    next_fact_key: u64,
}

impl TransformContext {
    pub fn new(model: &StarModel) -> ModelResult<Self> {
        let dimensions = model
            .dimensions
            .iter()
            .map(|spec| DimensionBuilder::new(spec, &model.input, model.key_base))
            .collect::<ModelResult<Vec<_>>>()?;

        let measure_sources = model
            .fact
            .measures
            .iter()
            .map(|m| {
                model.input.index_of(&m.source).ok_or_else(|| {
                    ModelError::Invalid(format!(
                        "measure '{}': column '{}' not in input schema",
                        m.name, m.source
                    ))
                })
            })
            .collect::<ModelResult<Vec<_>>>()?;

        Ok(Self {
            dimensions,
            fact_table: model.fact.table.clone(),
            fact_key_column: model.fact.key_column.clone(),
            measure_columns: model.fact.measures.iter().map(|m| m.name.clone()).collect(),
            measure_sources,
            facts: Vec::new(),
            next_fact_key: model.key_base,
        })
    }

    /// Resolve every dimension for `record` and append its fact row.
    pub fn push(&mut self, record: &RawRecord) {
        let foreign_keys = self
            .dimensions
            .iter_mut()
            .map(|d| d.resolve(record))
            .collect();
        let measures = self
            .measure_sources
            .iter()
            .map(|&i| record.get(i).clone())
            .collect();

        self.facts.push(FactRow {
            key: SurrogateKey(self.next_fact_key),
            foreign_keys,
            measures,
        });
        self.next_fact_key += 1;
    }

    pub fn fact_count(&self) -> usize {
        self.facts.len()
    }

    pub fn finish(self) -> StarSchema {
        let foreign_key_columns = self
            .dimensions
            .iter()
            .map(|d| d.key_column().to_string())
            .collect();

        let dimensions: Vec<_> = self.dimensions.into_iter().map(|d| d.finish()).collect();
        for dim in &dimensions {
            info!(dimension = %dim.name, table = %dim.table, rows = dim.len(), "dimension built");
        }
        info!(table = %self.fact_table, rows = self.facts.len(), "fact table built");

        StarSchema {
            dimensions,
            fact: FactTable {
                table: self.fact_table,
                key_column: self.fact_key_column,
                foreign_key_columns,
                measure_columns: self.measure_columns,
                rows: self.facts,
            },
        }
    }
}
