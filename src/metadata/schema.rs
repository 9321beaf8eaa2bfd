/// Column schema derived from a dataset
///
/// `inspect` is a pure function of the dataset's current state. Callers
/// re-run it after every shape change; nothing here is cached.
///
/// Key invariants:
/// - `null_count` is exact (every cell is counted, not a sample)
/// - Type inference samples the first N non-null cells in row order, so the
///   result is deterministic for a given dataset
/// - Ordinals follow the dataset's declaration order
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use tracing::debug;

use crate::config::EngineConfig;
use crate::dataset::{CellValue, Column, Dataset, TypeTag};

/// Inferred type and null statistics for one column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnSchema {
    pub name: String,
    /// Position in the dataset (declaration order)
    pub ordinal: usize,
    pub inferred_type: TypeTag,
    pub null_count: usize,
    /// Up to `distinct_sample_size` distinct values in order of appearance
    pub distinct_sample: Vec<String>,
}

impl ColumnSchema {
    pub fn null_rate(&self, row_count: usize) -> f64 {
        if row_count == 0 {
            0.0
        } else {
            self.null_count as f64 / row_count as f64
        }
    }
}

/// Column catalog for one dataset snapshot
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct Schema {
    columns: Vec<ColumnSchema>,
    row_count: usize,
    #[serde(skip)]
    lookup: HashMap<String, usize>,
}

impl Schema {
    pub fn new(columns: Vec<ColumnSchema>, row_count: usize) -> Self {
        let lookup = columns
            .iter()
            .enumerate()
            .map(|(idx, c)| (c.name.clone(), idx))
            .collect();
        Self {
            columns,
            row_count,
            lookup,
        }
    }

    pub fn columns(&self) -> &[ColumnSchema] {
        &self.columns
    }

    /// Exact (case-sensitive) lookup
    pub fn get(&self, name: &str) -> Option<&ColumnSchema> {
        match self.lookup.get(name) {
            Some(&idx) => self.columns.get(idx),
            // Deserialized schemas arrive without the lookup table
            None => self.columns.iter().find(|c| c.name == name),
        }
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn len(&self) -> usize {
        self.columns.len()
    }

    pub fn is_empty(&self) -> bool {
        self.columns.is_empty()
    }

    pub fn columns_of_type(&self, tag: TypeTag) -> impl Iterator<Item = &ColumnSchema> {
        self.columns.iter().filter(move |c| c.inferred_type == tag)
    }
}

/// Derive the schema of every column in `dataset`
pub fn inspect(dataset: &Dataset, config: &EngineConfig) -> Schema {
    let columns: Vec<ColumnSchema> = dataset
        .columns()
        .iter()
        .enumerate()
        .map(|(ordinal, column)| inspect_column(column, ordinal, config))
        .collect();
    debug!(
        columns = columns.len(),
        rows = dataset.row_count(),
        "inspected dataset schema"
    );
    Schema::new(columns, dataset.row_count())
}

fn inspect_column(column: &Column, ordinal: usize, config: &EngineConfig) -> ColumnSchema {
    let null_count = column.cells.iter().filter(|c| c.is_null()).count();
    let sample: Vec<&CellValue> = column
        .cells
        .iter()
        .filter(|c| !c.is_null())
        .take(config.sample_size_for_type_inference)
        .collect();

    let mut distinct_sample: Vec<String> = Vec::new();
    for cell in column.cells.iter().filter(|c| !c.is_null()) {
        if distinct_sample.len() >= config.distinct_sample_size {
            break;
        }
        let text = cell.to_string();
        if !distinct_sample.contains(&text) {
            distinct_sample.push(text);
        }
    }

    ColumnSchema {
        name: column.name.clone(),
        ordinal,
        inferred_type: infer_type(&sample, config.type_inference_threshold),
        null_count,
        distinct_sample,
    }
}

/// First candidate (numeric > date > boolean) that enough sampled values parse as
pub fn infer_type(sample: &[&CellValue], threshold: f64) -> TypeTag {
    if sample.is_empty() {
        return TypeTag::Text;
    }
    let total = sample.len() as f64;
    for candidate in TypeTag::inference_order() {
        let hits = sample.iter().filter(|cell| cell.matches_type(candidate)).count();
        if hits as f64 / total >= threshold {
            return candidate;
        }
    }
    TypeTag::Text
}
