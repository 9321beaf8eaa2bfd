/// In-memory tabular dataset
///
/// Columns sit behind an `Arc`, so clones are cheap snapshots. Every
/// row-selecting, sorting or removing operation builds a new `Dataset` and
/// leaves readers of the previous snapshot untouched.
use std::sync::Arc;

use super::value::CellValue;
use crate::error::{EngineError, EngineResult};

#[derive(Clone, Debug, PartialEq)]
pub struct Column {
    pub name: String,
    pub cells: Vec<CellValue>,
}

impl Column {
    pub fn new(name: impl Into<String>, cells: Vec<CellValue>) -> Self {
        Self {
            name: name.into(),
            cells,
        }
    }
}

#[derive(Clone, Debug)]
pub struct Dataset {
    columns: Arc<Vec<Column>>,
    row_count: usize,
}

impl Dataset {
    /// Build a dataset; all columns must share one length and have distinct names
    pub fn new(columns: Vec<Column>) -> EngineResult<Self> {
        let row_count = columns.first().map(|c| c.cells.len()).unwrap_or(0);
        for column in &columns {
            if column.cells.len() != row_count {
                return Err(EngineError::internal(format!(
                    "column '{}' has {} rows, expected {}",
                    column.name,
                    column.cells.len(),
                    row_count
                ))
                .with_context("dataset construction"));
            }
        }
        for (idx, column) in columns.iter().enumerate() {
            if columns[..idx].iter().any(|c| c.name == column.name) {
                return Err(EngineError::invalid_dataset(format!("duplicate column name '{}'", column.name)));
            }
        }
        Ok(Self {
            columns: Arc::new(columns),
            row_count,
        })
    }

    pub fn empty() -> Self {
        Self {
            columns: Arc::new(Vec::new()),
            row_count: 0,
        }
    }

    /// Build from row-major records
    pub fn from_rows<S: AsRef<str>>(headers: &[S], rows: Vec<Vec<CellValue>>) -> EngineResult<Self> {
        let mut columns: Vec<Column> = headers
            .iter()
            .map(|h| Column::new(h.as_ref(), Vec::with_capacity(rows.len())))
            .collect();
        for (row_idx, row) in rows.into_iter().enumerate() {
            if row.len() != columns.len() {
                return Err(EngineError::internal(format!(
                    "row {} has {} cells, expected {}",
                    row_idx,
                    row.len(),
                    columns.len()
                ))
                .with_context("dataset construction"));
            }
            for (column, cell) in columns.iter_mut().zip(row) {
                column.cells.push(cell);
            }
        }
        Self::new(columns)
    }

    /// Build from raw loader strings; inference decides the types later
    pub fn from_raw_rows<S: AsRef<str>>(headers: &[S], rows: &[Vec<String>]) -> EngineResult<Self> {
        let typed = rows
            .iter()
            .map(|row| row.iter().map(|raw| CellValue::from_raw(raw)).collect())
            .collect();
        Self::from_rows(headers, typed)
    }

    pub fn row_count(&self) -> usize {
        self.row_count
    }

    pub fn column_count(&self) -> usize {
        self.columns.len()
    }

    pub fn columns(&self) -> &[Column] {
        &self.columns
    }

    pub fn column_names(&self) -> Vec<&str> {
        self.columns.iter().map(|c| c.name.as_str()).collect()
    }

    pub fn column(&self, name: &str) -> Option<&Column> {
        self.columns.iter().find(|c| c.name == name)
    }

    pub fn column_index(&self, name: &str) -> Option<usize> {
        self.columns.iter().position(|c| c.name == name)
    }

    pub fn cell(&self, row: usize, column: usize) -> Option<&CellValue> {
        self.columns.get(column).and_then(|c| c.cells.get(row))
    }

    /// Cells of one row in column order
    pub fn row(&self, row: usize) -> Option<Vec<&CellValue>> {
        if row >= self.row_count {
            return None;
        }
        Some(self.columns.iter().map(|c| &c.cells[row]).collect())
    }

    /// New snapshot holding the given rows in the given order
    pub fn take_rows(&self, indices: &[usize]) -> EngineResult<Self> {
        if let Some(bad) = indices.iter().find(|&&i| i >= self.row_count) {
            return Err(EngineError::internal(format!(
                "row index {} out of bounds for {} rows",
                bad, self.row_count
            )));
        }
        let columns = self
            .columns
            .iter()
            .map(|c| Column::new(c.name.clone(), indices.iter().map(|&i| c.cells[i].clone()).collect()))
            .collect();
        Ok(Self {
            columns: Arc::new(columns),
            row_count: indices.len(),
        })
    }

    /// True when both snapshots share column storage
    pub fn shares_storage_with(&self, other: &Dataset) -> bool {
        Arc::ptr_eq(&self.columns, &other.columns)
    }
}

impl PartialEq for Dataset {
    fn eq(&self, other: &Self) -> bool {
        self.row_count == other.row_count && self.columns == other.columns
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample() -> Dataset {
        Dataset::from_rows(
            &["region", "revenue"],
            vec![
                vec!["west".into(), 1200.0.into()],
                vec!["east".into(), 800.0.into()],
                vec!["west".into(), CellValue::Null],
            ],
        )
        .unwrap()
    }

    #[test]
    fn test_from_rows_transposes() {
        let ds = sample();
        assert_eq!(ds.row_count(), 3);
        assert_eq!(ds.column_names(), vec!["region", "revenue"]);
        assert_eq!(ds.cell(1, 1), Some(&CellValue::Number(800.0)));
    }

    #[test]
    fn test_ragged_columns_rejected() {
        let err = Dataset::new(vec![
            Column::new("a", vec![1.0.into()]),
            Column::new("b", vec![]),
        ])
        .unwrap_err();
        assert!(!err.is_user_error());
    }

    #[test]
    fn test_duplicate_headers_are_a_data_error() {
        let err = Dataset::from_raw_rows(&["id", "name", "id"], &[vec!["1".into(), "amy".into(), "2".into()]])
            .unwrap_err();
        assert_eq!(err, EngineError::invalid_dataset("duplicate column name 'id'"));
        assert!(err.is_user_error());
    }

    #[test]
    fn test_equal_content_compares_equal() {
        let ds = sample();
        let copy = ds.take_rows(&[0, 1, 2]).unwrap();
        assert!(!copy.shares_storage_with(&ds));
        assert_eq!(copy, ds);
        assert_ne!(ds.take_rows(&[0]).unwrap(), ds);
    }

    #[test]
    fn test_take_rows_is_new_snapshot() {
        let ds = sample();
        let clone = ds.clone();
        assert!(clone.shares_storage_with(&ds));

        let picked = ds.take_rows(&[2, 0]).unwrap();
        assert!(!picked.shares_storage_with(&ds));
        assert_eq!(picked.row_count(), 2);
        assert_eq!(picked.cell(1, 1), Some(&CellValue::Number(1200.0)));
        assert_eq!(ds.row_count(), 3);
    }

    #[test]
    fn test_raw_rows_blank_is_null() {
        let ds = Dataset::from_raw_rows(
            &["name", "marks"],
            &[vec!["amy".to_string(), "".to_string()]],
        )
        .unwrap();
        assert_eq!(ds.cell(0, 1), Some(&CellValue::Null));
    }
}
