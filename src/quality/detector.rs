/// Data-Quality Detector
///
/// Fixed scans over a dataset snapshot, recomputed in full on every call:
/// - Missing: null or blank cells
/// - TypeMismatch: cells that do not coerce to the column's inferred type
/// - ErrorValue: spreadsheet error literals (`#DIV/0!`, `#N/A`, ...)
/// - OutOfRange: numeric values beyond the 3 x IQR fences
/// - Duplicate: rows equal to an earlier row (the first occurrence is kept)
///
/// An ad-hoc predicate adds PredicateMatch flags for the rows it selects.
use fxhash::FxHashMap;
use tracing::debug;

use super::report::{IssueKind, MissingSummary, QualityFlag, QualityReport};
use crate::config::EngineConfig;
use crate::dataset::{CellValue, Dataset, TypeTag};
use crate::error::EngineResult;
use crate::execution::aggregate::iqr_fences;
use crate::execution::Executor;
use crate::metadata::{ColumnSchema, Schema};
use crate::query::Predicate;

pub const ERROR_LITERALS: &[&str] = &["#DIV/0!", "#N/A", "#NAME?", "#NULL!", "#NUM!", "#REF!", "#VALUE!"];

/// Fence width for out-of-range values
const OUT_OF_RANGE_IQR: f64 = 3.0;
/// Fewer numeric values than this never produce out-of-range flags
const MIN_VALUES_FOR_FENCES: usize = 4;

pub struct QualityDetector {
    executor: Executor,
}

impl QualityDetector {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            executor: Executor::new(config),
        }
    }

    /// Every fixed scan, plus PredicateMatch flags when `predicate` is given
    pub fn scan(&self, dataset: &Dataset, schema: &Schema, predicate: Option<&Predicate>) -> EngineResult<QualityReport> {
        let mut report = self.scan_kinds(dataset, schema, &IssueKind::fixed_scans(), None)?;
        if let Some(predicate) = predicate {
            let selection = self.executor.evaluate(predicate, dataset)?;
            let detail = format!("matches {}", predicate);
            report.flags.extend(selection.indices().into_iter().map(|row| QualityFlag {
                kind: IssueKind::PredicateMatch,
                row_index: row,
                column: None,
                detail: detail.clone(),
            }));
        }
        Ok(report)
    }

    /// Run only `kinds`, optionally restricted to one column.
    /// Duplicate detection always compares whole rows.
    pub fn scan_kinds(
        &self,
        dataset: &Dataset,
        schema: &Schema,
        kinds: &[IssueKind],
        column: Option<&str>,
    ) -> EngineResult<QualityReport> {
        self.executor.check_rows(dataset)?;

        let targets: Vec<&ColumnSchema> = schema
            .columns()
            .iter()
            .filter(|c| column.map_or(true, |name| c.name == name))
            .collect();

        let mut flags = Vec::new();
        for kind in kinds {
            match kind {
                IssueKind::Missing => flags.extend(scan_cells(dataset, &targets, IssueKind::Missing, |_, cell| {
                    cell.is_null().then(|| "missing value".to_string())
                })),
                IssueKind::TypeMismatch => {
                    flags.extend(scan_cells(dataset, &targets, IssueKind::TypeMismatch, |schema, cell| {
                        let mismatched = schema.inferred_type != TypeTag::Text
                            && !cell.is_null()
                            && !cell.matches_type(schema.inferred_type);
                        mismatched.then(|| format!("expected {}, found '{}'", schema.inferred_type, cell))
                    }))
                }
                IssueKind::ErrorValue => flags.extend(scan_cells(dataset, &targets, IssueKind::ErrorValue, |_, cell| {
                    error_literal(cell).map(|lit| format!("spreadsheet error {}", lit))
                })),
                IssueKind::OutOfRange => flags.extend(scan_out_of_range(dataset, &targets)),
                IssueKind::Duplicate => flags.extend(scan_duplicates(dataset)),
                IssueKind::PredicateMatch => {}
            }
        }

        let row_count = dataset.row_count();
        let missing_summary = targets
            .iter()
            .filter(|c| c.null_count > 0)
            .map(|c| MissingSummary {
                column: c.name.clone(),
                count: c.null_count,
                percentage: c.null_rate(row_count) * 100.0,
            })
            .collect();

        debug!(
            kinds = ?kinds,
            flags = flags.len(),
            "data-quality scan"
        );
        Ok(QualityReport {
            row_count,
            flags,
            missing_summary,
        })
    }
}

/// Matching error literal for a cell, if any
pub fn error_literal(cell: &CellValue) -> Option<&'static str> {
    match cell {
        CellValue::Text(text) => {
            let upper = text.trim().to_uppercase();
            ERROR_LITERALS.iter().copied().find(|lit| *lit == upper)
        }
        _ => None,
    }
}

/// Row-major cell scan: rows ascending, columns in schema order within a row
fn scan_cells(
    dataset: &Dataset,
    targets: &[&ColumnSchema],
    kind: IssueKind,
    check: impl Fn(&ColumnSchema, &CellValue) -> Option<String>,
) -> Vec<QualityFlag> {
    let mut flags = Vec::new();
    for row in 0..dataset.row_count() {
        for schema in targets {
            let Some(cell) = dataset.cell(row, schema.ordinal) else {
                continue;
            };
            if let Some(detail) = check(schema, cell) {
                flags.push(QualityFlag {
                    kind,
                    row_index: row,
                    column: Some(schema.name.clone()),
                    detail,
                });
            }
        }
    }
    flags
}

fn scan_out_of_range(dataset: &Dataset, targets: &[&ColumnSchema]) -> Vec<QualityFlag> {
    let mut flags = Vec::new();
    for schema in targets.iter().filter(|c| c.inferred_type == TypeTag::Numeric) {
        let Some(column) = dataset.columns().get(schema.ordinal) else {
            continue;
        };
        let values: Vec<(usize, f64)> = column
            .cells
            .iter()
            .enumerate()
            .filter_map(|(row, cell)| cell.as_number().map(|v| (row, v)))
            .collect();
        if values.len() < MIN_VALUES_FOR_FENCES {
            continue;
        }
        let numbers: Vec<f64> = values.iter().map(|(_, v)| *v).collect();
        let Some((low, high)) = iqr_fences(&numbers, OUT_OF_RANGE_IQR) else {
            continue;
        };
        flags.extend(values.into_iter().filter(|(_, v)| *v < low || *v > high).map(|(row, v)| QualityFlag {
            kind: IssueKind::OutOfRange,
            row_index: row,
            column: Some(schema.name.clone()),
            detail: format!("{} is outside [{}, {}]", v, low, high),
        }));
    }
    flags.sort_by_key(|f| f.row_index);
    flags
}

fn scan_duplicates(dataset: &Dataset) -> Vec<QualityFlag> {
    let mut first_seen: FxHashMap<Vec<&CellValue>, usize> = FxHashMap::default();
    let mut flags = Vec::new();
    for row in 0..dataset.row_count() {
        let Some(cells) = dataset.row(row) else {
            continue;
        };
        match first_seen.get(&cells) {
            Some(&first) => flags.push(QualityFlag {
                kind: IssueKind::Duplicate,
                row_index: row,
                column: None,
                detail: format!("duplicate of row {}", first),
            }),
            None => {
                first_seen.insert(cells, row);
            }
        }
    }
    flags
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::inspect;

    fn sales() -> Dataset {
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

    fn detector() -> QualityDetector {
        QualityDetector::new(&EngineConfig::default())
    }

    #[test]
    fn test_missing_scan_flags_row_two_revenue() {
        let ds = sales();
        let schema = inspect(&ds, &EngineConfig::default());
        let report = detector().scan_kinds(&ds, &schema, &[IssueKind::Missing], None).unwrap();
        assert_eq!(
            report.flags,
            vec![QualityFlag {
                kind: IssueKind::Missing,
                row_index: 2,
                column: Some("revenue".to_string()),
                detail: "missing value".to_string(),
            }]
        );
        assert_eq!(report.missing_summary[0].column, "revenue");
        assert!((report.missing_summary[0].percentage - 100.0 / 3.0).abs() < 1e-9);
    }

    #[test]
    fn test_type_mismatch_and_error_literals_are_additive() {
        let ds = Dataset::from_raw_rows(
            &["qty"],
            &[
                vec!["1".to_string()],
                vec!["2".to_string()],
                vec!["3".to_string()],
                vec!["4".to_string()],
                vec!["5".to_string()],
                vec!["6".to_string()],
                vec!["7".to_string()],
                vec!["8".to_string()],
                vec!["9".to_string()],
                vec!["10".to_string()],
                vec!["#DIV/0!".to_string()],
            ],
        )
        .unwrap();
        let schema = inspect(&ds, &EngineConfig::default());
        assert_eq!(schema.get("qty").unwrap().inferred_type, TypeTag::Numeric);
        let report = detector().scan(&ds, &schema, None).unwrap();
        assert_eq!(report.rows_with(IssueKind::TypeMismatch), vec![10]);
        assert_eq!(report.rows_with(IssueKind::ErrorValue), vec![10]);
        assert_eq!(report.flagged_rows(), vec![10]);
    }

    #[test]
    fn test_duplicates_keep_first_occurrence() {
        let ds = Dataset::from_rows(
            &["a", "b"],
            vec![
                vec!["x".into(), 1.0.into()],
                vec!["y".into(), 2.0.into()],
                vec!["x".into(), 1.0.into()],
                vec!["x".into(), 1.0.into()],
            ],
        )
        .unwrap();
        let schema = inspect(&ds, &EngineConfig::default());
        let report = detector().scan_kinds(&ds, &schema, &[IssueKind::Duplicate], None).unwrap();
        assert_eq!(report.rows_with(IssueKind::Duplicate), vec![2, 3]);
        assert_eq!(report.flags[0].detail, "duplicate of row 0");
    }

    #[test]
    fn test_out_of_range_uses_wide_fences() {
        let mut rows: Vec<Vec<CellValue>> = (1..=8).map(|v| vec![CellValue::Number(v as f64)]).collect();
        rows.push(vec![CellValue::Number(14.0)]);
        rows.push(vec![CellValue::Number(500.0)]);
        let ds = Dataset::from_rows(&["score"], rows).unwrap();
        let schema = inspect(&ds, &EngineConfig::default());
        let report = detector().scan_kinds(&ds, &schema, &[IssueKind::OutOfRange], None).unwrap();
        // 14 sits inside 3 x IQR, 500 does not
        assert_eq!(report.rows_with(IssueKind::OutOfRange), vec![9]);
    }

    #[test]
    fn test_predicate_matches_are_reported() {
        use crate::query::CompareOp;
        let ds = sales();
        let schema = inspect(&ds, &EngineConfig::default());
        let predicate = Predicate::compare("region", TypeTag::Text, CompareOp::Eq, CellValue::Text("east".into()));
        let report = detector().scan(&ds, &schema, Some(&predicate)).unwrap();
        assert_eq!(report.rows_with(IssueKind::PredicateMatch), vec![1]);
        assert_eq!(report.rows_with(IssueKind::Missing), vec![2]);
    }

    #[test]
    fn test_column_restriction() {
        let ds = Dataset::from_rows(
            &["a", "b"],
            vec![vec![CellValue::Null, 1.0.into()], vec!["x".into(), CellValue::Null]],
        )
        .unwrap();
        let schema = inspect(&ds, &EngineConfig::default());
        let report = detector()
            .scan_kinds(&ds, &schema, &[IssueKind::Missing], Some("b"))
            .unwrap();
        assert_eq!(report.rows_with(IssueKind::Missing), vec![1]);
        assert_eq!(report.missing_summary.len(), 1);
    }
}
