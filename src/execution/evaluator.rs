/// Execution Engine
///
/// Evaluates predicate trees into row selections and derives new dataset
/// snapshots (select / remove / sort) and aggregates from them.
///
/// Evaluation rules:
/// - A comparison is tested cell by cell: O(rows) per leaf
/// - AND / OR fold children left to right and stop early once the
///   selection is empty (AND) or full (OR)
/// - NOT inverts its single child against the full row set
/// - Datasets above `max_rows` are rejected before any work is done
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use tracing::debug;

use super::aggregate::AggregateMetric;
use super::selection::RowSelection;
use crate::command::ChartKind;
use crate::config::EngineConfig;
use crate::dataset::{CellValue, Column, Dataset, TypeTag};
use crate::error::{EngineError, EngineResult};
use crate::query::{BoolOp, Predicate};

/// Category label for null group keys
pub const BLANK_CATEGORY: &str = "(blank)";
/// Category that absorbs pie slices beyond the limit
pub const OTHER_CATEGORY: &str = "Other";

/// One (category, value) pair of a chart series
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChartPoint {
    pub category: String,
    pub value: f64,
    /// Rows that fed this category
    pub rows: usize,
}

pub struct Executor {
    max_rows: usize,
    chart_max_categories: usize,
    pie_max_slices: usize,
}

impl Executor {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            max_rows: config.max_rows,
            chart_max_categories: config.chart_max_categories,
            pie_max_slices: config.pie_max_slices,
        }
    }

    /// Reject datasets above the configured row guard
    pub fn check_rows(&self, dataset: &Dataset) -> EngineResult<()> {
        if dataset.row_count() > self.max_rows {
            return Err(EngineError::row_limit(dataset.row_count(), self.max_rows));
        }
        Ok(())
    }

    /// Rows satisfying `predicate`, ascending
    pub fn evaluate(&self, predicate: &Predicate, dataset: &Dataset) -> EngineResult<RowSelection> {
        self.check_rows(dataset)?;
        let selection = eval_node(predicate, dataset)?;
        debug!(
            rows = dataset.row_count(),
            matched = selection.count(),
            "evaluated predicate"
        );
        Ok(selection)
    }

    /// `evaluate`, or every row when there is no predicate
    pub fn select_rows(&self, predicate: Option<&Predicate>, dataset: &Dataset) -> EngineResult<RowSelection> {
        match predicate {
            Some(p) => self.evaluate(p, dataset),
            None => {
                self.check_rows(dataset)?;
                Ok(RowSelection::all(dataset.row_count()))
            }
        }
    }

    /// Metric over one column, optionally restricted by a predicate.
    /// Count counts non-null cells; other metrics read numeric values only.
    pub fn aggregate(
        &self,
        column: &str,
        metric: AggregateMetric,
        dataset: &Dataset,
        predicate: Option<&Predicate>,
    ) -> EngineResult<Option<f64>> {
        let selection = self.select_rows(predicate, dataset)?;
        let column = column_of(dataset, column)?;
        let rows = selection.indices();

        if metric == AggregateMetric::Count {
            let count = rows.iter().filter(|&&i| !column.cells[i].is_null()).count();
            return Ok(Some(count as f64));
        }
        let values: Vec<f64> = rows.iter().filter_map(|&i| column.cells[i].as_number()).collect();
        Ok(metric.apply(&values))
    }

    /// Metric per distinct value of `group_column`, largest first.
    ///
    /// Without a value column the metric must be Count and each group
    /// reports its row count. Groups whose metric is undefined are dropped.
    /// Ties keep first-appearance order.
    pub fn group_aggregate(
        &self,
        group_column: &str,
        value_column: Option<&str>,
        metric: AggregateMetric,
        dataset: &Dataset,
        predicate: Option<&Predicate>,
    ) -> EngineResult<Vec<ChartPoint>> {
        let selection = self.select_rows(predicate, dataset)?;
        let groups = column_of(dataset, group_column)?;
        let values = value_column.map(|name| column_of(dataset, name)).transpose()?;

        if values.is_none() && metric != AggregateMetric::Count {
            return Err(EngineError::internal(format!(
                "{} by '{}' needs a value column",
                metric, group_column
            )));
        }

        // Group keys in first-appearance order
        let mut order: Vec<String> = Vec::new();
        let mut members: fxhash::FxHashMap<String, Vec<usize>> = fxhash::FxHashMap::default();
        for row in selection.indices() {
            let cell = &groups.cells[row];
            let key = if cell.is_null() {
                BLANK_CATEGORY.to_string()
            } else {
                cell.to_string()
            };
            let entry = members.entry(key.clone()).or_default();
            if entry.is_empty() {
                order.push(key);
            }
            entry.push(row);
        }

        let mut points: Vec<ChartPoint> = order
            .into_iter()
            .filter_map(|category| {
                let rows = members.remove(&category)?;
                let value = match values {
                    None => Some(rows.len() as f64),
                    Some(column) if metric == AggregateMetric::Count => {
                        Some(rows.iter().filter(|&&i| !column.cells[i].is_null()).count() as f64)
                    }
                    Some(column) => {
                        let numbers: Vec<f64> = rows.iter().filter_map(|&i| column.cells[i].as_number()).collect();
                        metric.apply(&numbers)
                    }
                }?;
                Some(ChartPoint {
                    category,
                    value,
                    rows: rows.len(),
                })
            })
            .collect();

        // Stable: equal values keep first-appearance order
        points.sort_by(|a, b| b.value.partial_cmp(&a.value).unwrap_or(Ordering::Equal));
        debug!(group_column, groups = points.len(), metric = %metric, "grouped aggregate");
        Ok(points)
    }

    /// Trim a grouped series for display.
    /// Bar charts keep the largest categories; pie charts fold the tail into "Other".
    /// Line series are kept whole.
    pub fn limit_series(&self, kind: ChartKind, mut points: Vec<ChartPoint>) -> Vec<ChartPoint> {
        match kind {
            ChartKind::Line => points,
            ChartKind::Bar => {
                points.truncate(self.chart_max_categories);
                points
            }
            ChartKind::Pie => {
                if points.len() <= self.pie_max_slices {
                    return points;
                }
                let tail = points.split_off(self.pie_max_slices);
                points.push(ChartPoint {
                    category: OTHER_CATEGORY.to_string(),
                    value: tail.iter().map(|p| p.value).sum(),
                    rows: tail.iter().map(|p| p.rows).sum(),
                });
                points
            }
        }
    }

    /// Reorder a series by its categories read as `category_type`
    /// (dates chronologically, numbers numerically). Stable; blank and
    /// unparsable categories go last.
    pub fn order_by_category(&self, mut points: Vec<ChartPoint>, category_type: TypeTag) -> Vec<ChartPoint> {
        let key = |point: &ChartPoint| {
            if point.category == BLANK_CATEGORY {
                None
            } else {
                CellValue::Text(point.category.clone()).coerce_to(category_type)
            }
        };
        points.sort_by(|a, b| match (key(a), key(b)) {
            (Some(x), Some(y)) => x.compare(&y).unwrap_or(Ordering::Equal),
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        points
    }

    /// New snapshot holding the selected rows
    pub fn select(&self, dataset: &Dataset, selection: &RowSelection) -> EngineResult<Dataset> {
        dataset.take_rows(&selection.indices())
    }

    /// New snapshot without the selected rows
    pub fn remove(&self, dataset: &Dataset, selection: &RowSelection) -> EngineResult<Dataset> {
        dataset.take_rows(&selection.invert().indices())
    }

    /// Row order for a stable sort on `column`; nulls and cells that do not
    /// coerce to `column_type` go last in either direction.
    /// Only rows in `within` take part when it is given.
    pub fn sort_order(
        &self,
        dataset: &Dataset,
        column: &str,
        column_type: TypeTag,
        descending: bool,
        within: Option<&RowSelection>,
    ) -> EngineResult<Vec<usize>> {
        self.check_rows(dataset)?;
        let column = column_of(dataset, column)?;
        let rows: Vec<usize> = match within {
            Some(selection) => selection.indices(),
            None => (0..dataset.row_count()).collect(),
        };

        let mut keyed: Vec<(usize, Option<CellValue>)> = rows
            .into_iter()
            .map(|i| (i, column.cells[i].coerce_to(column_type)))
            .collect();
        keyed.sort_by(|(_, a), (_, b)| match (a, b) {
            (Some(a), Some(b)) => {
                let ord = a.compare(b).unwrap_or(Ordering::Equal);
                if descending {
                    ord.reverse()
                } else {
                    ord
                }
            }
            (Some(_), None) => Ordering::Less,
            (None, Some(_)) => Ordering::Greater,
            (None, None) => Ordering::Equal,
        });
        Ok(keyed.into_iter().map(|(i, _)| i).collect())
    }

    /// New snapshot sorted on `column` (stable, nulls last)
    pub fn sort(&self, dataset: &Dataset, column: &str, column_type: TypeTag, descending: bool) -> EngineResult<Dataset> {
        let order = self.sort_order(dataset, column, column_type, descending, None)?;
        dataset.take_rows(&order)
    }
}

fn column_of<'a>(dataset: &'a Dataset, name: &str) -> EngineResult<&'a Column> {
    dataset.column(name).ok_or_else(|| {
        EngineError::internal(format!("column '{}' is not in the dataset", name)).with_context("execution")
    })
}

fn eval_node(predicate: &Predicate, dataset: &Dataset) -> EngineResult<RowSelection> {
    let rows = dataset.row_count();
    match predicate {
        Predicate::Comparison(comparison) => {
            let column = column_of(dataset, &comparison.column)?;
            Ok(RowSelection::from_fn(rows, |i| comparison.matches(&column.cells[i])))
        }
        Predicate::Boolean { op: BoolOp::Not, children } => match children.as_slice() {
            [child] => Ok(eval_node(child, dataset)?.invert()),
            _ => Err(EngineError::internal(format!("NOT node with {} children", children.len()))
                .with_context("evaluate")),
        },
        Predicate::Boolean { op, children } => {
            let (first, rest) = children.split_first().ok_or_else(|| {
                EngineError::internal(format!("{} node without children", op.name())).with_context("evaluate")
            })?;
            let mut acc = eval_node(first, dataset)?;
            for child in rest {
                let settled = match op {
                    BoolOp::And => acc.is_none_selected(),
                    _ => acc.is_full(),
                };
                if settled {
                    debug!(op = op.name(), "short-circuit");
                    break;
                }
                let next = eval_node(child, dataset)?;
                acc = match op {
                    BoolOp::And => acc.and(&next),
                    _ => acc.or(&next),
                };
            }
            Ok(acc)
        }
    }
}
