/// Insight Generator
///
/// Descriptive statistics over a dataset snapshot or a predicate-filtered
/// subset of it. Output order is fixed (dataset totals, then columns in
/// schema order, then correlations) and nothing is sampled, so the same
/// input always yields the same records.
use fxhash::FxHashMap;
use serde::{Deserialize, Serialize};
use std::fmt;
use tracing::debug;

use crate::config::EngineConfig;
use crate::dataset::{CellValue, Column, Dataset, TypeTag};
use crate::error::EngineResult;
use crate::execution::aggregate::{iqr_fences, pearson};
use crate::execution::{AggregateMetric, Executor};
use crate::metadata::{ColumnSchema, Schema};
use crate::quality::{IssueKind, QualityDetector};
use crate::query::Predicate;

/// |r| above this is reported as a strong correlation
const CORRELATION_THRESHOLD: f64 = 0.7;
const OUTLIER_IQR: f64 = 1.5;
const MIN_VALUES_FOR_OUTLIERS: usize = 4;
const MIN_PAIRS_FOR_CORRELATION: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum InsightValue {
    Number(f64),
    Text(String),
}

impl fmt::Display for InsightValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            InsightValue::Number(v) if v.fract() == 0.0 && v.abs() < 1e15 => write!(f, "{}", v),
            InsightValue::Number(v) => write!(f, "{:.2}", v),
            InsightValue::Text(s) => f.write_str(s),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct InsightRecord {
    pub column_or_group: String,
    pub metric_name: String,
    pub value: InsightValue,
    /// Rows (or values) the metric was computed from
    pub evidence_row_count: usize,
}

impl InsightRecord {
    fn number(column: &str, metric: &str, value: f64, evidence: usize) -> Self {
        Self {
            column_or_group: column.to_string(),
            metric_name: metric.to_string(),
            value: InsightValue::Number(value),
            evidence_row_count: evidence,
        }
    }

    fn text(column: &str, metric: &str, value: impl Into<String>, evidence: usize) -> Self {
        Self {
            column_or_group: column.to_string(),
            metric_name: metric.to_string(),
            value: InsightValue::Text(value.into()),
            evidence_row_count: evidence,
        }
    }
}

impl fmt::Display for InsightRecord {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {}: {} (n={})",
            self.column_or_group, self.metric_name, self.value, self.evidence_row_count
        )
    }
}

pub struct InsightGenerator {
    executor: Executor,
    detector: QualityDetector,
    top_k: usize,
}

impl InsightGenerator {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            executor: Executor::new(config),
            detector: QualityDetector::new(config),
            top_k: config.top_k_categorical,
        }
    }

    pub fn generate(
        &self,
        dataset: &Dataset,
        schema: &Schema,
        predicate: Option<&Predicate>,
    ) -> EngineResult<Vec<InsightRecord>> {
        self.generate_for_columns(dataset, schema, predicate, &[])
    }

    /// Like `generate`, but per-column records and correlations only cover
    /// `columns` (resolved names). An empty slice covers every column.
    /// Dataset totals always describe the whole subset.
    pub fn generate_for_columns(
        &self,
        dataset: &Dataset,
        schema: &Schema,
        predicate: Option<&Predicate>,
        columns: &[String],
    ) -> EngineResult<Vec<InsightRecord>> {
        let in_focus = |name: &str| columns.is_empty() || columns.iter().any(|c| c == name);
        let subset = match predicate {
            Some(p) => {
                let selection = self.executor.evaluate(p, dataset)?;
                self.executor.select(dataset, &selection)?
            }
            None => {
                self.executor.check_rows(dataset)?;
                dataset.clone()
            }
        };
        let rows = subset.row_count();

        let mut records = Vec::new();
        records.push(InsightRecord::number("dataset", "rows", rows as f64, rows));
        records.push(InsightRecord::number("dataset", "columns", subset.column_count() as f64, rows));
        let missing: usize = subset
            .columns()
            .iter()
            .map(|c| c.cells.iter().filter(|cell| cell.is_null()).count())
            .sum();
        records.push(InsightRecord::number("dataset", "missing_cells", missing as f64, rows));
        let duplicates = self
            .detector
            .scan_kinds(&subset, schema, &[IssueKind::Duplicate], None)?
            .count(IssueKind::Duplicate);
        records.push(InsightRecord::number("dataset", "duplicate_rows", duplicates as f64, rows));

        let date_ordered = is_date_ordered(&subset, schema);

        for column_schema in schema.columns().iter().filter(|c| in_focus(&c.name)) {
            let Some(column) = subset.columns().get(column_schema.ordinal) else {
                continue;
            };
            match column_schema.inferred_type {
                TypeTag::Numeric => records.extend(numeric_insights(column, date_ordered)),
                TypeTag::Date => records.extend(date_insights(column)),
                TypeTag::Text | TypeTag::Boolean => records.extend(self.categorical_insights(column)),
            }
        }

        records.extend(
            correlations(&subset, schema)
                .into_iter()
                .filter(|(left, right, _)| in_focus(left) || in_focus(right))
                .map(|(_, _, record)| record),
        );

        debug!(rows, records = records.len(), "generated insights");
        Ok(records)
    }

    /// Most frequent values, ties in first-appearance order
    fn categorical_insights(&self, column: &Column) -> Vec<InsightRecord> {
        let mut order: Vec<String> = Vec::new();
        let mut counts: FxHashMap<String, usize> = FxHashMap::default();
        for cell in column.cells.iter().filter(|c| !c.is_null()) {
            let key = cell.to_string();
            let count = counts.entry(key.clone()).or_insert(0);
            if *count == 0 {
                order.push(key);
            }
            *count += 1;
        }
        let non_null: usize = counts.values().sum();

        let mut ranked: Vec<(String, usize)> = order
            .into_iter()
            .map(|key| {
                let n = counts.get(&key).copied().unwrap_or(0);
                (key, n)
            })
            .collect();
        ranked.sort_by(|a, b| b.1.cmp(&a.1));

        let name = column.name.as_str();
        let mut records = vec![
            InsightRecord::number(name, "count", non_null as f64, non_null),
            InsightRecord::number(name, "unique_values", ranked.len() as f64, non_null),
        ];
        records.extend(
            ranked
                .into_iter()
                .take(self.top_k)
                .enumerate()
                .map(|(rank, (value, n))| InsightRecord::text(name, &format!("top_{}", rank + 1), value, n)),
        );
        records
    }
}

fn numeric_insights(column: &Column, date_ordered: bool) -> Vec<InsightRecord> {
    let name = column.name.as_str();
    let values: Vec<f64> = column.cells.iter().filter_map(CellValue::as_number).collect();
    let n = values.len();

    let mut records = vec![InsightRecord::number(name, "count", n as f64, n)];
    for metric in [
        AggregateMetric::Mean,
        AggregateMetric::Median,
        AggregateMetric::StdDev,
        AggregateMetric::Min,
        AggregateMetric::Max,
    ] {
        if let Some(value) = metric.apply(&values) {
            records.push(InsightRecord::number(name, metric.as_str(), value, n));
        }
    }

    if n >= MIN_VALUES_FOR_OUTLIERS {
        if let Some((low, high)) = iqr_fences(&values, OUTLIER_IQR) {
            let outliers = values.iter().filter(|v| **v < low || **v > high).count();
            records.push(InsightRecord::number(name, "outliers", outliers as f64, n));
        }
    }

    if date_ordered && n >= 2 {
        records.push(InsightRecord::text(name, "trend", trend(&values), n));
    }
    records
}

fn date_insights(column: &Column) -> Vec<InsightRecord> {
    let name = column.name.as_str();
    let dates: Vec<_> = column.cells.iter().filter_map(CellValue::as_date).collect();
    let n = dates.len();
    let mut records = vec![InsightRecord::number(name, "count", n as f64, n)];
    if let (Some(first), Some(last)) = (dates.iter().min(), dates.iter().max()) {
        records.push(InsightRecord::text(name, "earliest", first.format("%Y-%m-%d").to_string(), n));
        records.push(InsightRecord::text(name, "latest", last.format("%Y-%m-%d").to_string(), n));
    }
    records
}

/// Monotonic direction of values in row order
fn trend(values: &[f64]) -> &'static str {
    let rising = values.windows(2).all(|w| w[0] <= w[1]);
    let falling = values.windows(2).all(|w| w[0] >= w[1]);
    match (rising, falling) {
        (true, false) => "increasing",
        (false, true) => "decreasing",
        _ => "none",
    }
}

/// True when some date column is non-decreasing in row order
fn is_date_ordered(dataset: &Dataset, schema: &Schema) -> bool {
    schema.columns_of_type(TypeTag::Date).any(|column_schema: &ColumnSchema| {
        let Some(column) = dataset.columns().get(column_schema.ordinal) else {
            return false;
        };
        let dates: Vec<_> = column.cells.iter().filter_map(CellValue::as_date).collect();
        dates.len() >= 2 && dates.windows(2).all(|w| w[0] <= w[1])
    })
}

/// Strong pairwise correlations between numeric columns, schema order,
/// tagged with the two column names
fn correlations<'a>(dataset: &Dataset, schema: &'a Schema) -> Vec<(&'a str, &'a str, InsightRecord)> {
    let numeric: Vec<&ColumnSchema> = schema.columns_of_type(TypeTag::Numeric).collect();
    let mut records = Vec::new();
    for (i, left) in numeric.iter().enumerate() {
        for right in &numeric[i + 1..] {
            let (Some(a), Some(b)) = (
                dataset.columns().get(left.ordinal),
                dataset.columns().get(right.ordinal),
            ) else {
                continue;
            };
            let (xs, ys): (Vec<f64>, Vec<f64>) = a
                .cells
                .iter()
                .zip(&b.cells)
                .filter_map(|(x, y)| Some((x.as_number()?, y.as_number()?)))
                .unzip();
            if xs.len() < MIN_PAIRS_FOR_CORRELATION {
                continue;
            }
            if let Some(r) = pearson(&xs, &ys) {
                if r.abs() > CORRELATION_THRESHOLD {
                    records.push((
                        left.name.as_str(),
                        right.name.as_str(),
                        InsightRecord::number(&format!("{} & {}", left.name, right.name), "correlation", r, xs.len()),
                    ));
                }
            }
        }
    }
    records
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::inspect;
    use crate::query::CompareOp;

    fn find<'a>(records: &'a [InsightRecord], column: &str, metric: &str) -> Option<&'a InsightRecord> {
        records
            .iter()
            .find(|r| r.column_or_group == column && r.metric_name == metric)
    }

    fn sales() -> Dataset {
        Dataset::from_raw_rows(
            &["day", "region", "revenue", "units"],
            &[
                vec!["2024-01-01".into(), "west".into(), "100".into(), "10".into()],
                vec!["2024-01-02".into(), "east".into(), "150".into(), "14".into()],
                vec!["2024-01-03".into(), "west".into(), "200".into(), "21".into()],
                vec!["2024-01-04".into(), "west".into(), "260".into(), "25".into()],
                vec!["2024-01-05".into(), "north".into(), "".into(), "30".into()],
            ],
        )
        .unwrap()
    }

    fn generate(ds: &Dataset, predicate: Option<&Predicate>) -> Vec<InsightRecord> {
        let config = EngineConfig::default();
        let schema = inspect(ds, &config);
        InsightGenerator::new(&config).generate(ds, &schema, predicate).unwrap()
    }

    #[test]
    fn test_numeric_statistics() {
        let records = generate(&sales(), None);
        assert_eq!(find(&records, "revenue", "count").unwrap().value, InsightValue::Number(4.0));
        assert_eq!(find(&records, "revenue", "mean").unwrap().value, InsightValue::Number(177.5));
        assert_eq!(find(&records, "revenue", "median").unwrap().value, InsightValue::Number(175.0));
        assert_eq!(find(&records, "revenue", "min").unwrap().value, InsightValue::Number(100.0));
        assert_eq!(find(&records, "revenue", "max").unwrap().value, InsightValue::Number(260.0));
        assert_eq!(find(&records, "revenue", "trend").unwrap().value, InsightValue::Text("increasing".into()));
        assert_eq!(find(&records, "dataset", "missing_cells").unwrap().value, InsightValue::Number(1.0));
    }

    #[test]
    fn test_top_values_rank_by_frequency() {
        let records = generate(&sales(), None);
        let top = find(&records, "region", "top_1").unwrap();
        assert_eq!(top.value, InsightValue::Text("west".into()));
        assert_eq!(top.evidence_row_count, 3);
        assert_eq!(find(&records, "region", "top_2").unwrap().value, InsightValue::Text("east".into()));
        assert_eq!(find(&records, "region", "unique_values").unwrap().value, InsightValue::Number(3.0));
    }

    #[test]
    fn test_strong_correlation_reported() {
        let records = generate(&sales(), None);
        let r = find(&records, "revenue & units", "correlation").unwrap();
        assert_eq!(r.evidence_row_count, 4);
        match r.value {
            InsightValue::Number(v) => assert!(v > 0.9),
            _ => panic!("correlation should be numeric"),
        }
    }

    #[test]
    fn test_predicate_restricts_subset() {
        let predicate = Predicate::compare("region", TypeTag::Text, CompareOp::Eq, CellValue::Text("west".into()));
        let records = generate(&sales(), Some(&predicate));
        assert_eq!(find(&records, "dataset", "rows").unwrap().value, InsightValue::Number(3.0));
        assert_eq!(find(&records, "revenue", "max").unwrap().value, InsightValue::Number(260.0));
        assert_eq!(find(&records, "region", "unique_values").unwrap().value, InsightValue::Number(1.0));
    }

    #[test]
    fn test_output_is_deterministic() {
        let ds = sales();
        assert_eq!(generate(&ds, None), generate(&ds, None));
    }

    #[test]
    fn test_no_trend_without_date_order() {
        let ds = Dataset::from_rows(&["score"], vec![vec![3.0.into()], vec![1.0.into()]]).unwrap();
        let records = generate(&ds, None);
        assert!(find(&records, "score", "trend").is_none());
    }

    #[test]
    fn test_column_focus_limits_per_column_records() {
        let ds = sales();
        let config = EngineConfig::default();
        let schema = inspect(&ds, &config);
        let records = InsightGenerator::new(&config)
            .generate_for_columns(&ds, &schema, None, &["revenue".to_string()])
            .unwrap();
        assert!(find(&records, "revenue", "mean").is_some());
        assert!(find(&records, "region", "top_1").is_none());
        assert!(find(&records, "units", "count").is_none());
        assert!(find(&records, "revenue & units", "correlation").is_some());
        assert_eq!(find(&records, "dataset", "rows").unwrap().value, InsightValue::Number(5.0));
    }
}
