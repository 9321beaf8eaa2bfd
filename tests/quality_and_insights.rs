//! Data-quality scans and insights on a loader-style dataset
//!
//! Run with: `cargo test --test quality_and_insights`

use intellisheet::insights::{InsightGenerator, InsightValue};
use intellisheet::quality::{IssueKind, QualityDetector};
use intellisheet::{inspect, CommandOutcome, Dataset, EngineConfig, SheetEngine};

fn grades() -> Dataset {
    let rows: Vec<Vec<String>> = [
        ["amy", "72", "2024-01-10", "B"],
        ["ben", "", "2024-01-11", "C"],
        ["cal", "61", "2024-01-12", "F"],
        ["dee", "91", "2024-01-15", "A"],
        ["eve", "#DIV/0!", "2024-01-15", "B"],
        ["fin", "64", "2024-01-16", "C"],
        ["gus", "58", "2024-01-17", "D"],
        ["hal", "88", "2024-01-18", "B"],
        ["ivy", "77", "2024-01-19", "B"],
        ["jon", "69", "2024-01-20", "C"],
        ["kim", "83", "2024-01-21", "B"],
        ["dee", "91", "2024-01-15", "A"],
    ]
    .iter()
    .map(|r| r.iter().map(|s| s.to_string()).collect())
    .collect();
    Dataset::from_raw_rows(&["student", "score", "taken", "grade"], &rows).unwrap()
}

#[test]
fn test_fixed_scans_are_additive() {
    let config = EngineConfig::default();
    let data = grades();
    let schema = inspect(&data, &config);
    let report = QualityDetector::new(&config).scan(&data, &schema, None).unwrap();

    assert_eq!(report.rows_with(IssueKind::Missing), vec![1]);
    assert_eq!(report.rows_with(IssueKind::TypeMismatch), vec![4]);
    assert_eq!(report.rows_with(IssueKind::ErrorValue), vec![4]);
    assert_eq!(report.rows_with(IssueKind::Duplicate), vec![11]);
    assert_eq!(report.flagged_rows(), vec![1, 4, 11]);

    let summary = &report.missing_summary;
    assert_eq!(summary.len(), 1);
    assert_eq!(summary[0].column, "score");
    assert_eq!(summary[0].count, 1);
}

#[test]
fn test_scans_are_recomputed_from_scratch() {
    let config = EngineConfig::default();
    let data = grades();
    let schema = inspect(&data, &config);
    let detector = QualityDetector::new(&config);
    let first = detector.scan(&data, &schema, None).unwrap();
    let second = detector.scan(&data, &schema, None).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_ad_hoc_condition_joins_the_report() {
    let engine = SheetEngine::new(EngineConfig::default()).unwrap();
    let report = engine.quality_report(&grades(), Some("score below 60")).unwrap();
    assert_eq!(report.rows_with(IssueKind::PredicateMatch), vec![6]);
    assert_eq!(report.rows_with(IssueKind::Missing), vec![1]);
}

#[test]
fn test_highlight_errors_command() {
    let mut engine = SheetEngine::new(EngineConfig::default()).unwrap();
    let outcome = engine.execute("highlight errors in score", &grades()).unwrap();
    let CommandOutcome::Highlight { rows, flags, .. } = outcome else {
        panic!("highlight should return flags");
    };
    assert_eq!(rows, vec![4]);
    assert!(flags.iter().all(|f| f.column.as_deref() == Some("score")));
    assert!(flags.iter().any(|f| f.kind == IssueKind::ErrorValue));
}

#[test]
fn test_insights_are_deterministic() {
    let config = EngineConfig::default();
    let data = grades();
    let schema = inspect(&data, &config);
    let generator = InsightGenerator::new(&config);
    let first = serde_json::to_string(&generator.generate(&data, &schema, None).unwrap()).unwrap();
    let second = serde_json::to_string(&generator.generate(&data, &schema, None).unwrap()).unwrap();
    assert_eq!(first, second);
}

#[test]
fn test_top_values_for_text_columns() {
    let config = EngineConfig::default();
    let data = grades();
    let schema = inspect(&data, &config);
    let records = InsightGenerator::new(&config).generate(&data, &schema, None).unwrap();
    let top = records
        .iter()
        .find(|r| r.column_or_group == "grade" && r.metric_name == "top_1")
        .unwrap();
    assert_eq!(top.value, InsightValue::Text("B".to_string()));
    assert_eq!(top.evidence_row_count, 5);
    let ranks = records
        .iter()
        .filter(|r| r.column_or_group == "grade" && r.metric_name.starts_with("top_"))
        .count();
    assert_eq!(ranks, 5);
}
