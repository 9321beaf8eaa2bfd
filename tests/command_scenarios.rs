//! End-to-end command scenarios through the public API
//!
//! Run with: `cargo test --test command_scenarios`

use intellisheet::command::{CommandParser, Verb};
use intellisheet::query::{BoolOp, CompareOp, PredicateCompiler};
use intellisheet::quality::IssueKind;
use intellisheet::{inspect, CellValue, CommandOutcome, Dataset, EngineConfig, EngineError, Predicate, SheetEngine, TypeTag};

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

fn engine() -> SheetEngine {
    SheetEngine::new(EngineConfig::default()).unwrap()
}

#[test]
fn test_show_revenue_and_region() {
    let config = EngineConfig::default();
    let dataset = sales();
    let schema = inspect(&dataset, &config);
    assert_eq!(schema.get("region").unwrap().inferred_type, TypeTag::Text);
    assert_eq!(schema.get("revenue").unwrap().inferred_type, TypeTag::Numeric);
    assert_eq!(schema.get("revenue").unwrap().null_count, 1);

    let parsed = CommandParser::new(&config)
        .parse("show rows where revenue is greater than 1000 and region is west")
        .unwrap();
    let predicate = PredicateCompiler::new(&config).compile(&parsed, &schema).unwrap().unwrap();
    assert_eq!(
        predicate,
        Predicate::Boolean {
            op: BoolOp::And,
            children: vec![
                Predicate::compare("revenue", TypeTag::Numeric, CompareOp::Gt, CellValue::Number(1000.0)),
                Predicate::compare("region", TypeTag::Text, CompareOp::Eq, CellValue::Text("west".to_string())),
            ],
        }
    );

    let outcome = engine()
        .execute("show rows where revenue is greater than 1000 and region is west", &dataset)
        .unwrap();
    let CommandOutcome::Rows { rows, dataset: view, .. } = outcome else {
        panic!("show should return rows");
    };
    assert_eq!(rows, vec![0]);
    assert_eq!(view.cell(0, 0), Some(&CellValue::Text("west".to_string())));
}

#[test]
fn test_highlight_missing_values_flags_revenue_row_two() {
    let outcome = engine().execute("highlight rows with missing values", &sales()).unwrap();
    let CommandOutcome::Highlight { rows, flags, predicate } = outcome else {
        panic!("highlight should return flags");
    };
    assert!(predicate.is_none());
    assert_eq!(rows, vec![2]);
    assert_eq!(flags.len(), 1);
    assert_eq!(flags[0].kind, IssueKind::Missing);
    assert_eq!(flags[0].row_index, 2);
    assert_eq!(flags[0].column.as_deref(), Some("revenue"));
}

#[test]
fn test_misspelled_filler_surfaces_unknown_column() {
    let config = EngineConfig::default();
    let parsed = CommandParser::new(&config).parse("filter wherre revenue > 1000").unwrap();
    assert_eq!(parsed.verb, Verb::Filter);

    let err = engine().execute("filter wherre revenue > 1000", &sales()).unwrap_err();
    match err {
        EngineError::UnknownColumn { phrase, candidates } => {
            assert_eq!(phrase, "wherre revenue");
            assert_eq!(candidates.first().map(String::as_str), Some("revenue"));
        }
        other => panic!("expected UnknownColumn, got {:?}", other),
    }
}

#[test]
fn test_correctly_spelled_filler_is_dropped() {
    let outcome = engine().execute("filter where revenue > 1000", &sales()).unwrap();
    let CommandOutcome::Rows { rows, .. } = outcome else {
        panic!("filter should return rows");
    };
    assert_eq!(rows, vec![0]);
}

#[test]
fn test_user_errors_are_not_internal() {
    let mut engine = engine();
    let dataset = sales();
    for command in ["jump revenue > 1", "show revenue > lots", "show profit > 3", "show revenue > 1 and"] {
        let err = engine.execute(command, &dataset).unwrap_err();
        assert!(err.is_user_error(), "{} gave {:?}", command, err);
    }
    assert!(matches!(
        engine.execute("show revenue > lots", &dataset).unwrap_err(),
        EngineError::TypeMismatch { .. }
    ));
}

#[test]
fn test_failed_command_leaves_dataset_untouched() {
    let mut engine = engine();
    let dataset = sales();
    assert!(engine.execute("remove rows where revenue > lots", &dataset).is_err());
    assert_eq!(dataset.row_count(), 3);

    let outcome = engine.execute("remove rows where region is west", &dataset).unwrap();
    let CommandOutcome::Rows { dataset: remaining, rows, .. } = outcome else {
        panic!("remove should return rows");
    };
    assert_eq!(rows, vec![0, 2]);
    assert_eq!(remaining.row_count(), 1);
    assert_eq!(dataset.row_count(), 3);
}

#[test]
fn test_or_then_and_applies_left_to_right() {
    // (region = east OR region = west) AND revenue > 1000 keeps only row 0;
    // conventional precedence would also keep row 1
    let outcome = engine()
        .execute("show region is east or region is west and revenue > 1000", &sales())
        .unwrap();
    let CommandOutcome::Rows { rows, .. } = outcome else {
        panic!("show should return rows");
    };
    assert_eq!(rows, vec![0]);
}

#[test]
fn test_remove_duplicates() {
    let dataset = Dataset::from_rows(
        &["name", "score"],
        vec![
            vec!["amy".into(), 70.0.into()],
            vec!["bob".into(), 55.0.into()],
            vec!["amy".into(), 70.0.into()],
        ],
    )
    .unwrap();
    let outcome = engine().execute("remove duplicates", &dataset).unwrap();
    let CommandOutcome::Rows { dataset: remaining, rows, .. } = outcome else {
        panic!("remove should return rows");
    };
    assert_eq!(rows, vec![2]);
    assert_eq!(remaining.row_count(), 2);
}

#[test]
fn test_pie_chart_counts_categories() {
    let outcome = engine().execute("pie chart of region", &sales()).unwrap();
    let CommandOutcome::Chart(series) = outcome else {
        panic!("chart should return a series");
    };
    assert_eq!(series.group_column, "region");
    assert_eq!(series.points.len(), 2);
    assert_eq!(series.points[0].category, "west");
    assert_eq!(series.points[0].value, 2.0);
}

#[test]
fn test_summarize_filtered_subset() {
    let outcome = engine().execute("summarize where region is west", &sales()).unwrap();
    let CommandOutcome::Insights(records) = outcome else {
        panic!("summarize should return insights");
    };
    let rows = records
        .iter()
        .find(|r| r.column_or_group == "dataset" && r.metric_name == "rows")
        .unwrap();
    assert_eq!(rows.evidence_row_count, 2);
}

#[test]
fn test_raw_column_name_wins_over_lookalike() {
    let data = Dataset::from_rows(
        &["Sales Q1", "sales_q1"],
        vec![vec![10.0.into(), 80.0.into()], vec![90.0.into(), 20.0.into()]],
    )
    .unwrap();
    let outcome = engine().execute("show sales_q1 > 50", &data).unwrap();
    let CommandOutcome::Rows { rows, predicate, .. } = outcome else {
        panic!("show should return rows");
    };
    assert_eq!(rows, vec![0]);
    assert!(predicate.unwrap().to_string().contains("sales_q1"));
}

#[test]
fn test_line_chart_orders_by_date() {
    let data = Dataset::from_raw_rows(
        &["day", "revenue"],
        &[
            vec!["2024-03-01".to_string(), "10".to_string()],
            vec!["2024-01-01".to_string(), "500".to_string()],
            vec!["2024-02-01".to_string(), "70".to_string()],
        ],
    )
    .unwrap();
    let outcome = engine().execute("line chart of sum of revenue by day", &data).unwrap();
    let CommandOutcome::Chart(series) = outcome else {
        panic!("line chart should return a series");
    };
    let days: Vec<&str> = series.points.iter().map(|p| p.category.as_str()).collect();
    assert_eq!(days, vec!["2024-01-01", "2024-02-01", "2024-03-01"]);
    assert_eq!(series.points[0].value, 500.0);
}

#[test]
fn test_summarize_named_column() {
    let outcome = engine().execute("summarize revenue where region is west", &sales()).unwrap();
    let CommandOutcome::Insights(records) = outcome else {
        panic!("summarize should return insights");
    };
    assert!(records.iter().any(|r| r.column_or_group == "revenue"));
    assert!(!records.iter().any(|r| r.column_or_group == "region"));

    let err = engine().execute("summarize email", &sales()).unwrap_err();
    assert!(matches!(err, EngineError::UnknownColumn { .. }));
}

#[test]
fn test_row_limit_rejects_eagerly() {
    let config = EngineConfig {
        max_rows: 2,
        ..EngineConfig::default()
    };
    let mut engine = SheetEngine::new(config).unwrap();
    let err = engine.execute("show revenue > 1", &sales()).unwrap_err();
    assert_eq!(err, EngineError::row_limit(3, 2));
}
