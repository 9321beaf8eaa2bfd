//! Predicate evaluation properties over a mixed-type dataset with gaps
//!
//! Run with: `cargo test --test predicate_properties`

use intellisheet::command::CommandParser;
use intellisheet::execution::Executor;
use intellisheet::query::PredicateCompiler;
use intellisheet::{deserialize_predicate, inspect, serialize_predicate, Dataset, EngineConfig, Predicate, Schema};

const COMMANDS: &[&str] = &[
    "show revenue > 1000",
    "show revenue >= 800 and region is west",
    "show region is east or units below 3",
    "show not region is west",
    "show closed on before 2024-03-01",
    "show closed on after 2024-01-31 or revenue is empty",
    "show notes contains rush",
    "show notes does not contain rush and paid is yes",
    "show region is not west and not revenue is missing",
    "show units at most 4 or region is north and paid is no",
];

fn dataset() -> Dataset {
    Dataset::from_raw_rows(
        &["region", "revenue", "units", "closed on", "paid", "notes"],
        &[
            row(&["west", "1200", "5", "2024-01-05", "yes", "Rush order"]),
            row(&["east", "800", "2", "2024-02-10", "no", ""]),
            row(&["west", "", "7", "2024-03-01", "yes", "standard"]),
            row(&["north", "1500.5", "", "", "no", "rush"]),
            row(&["", "950", "1", "2024-04-22", "yes", "follow up"]),
            row(&["east", "1000", "4", "2024-01-31", "", "RUSH"]),
        ],
    )
    .unwrap()
}

fn row(cells: &[&str]) -> Vec<String> {
    cells.iter().map(|s| s.to_string()).collect()
}

fn compile_all(schema: &Schema) -> Vec<Predicate> {
    let config = EngineConfig::default();
    let parser = CommandParser::new(&config);
    let compiler = PredicateCompiler::new(&config);
    COMMANDS
        .iter()
        .map(|text| {
            let parsed = parser.parse(text).unwrap();
            compiler.compile(&parsed, schema).unwrap().unwrap()
        })
        .collect()
}

#[test]
fn test_evaluation_is_idempotent() {
    let config = EngineConfig::default();
    let data = dataset();
    let schema = inspect(&data, &config);
    let executor = Executor::new(&config);
    for predicate in compile_all(&schema) {
        let first = executor.evaluate(&predicate, &data).unwrap();
        let second = executor.evaluate(&predicate, &data).unwrap();
        assert_eq!(first, second, "{}", predicate);
    }
}

#[test]
fn test_double_negation_is_identity() {
    let config = EngineConfig::default();
    let data = dataset();
    let schema = inspect(&data, &config);
    let executor = Executor::new(&config);
    for predicate in compile_all(&schema) {
        let doubled = Predicate::negate(Predicate::negate(predicate.clone()));
        assert_eq!(
            executor.evaluate(&doubled, &data).unwrap().indices(),
            executor.evaluate(&predicate, &data).unwrap().indices(),
            "{}",
            predicate
        );
    }
}

#[test]
fn test_serialized_predicates_evaluate_identically() {
    let config = EngineConfig::default();
    let data = dataset();
    let schema = inspect(&data, &config);
    let executor = Executor::new(&config);
    for predicate in compile_all(&schema) {
        let stored = serialize_predicate(&predicate);
        let text = serde_json::to_string(&stored).unwrap();
        let restored = deserialize_predicate(&serde_json::from_str(&text).unwrap(), &schema).unwrap();
        assert_eq!(
            executor.evaluate(&restored, &data).unwrap(),
            executor.evaluate(&predicate, &data).unwrap(),
            "{}",
            predicate
        );
    }
}

#[test]
fn test_greater_than_selects_exactly_larger_values() {
    let config = EngineConfig::default();
    let data = dataset();
    let schema = inspect(&data, &config);
    let parser = CommandParser::new(&config);
    let compiler = PredicateCompiler::new(&config);
    let executor = Executor::new(&config);
    let revenue = data.column("revenue").unwrap();

    for threshold in [-5.0, 0.0, 800.0, 950.0, 999.99, 1000.0, 1200.0, 1500.5, 9000.0] {
        let parsed = parser.parse(&format!("show revenue > {}", threshold)).unwrap();
        let predicate = compiler.compile(&parsed, &schema).unwrap().unwrap();
        let selected = executor.evaluate(&predicate, &data).unwrap().indices();
        let expected: Vec<usize> = revenue
            .cells
            .iter()
            .enumerate()
            .filter(|(_, cell)| cell.as_number().map_or(false, |v| v > threshold))
            .map(|(i, _)| i)
            .collect();
        assert_eq!(selected, expected, "revenue > {}", threshold);
        assert!(!selected.contains(&2), "null revenue must never match");
    }
}

#[test]
fn test_text_comparisons_ignore_case() {
    let config = EngineConfig::default();
    let data = dataset();
    let schema = inspect(&data, &config);
    let parsed = CommandParser::new(&config).parse("show notes contains RUSH").unwrap();
    let predicate = PredicateCompiler::new(&config).compile(&parsed, &schema).unwrap().unwrap();
    let selected = Executor::new(&config).evaluate(&predicate, &data).unwrap().indices();
    assert_eq!(selected, vec![0, 3, 5]);
}
