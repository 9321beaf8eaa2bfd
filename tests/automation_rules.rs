//! Automation rules across dataset refreshes and sessions
//!
//! Run with: `cargo test --test automation_rules`

use intellisheet::automation::{ActionSpec, RuleStatus};
use intellisheet::{CellValue, Dataset, EngineConfig, EngineError, SheetEngine};

fn inventory(units: Vec<CellValue>) -> Dataset {
    let items: Vec<CellValue> = ["bolt", "nut", "gear", "cog"].iter().take(units.len()).map(|s| (*s).into()).collect();
    Dataset::from_rows(
        &["item", "units in stock"],
        items.into_iter().zip(units).map(|(item, units)| vec![item, units]).collect(),
    )
    .unwrap()
}

fn engine() -> SheetEngine {
    SheetEngine::new(EngineConfig::default()).unwrap()
}

#[test]
fn test_rule_reevaluates_on_every_refresh() {
    let mut engine = engine();
    let first = inventory(vec![4.0.into(), 40.0.into(), 12.0.into()]);
    let id = engine
        .create_rule(
            "reorder",
            "units in stock below 10",
            ActionSpec::Notify {
                message: "reorder".to_string(),
            },
            &first,
        )
        .unwrap();

    let outcomes = engine.refresh_rules(&first);
    assert_eq!(outcomes[0].rule_id, id);
    assert!(matches!(&outcomes[0].status, RuleStatus::Fired { rows, .. } if rows == &vec![0]));

    let refreshed = inventory(vec![4.0.into(), 3.0.into(), 12.0.into(), 1.0.into()]);
    let outcomes = engine.refresh_rules(&refreshed);
    assert!(matches!(&outcomes[0].status, RuleStatus::Fired { rows, .. } if rows == &vec![0, 1, 3]));
}

#[test]
fn test_rules_fail_independently() {
    let mut engine = engine();
    let data = Dataset::from_rows(
        &["item", "units", "price"],
        vec![
            vec!["bolt".into(), 4.0.into(), 0.5.into()],
            vec!["nut".into(), 40.0.into(), 0.1.into()],
        ],
    )
    .unwrap();
    let stale = engine.create_rule("low units", "units < 10", ActionSpec::Highlight, &data).unwrap();
    let cheap = engine.create_rule("cheap", "price < 0.2", ActionSpec::Filter, &data).unwrap();

    let reshaped = Dataset::from_rows(
        &["item", "price"],
        vec![vec!["bolt".into(), 0.5.into()], vec!["nut".into(), 0.1.into()]],
    )
    .unwrap();
    let outcomes = engine.refresh_rules(&reshaped);
    assert!(matches!(
        &outcomes[0].status,
        RuleStatus::Deactivated { error: EngineError::StaleRule { .. } }
    ));
    assert!(matches!(&outcomes[1].status, RuleStatus::Fired { rows, .. } if rows == &vec![1]));

    // Deactivated, never dropped
    assert_eq!(engine.rules().len(), 2);
    assert!(!engine.rules().get(stale).unwrap().active);
    assert!(engine.rules().get(cheap).unwrap().active);
}

#[test]
fn test_type_change_makes_ordering_rule_stale() {
    let mut engine = engine();
    let data = inventory(vec![4.0.into(), 40.0.into()]);
    engine.create_rule("low", "units in stock < 10", ActionSpec::Highlight, &data).unwrap();

    let text_units = inventory(vec!["four".into(), "forty".into()]);
    let outcomes = engine.refresh_rules(&text_units);
    match &outcomes[0].status {
        RuleStatus::Deactivated { error } => assert!(error.to_string().contains("changed from numeric to text")),
        other => panic!("expected a deactivated rule, got {:?}", other),
    }
}

#[test]
fn test_export_restore_across_sessions() {
    let mut first_session = engine();
    let data = inventory(vec![4.0.into(), 40.0.into()]);
    first_session
        .create_rule("low", "units in stock < 10", ActionSpec::Highlight, &data)
        .unwrap();
    let exported = first_session.export_rules().unwrap();
    let stored = serde_json::to_string(&exported).unwrap();

    let mut second_session = engine();
    let stale = second_session
        .restore_rules(&serde_json::from_str(&stored).unwrap(), &data)
        .unwrap();
    assert!(stale.is_empty());
    assert_eq!(second_session.rules().rules(), first_session.rules().rules());

    let mut third_session = engine();
    let without_units = Dataset::from_rows(&["item"], vec![vec!["bolt".into()]]).unwrap();
    let stale = third_session
        .restore_rules(&serde_json::from_str(&stored).unwrap(), &without_units)
        .unwrap();
    assert_eq!(stale.len(), 1);
    assert!(!third_session.rules().rules()[0].active);
}

#[test]
fn test_presets_match_keyword_columns() {
    let mut engine = engine();
    let data = Dataset::from_rows(
        &["student", "math marks", "units in stock"],
        vec![
            vec!["amy".into(), 35.0.into(), 20.0.into()],
            vec!["ben".into(), 82.0.into(), 3.0.into()],
        ],
    )
    .unwrap();
    let added = engine.add_presets(&data);
    assert_eq!(added.len(), 2);

    let outcomes = engine.refresh_rules(&data);
    let fired: Vec<Vec<usize>> = outcomes
        .iter()
        .map(|o| match &o.status {
            RuleStatus::Fired { rows, .. } => rows.clone(),
            other => panic!("preset did not fire: {:?}", other),
        })
        .collect();
    assert_eq!(fired, vec![vec![0], vec![1]]);
}

#[test]
fn test_restore_survives_a_corrupted_rule() {
    let mut first_session = engine();
    let data = inventory(vec![4.0.into(), 40.0.into()]);
    let ids: Vec<_> = ["low", "very low", "empty"]
        .iter()
        .zip(["units in stock < 10", "units in stock < 2", "units in stock is empty"])
        .map(|(name, condition)| {
            first_session
                .create_rule(name, condition, ActionSpec::Highlight, &data)
                .unwrap()
        })
        .collect();
    let mut exported = first_session.export_rules().unwrap();
    exported[1]["trigger"] = serde_json::json!({"kind": "bogus"});

    let mut second_session = engine();
    let errors = second_session.restore_rules(&exported, &data).unwrap();
    assert_eq!(errors.len(), 1);
    assert!(errors[0].to_string().contains("bogus"));
    assert_eq!(second_session.rules().len(), 2);
    assert!(second_session.rules().get(ids[0]).unwrap().active);
    assert!(second_session.rules().get(ids[1]).is_none());
    assert!(second_session.rules().get(ids[2]).unwrap().active);
}

#[test]
fn test_presets_are_added_once() {
    let mut engine = engine();
    let data = Dataset::from_rows(&["marks"], vec![vec![35.0.into()], vec![72.0.into()]]).unwrap();
    assert_eq!(engine.add_presets(&data).len(), 1);
    assert!(engine.add_presets(&data).is_empty());
    assert_eq!(engine.rules().len(), 1);

    let outcomes = engine.refresh_rules(&data);
    assert_eq!(outcomes.len(), 1);
}
