/// Ready-made rules built from column-name keywords
///
/// - low marks: mark / grade / score / result / percentage columns below 40
/// - low stock: stock / quantity / inventory / available / units columns below 10
///
/// Only numeric columns qualify. Several matching columns are OR-ed, so a row
/// fires when any of them is low.
use super::rules::{ActionSpec, AutomationRule};
use crate::dataset::{CellValue, TypeTag};
use crate::metadata::Schema;
use crate::query::{CompareOp, Predicate};

pub const LOW_MARKS_KEYWORDS: &[&str] = &["mark", "grade", "score", "result", "percentage"];
pub const LOW_MARKS_THRESHOLD: f64 = 40.0;
pub const LOW_STOCK_KEYWORDS: &[&str] = &["stock", "quantity", "inventory", "available", "units"];
pub const LOW_STOCK_THRESHOLD: f64 = 10.0;

/// Highlight rows with any marks-like column below `threshold`
pub fn low_marks(schema: &Schema, threshold: f64) -> Option<AutomationRule> {
    keyword_rule(schema, LOW_MARKS_KEYWORDS, threshold).map(|trigger| {
        AutomationRule::new(format!("Low marks (below {})", threshold), trigger, ActionSpec::Highlight)
    })
}

/// Notify on rows with any stock-like column below `threshold`
pub fn low_stock(schema: &Schema, threshold: f64) -> Option<AutomationRule> {
    keyword_rule(schema, LOW_STOCK_KEYWORDS, threshold).map(|trigger| {
        AutomationRule::new(
            format!("Low stock (below {})", threshold),
            trigger,
            ActionSpec::Notify {
                message: format!("Stock below {}", threshold),
            },
        )
    })
}

fn keyword_rule(schema: &Schema, keywords: &[&str], threshold: f64) -> Option<Predicate> {
    let mut comparisons: Vec<Predicate> = schema
        .columns_of_type(TypeTag::Numeric)
        .filter(|c| {
            let lower = c.name.to_lowercase();
            keywords.iter().any(|k| lower.contains(k))
        })
        .map(|c| Predicate::compare(c.name.clone(), TypeTag::Numeric, CompareOp::Lt, CellValue::Number(threshold)))
        .collect();
    match comparisons.len() {
        0 => None,
        1 => comparisons.pop(),
        _ => Some(Predicate::or(comparisons)),
    }
}
