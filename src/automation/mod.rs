//! Automation rules: persisted predicates plus actions, re-evaluated by an
//! external scheduler on every dataset refresh.

pub mod presets;
pub mod rules;

pub use presets::{low_marks, low_stock, LOW_MARKS_THRESHOLD, LOW_STOCK_THRESHOLD};
pub use rules::{ActionSpec, AutomationRule, PersistedRule, RuleOutcome, RuleSet, RuleStatus};
