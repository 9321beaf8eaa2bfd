//! Execution Engine
//!
//! Predicate evaluation over row-selection bitsets, plus the aggregate
//! kernels reused by charts, insights and data-quality scans.

pub mod aggregate;
pub mod evaluator;
pub mod selection;

pub use aggregate::AggregateMetric;
pub use evaluator::{ChartPoint, Executor, BLANK_CATEGORY, OTHER_CATEGORY};
pub use selection::RowSelection;
