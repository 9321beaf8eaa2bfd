//! Insight Generator: descriptive statistics, top values, trends and
//! correlations over a dataset or a filtered subset.

pub mod generator;

pub use generator::{InsightGenerator, InsightRecord, InsightValue};
