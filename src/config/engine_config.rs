/// Engine configuration
///
/// Options supplied alongside every command:
/// - Fuzzy column matching floor
/// - Type inference sampling
/// - Insight and chart sizing
/// - Row-count guard for evaluation
/// - Leading filler words stripped from column phrases
use serde::{Deserialize, Serialize};
use std::path::Path;

use crate::error::{EngineError, EngineResult};

/// Words dropped from the start of a clause's column phrase.
/// Anything not listed here is treated as part of the column name.
pub const DEFAULT_FILLER_WORDS: &[&str] = &[
    "rows", "row", "records", "record", "entries", "where", "with", "whose", "which", "that",
    "the", "all", "any", "me", "for", "column", "field", "only",
];

/// Engine configuration
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct EngineConfig {
    /// Minimum fuzzy score for a column phrase to resolve (0.0-1.0)
    pub similarity_floor: f64,

    /// Non-null values sampled per column during type inference
    pub sample_size_for_type_inference: usize,

    /// Share of sampled values that must parse for a type to win (0.0-1.0)
    pub type_inference_threshold: f64,

    /// Number of most frequent values reported for text columns
    pub top_k_categorical: usize,

    /// Evaluation is rejected above this many rows
    pub max_rows: usize,

    /// Distinct values kept per ColumnSchema
    pub distinct_sample_size: usize,

    /// Categories kept in a bar chart series
    pub chart_max_categories: usize,

    /// Slices kept in a pie chart before folding into "Other"
    pub pie_max_slices: usize,

    /// Commands retained by the audit log
    pub audit_capacity: usize,

    /// Leading filler words stripped from column phrases
    pub filler_words: Vec<String>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            similarity_floor: 0.6,
            sample_size_for_type_inference: 100,
            type_inference_threshold: 0.9,
            top_k_categorical: 5,
            max_rows: 1_000_000,
            distinct_sample_size: 10,
            chart_max_categories: 15,
            pie_max_slices: 8,
            audit_capacity: 1000,
            filler_words: DEFAULT_FILLER_WORDS.iter().map(|w| w.to_string()).collect(),
        }
    }
}

impl EngineConfig {
    /// Parse a JSON document; missing keys take their defaults
    pub fn from_json_str(json: &str) -> EngineResult<Self> {
        let config: Self = serde_json::from_str(json)?;
        config.validate()?;
        Ok(config)
    }

    /// Load a JSON configuration file
    pub fn from_path(path: impl AsRef<Path>) -> EngineResult<Self> {
        let path = path.as_ref();
        let contents = std::fs::read_to_string(path).map_err(|e| {
            EngineError::invalid_config(format!("cannot read {}: {}", path.display(), e))
        })?;
        Self::from_json_str(&contents)
    }

    pub fn validate(&self) -> EngineResult<()> {
        if !(0.0..=1.0).contains(&self.similarity_floor) {
            return Err(EngineError::invalid_config(format!(
                "similarity_floor must be within [0, 1], got {}",
                self.similarity_floor
            )));
        }
        if !(0.0..=1.0).contains(&self.type_inference_threshold) || self.type_inference_threshold == 0.0 {
            return Err(EngineError::invalid_config(format!(
                "type_inference_threshold must be within (0, 1], got {}",
                self.type_inference_threshold
            )));
        }
        if self.sample_size_for_type_inference == 0 {
            return Err(EngineError::invalid_config(
                "sample_size_for_type_inference must be positive",
            ));
        }
        if self.max_rows == 0 {
            return Err(EngineError::invalid_config("max_rows must be positive"));
        }
        if self.chart_max_categories == 0 || self.pie_max_slices == 0 {
            return Err(EngineError::invalid_config(
                "chart sizes must be positive",
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_documented_values() {
        let config = EngineConfig::default();
        assert_eq!(config.similarity_floor, 0.6);
        assert_eq!(config.sample_size_for_type_inference, 100);
        assert_eq!(config.top_k_categorical, 5);
        assert_eq!(config.max_rows, 1_000_000);
        assert!(config.filler_words.iter().any(|w| w == "where"));
        assert!(!config.filler_words.iter().any(|w| w == "wherre" || w == "everything"));
    }

    #[test]
    fn test_partial_json_keeps_defaults() {
        let config = EngineConfig::from_json_str(r#"{"top_k_categorical": 3, "max_rows": 50}"#).unwrap();
        assert_eq!(config.top_k_categorical, 3);
        assert_eq!(config.max_rows, 50);
        assert_eq!(config.similarity_floor, 0.6);
    }

    #[test]
    fn test_out_of_range_floor_rejected() {
        let err = EngineConfig::from_json_str(r#"{"similarity_floor": 1.5}"#).unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }

    #[test]
    fn test_malformed_json_rejected() {
        let err = EngineConfig::from_json_str("{not json").unwrap_err();
        assert!(matches!(err, EngineError::InvalidConfig { .. }));
    }
}
