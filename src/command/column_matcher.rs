/// Fuzzy column matching
///
/// Pure scoring of a user's column phrase against every column in a schema.
/// Matching order:
/// 1. Case-insensitive exact name (score 1.0)
/// 2. Token overlap: each phrase token takes its best edit-distance similarity
///    against the column's tokens, the sum is divided by the larger token count
/// 3. Whole-string similarity with separators removed ("unitprice" ~ "Unit Price")
///
/// Ties go to a column whose raw name equals the phrase ignoring case
/// ("sales_q1" picks `sales_q1` over `Sales Q1`), then to the smaller
/// edit distance between the lower-cased raw strings, then declaration order.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;

use crate::error::{EngineError, EngineResult};
use crate::metadata::{ColumnSchema, Schema};

/// Per-token similarity below this contributes nothing
const TOKEN_SIMILARITY_CUTOFF: f64 = 0.75;

/// Candidates reported with an UnknownColumn error
const SUGGESTION_COUNT: usize = 3;

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ColumnCandidate {
    pub name: String,
    pub ordinal: usize,
    pub score: f64,
    /// Raw name equals the phrase, ignoring case
    pub exact: bool,
    pub edit_distance: usize,
}

/// Score every column against `phrase`, best first
pub fn rank_columns(phrase: &str, schema: &Schema) -> Vec<ColumnCandidate> {
    let phrase_tokens = name_tokens(phrase);
    let phrase_raw = phrase.trim().to_lowercase();

    let mut ranked: Vec<ColumnCandidate> = schema
        .columns()
        .iter()
        .map(|column| {
            let column_raw = column.name.trim().to_lowercase();
            ColumnCandidate {
                name: column.name.clone(),
                ordinal: column.ordinal,
                score: score_tokens(&phrase_tokens, &name_tokens(&column.name)),
                exact: phrase_raw == column_raw,
                edit_distance: levenshtein_distance(&phrase_raw, &column_raw),
            }
        })
        .collect();

    ranked.sort_by(|a, b| {
        b.score
            .partial_cmp(&a.score)
            .unwrap_or(Ordering::Equal)
            .then(b.exact.cmp(&a.exact))
            .then(a.edit_distance.cmp(&b.edit_distance))
            .then(a.ordinal.cmp(&b.ordinal))
    });
    ranked
}

/// Resolve a phrase to a column, or fail with the nearest names
pub fn resolve_column<'a>(phrase: &str, schema: &'a Schema, floor: f64) -> EngineResult<&'a ColumnSchema> {
    let ranked = rank_columns(phrase, schema);
    match ranked.first() {
        Some(best) if best.score >= floor => schema
            .get(&best.name)
            .ok_or_else(|| EngineError::internal(format!("ranked column '{}' missing from schema", best.name))),
        _ => Err(EngineError::unknown_column(
            phrase,
            ranked.into_iter().take(SUGGESTION_COUNT).map(|c| c.name).collect(),
        )),
    }
}

/// Lower-cased words of a name; splits on separators and camelCase boundaries
pub fn name_tokens(name: &str) -> Vec<String> {
    let mut tokens = Vec::new();
    let mut current = String::new();
    let mut prev_lower = false;
    for ch in name.chars() {
        if !ch.is_alphanumeric() {
            if !current.is_empty() {
                tokens.push(std::mem::take(&mut current));
            }
            prev_lower = false;
            continue;
        }
        if ch.is_uppercase() && prev_lower && !current.is_empty() {
            tokens.push(std::mem::take(&mut current));
        }
        prev_lower = ch.is_lowercase() || ch.is_numeric();
        current.extend(ch.to_lowercase());
    }
    if !current.is_empty() {
        tokens.push(current);
    }
    tokens
}

fn score_tokens(phrase: &[String], column: &[String]) -> f64 {
    if phrase.is_empty() || column.is_empty() {
        return 0.0;
    }
    if phrase == column {
        return 1.0;
    }

    let overlap: f64 = phrase
        .iter()
        .map(|p| {
            column
                .iter()
                .map(|c| similarity(p, c))
                .filter(|s| *s >= TOKEN_SIMILARITY_CUTOFF)
                .fold(0.0, f64::max)
        })
        .sum();
    let token_score = overlap / phrase.len().max(column.len()) as f64;

    let whole = similarity(&phrase.concat(), &column.concat());
    let whole_score = if whole >= TOKEN_SIMILARITY_CUTOFF { whole } else { 0.0 };

    token_score.max(whole_score)
}

/// 1 - distance / longer length
pub fn similarity(a: &str, b: &str) -> f64 {
    let max_len = a.chars().count().max(b.chars().count());
    if max_len == 0 {
        return 1.0;
    }
    1.0 - levenshtein_distance(a, b) as f64 / max_len as f64
}

/// Calculate Levenshtein distance between two strings
pub fn levenshtein_distance(s1: &str, s2: &str) -> usize {
    let s1_chars: Vec<char> = s1.chars().collect();
    let s2_chars: Vec<char> = s2.chars().collect();
    let len2 = s2_chars.len();

    if s1_chars.is_empty() {
        return len2;
    }
    if len2 == 0 {
        return s1_chars.len();
    }

    let mut prev_row: Vec<usize> = (0..=len2).collect();
    let mut curr_row = vec![0; len2 + 1];

    for (i, c1) in s1_chars.iter().enumerate() {
        curr_row[0] = i + 1;
        for (j, c2) in s2_chars.iter().enumerate() {
            let cost = if c1 == c2 { 0 } else { 1 };
            curr_row[j + 1] = (prev_row[j + 1] + 1)
                .min(curr_row[j] + 1)
                .min(prev_row[j] + cost);
        }
        std::mem::swap(&mut prev_row, &mut curr_row);
    }

    prev_row[len2]
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::dataset::TypeTag;

    fn schema(names: &[&str]) -> Schema {
        Schema::new(
            names
                .iter()
                .enumerate()
                .map(|(ordinal, name)| ColumnSchema {
                    name: name.to_string(),
                    ordinal,
                    inferred_type: TypeTag::Text,
                    null_count: 0,
                    distinct_sample: Vec::new(),
                })
                .collect(),
            0,
        )
    }

    #[test]
    fn test_levenshtein_distance() {
        assert_eq!(levenshtein_distance("kitten", "sitting"), 3);
        assert_eq!(levenshtein_distance("", "abc"), 3);
        assert_eq!(levenshtein_distance("same", "same"), 0);
    }

    #[test]
    fn test_name_tokens_split() {
        assert_eq!(name_tokens("Unit Price"), vec!["unit", "price"]);
        assert_eq!(name_tokens("unitPrice"), vec!["unit", "price"]);
        assert_eq!(name_tokens("order_date"), vec!["order", "date"]);
    }

    #[test]
    fn test_exact_case_insensitive_match_wins() {
        let s = schema(&["Region", "Revenue"]);
        let ranked = rank_columns("revenue", &s);
        assert_eq!(ranked[0].name, "Revenue");
        assert_eq!(ranked[0].score, 1.0);
    }

    #[test]
    fn test_typo_still_resolves() {
        let s = schema(&["region", "revenue"]);
        let col = resolve_column("revenu", &s, 0.6).unwrap();
        assert_eq!(col.name, "revenue");
        let binding = schema(&["Unit Price", "Units"]);
        let col = resolve_column("unitprice", &binding, 0.6).unwrap();
        assert_eq!(col.name, "Unit Price");
    }

    #[test]
    fn test_extra_word_falls_below_floor() {
        let s = schema(&["region", "revenue"]);
        let err = resolve_column("wherre revenue", &s, 0.6).unwrap_err();
        match err {
            EngineError::UnknownColumn { phrase, candidates } => {
                assert_eq!(phrase, "wherre revenue");
                assert_eq!(candidates[0], "revenue");
            }
            other => panic!("unexpected error: {:?}", other),
        }
    }

    #[test]
    fn test_ties_prefer_declaration_order() {
        let s = schema(&["score", "score"]);
        let ranked = rank_columns("score", &s);
        assert_eq!(ranked[0].ordinal, 0);
    }

    #[test]
    fn test_raw_name_breaks_token_ties() {
        let s = schema(&["Sales Q1", "sales_q1"]);
        let ranked = rank_columns("sales_q1", &s);
        assert_eq!(ranked[0].name, "sales_q1");
        assert!(ranked[0].exact);
        assert!(!ranked[1].exact);
        assert_eq!(resolve_column("sales q1", &s, 0.6).unwrap().name, "Sales Q1");
    }

    #[test]
    fn test_multi_word_phrase() {
        let s = schema(&["unit price", "price list", "units"]);
        let ranked = rank_columns("unit price", &s);
        assert_eq!(ranked[0].name, "unit price");
        assert!(ranked[1].score < 1.0);
    }
}
