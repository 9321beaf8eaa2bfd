/// Data-quality report types
use serde::{Deserialize, Serialize};
use std::fmt;

/// Category of a flagged cell or row
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IssueKind {
    /// Null or blank cell
    Missing,
    /// Cell does not coerce to its column's inferred type
    TypeMismatch,
    /// Row equal to an earlier row
    Duplicate,
    /// Numeric value beyond the 3 x IQR fences
    OutOfRange,
    /// Spreadsheet error literal such as `#DIV/0!`
    ErrorValue,
    /// Row selected by an ad-hoc predicate
    PredicateMatch,
}

impl IssueKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            IssueKind::Missing => "missing",
            IssueKind::TypeMismatch => "type_mismatch",
            IssueKind::Duplicate => "duplicate",
            IssueKind::OutOfRange => "out_of_range",
            IssueKind::ErrorValue => "error_value",
            IssueKind::PredicateMatch => "predicate_match",
        }
    }

    /// The scans run by a full report, in report order
    pub fn fixed_scans() -> [IssueKind; 5] {
        [
            IssueKind::Missing,
            IssueKind::TypeMismatch,
            IssueKind::ErrorValue,
            IssueKind::OutOfRange,
            IssueKind::Duplicate,
        ]
    }
}

impl fmt::Display for IssueKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One flagged cell (`column` set) or whole row (`column` None)
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct QualityFlag {
    pub kind: IssueKind,
    pub row_index: usize,
    pub column: Option<String>,
    pub detail: String,
}

/// Missing-value totals for one column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct MissingSummary {
    pub column: String,
    pub count: usize,
    /// Share of rows, 0-100
    pub percentage: f64,
}

/// Result of one scan pass. Flags are additive: a cell may appear under
/// several kinds.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub row_count: usize,
    pub flags: Vec<QualityFlag>,
    /// Columns with at least one missing cell, in column order
    pub missing_summary: Vec<MissingSummary>,
}

impl QualityReport {
    pub fn is_clean(&self) -> bool {
        self.flags.is_empty()
    }

    pub fn flags_of(&self, kind: IssueKind) -> impl Iterator<Item = &QualityFlag> {
        self.flags.iter().filter(move |f| f.kind == kind)
    }

    pub fn count(&self, kind: IssueKind) -> usize {
        self.flags_of(kind).count()
    }

    /// Distinct flagged rows, ascending
    pub fn flagged_rows(&self) -> Vec<usize> {
        let mut rows: Vec<usize> = self.flags.iter().map(|f| f.row_index).collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }

    /// Distinct rows flagged with `kind`, ascending
    pub fn rows_with(&self, kind: IssueKind) -> Vec<usize> {
        let mut rows: Vec<usize> = self.flags_of(kind).map(|f| f.row_index).collect();
        rows.sort_unstable();
        rows.dedup();
        rows
    }
}
