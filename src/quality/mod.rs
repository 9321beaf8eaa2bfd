//! Data-Quality Detector: fixed and ad-hoc scans that flag cells and rows.

pub mod detector;
pub mod report;

pub use detector::{error_literal, QualityDetector, ERROR_LITERALS};
pub use report::{IssueKind, MissingSummary, QualityFlag, QualityReport};
