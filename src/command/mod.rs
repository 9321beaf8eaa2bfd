//! Plain-language command parsing
//!
//! Turns command text into a verb plus clause tokens. Column phrases stay
//! unresolved here; the query compiler resolves them against a schema.

pub mod column_matcher;
pub mod parser;
pub mod token;

pub use column_matcher::{rank_columns, resolve_column, ColumnCandidate};
pub use parser::{ChartKind, ChartSpec, CommandParser, ParsedCommand, ScanRequest, SortSpec};
pub use token::{CommandToken, Connective, Operator, Verb};
