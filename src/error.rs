/// Unified error type for the command engine
/// Separates recoverable user-input failures from internal defects
use thiserror::Error;

#[derive(Error, Debug, Clone, PartialEq)]
pub enum EngineError {
    /// Unrecognized verb or a clause that could not be split into column/operator/value
    #[error("Could not understand '{fragment}': {message}")]
    Parse {
        message: String,
        fragment: String,
    },

    /// No column cleared the similarity floor
    #[error("No column matches '{phrase}'{}", suggestion_suffix(.candidates))]
    UnknownColumn {
        phrase: String,
        /// Nearest column names, best first
        candidates: Vec<String>,
    },

    /// Literal does not coerce to the resolved column's type
    #[error("Column '{column}' expects a {expected} value, got '{literal}'")]
    TypeMismatch {
        column: String,
        expected: String,
        literal: String,
    },

    /// Persisted rule no longer fits the current dataset shape
    #[error("Rule {rule_id} is stale: {reason}")]
    StaleRule {
        rule_id: String,
        reason: String,
    },

    /// Dataset exceeds the configured evaluation guard
    #[error("Dataset has {rows} rows, above the limit of {limit}")]
    RowLimit {
        rows: usize,
        limit: usize,
    },

    /// Configuration rejected by validation
    #[error("Invalid configuration: {message}")]
    InvalidConfig {
        message: String,
    },

    /// Loaded data cannot form a dataset (duplicate headers)
    #[error("Invalid dataset: {message}")]
    InvalidDataset {
        message: String,
    },

    /// Internal errors: should never happen, indicates bug
    #[error("Internal error: {message}")]
    Internal {
        message: String,
        context: Option<String>,
    },
}

fn suggestion_suffix(candidates: &[String]) -> String {
    if candidates.is_empty() {
        String::new()
    } else {
        format!(" (did you mean: {}?)", candidates.join(", "))
    }
}

impl EngineError {
    pub fn parse(message: impl Into<String>, fragment: impl Into<String>) -> Self {
        Self::Parse {
            message: message.into(),
            fragment: fragment.into(),
        }
    }

    pub fn unknown_column(phrase: impl Into<String>, candidates: Vec<String>) -> Self {
        Self::UnknownColumn {
            phrase: phrase.into(),
            candidates,
        }
    }

    pub fn type_mismatch(
        column: impl Into<String>,
        expected: impl Into<String>,
        literal: impl Into<String>,
    ) -> Self {
        Self::TypeMismatch {
            column: column.into(),
            expected: expected.into(),
            literal: literal.into(),
        }
    }

    pub fn stale_rule(rule_id: impl Into<String>, reason: impl Into<String>) -> Self {
        Self::StaleRule {
            rule_id: rule_id.into(),
            reason: reason.into(),
        }
    }

    pub fn row_limit(rows: usize, limit: usize) -> Self {
        Self::RowLimit { rows, limit }
    }

    pub fn invalid_config(message: impl Into<String>) -> Self {
        Self::InvalidConfig {
            message: message.into(),
        }
    }

    pub fn invalid_dataset(message: impl Into<String>) -> Self {
        Self::InvalidDataset {
            message: message.into(),
        }
    }

    pub fn internal(message: impl Into<String>) -> Self {
        Self::Internal {
            message: message.into(),
            context: None,
        }
    }

    /// Add context to an error
    pub fn with_context(mut self, context: impl Into<String>) -> Self {
        if let Self::Internal { context: ctx, .. } = &mut self {
            *ctx = Some(context.into());
        }
        self
    }

    /// Attach a rule id to a StaleRule raised before the rule was known
    pub fn for_rule(self, id: impl Into<String>) -> Self {
        match self {
            Self::StaleRule { reason, .. } => Self::StaleRule {
                rule_id: id.into(),
                reason,
            },
            other => other,
        }
    }

    /// True for failures caused by user input or stale persisted state.
    /// `Internal` is the only variant that signals a defect.
    pub fn is_user_error(&self) -> bool {
        !matches!(self, Self::Internal { .. })
    }
}

impl From<anyhow::Error> for EngineError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal {
            message: err.to_string(),
            context: None,
        }
    }
}

impl From<serde_json::Error> for EngineError {
    fn from(err: serde_json::Error) -> Self {
        Self::InvalidConfig {
            message: err.to_string(),
        }
    }
}

/// Result type alias for engine operations
pub type EngineResult<T> = Result<T, EngineError>;
