/// Command tokens
///
/// The parser turns a normalized utterance into these tagged variants and the
/// predicate compiler matches on them exhaustively.
use serde::{Deserialize, Serialize};
use std::fmt;

/// Leading action of a command
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Verb {
    Show,
    Filter,
    Highlight,
    Sort,
    Remove,
    Chart,
    Summarize,
}

impl Verb {
    /// Resolve a verb word, including synonyms
    pub fn from_word(word: &str) -> Option<Self> {
        let verb = match word {
            "show" | "display" | "list" | "find" | "get" | "view" => Verb::Show,
            "filter" | "select" | "keep" => Verb::Filter,
            "highlight" | "mark" | "flag" => Verb::Highlight,
            "sort" | "order" | "arrange" | "rank" => Verb::Sort,
            "remove" | "delete" | "drop" | "exclude" => Verb::Remove,
            "chart" | "plot" | "graph" => Verb::Chart,
            "summarize" | "summarise" | "summary" | "analyze" | "analyse" | "describe"
            | "insights" => Verb::Summarize,
            _ => return None,
        };
        Some(verb)
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            Verb::Show => "show",
            Verb::Filter => "filter",
            Verb::Highlight => "highlight",
            Verb::Sort => "sort",
            Verb::Remove => "remove",
            Verb::Chart => "chart",
            Verb::Summarize => "summarize",
        }
    }
}

impl fmt::Display for Verb {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Comparison operator as written by the user
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Operator {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    NotContains,
    Before,
    After,
    IsEmpty,
    IsNotEmpty,
}

impl Operator {
    /// Null checks take no value
    pub fn takes_value(&self) -> bool {
        !matches!(self, Operator::IsEmpty | Operator::IsNotEmpty)
    }

    pub fn symbol(&self) -> &'static str {
        match self {
            Operator::Eq => "=",
            Operator::Ne => "!=",
            Operator::Gt => ">",
            Operator::Ge => ">=",
            Operator::Lt => "<",
            Operator::Le => "<=",
            Operator::Contains => "contains",
            Operator::NotContains => "does not contain",
            Operator::Before => "before",
            Operator::After => "after",
            Operator::IsEmpty => "is empty",
            Operator::IsNotEmpty => "is not empty",
        }
    }
}

/// Boolean connective between clauses
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Connective {
    And,
    Or,
    Not,
}

impl Connective {
    pub fn from_word(word: &str) -> Option<Self> {
        match word {
            "and" | "but" | "&&" => Some(Connective::And),
            "or" | "||" => Some(Connective::Or),
            "not" => Some(Connective::Not),
            _ => None,
        }
    }
}

/// One token of a parsed command
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub enum CommandToken {
    Verb(Verb),
    /// Column phrase as typed; resolved against the schema during compilation
    ColumnRef(String),
    Operator(Operator),
    /// Raw value text; coerced during compilation
    Literal(String),
    Connective(Connective),
}

impl fmt::Display for CommandToken {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CommandToken::Verb(v) => write!(f, "{}", v),
            CommandToken::ColumnRef(c) => write!(f, "[{}]", c),
            CommandToken::Operator(op) => write!(f, "{}", op.symbol()),
            CommandToken::Literal(l) => write!(f, "'{}'", l),
            CommandToken::Connective(c) => write!(f, "{:?}", c),
        }
    }
}
