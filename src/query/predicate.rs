/// Predicate tree
///
/// Compiled, immutable filter expression. Every `Comparison` carries the
/// column's inferred type at compile time and a value already coerced to it,
/// so evaluation never re-parses literals.
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::fmt;

use crate::dataset::{CellValue, TypeTag};
use crate::error::{EngineError, EngineResult};

/// Comparison operator after compilation.
/// `before`/`after` lower to `Lt`/`Gt`; negated forms lower to `Not`.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CompareOp {
    Eq,
    Ne,
    Gt,
    Ge,
    Lt,
    Le,
    Contains,
    IsEmpty,
}

impl CompareOp {
    pub fn symbol(&self) -> &'static str {
        match self {
            CompareOp::Eq => "=",
            CompareOp::Ne => "!=",
            CompareOp::Gt => ">",
            CompareOp::Ge => ">=",
            CompareOp::Lt => "<",
            CompareOp::Le => "<=",
            CompareOp::Contains => "contains",
            CompareOp::IsEmpty => "is empty",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        let op = match name {
            "eq" => CompareOp::Eq,
            "ne" => CompareOp::Ne,
            "gt" => CompareOp::Gt,
            "ge" => CompareOp::Ge,
            "lt" => CompareOp::Lt,
            "le" => CompareOp::Le,
            "contains" => CompareOp::Contains,
            "is_empty" => CompareOp::IsEmpty,
            _ => return None,
        };
        Some(op)
    }

    pub fn name(&self) -> &'static str {
        match self {
            CompareOp::Eq => "eq",
            CompareOp::Ne => "ne",
            CompareOp::Gt => "gt",
            CompareOp::Ge => "ge",
            CompareOp::Lt => "lt",
            CompareOp::Le => "le",
            CompareOp::Contains => "contains",
            CompareOp::IsEmpty => "is_empty",
        }
    }

    /// Ordering operators need a comparable value
    pub fn is_ordering(&self) -> bool {
        matches!(self, CompareOp::Gt | CompareOp::Ge | CompareOp::Lt | CompareOp::Le)
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BoolOp {
    And,
    Or,
    Not,
}

impl BoolOp {
    pub fn name(&self) -> &'static str {
        match self {
            BoolOp::And => "and",
            BoolOp::Or => "or",
            BoolOp::Not => "not",
        }
    }

    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "and" => Some(BoolOp::And),
            "or" => Some(BoolOp::Or),
            "not" => Some(BoolOp::Not),
            _ => None,
        }
    }
}

/// Leaf comparison against one column
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Comparison {
    pub column: String,
    /// Column type the value was coerced to
    pub column_type: TypeTag,
    pub op: CompareOp,
    /// `Null` for `IsEmpty`; raw text for `Contains`
    pub value: CellValue,
}

impl Comparison {
    pub fn new(column: impl Into<String>, column_type: TypeTag, op: CompareOp, value: CellValue) -> Self {
        Self {
            column: column.into(),
            column_type,
            op,
            value,
        }
    }

    /// Test one cell. Null cells satisfy only `IsEmpty`; cells that do not
    /// coerce to the column type satisfy nothing else either.
    pub fn matches(&self, cell: &CellValue) -> bool {
        if self.op == CompareOp::IsEmpty {
            return cell.is_null();
        }
        if cell.is_null() {
            return false;
        }
        if self.op == CompareOp::Contains {
            let needle = self.value.to_string().to_lowercase();
            return cell.to_string().to_lowercase().contains(&needle);
        }

        let Some(coerced) = cell.coerce_to(self.column_type) else {
            return false;
        };
        let Some(ordering) = coerced.compare(&self.value) else {
            // NaN or mismatched variants
            return false;
        };
        match self.op {
            CompareOp::Eq => ordering == Ordering::Equal,
            CompareOp::Ne => ordering != Ordering::Equal,
            CompareOp::Gt => ordering == Ordering::Greater,
            CompareOp::Ge => ordering != Ordering::Less,
            CompareOp::Lt => ordering == Ordering::Less,
            CompareOp::Le => ordering != Ordering::Greater,
            CompareOp::Contains | CompareOp::IsEmpty => false,
        }
    }
}

impl fmt::Display for Comparison {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.op, &self.value) {
            (CompareOp::IsEmpty, _) => write!(f, "{} is empty", self.column),
            (_, CellValue::Number(_)) | (_, CellValue::Bool(_)) => {
                write!(f, "{} {} {}", self.column, self.op.symbol(), self.value)
            }
            _ => write!(f, "{} {} '{}'", self.column, self.op.symbol(), self.value),
        }
    }
}

/// Composable boolean expression over column comparisons
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(tag = "node", rename_all = "lowercase")]
pub enum Predicate {
    Comparison(Comparison),
    Boolean { op: BoolOp, children: Vec<Predicate> },
}

impl Predicate {
    pub fn compare(column: impl Into<String>, column_type: TypeTag, op: CompareOp, value: CellValue) -> Self {
        Predicate::Comparison(Comparison::new(column, column_type, op, value))
    }

    pub fn and(children: Vec<Predicate>) -> Self {
        Predicate::Boolean {
            op: BoolOp::And,
            children,
        }
    }

    pub fn or(children: Vec<Predicate>) -> Self {
        Predicate::Boolean {
            op: BoolOp::Or,
            children,
        }
    }

    pub fn negate(child: Predicate) -> Self {
        Predicate::Boolean {
            op: BoolOp::Not,
            children: vec![child],
        }
    }

    /// Append `next` under `op`, left to right. A chain of the same operator
    /// stays flat: `(a AND b) AND c` becomes `AND(a, b, c)`.
    pub fn join(self, op: BoolOp, next: Predicate) -> Self {
        match self {
            Predicate::Boolean { op: current, mut children } if current == op && op != BoolOp::Not => {
                children.push(next);
                Predicate::Boolean { op, children }
            }
            other => Predicate::Boolean {
                op,
                children: vec![other, next],
            },
        }
    }

    /// Distinct column names in first-use order
    pub fn columns(&self) -> Vec<&str> {
        let mut names: Vec<&str> = Vec::new();
        for comparison in self.comparisons() {
            if !names.contains(&comparison.column.as_str()) {
                names.push(comparison.column.as_str());
            }
        }
        names
    }

    /// Leaves in left-to-right order
    pub fn comparisons(&self) -> Vec<&Comparison> {
        match self {
            Predicate::Comparison(c) => vec![c],
            Predicate::Boolean { children, .. } => children.iter().flat_map(Predicate::comparisons).collect(),
        }
    }

    pub fn comparison_count(&self) -> usize {
        self.comparisons().len()
    }

    /// Structural check: NOT has one child, AND/OR at least one
    pub fn validate(&self) -> EngineResult<()> {
        match self {
            Predicate::Comparison(_) => Ok(()),
            Predicate::Boolean { op: BoolOp::Not, children } if children.len() != 1 => Err(EngineError::internal(
                format!("NOT node with {} children", children.len()),
            )),
            Predicate::Boolean { op, children } if children.is_empty() => {
                Err(EngineError::internal(format!("{} node without children", op.name())))
            }
            Predicate::Boolean { children, .. } => children.iter().try_for_each(Predicate::validate),
        }
    }
}

impl fmt::Display for Predicate {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Predicate::Comparison(c) => write!(f, "{}", c),
            Predicate::Boolean { op: BoolOp::Not, children } => {
                write!(f, "NOT ")?;
                match children.first() {
                    Some(child @ Predicate::Comparison(_)) => write!(f, "{}", child),
                    Some(child) => write!(f, "({})", child),
                    None => Ok(()),
                }
            }
            Predicate::Boolean { op, children } => {
                let sep = format!(" {} ", op.name().to_uppercase());
                for (i, child) in children.iter().enumerate() {
                    if i > 0 {
                        f.write_str(&sep)?;
                    }
                    match child {
                        Predicate::Boolean { op: BoolOp::Not, .. } | Predicate::Comparison(_) => write!(f, "{}", child)?,
                        _ => write!(f, "({})", child)?,
                    }
                }
                Ok(())
            }
        }
    }
}
