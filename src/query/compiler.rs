/// Predicate Compiler: ParsedCommand + Schema → Predicate
///
/// For every clause:
/// - Resolve the column phrase (exact, then fuzzy) against the schema
/// - Coerce the literal to the column's inferred type
/// - Lower the user-facing operator to a `CompareOp` (negated forms become NOT)
///
/// Clauses combine strictly left to right. AND and OR share one precedence
/// level and NOT binds to the single following clause:
/// `a or b and c` is `(a OR b) AND c`.
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::command::column_matcher::resolve_column;
use crate::command::{CommandToken, Connective, Operator, ParsedCommand};
use crate::config::EngineConfig;
use crate::dataset::{CellValue, TypeTag};
use crate::error::{EngineError, EngineResult};
use crate::metadata::{ColumnSchema, Schema};

use super::predicate::{BoolOp, CompareOp, Predicate};

/// One resolution decision, kept for user feedback and the audit log
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompilerExplanation {
    pub step: String,
    pub decision: String,
    pub reason: String,
}

/// Predicate plus the decisions that produced it
#[derive(Debug, Clone, PartialEq)]
pub struct Compilation {
    pub predicate: Option<Predicate>,
    pub explanations: Vec<CompilerExplanation>,
}

pub struct PredicateCompiler {
    similarity_floor: f64,
}

impl PredicateCompiler {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            similarity_floor: config.similarity_floor,
        }
    }

    /// Compile the command's clauses. `None` when the command has none.
    pub fn compile(&self, command: &ParsedCommand, schema: &Schema) -> EngineResult<Option<Predicate>> {
        self.compile_explained(command, schema).map(|c| c.predicate)
    }

    pub fn compile_explained(&self, command: &ParsedCommand, schema: &Schema) -> EngineResult<Compilation> {
        let mut explanations = Vec::new();
        let mut acc: Option<Predicate> = None;
        let mut pending_join: Option<BoolOp> = None;
        let mut negations = 0usize;
        let mut tokens = command.clauses.iter();

        while let Some(token) = tokens.next() {
            match token {
                CommandToken::Connective(Connective::Not) => negations += 1,
                CommandToken::Connective(conn @ (Connective::And | Connective::Or)) => {
                    if acc.is_none() || pending_join.is_some() {
                        return Err(EngineError::parse(
                            "connective without a preceding condition",
                            format!("{:?}", conn).to_lowercase(),
                        ));
                    }
                    pending_join = Some(match conn {
                        Connective::And => BoolOp::And,
                        _ => BoolOp::Or,
                    });
                }
                CommandToken::ColumnRef(phrase) => {
                    let op = match tokens.next() {
                        Some(CommandToken::Operator(op)) => *op,
                        other => {
                            return Err(EngineError::internal(format!(
                                "column reference '{}' followed by {:?}",
                                phrase, other
                            ))
                            .with_context("predicate compilation"))
                        }
                    };
                    let literal = if op.takes_value() {
                        match tokens.next() {
                            Some(CommandToken::Literal(text)) => Some(text.as_str()),
                            other => {
                                return Err(EngineError::internal(format!(
                                    "operator '{}' followed by {:?}",
                                    op.symbol(),
                                    other
                                ))
                                .with_context("predicate compilation"))
                            }
                        }
                    } else {
                        None
                    };

                    let column = self.resolve(phrase, schema, &mut explanations)?;
                    let mut leaf = compile_clause(column, op, literal)?;
                    for _ in 0..negations {
                        leaf = Predicate::negate(leaf);
                    }
                    negations = 0;

                    acc = Some(match (acc.take(), pending_join.take()) {
                        (None, None) => leaf,
                        (Some(prev), Some(op)) => prev.join(op, leaf),
                        (Some(_), None) => {
                            return Err(EngineError::parse("two conditions need 'and' or 'or' between them", phrase.clone()))
                        }
                        (None, Some(_)) => {
                            return Err(EngineError::internal("pending connective without a left operand"))
                        }
                    });
                }
                CommandToken::Operator(_) | CommandToken::Literal(_) | CommandToken::Verb(_) => {
                    return Err(EngineError::internal(format!("unexpected token {} in clause stream", token))
                        .with_context("predicate compilation"));
                }
            }
        }

        if negations > 0 || pending_join.is_some() {
            return Err(EngineError::parse("command ends with a dangling connective", command.text.clone()));
        }

        if let Some(predicate) = &acc {
            predicate.validate()?;
            debug!(
                comparisons = predicate.comparison_count(),
                predicate = %predicate,
                "compiled predicate"
            );
        }

        Ok(Compilation {
            predicate: acc,
            explanations,
        })
    }

    /// Resolve a free-standing column phrase (sort keys, chart axes, scan targets)
    pub fn resolve_column<'a>(&self, phrase: &str, schema: &'a Schema) -> EngineResult<&'a ColumnSchema> {
        let mut ignored = Vec::new();
        self.resolve(phrase, schema, &mut ignored)
    }

    fn resolve<'a>(
        &self,
        phrase: &str,
        schema: &'a Schema,
        explanations: &mut Vec<CompilerExplanation>,
    ) -> EngineResult<&'a ColumnSchema> {
        let column = resolve_column(phrase, schema, self.similarity_floor)?;
        let exact = column.name.eq_ignore_ascii_case(phrase.trim());
        if !exact {
            debug!(phrase, column = %column.name, "fuzzy column match");
        }
        explanations.push(CompilerExplanation {
            step: "column".to_string(),
            decision: format!("'{}' -> {}", phrase, column.name),
            reason: if exact {
                "exact name".to_string()
            } else {
                "closest column name".to_string()
            },
        });
        Ok(column)
    }
}

/// Lower one resolved clause into a comparison (or its negation)
fn compile_clause(column: &ColumnSchema, op: Operator, literal: Option<&str>) -> EngineResult<Predicate> {
    let name = column.name.clone();
    let tag = column.inferred_type;
    let raw = literal.unwrap_or_default();

    let leaf = match op {
        Operator::IsEmpty => Predicate::compare(name, tag, CompareOp::IsEmpty, CellValue::Null),
        Operator::IsNotEmpty => Predicate::negate(Predicate::compare(name, tag, CompareOp::IsEmpty, CellValue::Null)),
        Operator::Contains => Predicate::compare(name, tag, CompareOp::Contains, CellValue::Text(raw.to_string())),
        Operator::NotContains => Predicate::negate(Predicate::compare(
            name,
            tag,
            CompareOp::Contains,
            CellValue::Text(raw.to_string()),
        )),
        Operator::Before | Operator::After => {
            if !matches!(tag, TypeTag::Date | TypeTag::Numeric) {
                return Err(EngineError::type_mismatch(&column.name, "date", raw));
            }
            let cmp = if op == Operator::Before { CompareOp::Lt } else { CompareOp::Gt };
            Predicate::compare(name, tag, cmp, coerce_literal(column, raw)?)
        }
        Operator::Eq => Predicate::compare(name, tag, CompareOp::Eq, coerce_literal(column, raw)?),
        Operator::Ne => Predicate::compare(name, tag, CompareOp::Ne, coerce_literal(column, raw)?),
        Operator::Gt => Predicate::compare(name, tag, CompareOp::Gt, coerce_literal(column, raw)?),
        Operator::Ge => Predicate::compare(name, tag, CompareOp::Ge, coerce_literal(column, raw)?),
        Operator::Lt => Predicate::compare(name, tag, CompareOp::Lt, coerce_literal(column, raw)?),
        Operator::Le => Predicate::compare(name, tag, CompareOp::Le, coerce_literal(column, raw)?),
    };
    Ok(leaf)
}

/// Coerce a literal to the column's inferred type; text passes through
pub fn coerce_literal(column: &ColumnSchema, raw: &str) -> EngineResult<CellValue> {
    let trimmed = raw.trim();
    if column.inferred_type == TypeTag::Text {
        return Ok(CellValue::Text(trimmed.to_string()));
    }
    CellValue::Text(trimmed.to_string())
        .coerce_to(column.inferred_type)
        .ok_or_else(|| EngineError::type_mismatch(&column.name, column.inferred_type.as_str(), trimmed))
}
