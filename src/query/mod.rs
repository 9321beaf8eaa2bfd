//! Query layer: predicate trees, the compiler that builds them from parsed
//! commands, and their persisted JSON form.

pub mod compiler;
pub mod persistence;
pub mod predicate;

pub use compiler::{coerce_literal, Compilation, CompilerExplanation, PredicateCompiler};
pub use persistence::{decode_predicate, deserialize_predicate, revalidate, serialize_predicate};
pub use predicate::{BoolOp, CompareOp, Comparison, Predicate};
