/// Metadata module: schema inspection for loaded datasets
///
/// Every other component resolves column names and types through the
/// `Schema` produced here.

pub mod schema;

pub use schema::{infer_type, inspect, ColumnSchema, Schema};
pub use crate::dataset::TypeTag;
