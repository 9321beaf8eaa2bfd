/// Predicate persistence
///
/// Predicates leave the core as plain JSON (objects, arrays, strings,
/// numbers, booleans, null) so an external store can keep automation rules
/// across sessions:
///
/// ```text
/// {"kind": "comparison", "column": "revenue", "column_type": "numeric", "op": "gt", "value": 1000}
/// {"kind": "and", "children": [ ... ]}
/// ```
///
/// Loading re-validates every comparison against the current schema. A missing
/// column or a type change the stored value cannot follow is a StaleRule.
use serde_json::{json, Map, Value};

use crate::dataset::{parse_date, CellValue, TypeTag};
use crate::error::{EngineError, EngineResult};
use crate::metadata::Schema;

use super::predicate::{BoolOp, CompareOp, Comparison, Predicate};

/// Placeholder id until the owning rule is known
const UNBOUND_RULE: &str = "unbound";

pub fn serialize_predicate(predicate: &Predicate) -> Value {
    match predicate {
        Predicate::Comparison(c) => json!({
            "kind": "comparison",
            "column": c.column,
            "column_type": c.column_type.as_str(),
            "op": c.op.name(),
            "value": encode_value(&c.value),
        }),
        Predicate::Boolean { op, children } => json!({
            "kind": op.name(),
            "children": children.iter().map(serialize_predicate).collect::<Vec<_>>(),
        }),
    }
}

/// Decode and re-validate against `schema`
pub fn deserialize_predicate(value: &Value, schema: &Schema) -> EngineResult<Predicate> {
    let predicate = decode_predicate(value)?;
    revalidate(&predicate, schema)
}

/// Structural decode only; no schema checks
pub fn decode_predicate(value: &Value) -> EngineResult<Predicate> {
    let object = value
        .as_object()
        .ok_or_else(|| malformed("predicate node is not an object"))?;
    let kind = string_field(object, "kind")?;

    if kind == "comparison" {
        let column = string_field(object, "column")?;
        let type_name = string_field(object, "column_type")?;
        let column_type = TypeTag::from_name(type_name)
            .ok_or_else(|| malformed(format!("unknown column type '{}'", type_name)))?;
        let op_name = string_field(object, "op")?;
        let op = CompareOp::from_name(op_name).ok_or_else(|| malformed(format!("unknown operator '{}'", op_name)))?;
        let raw = object.get("value").unwrap_or(&Value::Null);
        let value = decode_value(raw, op, column_type)?;
        return Ok(Predicate::compare(column, column_type, op, value));
    }

    let op = BoolOp::from_name(kind).ok_or_else(|| malformed(format!("unknown node kind '{}'", kind)))?;
    let children = object
        .get("children")
        .and_then(Value::as_array)
        .ok_or_else(|| malformed(format!("'{}' node without children", kind)))?
        .iter()
        .map(decode_predicate)
        .collect::<EngineResult<Vec<_>>>()?;
    let predicate = Predicate::Boolean { op, children };
    predicate
        .validate()
        .map_err(|e| malformed(format!("invalid tree: {}", e)))?;
    Ok(predicate)
}

/// Check every comparison against the current schema, re-coercing values
/// when a column's inferred type has changed compatibly
pub fn revalidate(predicate: &Predicate, schema: &Schema) -> EngineResult<Predicate> {
    match predicate {
        Predicate::Comparison(c) => revalidate_comparison(c, schema).map(Predicate::Comparison),
        Predicate::Boolean { op, children } => Ok(Predicate::Boolean {
            op: *op,
            children: children
                .iter()
                .map(|child| revalidate(child, schema))
                .collect::<EngineResult<Vec<_>>>()?,
        }),
    }
}

fn revalidate_comparison(comparison: &Comparison, schema: &Schema) -> EngineResult<Comparison> {
    let column = schema.get(&comparison.column).ok_or_else(|| {
        EngineError::stale_rule(
            UNBOUND_RULE,
            format!("column '{}' no longer exists", comparison.column),
        )
    })?;
    let current = column.inferred_type;
    if current == comparison.column_type {
        return Ok(comparison.clone());
    }

    let incompatible = || {
        EngineError::stale_rule(
            UNBOUND_RULE,
            format!(
                "column '{}' changed from {} to {}",
                comparison.column, comparison.column_type, current
            ),
        )
    };

    let value = match comparison.op {
        CompareOp::IsEmpty | CompareOp::Contains => comparison.value.clone(),
        op if op.is_ordering() && matches!(current, TypeTag::Text | TypeTag::Boolean) => return Err(incompatible()),
        _ => CellValue::Text(comparison.value.to_string())
            .coerce_to(current)
            .ok_or_else(incompatible)?,
    };
    Ok(Comparison::new(comparison.column.clone(), current, comparison.op, value))
}

fn encode_value(value: &CellValue) -> Value {
    match value {
        CellValue::Number(v) => json!(v),
        CellValue::Text(s) => json!(s),
        CellValue::Bool(b) => json!(b),
        CellValue::Date(d) => json!(d.format("%Y-%m-%d").to_string()),
        CellValue::Null => Value::Null,
    }
}

fn decode_value(raw: &Value, op: CompareOp, column_type: TypeTag) -> EngineResult<CellValue> {
    match op {
        CompareOp::IsEmpty => return Ok(CellValue::Null),
        CompareOp::Contains => {
            return raw
                .as_str()
                .map(|s| CellValue::Text(s.to_string()))
                .ok_or_else(|| malformed("contains needs a text value"))
        }
        _ => {}
    }

    let decoded = match column_type {
        TypeTag::Numeric => raw.as_f64().map(CellValue::Number),
        TypeTag::Boolean => raw.as_bool().map(CellValue::Bool),
        TypeTag::Date => raw.as_str().and_then(parse_date).map(CellValue::Date),
        TypeTag::Text => raw.as_str().map(|s| CellValue::Text(s.to_string())),
    };
    decoded.ok_or_else(|| malformed(format!("value {} is not a {} value", raw, column_type)))
}

fn string_field<'a>(object: &'a Map<String, Value>, key: &str) -> EngineResult<&'a str> {
    object
        .get(key)
        .and_then(Value::as_str)
        .ok_or_else(|| malformed(format!("missing '{}'", key)))
}

fn malformed(reason: impl Into<String>) -> EngineError {
    EngineError::stale_rule(UNBOUND_RULE, format!("malformed predicate: {}", reason.into()))
}
