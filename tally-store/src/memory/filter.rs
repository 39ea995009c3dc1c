//! Filter document evaluation
//!
//! Evaluates the native filter dialect produced by the query translator
//! against in-memory rows. Unknown `$` keys fail with a named error rather
//! than matching nothing.

use std::cmp::Ordering;

use regex::Regex;
use serde_json::{Map, Value};
use tally_core::{lookup_path, Document, StoreError};

use crate::value::{compare_values, values_equal};

/// Evaluate a whole filter document against one row.
pub(crate) fn matches_filter(
    row: &Document,
    filter: &Map<String, Value>,
) -> Result<bool, StoreError> {
    for (key, clause) in filter {
        if key == "$or" {
            if !matches_or(row, clause)? {
                return Ok(false);
            }
        } else if key.starts_with('$') {
            return Err(StoreError::UnsupportedOperator {
                operator: key.clone(),
            });
        } else {
            let found = lookup_path(row, key);
            if !matches_clause(found, clause)? {
                return Ok(false);
            }
        }
    }
    Ok(true)
}

fn matches_or(row: &Document, clause: &Value) -> Result<bool, StoreError> {
    let branches = clause.as_array().ok_or_else(|| StoreError::MalformedFilter {
        reason: "$or expects an array of filter documents".to_string(),
    })?;
    for branch in branches {
        let branch = branch.as_object().ok_or_else(|| StoreError::MalformedFilter {
            reason: "$or branches must be filter documents".to_string(),
        })?;
        if matches_filter(row, branch)? {
            return Ok(true);
        }
    }
    Ok(false)
}

/// One field clause: either an operator map or a direct equality value.
fn matches_clause(found: Option<&Value>, clause: &Value) -> Result<bool, StoreError> {
    match clause {
        Value::Object(map) if is_operator_map(map) => matches_operator_map(found, map),
        direct => Ok(values_equal(found, direct)),
    }
}

fn matches_operator_map(
    found: Option<&Value>,
    operators: &Map<String, Value>,
) -> Result<bool, StoreError> {
    let options = operators
        .get("$options")
        .and_then(Value::as_str)
        .unwrap_or("");
    for (op, operand) in operators {
        if op == "$options" {
            continue;
        }
        if !apply_operator(found, op, operand, options)? {
            return Ok(false);
        }
    }
    Ok(true)
}

fn apply_operator(
    found: Option<&Value>,
    op: &str,
    operand: &Value,
    options: &str,
) -> Result<bool, StoreError> {
    match op {
        "$eq" => Ok(values_equal(found, operand)),
        "$ne" => Ok(!values_equal(found, operand)),
        "$gt" => Ok(compare_same_type(found, operand) == Some(Ordering::Greater)),
        "$gte" => Ok(matches!(
            compare_same_type(found, operand),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        )),
        "$lt" => Ok(compare_same_type(found, operand) == Some(Ordering::Less)),
        "$lte" => Ok(matches!(
            compare_same_type(found, operand),
            Some(Ordering::Less) | Some(Ordering::Equal)
        )),
        "$in" => {
            let candidates = list_operand(op, operand)?;
            Ok(candidates
                .iter()
                .any(|candidate| values_equal(found, candidate)))
        }
        "$nin" => {
            let candidates = list_operand(op, operand)?;
            Ok(!candidates
                .iter()
                .any(|candidate| values_equal(found, candidate)))
        }
        "$exists" => {
            let wanted = operand.as_bool().ok_or_else(|| malformed("$exists expects a boolean"))?;
            Ok(found.is_some() == wanted)
        }
        "$type" => {
            let name = operand
                .as_str()
                .ok_or_else(|| malformed("$type expects a type name string"))?;
            Ok(found.is_some_and(|value| type_matches(value, name)))
        }
        "$regex" => {
            let pattern = operand
                .as_str()
                .ok_or_else(|| malformed("$regex expects a pattern string"))?;
            let Some(Value::String(text)) = found else {
                return Ok(false);
            };
            let full = if options.contains('i') {
                format!("(?i){pattern}")
            } else {
                pattern.to_string()
            };
            let regex = Regex::new(&full).map_err(|source| StoreError::MalformedFilter {
                reason: format!("bad pattern `{pattern}`: {source}"),
            })?;
            Ok(regex.is_match(text))
        }
        "$all" => {
            let wanted = list_operand(op, operand)?;
            match found {
                Some(Value::Array(items)) => Ok(wanted.iter().all(|value| items.contains(value))),
                _ => Ok(false),
            }
        }
        "$size" => {
            let size = operand
                .as_u64()
                .ok_or_else(|| malformed("$size expects a non-negative integer"))?;
            match found {
                Some(Value::Array(items)) => Ok(items.len() as u64 == size),
                _ => Ok(false),
            }
        }
        "$elemMatch" => {
            let condition = operand
                .as_object()
                .ok_or_else(|| malformed("$elemMatch expects a condition object"))?;
            match found {
                Some(Value::Array(items)) => {
                    for item in items {
                        if element_matches(item, condition)? {
                            return Ok(true);
                        }
                    }
                    Ok(false)
                }
                _ => Ok(false),
            }
        }
        other => Err(StoreError::UnsupportedOperator {
            operator: other.to_string(),
        }),
    }
}

/// An element matches either a bare operator map (`{"$gt": 5}`) or a nested
/// filter document over its fields.
fn element_matches(item: &Value, condition: &Map<String, Value>) -> Result<bool, StoreError> {
    if is_operator_map(condition) {
        matches_operator_map(Some(item), condition)
    } else {
        match item {
            Value::Object(fields) => matches_filter(fields, condition),
            _ => Ok(false),
        }
    }
}

/// Range comparisons only apply within a type: two numbers or two strings.
fn compare_same_type(found: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (found?, operand) {
        (Value::Number(m), Value::Number(n)) => m.as_f64()?.partial_cmp(&n.as_f64()?),
        (Value::String(s), Value::String(t)) => Some(s.cmp(t)),
        _ => None,
    }
}

fn list_operand<'a>(op: &str, operand: &'a Value) -> Result<&'a Vec<Value>, StoreError> {
    operand
        .as_array()
        .ok_or_else(|| malformed(&format!("{op} expects an array")))
}

fn malformed(reason: &str) -> StoreError {
    StoreError::MalformedFilter {
        reason: reason.to_string(),
    }
}

fn is_operator_map(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

fn type_matches(value: &Value, name: &str) -> bool {
    match value {
        Value::Null => name == "null",
        Value::Bool(_) => name == "bool",
        Value::String(_) => name == "string",
        Value::Array(_) => name == "array",
        Value::Object(_) => name == "object",
        Value::Number(n) => match name {
            "number" => true,
            "int" | "long" => n.is_i64() || n.is_u64(),
            "double" => n.is_f64(),
            _ => false,
        },
    }
}

/// Stable multi-key sort using the store's value ordering.
pub(crate) fn sort_documents(rows: &mut [Document], keys: &[(String, i64)]) {
    if keys.is_empty() {
        return;
    }
    rows.sort_by(|a, b| {
        for (field, direction) in keys {
            let mut ord = compare_values(lookup_path(a, field), lookup_path(b, field));
            if *direction < 0 {
                ord = ord.reverse();
            }
            if ord != Ordering::Equal {
                return ord;
            }
        }
        Ordering::Equal
    });
}

// =============================================================================
// TESTS
// =============================================================================
