//! Aggregation pipeline interpreter
//!
//! Executes the pushed-down dialect over materialized rows: `$match`,
//! `$group`, `$project`, `$sort`, `$skip`, `$limit`, `$unwind`, `$facet`,
//! `$sample` and `$count`, plus the expression operators the bundled
//! analyses compile to. Anything outside the dialect fails with a named
//! error instead of being skipped.

use std::cmp::Ordering;
use std::collections::HashMap;

use chrono::{DateTime, Timelike, Utc};
use rand::seq::IteratorRandom;
use serde_json::{Map, Number, Value};
use tally_core::num::{number_value, round_to, value_as_f64};
use tally_core::{lookup_path, parse_datetime, Document, StoreError};

use crate::memory::filter::{matches_filter, sort_documents};
use crate::value::compare_values;

/// Run every stage in order over the given rows.
pub(crate) fn run(mut rows: Vec<Document>, stages: &[Value]) -> Result<Vec<Document>, StoreError> {
    for stage in stages {
        rows = apply_stage(rows, stage)?;
    }
    Ok(rows)
}

fn apply_stage(rows: Vec<Document>, stage: &Value) -> Result<Vec<Document>, StoreError> {
    let single_key = stage
        .as_object()
        .filter(|spec| spec.len() == 1)
        .and_then(|spec| spec.iter().next());
    let (name, body) = single_key.ok_or_else(|| {
        malformed("<stage>", "each stage must be an object with exactly one operator")
    })?;
    match name.as_str() {
        "$match" => stage_match(rows, body),
        "$group" => stage_group(rows, body),
        "$project" => stage_project(rows, body),
        "$sort" => stage_sort(rows, body),
        "$skip" => stage_skip(rows, body),
        "$limit" => stage_limit(rows, body),
        "$unwind" => stage_unwind(rows, body),
        "$facet" => stage_facet(rows, body),
        "$sample" => stage_sample(rows, body),
        "$count" => stage_count(rows, body),
        other => Err(StoreError::UnsupportedStage {
            stage: other.to_string(),
        }),
    }
}

fn malformed(stage: &str, reason: &str) -> StoreError {
    StoreError::MalformedStage {
        stage: stage.to_string(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// ROW STAGES
// =============================================================================

fn stage_match(mut rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let filter = body
        .as_object()
        .ok_or_else(|| malformed("$match", "expects a filter document"))?;
    let mut kept = Vec::with_capacity(rows.len());
    for row in rows.drain(..) {
        if matches_filter(&row, filter)? {
            kept.push(row);
        }
    }
    Ok(kept)
}

fn stage_sort(mut rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = body
        .as_object()
        .ok_or_else(|| malformed("$sort", "expects an object of field directions"))?;
    let mut keys = Vec::with_capacity(spec.len());
    for (field, direction) in spec {
        let direction = direction
            .as_i64()
            .filter(|d| *d == 1 || *d == -1)
            .ok_or_else(|| malformed("$sort", "directions must be 1 or -1"))?;
        keys.push((field.clone(), direction));
    }
    sort_documents(&mut rows, &keys);
    Ok(rows)
}

fn stage_skip(rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let count = body
        .as_u64()
        .ok_or_else(|| malformed("$skip", "expects a non-negative integer"))?;
    Ok(rows.into_iter().skip(count as usize).collect())
}

fn stage_limit(mut rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let count = body
        .as_u64()
        .ok_or_else(|| malformed("$limit", "expects a non-negative integer"))?;
    rows.truncate(count as usize);
    Ok(rows)
}

fn stage_count(rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let field = body
        .as_str()
        .ok_or_else(|| malformed("$count", "expects an output field name"))?;
    let mut doc = Map::new();
    doc.insert(field.to_string(), Value::Number(Number::from(rows.len() as u64)));
    Ok(vec![doc])
}

fn stage_sample(rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let size = body
        .as_object()
        .and_then(|opts| opts.get("size"))
        .and_then(Value::as_u64)
        .ok_or_else(|| malformed("$sample", "expects {size: n}"))? as usize;
    if size >= rows.len() {
        return Ok(rows);
    }
    Ok(rows.into_iter().choose_multiple(&mut rand::rng(), size))
}

enum UnwindPlan {
    Drop,
    Keep,
    Expand(Vec<Value>),
}

fn stage_unwind(rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let path = match body {
        Value::String(path) => path.as_str(),
        Value::Object(opts) => opts
            .get("path")
            .and_then(Value::as_str)
            .ok_or_else(|| malformed("$unwind", "expects a `$field` path"))?,
        _ => return Err(malformed("$unwind", "expects a `$field` path")),
    };
    let field = path
        .strip_prefix('$')
        .ok_or_else(|| malformed("$unwind", "paths must start with `$`"))?;

    let mut out = Vec::new();
    for row in rows {
        let plan = match lookup_path(&row, field) {
            Some(Value::Array(items)) if items.is_empty() => UnwindPlan::Drop,
            Some(Value::Array(items)) => UnwindPlan::Expand(items.clone()),
            Some(Value::Null) | None => UnwindPlan::Drop,
            Some(_) => UnwindPlan::Keep,
        };
        match plan {
            UnwindPlan::Drop => {}
            UnwindPlan::Keep => out.push(row),
            UnwindPlan::Expand(items) => {
                for item in items {
                    let mut expanded = row.clone();
                    set_path(&mut expanded, field, item);
                    out.push(expanded);
                }
            }
        }
    }
    Ok(out)
}

fn set_path(doc: &mut Document, path: &str, value: Value) {
    match path.split_once('.') {
        None => {
            doc.insert(path.to_string(), value);
        }
        Some((head, rest)) => {
            if let Some(Value::Object(inner)) = doc.get_mut(head) {
                set_path(inner, rest, value);
            }
        }
    }
}

fn stage_facet(rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let facets = body
        .as_object()
        .ok_or_else(|| malformed("$facet", "expects an object of sub-pipelines"))?;
    let mut out = Map::new();
    for (name, sub) in facets {
        let stages = sub
            .as_array()
            .ok_or_else(|| malformed("$facet", "sub-pipelines must be stage arrays"))?;
        let results = run(rows.clone(), stages)?;
        out.insert(
            name.clone(),
            Value::Array(results.into_iter().map(Value::Object).collect()),
        );
    }
    Ok(vec![out])
}

// =============================================================================
// $group
// =============================================================================

enum Accumulator {
    Sum,
    Avg,
    Min,
    Max,
    Push,
    AddToSet,
}

impl Accumulator {
    fn parse(op: &str) -> Result<Self, StoreError> {
        match op {
            "$sum" => Ok(Self::Sum),
            "$avg" => Ok(Self::Avg),
            "$min" => Ok(Self::Min),
            "$max" => Ok(Self::Max),
            "$push" => Ok(Self::Push),
            "$addToSet" => Ok(Self::AddToSet),
            other => Err(StoreError::UnsupportedExpression {
                operator: other.to_string(),
            }),
        }
    }

    fn fresh_state(&self) -> AccState {
        match self {
            Self::Sum => AccState::Sum(0.0),
            Self::Avg => AccState::Avg {
                total: 0.0,
                count: 0,
            },
            Self::Min => AccState::Min(None),
            Self::Max => AccState::Max(None),
            Self::Push => AccState::Push(Vec::new()),
            Self::AddToSet => AccState::AddToSet(Vec::new()),
        }
    }
}

enum AccState {
    Sum(f64),
    Avg { total: f64, count: u64 },
    Min(Option<Value>),
    Max(Option<Value>),
    Push(Vec<Value>),
    AddToSet(Vec<Value>),
}

impl AccState {
    /// Fold one evaluated expression into the state. Non-numeric values are
    /// ignored by the numeric accumulators; null and missing are ignored by
    /// min/max; missing is skipped by push/addToSet.
    fn update(&mut self, evaluated: Option<Value>) {
        match self {
            AccState::Sum(total) => {
                if let Some(n) = evaluated.as_ref().and_then(value_as_f64) {
                    *total += n;
                }
            }
            AccState::Avg { total, count } => {
                if let Some(n) = evaluated.as_ref().and_then(value_as_f64) {
                    *total += n;
                    *count += 1;
                }
            }
            AccState::Min(current) => {
                if let Some(value) = evaluated.filter(|v| !v.is_null()) {
                    let replace = match current {
                        Some(existing) => {
                            compare_values(Some(&value), Some(existing)) == Ordering::Less
                        }
                        None => true,
                    };
                    if replace {
                        *current = Some(value);
                    }
                }
            }
            AccState::Max(current) => {
                if let Some(value) = evaluated.filter(|v| !v.is_null()) {
                    let replace = match current {
                        Some(existing) => {
                            compare_values(Some(&value), Some(existing)) == Ordering::Greater
                        }
                        None => true,
                    };
                    if replace {
                        *current = Some(value);
                    }
                }
            }
            AccState::Push(items) => {
                if let Some(value) = evaluated {
                    items.push(value);
                }
            }
            AccState::AddToSet(items) => {
                if let Some(value) = evaluated {
                    if !items.contains(&value) {
                        items.push(value);
                    }
                }
            }
        }
    }

    fn finalize(self) -> Value {
        match self {
            AccState::Sum(total) => number_value(total),
            AccState::Avg { total, count } => {
                if count == 0 {
                    Value::Null
                } else {
                    number_value(total / count as f64)
                }
            }
            AccState::Min(value) | AccState::Max(value) => value.unwrap_or(Value::Null),
            AccState::Push(items) | AccState::AddToSet(items) => Value::Array(items),
        }
    }
}

fn stage_group(rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = body
        .as_object()
        .ok_or_else(|| malformed("$group", "expects an object"))?;
    let id_expr = spec
        .get("_id")
        .ok_or_else(|| malformed("$group", "requires an `_id` expression"))?;

    let mut fields: Vec<(String, Accumulator, Value)> = Vec::new();
    for (field, acc_spec) in spec {
        if field == "_id" {
            continue;
        }
        let acc_map = acc_spec
            .as_object()
            .filter(|map| map.len() == 1)
            .ok_or_else(|| malformed("$group", "accumulators must be single-operator objects"))?;
        if let Some((op, expr)) = acc_map.iter().next() {
            fields.push((field.clone(), Accumulator::parse(op)?, expr.clone()));
        }
    }

    // Groups keep first-seen order; keys are canonical JSON of the _id value.
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, (Value, Vec<AccState>)> = HashMap::new();
    for row in &rows {
        let key_value = eval_expr(row, id_expr)?.unwrap_or(Value::Null);
        let key = key_value.to_string();
        if !groups.contains_key(&key) {
            order.push(key.clone());
            let states = fields.iter().map(|(_, acc, _)| acc.fresh_state()).collect();
            groups.insert(key.clone(), (key_value, states));
        }
        if let Some((_, states)) = groups.get_mut(&key) {
            for ((_, _, expr), state) in fields.iter().zip(states.iter_mut()) {
                state.update(eval_expr(row, expr)?);
            }
        }
    }

    let mut out = Vec::with_capacity(order.len());
    for key in order {
        if let Some((key_value, states)) = groups.remove(&key) {
            let mut doc = Map::new();
            doc.insert("_id".to_string(), key_value);
            for ((field, _, _), state) in fields.iter().zip(states) {
                doc.insert(field.clone(), state.finalize());
            }
            out.push(doc);
        }
    }
    Ok(out)
}

// =============================================================================
// $project
// =============================================================================

fn is_exclude(directive: &Value) -> bool {
    matches!(directive, Value::Bool(false)) || directive.as_i64() == Some(0)
}

fn is_include(directive: &Value) -> bool {
    matches!(directive, Value::Bool(true)) || directive.as_i64() == Some(1)
}

fn stage_project(rows: Vec<Document>, body: &Value) -> Result<Vec<Document>, StoreError> {
    let spec = body
        .as_object()
        .ok_or_else(|| malformed("$project", "expects an object"))?;
    if spec.is_empty() {
        return Err(malformed("$project", "requires at least one field"));
    }
    let exclusion = spec.values().all(is_exclude);
    let mut out = Vec::with_capacity(rows.len());
    for row in rows {
        out.push(project_row(&row, spec, exclusion)?);
    }
    Ok(out)
}

fn project_row(
    row: &Document,
    spec: &Map<String, Value>,
    exclusion: bool,
) -> Result<Document, StoreError> {
    if exclusion {
        let mut kept = row.clone();
        for field in spec.keys() {
            kept.remove(field);
        }
        return Ok(kept);
    }

    let mut out = Map::new();
    let mut keep_id = true;
    for (field, directive) in spec {
        if field == "_id" && is_exclude(directive) {
            keep_id = false;
            continue;
        }
        if is_include(directive) {
            if let Some(value) = lookup_path(row, field) {
                out.insert(field.clone(), value.clone());
            }
        } else if is_exclude(directive) {
            continue;
        } else if let Some(value) = eval_expr(row, directive)? {
            out.insert(field.clone(), value);
        }
    }
    if keep_id && !out.contains_key("_id") {
        if let Some(id) = row.get("_id") {
            out.insert("_id".to_string(), id.clone());
        }
    }
    Ok(out)
}

// =============================================================================
// EXPRESSIONS
// =============================================================================

/// Evaluate an aggregation expression against one row. `None` means the
/// expression resolved to a missing value.
pub(crate) fn eval_expr(row: &Document, expr: &Value) -> Result<Option<Value>, StoreError> {
    match expr {
        Value::String(text) => match text.strip_prefix('$') {
            Some(path) => Ok(lookup_path(row, path).cloned()),
            None => Ok(Some(expr.clone())),
        },
        Value::Object(map) => {
            if map.len() == 1 {
                if let Some((op, args)) = map.iter().next() {
                    if op.starts_with('$') {
                        return eval_operator(row, op, args);
                    }
                }
            }
            // Object literal: evaluate each value.
            let mut out = Map::new();
            for (key, sub) in map {
                if key.starts_with('$') {
                    return Err(StoreError::UnsupportedExpression {
                        operator: key.clone(),
                    });
                }
                out.insert(key.clone(), eval_expr(row, sub)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Object(out)))
        }
        Value::Array(items) => {
            let mut out = Vec::with_capacity(items.len());
            for item in items {
                out.push(eval_expr(row, item)?.unwrap_or(Value::Null));
            }
            Ok(Some(Value::Array(out)))
        }
        literal => Ok(Some(literal.clone())),
    }
}

fn eval_operator(row: &Document, op: &str, args: &Value) -> Result<Option<Value>, StoreError> {
    match op {
        "$multiply" => {
            let operands = expr_list(op, args)?;
            let mut product = 1.0;
            for operand in operands {
                match eval_expr(row, operand)?.as_ref().and_then(value_as_f64) {
                    Some(n) => product *= n,
                    None => return Ok(None),
                }
            }
            Ok(Some(number_value(product)))
        }
        "$divide" => {
            let operands = expr_list(op, args)?;
            if operands.len() != 2 {
                return Err(invalid(op, "expects exactly two operands"));
            }
            let numerator = eval_expr(row, &operands[0])?.as_ref().and_then(value_as_f64);
            let denominator = eval_expr(row, &operands[1])?.as_ref().and_then(value_as_f64);
            match (numerator, denominator) {
                (Some(_), Some(d)) if d == 0.0 => Ok(None),
                (Some(n), Some(d)) => Ok(Some(number_value(n / d))),
                _ => Ok(None),
            }
        }
        "$round" => {
            let operands = expr_list(op, args)?;
            if operands.is_empty() || operands.len() > 2 {
                return Err(invalid(op, "expects a value and an optional precision"));
            }
            let places = match operands.get(1) {
                Some(places) => places
                    .as_i64()
                    .ok_or_else(|| invalid(op, "precision must be an integer"))?
                    as i32,
                None => 0,
            };
            match eval_expr(row, &operands[0])?.as_ref().and_then(value_as_f64) {
                Some(n) => Ok(Some(number_value(round_to(n, places)))),
                None => Ok(None),
            }
        }
        "$size" => match eval_expr(row, args)? {
            Some(Value::Array(items)) => {
                Ok(Some(Value::Number(Number::from(items.len() as u64))))
            }
            _ => Err(invalid(op, "expects an array operand")),
        },
        "$hour" => {
            let instant = eval_datetime(row, op, args)?;
            Ok(Some(Value::Number(Number::from(instant.hour()))))
        }
        "$dateToString" => {
            let opts = args
                .as_object()
                .ok_or_else(|| invalid(op, "expects {format, date}"))?;
            let format = opts
                .get("format")
                .and_then(Value::as_str)
                .ok_or_else(|| invalid(op, "expects a format string"))?;
            let date = opts
                .get("date")
                .ok_or_else(|| invalid(op, "expects a date expression"))?;
            let instant = eval_datetime(row, op, date)?;
            Ok(Some(Value::String(instant.format(format).to_string())))
        }
        other => Err(StoreError::UnsupportedExpression {
            operator: other.to_string(),
        }),
    }
}

fn eval_datetime(row: &Document, op: &str, expr: &Value) -> Result<DateTime<Utc>, StoreError> {
    let value = eval_expr(row, expr)?;
    let text = value
        .as_ref()
        .and_then(Value::as_str)
        .ok_or_else(|| invalid(op, "expects a datetime string"))?;
    parse_datetime(text).ok_or_else(|| invalid(op, &format!("unparseable datetime `{text}`")))
}

fn expr_list<'a>(op: &str, args: &'a Value) -> Result<&'a Vec<Value>, StoreError> {
    args.as_array()
        .ok_or_else(|| invalid(op, "expects an array of operands"))
}

fn invalid(op: &str, reason: &str) -> StoreError {
    StoreError::InvalidArgument {
        operator: op.to_string(),
        reason: reason.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn rows(values: Value) -> Vec<Document> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    fn sales_rows() -> Vec<Document> {
        rows(json!([
            {"region": "North", "amount": 100},
            {"region": "South", "amount": 50},
            {"region": "North", "amount": 200},
            {"region": "East", "amount": 75},
            {"region": "South", "amount": 25},
        ]))
    }

    #[test]
    fn test_match_filters_rows() {
        let out = run(
            sales_rows(),
            &[json!({"$match": {"region": "North"}})],
        )
        .unwrap();
        assert_eq!(out.len(), 2);
    }

    #[test]
    fn test_group_by_field_with_accumulators() {
        let out = run(
            sales_rows(),
            &[json!({"$group": {
                "_id": "$region",
                "total": {"$sum": "$amount"},
                "average": {"$avg": "$amount"},
                "low": {"$min": "$amount"},
                "high": {"$max": "$amount"},
                "count": {"$sum": 1},
            }})],
        )
        .unwrap();

        assert_eq!(out.len(), 3);
        // First-seen order: North, South, East.
        assert_eq!(out[0].get("_id"), Some(&json!("North")));
        assert_eq!(out[0].get("total"), Some(&json!(300)));
        assert_eq!(out[0].get("average"), Some(&json!(150)));
        assert_eq!(out[0].get("low"), Some(&json!(100)));
        assert_eq!(out[0].get("high"), Some(&json!(200)));
        assert_eq!(out[0].get("count"), Some(&json!(2)));
        assert_eq!(out[2].get("_id"), Some(&json!("East")));
    }

    #[test]
    fn test_group_with_null_id_collapses_everything() {
        let out = run(
            sales_rows(),
            &[json!({"$group": {
                "_id": null,
                "grand_total": {"$sum": "$amount"},
                "regions": {"$addToSet": "$region"},
            }})],
        )
        .unwrap();

        assert_eq!(out.len(), 1);
        assert_eq!(out[0].get("_id"), Some(&json!(null)));
        assert_eq!(out[0].get("grand_total"), Some(&json!(450)));
        let regions = out[0].get("regions").and_then(Value::as_array).unwrap();
        assert_eq!(regions.len(), 3);
    }

    #[test]
    fn test_group_composite_id_reached_through_project() {
        let out = run(
            rows(json!([
                {"a": "x", "b": 1, "v": 10},
                {"a": "x", "b": 1, "v": 20},
                {"a": "y", "b": 2, "v": 5},
            ])),
            &[
                json!({"$group": {
                    "_id": {"a": "$a", "b": "$b"},
                    "v_sum": {"$sum": "$v"},
                }}),
                json!({"$project": {
                    "_id": 0,
                    "a": "$_id.a",
                    "b": "$_id.b",
                    "v_sum": 1,
                }}),
            ],
        )
        .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("a"), Some(&json!("x")));
        assert_eq!(out[0].get("b"), Some(&json!(1)));
        assert_eq!(out[0].get("v_sum"), Some(&json!(30)));
        assert!(!out[0].contains_key("_id"));
    }

    #[test]
    fn test_sum_ignores_non_numeric_and_avg_of_none_is_null() {
        let out = run(
            rows(json!([
                {"g": 1, "v": 10},
                {"g": 1, "v": "not a number"},
                {"g": 1},
            ])),
            &[json!({"$group": {
                "_id": "$g",
                "total": {"$sum": "$v"},
                "average": {"$avg": "$missing"},
            }})],
        )
        .unwrap();

        assert_eq!(out[0].get("total"), Some(&json!(10)));
        assert_eq!(out[0].get("average"), Some(&json!(null)));
    }

    #[test]
    fn test_project_inclusion_and_computed_fields() {
        let out = run(
            rows(json!([{"_id": "a", "n": 7, "hidden": true}])),
            &[json!({"$project": {
                "n": 1,
                "double": {"$multiply": ["$n", 2]},
                "_id": 0,
            }})],
        )
        .unwrap();

        assert_eq!(out[0].get("n"), Some(&json!(7)));
        assert_eq!(out[0].get("double"), Some(&json!(14)));
        assert!(!out[0].contains_key("_id"));
        assert!(!out[0].contains_key("hidden"));
    }

    #[test]
    fn test_project_exclusion_mode_keeps_the_rest() {
        let out = run(
            rows(json!([{"_id": "a", "n": 7, "hidden": true}])),
            &[json!({"$project": {"hidden": 0}})],
        )
        .unwrap();

        assert_eq!(out[0].get("n"), Some(&json!(7)));
        assert_eq!(out[0].get("_id"), Some(&json!("a")));
        assert!(!out[0].contains_key("hidden"));
    }

    #[test]
    fn test_sort_skip_limit_page_through_rows() {
        let out = run(
            sales_rows(),
            &[
                json!({"$sort": {"amount": -1}}),
                json!({"$skip": 1}),
                json!({"$limit": 2}),
            ],
        )
        .unwrap();

        assert_eq!(out.len(), 2);
        assert_eq!(out[0].get("amount"), Some(&json!(100)));
        assert_eq!(out[1].get("amount"), Some(&json!(75)));
    }

    #[test]
    fn test_consecutive_sorts_compound_via_stability() {
        // Sorting by the tie-break key first, then by the primary key,
        // yields a compound order because the sort is stable.
        let out = run(
            rows(json!([
                {"g": "b", "n": 1},
                {"g": "a", "n": 2},
                {"g": "b", "n": 2},
                {"g": "a", "n": 1},
            ])),
            &[
                json!({"$sort": {"g": 1}}),
                json!({"$sort": {"n": -1}}),
            ],
        )
        .unwrap();

        let pairs: Vec<(String, i64)> = out
            .iter()
            .map(|r| {
                (
                    r.get("g").and_then(Value::as_str).unwrap().to_string(),
                    r.get("n").and_then(Value::as_i64).unwrap(),
                )
            })
            .collect();
        assert_eq!(
            pairs,
            vec![
                ("a".to_string(), 2),
                ("b".to_string(), 2),
                ("a".to_string(), 1),
                ("b".to_string(), 1),
            ]
        );
    }

    #[test]
    fn test_unwind_expands_and_drops_missing() {
        let out = run(
            rows(json!([
                {"id": 1, "tags": ["a", "b"]},
                {"id": 2, "tags": []},
                {"id": 3},
                {"id": 4, "tags": "solo"},
            ])),
            &[json!({"$unwind": "$tags"})],
        )
        .unwrap();

        assert_eq!(out.len(), 3);
        assert_eq!(out[0].get("tags"), Some(&json!("a")));
        assert_eq!(out[1].get("tags"), Some(&json!("b")));
        assert_eq!(out[2].get("tags"), Some(&json!("solo")));
    }

    #[test]
    fn test_facet_runs_sub_pipelines_independently() {
        let out = run(
            sales_rows(),
            &[json!({"$facet": {
                "totals": [
                    {"$group": {"_id": "$region", "total": {"$sum": "$amount"}}},
                    {"$sort": {"total": -1}},
                ],
                "count": [{"$count": "n"}],
            }})],
        )
        .unwrap();

        assert_eq!(out.len(), 1);
        let totals = out[0].get("totals").and_then(Value::as_array).unwrap();
        assert_eq!(totals.len(), 3);
        assert_eq!(totals[0].get("_id"), Some(&json!("North")));
        let count = out[0].get("count").and_then(Value::as_array).unwrap();
        assert_eq!(count[0].get("n"), Some(&json!(5)));
    }

    #[test]
    fn test_sample_bounds() {
        let out = run(sales_rows(), &[json!({"$sample": {"size": 2}})]).unwrap();
        assert_eq!(out.len(), 2);

        let out = run(sales_rows(), &[json!({"$sample": {"size": 50}})]).unwrap();
        assert_eq!(out.len(), 5);
    }

    #[test]
    fn test_divide_by_zero_omits_the_field() {
        let out = run(
            rows(json!([{"n": 10, "d": 0}])),
            &[json!({"$project": {
                "_id": 0,
                "ratio": {"$divide": ["$n", "$d"]},
            }})],
        )
        .unwrap();
        assert!(!out[0].contains_key("ratio"));
    }

    #[test]
    fn test_round_with_precision() {
        let out = run(
            rows(json!([{"v": 33.333333}])),
            &[json!({"$project": {"_id": 0, "r": {"$round": ["$v", 2]}}})],
        )
        .unwrap();
        assert_eq!(out[0].get("r"), Some(&json!(33.33)));
    }

    #[test]
    fn test_hour_and_date_to_string() {
        let out = run(
            rows(json!([{"ts": "2024-03-05T14:45:00Z"}])),
            &[json!({"$project": {
                "_id": 0,
                "hour": {"$hour": "$ts"},
                "day": {"$dateToString": {"format": "%Y-%m-%d", "date": "$ts"}},
            }})],
        )
        .unwrap();
        assert_eq!(out[0].get("hour"), Some(&json!(14)));
        assert_eq!(out[0].get("day"), Some(&json!("2024-03-05")));
    }

    #[test]
    fn test_hour_on_garbage_is_an_error() {
        let err = run(
            rows(json!([{"ts": "yesterday-ish"}])),
            &[json!({"$project": {"hour": {"$hour": "$ts"}}})],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::InvalidArgument { .. }));
    }

    #[test]
    fn test_unsupported_stage_and_expression_fail() {
        let err = run(sales_rows(), &[json!({"$lookup": {}})]).unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedStage { .. }));

        let err = run(
            sales_rows(),
            &[json!({"$group": {"_id": null, "x": {"$stdDevPop": "$amount"}}})],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedExpression { .. }));

        let err = run(
            sales_rows(),
            &[json!({"$project": {"x": {"$dayOfWeek": "$ts"}}})],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::UnsupportedExpression { .. }));
    }

    #[test]
    fn test_stage_must_have_exactly_one_operator() {
        let err = run(
            sales_rows(),
            &[json!({"$match": {}, "$limit": 1})],
        )
        .unwrap_err();
        assert!(matches!(err, StoreError::MalformedStage { .. }));
    }

    #[test]
    fn test_object_literal_expression_builds_nested_value() {
        let out = run(
            rows(json!([{"lo": "2024-01-01", "hi": "2024-02-01"}])),
            &[json!({"$project": {
                "_id": 0,
                "range": {"start": "$lo", "end": "$hi"},
            }})],
        )
        .unwrap();
        assert_eq!(
            out[0].get("range"),
            Some(&json!({"start": "2024-01-01", "end": "2024-02-01"}))
        );
    }
}
