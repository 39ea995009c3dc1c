//! Query translation
//!
//! Turns declarative `SearchCriteria` into the store's native query dialect.
//! Translation accumulates in a builder bound to one collection; `build()`
//! takes an immutable snapshot and `execute()` runs it. The builder is the
//! only place request-supplied filters become `$`-operator documents, so all
//! operand validation happens here.

use std::sync::Arc;

use serde::Serialize;
use serde_json::{json, Map, Value};
use tally_core::{
    Document, FilterCondition, FilterOperator, OrGroup, QueryError, SearchCriteria, SortDirection,
    StoreError,
};

use crate::collection::DocumentCollection;

// =============================================================================
// TRANSLATED QUERY
// =============================================================================

/// Immutable snapshot of a translated query.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct TranslatedQuery {
    /// Native filter document (`field -> value | {$op: operand}` plus `$or`)
    pub filter: Map<String, Value>,
    /// Sort keys in priority order, direction 1 or -1
    pub sort: Vec<(String, i64)>,
    /// Page size cap
    pub limit: Option<u32>,
    /// Rows to drop after sorting
    pub skip: u32,
}

// =============================================================================
// TRANSLATOR
// =============================================================================

/// Builder accumulating native query parts over a bound collection.
pub struct QueryTranslator {
    collection: Arc<dyn DocumentCollection>,
    filter: Map<String, Value>,
    sort: Vec<(String, i64)>,
    limit: Option<u32>,
    skip: u32,
}

impl QueryTranslator {
    /// Start an empty translation against one collection.
    pub fn new(collection: Arc<dyn DocumentCollection>) -> Self {
        Self {
            collection,
            filter: Map::new(),
            sort: Vec::new(),
            limit: None,
            skip: 0,
        }
    }

    /// Translate a whole criteria object in one pass.
    pub fn from_criteria(
        collection: Arc<dyn DocumentCollection>,
        criteria: &SearchCriteria,
    ) -> Result<Self, QueryError> {
        criteria.validate()?;
        let mut translator = Self::new(collection);
        for condition in &criteria.filters {
            translator.add_filter(condition)?;
        }
        for group in &criteria.or_groups {
            translator.add_or_group(group)?;
        }
        for key in &criteria.sort {
            translator.set_sort(&key.field, key.direction);
        }
        if let Some(limit) = criteria.limit {
            translator.set_limit(limit);
        }
        if criteria.skip > 0 {
            translator.set_skip(criteria.skip);
        }
        Ok(translator)
    }

    /// Translate one condition and merge it into the filter document.
    ///
    /// Conditions on the same field compose as an implicit AND: a bare
    /// equality value and a later operator merge into `{"$eq": v, "$op": w}`.
    pub fn add_filter(&mut self, condition: &FilterCondition) -> Result<&mut Self, QueryError> {
        let clause = translate_condition(condition)?;
        merge_field_clause(&mut self.filter, &condition.field, clause);
        Ok(self)
    }

    /// Translate an or-group into branches of the top-level `$or` list.
    ///
    /// Repeated calls extend the same list; branches from different groups
    /// are never nested into AND-of-OR.
    pub fn add_or_group(&mut self, group: &OrGroup) -> Result<&mut Self, QueryError> {
        if group.conditions.is_empty() {
            return Err(QueryError::EmptyOrGroup);
        }
        let mut branches = Vec::with_capacity(group.conditions.len());
        for condition in &group.conditions {
            let clause = translate_condition(condition)?;
            let mut branch = Map::new();
            branch.insert(condition.field.clone(), clause);
            branches.push(Value::Object(branch));
        }
        match self.filter.get_mut("$or") {
            Some(Value::Array(existing)) => existing.extend(branches),
            _ => {
                self.filter
                    .insert("$or".to_string(), Value::Array(branches));
            }
        }
        Ok(self)
    }

    /// Append a sort key; earlier keys take precedence.
    pub fn set_sort(&mut self, field: &str, direction: SortDirection) -> &mut Self {
        self.sort.push((field.to_string(), direction.as_int()));
        self
    }

    /// Cap the page size. Last write wins.
    pub fn set_limit(&mut self, limit: u32) -> &mut Self {
        self.limit = Some(limit);
        self
    }

    /// Skip leading rows after sorting. Last write wins.
    pub fn set_skip(&mut self, skip: u32) -> &mut Self {
        self.skip = skip;
        self
    }

    /// Snapshot the accumulated parts.
    pub fn build(&self) -> TranslatedQuery {
        TranslatedQuery {
            filter: self.filter.clone(),
            sort: self.sort.clone(),
            limit: self.limit,
            skip: self.skip,
        }
    }

    /// The filter document alone, for seeding aggregation pipelines.
    pub fn base_filter(&self) -> Value {
        Value::Object(self.filter.clone())
    }

    /// Name of the bound collection.
    pub fn collection_name(&self) -> &str {
        self.collection.name()
    }

    /// Run the snapshot: filter, sort, skip, limit.
    pub async fn execute(&self) -> Result<Vec<Document>, StoreError> {
        let query = self.build();
        tracing::debug!(
            collection = self.collection.name(),
            filter = %serde_json::Value::Object(query.filter.clone()),
            sort_keys = query.sort.len(),
            limit = ?query.limit,
            skip = query.skip,
            "executing translated query"
        );
        self.collection.find(&query).await
    }

    /// Run an aggregation pipeline against the bound collection.
    pub async fn execute_pipeline(&self, stages: &[Value]) -> Result<Vec<Document>, StoreError> {
        tracing::debug!(
            collection = self.collection.name(),
            stages = stages.len(),
            "executing aggregation pipeline"
        );
        self.collection.aggregate(stages).await
    }
}

// =============================================================================
// CONDITION TRANSLATION
// =============================================================================

fn translate_condition(condition: &FilterCondition) -> Result<Value, QueryError> {
    let value = &condition.value;
    match condition.operator {
        FilterOperator::Eq => Ok(value.clone()),
        FilterOperator::Ne => Ok(json!({ "$ne": value })),
        FilterOperator::Gt => Ok(json!({ "$gt": value })),
        FilterOperator::Gte => Ok(json!({ "$gte": value })),
        FilterOperator::Lt => Ok(json!({ "$lt": value })),
        FilterOperator::Lte => Ok(json!({ "$lte": value })),
        // Scalars are accepted and wrapped for the membership operators.
        FilterOperator::In => Ok(json!({ "$in": as_array(value) })),
        FilterOperator::Nin => Ok(json!({ "$nin": as_array(value) })),
        FilterOperator::All => Ok(json!({ "$all": as_array(value) })),
        FilterOperator::Exists => match value {
            Value::Bool(wanted) => Ok(json!({ "$exists": wanted })),
            _ => Err(invalid_operand(condition, "a boolean")),
        },
        FilterOperator::Type => match value {
            Value::String(name) => Ok(json!({ "$type": name })),
            _ => Err(invalid_operand(condition, "a type name string")),
        },
        FilterOperator::Size => match value.as_u64() {
            Some(size) => Ok(json!({ "$size": size })),
            None => Err(invalid_operand(condition, "a non-negative integer")),
        },
        FilterOperator::ElemMatch => match value {
            Value::Object(_) => Ok(json!({ "$elemMatch": value })),
            _ => Err(invalid_operand(condition, "a condition object")),
        },
        FilterOperator::Regex => match value {
            Value::String(pattern) => {
                compile_pattern(&condition.field, pattern, condition.case_insensitive)?;
                Ok(regex_clause(pattern.clone(), condition.case_insensitive))
            }
            _ => Err(invalid_operand(condition, "a pattern string")),
        },
        FilterOperator::Contains => {
            let literal = text_operand(condition)?;
            Ok(regex_clause(
                regex::escape(&literal),
                condition.case_insensitive,
            ))
        }
        FilterOperator::StartsWith => {
            let literal = text_operand(condition)?;
            Ok(regex_clause(
                format!("^{}", regex::escape(&literal)),
                condition.case_insensitive,
            ))
        }
        FilterOperator::EndsWith => {
            let literal = text_operand(condition)?;
            Ok(regex_clause(
                format!("{}$", regex::escape(&literal)),
                condition.case_insensitive,
            ))
        }
    }
}

/// Merge a translated clause into the filter under `field`.
fn merge_field_clause(filter: &mut Map<String, Value>, field: &str, clause: Value) {
    match filter.get_mut(field) {
        Some(Value::Object(existing)) if is_operator_map(existing) => match clause {
            Value::Object(new_ops) if is_operator_map(&new_ops) => {
                for (op, operand) in new_ops {
                    existing.insert(op, operand);
                }
            }
            direct => {
                existing.insert("$eq".to_string(), direct);
            }
        },
        Some(existing) => {
            let previous = existing.take();
            match clause {
                Value::Object(new_ops) if is_operator_map(&new_ops) => {
                    let mut merged = Map::new();
                    merged.insert("$eq".to_string(), previous);
                    for (op, operand) in new_ops {
                        merged.insert(op, operand);
                    }
                    *existing = Value::Object(merged);
                }
                direct => *existing = direct,
            }
        }
        None => {
            filter.insert(field.to_string(), clause);
        }
    }
}

fn is_operator_map(map: &Map<String, Value>) -> bool {
    !map.is_empty() && map.keys().all(|key| key.starts_with('$'))
}

fn as_array(value: &Value) -> Value {
    match value {
        Value::Array(_) => value.clone(),
        other => Value::Array(vec![other.clone()]),
    }
}

fn text_operand(condition: &FilterCondition) -> Result<String, QueryError> {
    match &condition.value {
        Value::String(text) => Ok(text.clone()),
        Value::Number(number) => Ok(number.to_string()),
        _ => Err(invalid_operand(condition, "a string")),
    }
}

fn invalid_operand(condition: &FilterCondition, expected: &str) -> QueryError {
    QueryError::InvalidOperand {
        field: condition.field.clone(),
        operator: condition.operator.as_str().to_string(),
        expected: expected.to_string(),
    }
}

fn regex_clause(pattern: String, case_insensitive: bool) -> Value {
    if case_insensitive {
        json!({ "$regex": pattern, "$options": "i" })
    } else {
        json!({ "$regex": pattern })
    }
}

/// Reject patterns the store could not evaluate later.
fn compile_pattern(field: &str, pattern: &str, case_insensitive: bool) -> Result<(), QueryError> {
    let full = if case_insensitive {
        format!("(?i){pattern}")
    } else {
        pattern.to_string()
    };
    regex::Regex::new(&full)
        .map(|_| ())
        .map_err(|source| QueryError::InvalidPattern {
            field: field.to_string(),
            reason: source.to_string(),
        })
}

// =============================================================================
// TESTS
// =============================================================================
