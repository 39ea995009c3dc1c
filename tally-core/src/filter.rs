//! Declarative filter expressions
//!
//! The filter model accepted on the wire: a flat list of field conditions
//! (implicitly AND-ed) plus optional or-groups. Translation into the native
//! store dialect lives in `tally-store`; this module only defines the shapes.

use serde::{Deserialize, Serialize};

/// Filter operator for field comparisons.
///
/// The set is closed: an unknown operator string fails request decoding
/// instead of being silently dropped.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Equal to
    Eq,
    /// Not equal to
    Ne,
    /// Greater than
    Gt,
    /// Greater than or equal
    Gte,
    /// Less than
    Lt,
    /// Less than or equal
    Lte,
    /// In list of values
    In,
    /// Not in list of values
    Nin,
    /// Field presence check (operand is a boolean)
    Exists,
    /// Native type check (operand is the store's type name)
    Type,
    /// Matches regular expression
    Regex,
    /// Contains substring (for strings)
    Contains,
    /// Starts with prefix (for strings)
    StartsWith,
    /// Ends with suffix (for strings)
    EndsWith,
    /// Array contains all listed values
    All,
    /// Array has exactly N elements
    Size,
    /// At least one array element matches a nested condition document
    ElemMatch,
}

impl FilterOperator {
    /// Wire name of the operator, as accepted in requests.
    pub fn as_str(&self) -> &'static str {
        match self {
            FilterOperator::Eq => "eq",
            FilterOperator::Ne => "ne",
            FilterOperator::Gt => "gt",
            FilterOperator::Gte => "gte",
            FilterOperator::Lt => "lt",
            FilterOperator::Lte => "lte",
            FilterOperator::In => "in",
            FilterOperator::Nin => "nin",
            FilterOperator::Exists => "exists",
            FilterOperator::Type => "type",
            FilterOperator::Regex => "regex",
            FilterOperator::Contains => "contains",
            FilterOperator::StartsWith => "starts_with",
            FilterOperator::EndsWith => "ends_with",
            FilterOperator::All => "all",
            FilterOperator::Size => "size",
            FilterOperator::ElemMatch => "elem_match",
        }
    }
}

/// A single field condition.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FilterCondition {
    /// Field to filter on (dotted paths reach into nested documents)
    pub field: String,
    /// Operator to apply
    pub operator: FilterOperator,
    /// Value to compare against (JSON value for flexibility)
    pub value: serde_json::Value,
    /// Case-insensitive matching for the text operators
    #[serde(default)]
    pub case_insensitive: bool,
}

impl FilterCondition {
    /// Create a new filter condition.
    pub fn new(
        field: impl Into<String>,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Self {
        Self {
            field: field.into(),
            operator,
            value,
            case_insensitive: false,
        }
    }

    /// Create an equality condition.
    pub fn eq(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, FilterOperator::Eq, value)
    }

    /// Create a contains condition.
    pub fn contains(field: impl Into<String>, value: serde_json::Value) -> Self {
        Self::new(field, FilterOperator::Contains, value)
    }

    /// Toggle case-insensitive matching.
    pub fn case_insensitive(mut self) -> Self {
        self.case_insensitive = true;
        self
    }
}

/// A group of conditions of which at least one must hold.
///
/// Serialized as a bare list of conditions. Multiple groups on one request
/// are flattened into a single top-level disjunction by the translator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OrGroup {
    pub conditions: Vec<FilterCondition>,
}

impl OrGroup {
    pub fn new(conditions: Vec<FilterCondition>) -> Self {
        Self { conditions }
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_operator_wire_names() {
        assert_eq!(
            serde_json::to_value(FilterOperator::Eq).unwrap(),
            json!("eq")
        );
        assert_eq!(
            serde_json::to_value(FilterOperator::Type).unwrap(),
            json!("type")
        );
        assert_eq!(
            serde_json::to_value(FilterOperator::StartsWith).unwrap(),
            json!("starts_with")
        );
        assert_eq!(
            serde_json::to_value(FilterOperator::ElemMatch).unwrap(),
            json!("elem_match")
        );
    }

    #[test]
    fn test_unknown_operator_rejected_at_decode() {
        let result: Result<FilterOperator, _> = serde_json::from_value(json!("approximately"));
        assert!(result.is_err());
        let msg = result.unwrap_err().to_string();
        assert!(msg.contains("approximately"));
    }

    #[test]
    fn test_condition_decode_defaults_case_sensitivity() {
        let cond: FilterCondition = serde_json::from_value(json!({
            "field": "region",
            "operator": "eq",
            "value": "North"
        }))
        .unwrap();
        assert_eq!(cond.field, "region");
        assert_eq!(cond.operator, FilterOperator::Eq);
        assert!(!cond.case_insensitive);
    }

    #[test]
    fn test_or_group_serializes_transparent() {
        let group = OrGroup::new(vec![
            FilterCondition::eq("status", json!("active")),
            FilterCondition::eq("status", json!("pending")),
        ]);
        let value = serde_json::to_value(&group).unwrap();
        assert!(value.is_array());
        assert_eq!(value.as_array().unwrap().len(), 2);
    }

    #[test]
    fn test_as_str_matches_wire_encoding() {
        for op in [
            FilterOperator::Eq,
            FilterOperator::Nin,
            FilterOperator::Exists,
            FilterOperator::Contains,
            FilterOperator::EndsWith,
            FilterOperator::Size,
            FilterOperator::ElemMatch,
        ] {
            let wire = serde_json::to_value(op).unwrap();
            assert_eq!(wire, serde_json::Value::String(op.as_str().to_string()));
        }
    }
}
