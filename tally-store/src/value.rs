//! Total ordering and equality over JSON values
//!
//! Sorting schemaless documents needs a total order across types:
//! missing < null < numbers < strings < objects < arrays < booleans, with
//! same-type values compared naturally. Objects compare equal to each other
//! and rely on stable sort to keep their input order.

use std::cmp::Ordering;

use serde_json::Value;

fn type_rank(value: &Value) -> u8 {
    match value {
        Value::Null => 0,
        Value::Number(_) => 1,
        Value::String(_) => 2,
        Value::Object(_) => 3,
        Value::Array(_) => 4,
        Value::Bool(_) => 5,
    }
}

/// Compare two optional values; a missing field sorts below everything.
pub fn compare_values(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => compare_present(x, y),
    }
}

fn compare_present(x: &Value, y: &Value) -> Ordering {
    let rank_x = type_rank(x);
    let rank_y = type_rank(y);
    if rank_x != rank_y {
        return rank_x.cmp(&rank_y);
    }
    match (x, y) {
        (Value::Number(m), Value::Number(n)) => {
            let m = m.as_f64().unwrap_or(0.0);
            let n = n.as_f64().unwrap_or(0.0);
            m.partial_cmp(&n).unwrap_or(Ordering::Equal)
        }
        (Value::String(s), Value::String(t)) => s.cmp(t),
        (Value::Bool(p), Value::Bool(q)) => p.cmp(q),
        (Value::Array(v), Value::Array(w)) => {
            for (a, b) in v.iter().zip(w.iter()) {
                let ord = compare_present(a, b);
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            v.len().cmp(&w.len())
        }
        _ => Ordering::Equal,
    }
}

/// Equality the way the filter evaluator sees it: a stored array also
/// matches when any of its elements equals the probe value.
pub fn values_equal(found: Option<&Value>, probe: &Value) -> bool {
    match found {
        Some(value) if value == probe => true,
        Some(Value::Array(items)) => items.iter().any(|item| item == probe),
        _ => false,
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
    fn test_type_ranks_order_mixed_values() {
        let null = json!(null);
        let number = json!(3);
        let text = json!("a");
        let object = json!({"k": 1});
        let array = json!([1]);
        let boolean = json!(false);

        assert_eq!(
            compare_values(Some(&null), Some(&number)),
            Ordering::Less
        );
        assert_eq!(compare_values(Some(&number), Some(&text)), Ordering::Less);
        assert_eq!(compare_values(Some(&text), Some(&object)), Ordering::Less);
        assert_eq!(compare_values(Some(&object), Some(&array)), Ordering::Less);
        assert_eq!(
            compare_values(Some(&array), Some(&boolean)),
            Ordering::Less
        );
    }

    #[test]
    fn test_missing_sorts_below_null() {
        let null = json!(null);
        assert_eq!(compare_values(None, Some(&null)), Ordering::Less);
        assert_eq!(compare_values(Some(&null), None), Ordering::Greater);
        assert_eq!(compare_values(None, None), Ordering::Equal);
    }

    #[test]
    fn test_numbers_compare_across_int_and_float() {
        let int = json!(2);
        let float = json!(2.5);
        assert_eq!(compare_values(Some(&int), Some(&float)), Ordering::Less);

        let same_int = json!(3);
        let same_float = json!(3.0);
        assert_eq!(
            compare_values(Some(&same_int), Some(&same_float)),
            Ordering::Equal
        );
    }

    #[test]
    fn test_arrays_compare_elementwise_then_by_length() {
        let short = json!([1, 2]);
        let long = json!([1, 2, 3]);
        let bigger = json!([1, 9]);
        assert_eq!(compare_values(Some(&short), Some(&long)), Ordering::Less);
        assert_eq!(
            compare_values(Some(&bigger), Some(&long)),
            Ordering::Greater
        );
    }

    #[test]
    fn test_values_equal_matches_array_membership() {
        let tags = json!(["red", "blue"]);
        assert!(values_equal(Some(&tags), &json!("red")));
        assert!(!values_equal(Some(&tags), &json!("green")));
        assert!(values_equal(Some(&tags), &json!(["red", "blue"])));
        assert!(!values_equal(None, &json!("red")));
    }
}
