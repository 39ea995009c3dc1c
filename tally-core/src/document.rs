//! Document type and field path lookup

use serde_json::Value;

/// A store document, backed by `serde_json`'s object map.
pub type Document = serde_json::Map<String, Value>;

/// Reserved identifier field. The store assigns it on insert when absent
/// and always exposes it as a plain string.
pub const ID_FIELD: &str = "_id";

/// Resolve a dotted field path against a document.
///
/// Path segments index into nested objects; a numeric segment indexes into
/// an array. Missing segments resolve to `None`, never to an error.
pub fn lookup_path<'a>(doc: &'a Document, path: &str) -> Option<&'a Value> {
    let mut segments = path.split('.');
    let first = segments.next()?;
    let mut current = doc.get(first)?;
    for segment in segments {
        current = lookup_segment(current, segment)?;
    }
    Some(current)
}

/// Resolve a dotted field path against an arbitrary JSON value.
pub fn lookup_value<'a>(value: &'a Value, path: &str) -> Option<&'a Value> {
    let mut current = value;
    for segment in path.split('.') {
        current = lookup_segment(current, segment)?;
    }
    Some(current)
}

fn lookup_segment<'a>(value: &'a Value, segment: &str) -> Option<&'a Value> {
    match value {
        Value::Object(map) => map.get(segment),
        Value::Array(items) => segment.parse::<usize>().ok().and_then(|i| items.get(i)),
        _ => None,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn doc(value: Value) -> Document {
        value.as_object().cloned().unwrap_or_default()
    }

    #[test]
    fn test_lookup_top_level_field() {
        let d = doc(json!({ "region": "North", "sales_amount": 120.5 }));
        assert_eq!(lookup_path(&d, "region"), Some(&json!("North")));
        assert_eq!(lookup_path(&d, "missing"), None);
    }

    #[test]
    fn test_lookup_nested_path() {
        let d = doc(json!({ "user": { "address": { "city": "Lyon" } } }));
        assert_eq!(lookup_path(&d, "user.address.city"), Some(&json!("Lyon")));
        assert_eq!(lookup_path(&d, "user.address.zip"), None);
        assert_eq!(lookup_path(&d, "user.name.first"), None);
    }

    #[test]
    fn test_lookup_array_index() {
        let d = doc(json!({ "tags": ["a", "b", "c"] }));
        assert_eq!(lookup_path(&d, "tags.1"), Some(&json!("b")));
        assert_eq!(lookup_path(&d, "tags.9"), None);
        assert_eq!(lookup_path(&d, "tags.x"), None);
    }

    #[test]
    fn test_lookup_through_scalar_fails() {
        let d = doc(json!({ "count": 3 }));
        assert_eq!(lookup_path(&d, "count.inner"), None);
    }
}

#[cfg(test)]
mod prop_tests {
    use super::*;
    use proptest::prelude::*;
    use serde_json::json;

    proptest! {
        /// Building a nested object along any segment chain and resolving
        /// the joined path SHALL return the leaf that was inserted.
        #[test]
        fn prop_lookup_resolves_constructed_spine(
            segments in proptest::collection::vec("[a-z]{1,8}", 1..5),
            leaf in any::<i64>(),
        ) {
            let mut value = json!(leaf);
            for segment in segments.iter().rev() {
                value = json!({ segment.clone(): value });
            }
            let doc = value.as_object().cloned().unwrap();
            let path = segments.join(".");
            prop_assert_eq!(lookup_path(&doc, &path), Some(&json!(leaf)));
        }
    }
}
