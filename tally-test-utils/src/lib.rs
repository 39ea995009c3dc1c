//! Tally Test Utilities
//!
//! Centralized test infrastructure for the Tally workspace:
//! - Proptest generators for documents and search criteria
//! - Deterministic fixtures with hand-checked aggregate values
//! - Seeded in-memory stores for integration tests
//! - Custom assertions for Tally-specific validation

use std::sync::Arc;

// Re-export core types for convenience
pub use tally_core::{
    Document, FilterCondition, FilterOperator, OrGroup, SearchCriteria, SortDirection, SortKey,
    TallyError, TallyResult, ID_FIELD,
};
pub use tally_store::{DocumentCollection, DocumentStore, MemoryCollection, MemoryStore};

// ============================================================================
// SEEDED STORES
// ============================================================================

/// Build a store with one seeded collection.
pub async fn store_with(collection: &str, docs: Vec<Document>) -> MemoryStore {
    let store = MemoryStore::new();
    store
        .seed(collection, docs)
        .await
        .expect("seeding an in-memory fixture store cannot fail");
    store
}

/// Build a standalone seeded collection.
pub async fn collection_with(name: &str, docs: Vec<Document>) -> Arc<MemoryCollection> {
    let collection = Arc::new(MemoryCollection::new(name));
    collection
        .insert_many(docs)
        .await
        .expect("seeding an in-memory fixture collection cannot fail");
    collection
}

// ============================================================================
// GENERATORS
// ============================================================================

pub mod generators {
    //! Proptest strategies for documents and queries.

    use proptest::prelude::*;
    use serde_json::{json, Value};
    use tally_core::Document;

    /// One of the four fixture regions.
    pub fn arb_region() -> impl Strategy<Value = &'static str> {
        prop_oneof![
            Just("North"),
            Just("South"),
            Just("East"),
            Just("West"),
        ]
    }

    /// One of the fixture product lines.
    pub fn arb_product() -> impl Strategy<Value = &'static str> {
        prop_oneof![Just("widget"), Just("gadget"), Just("gizmo")]
    }

    /// A monetary amount between 0.01 and 5000.00 with cent precision.
    pub fn arb_amount() -> impl Strategy<Value = f64> {
        (1u32..500_000).prop_map(|cents| f64::from(cents) / 100.0)
    }

    /// A JSON scalar: null, bool, integer, float, or short string.
    pub fn arb_scalar() -> impl Strategy<Value = Value> {
        prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::from),
            (-10_000i64..10_000).prop_map(Value::from),
            (-1000.0f64..1000.0).prop_map(Value::from),
            "[a-z]{0,10}".prop_map(Value::from),
        ]
    }

    /// A flat document with a handful of scalar fields.
    pub fn arb_document() -> impl Strategy<Value = Document> {
        proptest::collection::btree_map("[a-z]{1,6}", arb_scalar(), 1..6).prop_map(|fields| {
            let mut doc = Document::new();
            for (key, value) in fields {
                doc.insert(key, value);
            }
            doc
        })
    }

    /// A sales row in the shape the analytics fixtures use.
    pub fn arb_sales_document() -> impl Strategy<Value = Document> {
        (arb_region(), arb_product(), arb_amount(), 1u32..50).prop_map(
            |(region, product, amount, units)| {
                as_document(json!({
                    "region": region,
                    "product": product,
                    "sales_amount": amount,
                    "units": units,
                }))
            },
        )
    }

    /// An activity event with a timestamp inside March 2024.
    pub fn arb_activity_document() -> impl Strategy<Value = Document> {
        let action = prop_oneof![
            Just("login"),
            Just("view"),
            Just("edit"),
            Just("logout"),
        ];
        (1u32..10, 0u32..24, 0u32..60, 1u32..6, action).prop_map(
            |(day, hour, minute, user, action)| {
                as_document(json!({
                    "user_id": format!("u{user}"),
                    "action_type": action,
                    "timestamp": format!("2024-03-0{day}T{hour:02}:{minute:02}:00Z"),
                }))
            },
        )
    }

    /// A batch of sales rows.
    pub fn arb_sales_batch(max: usize) -> impl Strategy<Value = Vec<Document>> {
        proptest::collection::vec(arb_sales_document(), 1..max)
    }

    /// A batch of activity events.
    pub fn arb_activity_batch(max: usize) -> impl Strategy<Value = Vec<Document>> {
        proptest::collection::vec(arb_activity_document(), 1..max)
    }

    fn as_document(value: Value) -> Document {
        match value {
            Value::Object(map) => map,
            _ => Document::new(),
        }
    }
}

// ============================================================================
// FIXTURES
// ============================================================================

pub mod fixtures {
    //! Deterministic documents with hand-checked aggregate values.

    use serde_json::{json, Value};
    use tally_core::Document;

    fn docs(rows: Vec<Value>) -> Vec<Document> {
        rows.into_iter()
            .filter_map(|row| match row {
                Value::Object(map) => Some(map),
                _ => None,
            })
            .collect()
    }

    /// Ten sales rows over four regions.
    ///
    /// Per-region totals: West 1000.0 (4 rows), North 500.0 (3 rows),
    /// South 300.0 (1 row), East 200.0 (2 rows). Grand total 2000.0, so the
    /// share-of-total percentages are West 50, North 25, South 15, East 10.
    pub fn sales_documents() -> Vec<Document> {
        docs(vec![
            json!({ "region": "North", "product": "widget", "sales_amount": 100.0, "units": 10, "date": "2024-03-01" }),
            json!({ "region": "West", "product": "gadget", "sales_amount": 250.0, "units": 5, "date": "2024-03-01" }),
            json!({ "region": "East", "product": "widget", "sales_amount": 75.25, "units": 3, "date": "2024-03-02" }),
            json!({ "region": "North", "product": "gizmo", "sales_amount": 150.5, "units": 12, "date": "2024-03-02" }),
            json!({ "region": "South", "product": "widget", "sales_amount": 300.0, "units": 20, "date": "2024-03-02" }),
            json!({ "region": "West", "product": "widget", "sales_amount": 500.0, "units": 25, "date": "2024-03-03" }),
            json!({ "region": "East", "product": "gadget", "sales_amount": 124.75, "units": 6, "date": "2024-03-03" }),
            json!({ "region": "West", "product": "gizmo", "sales_amount": 150.0, "units": 9, "date": "2024-03-04" }),
            json!({ "region": "North", "product": "widget", "sales_amount": 249.5, "units": 15, "date": "2024-03-04" }),
            json!({ "region": "West", "product": "gadget", "sales_amount": 100.0, "units": 2, "date": "2024-03-05" }),
        ])
    }

    /// Fourteen activity events over three days and three users.
    ///
    /// Daily shape: 2024-03-01 has 5 actions by 2 users, 2024-03-02 has
    /// 6 actions by 3 users, 2024-03-03 has 3 actions by 2 users. Per-user
    /// action counts: u1 6, u2 5, u3 3. The busiest hour is 09:00 with 6
    /// events.
    pub fn activity_documents() -> Vec<Document> {
        docs(vec![
            json!({ "user_id": "u1", "action_type": "login",  "timestamp": "2024-03-01T08:00:00Z" }),
            json!({ "user_id": "u1", "action_type": "view",   "timestamp": "2024-03-01T09:15:00Z" }),
            json!({ "user_id": "u2", "action_type": "login",  "timestamp": "2024-03-01T09:30:00Z" }),
            json!({ "user_id": "u1", "action_type": "edit",   "timestamp": "2024-03-01T10:00:00Z" }),
            json!({ "user_id": "u2", "action_type": "view",   "timestamp": "2024-03-01T10:30:00Z" }),
            json!({ "user_id": "u3", "action_type": "login",  "timestamp": "2024-03-02T09:00:00Z" }),
            json!({ "user_id": "u3", "action_type": "view",   "timestamp": "2024-03-02T09:45:00Z" }),
            json!({ "user_id": "u1", "action_type": "login",  "timestamp": "2024-03-02T10:05:00Z" }),
            json!({ "user_id": "u3", "action_type": "edit",   "timestamp": "2024-03-02T14:20:00Z" }),
            json!({ "user_id": "u1", "action_type": "view",   "timestamp": "2024-03-02T14:50:00Z" }),
            json!({ "user_id": "u2", "action_type": "login",  "timestamp": "2024-03-02T15:00:00Z" }),
            json!({ "user_id": "u2", "action_type": "view",   "timestamp": "2024-03-03T09:10:00Z" }),
            json!({ "user_id": "u2", "action_type": "edit",   "timestamp": "2024-03-03T09:40:00Z" }),
            json!({ "user_id": "u1", "action_type": "logout", "timestamp": "2024-03-03T17:05:00Z" }),
        ])
    }

    /// A handful of people rows for query and filter tests.
    pub fn people_documents() -> Vec<Document> {
        docs(vec![
            json!({ "name": "ann",  "age": 34, "city": "Lyon",  "active": true }),
            json!({ "name": "bob",  "age": 28, "city": "Oslo",  "active": false }),
            json!({ "name": "cal",  "age": 34, "city": "Lyon",  "active": true }),
            json!({ "name": "dee",  "age": 51, "city": "Kyoto", "active": true }),
            json!({ "name": "eve",  "age": 19, "city": "Oslo",  "active": false }),
        ])
    }
}

// ============================================================================
// CUSTOM ASSERTIONS
// ============================================================================

pub mod assertions {
    //! Assertion helpers for Tally-specific validation.

    use tally_core::{AnalysisError, QueryError, StoreError, TallyError, TallyResult};

    /// Assert that a TallyResult is Ok.
    #[track_caller]
    pub fn assert_ok<T: std::fmt::Debug>(result: &TallyResult<T>) {
        assert!(result.is_ok(), "Expected Ok, got Err: {result:?}");
    }

    /// Assert that a TallyResult is a Query error.
    #[track_caller]
    pub fn assert_query_error<T: std::fmt::Debug>(result: &TallyResult<T>) {
        match result {
            Err(TallyError::Query(_)) => {}
            other => panic!("Expected Query error, got: {other:?}"),
        }
    }

    /// Assert that a TallyResult rejects an operand for the given field.
    #[track_caller]
    pub fn assert_invalid_operand<T: std::fmt::Debug>(result: &TallyResult<T>, field: &str) {
        match result {
            Err(TallyError::Query(QueryError::InvalidOperand { field: f, .. })) => {
                assert_eq!(f, field, "Wrong field in InvalidOperand error");
            }
            other => panic!("Expected InvalidOperand for `{field}`, got: {other:?}"),
        }
    }

    /// Assert that a TallyResult is an Analysis error.
    #[track_caller]
    pub fn assert_analysis_error<T: std::fmt::Debug>(result: &TallyResult<T>) {
        match result {
            Err(TallyError::Analysis(_)) => {}
            other => panic!("Expected Analysis error, got: {other:?}"),
        }
    }

    /// Assert that a TallyResult names a missing column.
    #[track_caller]
    pub fn assert_missing_column<T: std::fmt::Debug>(result: &TallyResult<T>, column: &str) {
        match result {
            Err(TallyError::Analysis(AnalysisError::MissingColumn { column: c, .. })) => {
                assert_eq!(c, column, "Wrong column in MissingColumn error");
            }
            other => panic!("Expected MissingColumn for `{column}`, got: {other:?}"),
        }
    }

    /// Assert that a TallyResult is a Store error.
    #[track_caller]
    pub fn assert_store_error<T: std::fmt::Debug>(result: &TallyResult<T>) {
        match result {
            Err(TallyError::Store(_)) => {}
            other => panic!("Expected Store error, got: {other:?}"),
        }
    }

    /// Assert that a store rejected an operator by name.
    #[track_caller]
    pub fn assert_unsupported_operator<T: std::fmt::Debug>(result: &TallyResult<T>, operator: &str) {
        match result {
            Err(TallyError::Store(StoreError::UnsupportedOperator { operator: o })) => {
                assert_eq!(o, operator, "Wrong operator in UnsupportedOperator error");
            }
            other => panic!("Expected UnsupportedOperator for `{operator}`, got: {other:?}"),
        }
    }

    /// Assert two floats agree to within `tolerance`.
    #[track_caller]
    pub fn assert_close(left: f64, right: f64, tolerance: f64) {
        assert!(
            (left - right).abs() <= tolerance,
            "Expected {left} and {right} to agree within {tolerance}"
        );
    }
}
