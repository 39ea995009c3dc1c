//! Property-Based Tests for Query Execution
//!
//! **Property: Reference-Model Conformance**
//!
//! For any document batch and search criteria, the full path
//! criteria -> translator -> native filter -> in-memory evaluator SHALL
//! return exactly the page a direct model of the criteria returns. The
//! model is written from the criteria alone and never touches the
//! `$`-operator dialect.
//!
//! The generated universe keeps field values to integers and short
//! strings so the model's ordering stays small.

use std::cmp::Ordering;
use std::collections::HashSet;
use std::sync::Arc;

use proptest::prelude::*;
use serde_json::{json, Value};
use tally_core::{
    Document, FilterCondition, FilterOperator, OrGroup, SearchCriteria, SortDirection, SortKey,
    ID_FIELD,
};
use tally_store::{DocumentCollection, MemoryCollection, QueryTranslator};

// ============================================================================
// GENERATORS
// ============================================================================

fn arb_kind() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("alpha"), Just("beta"), Just("gamma")]
}

fn arb_label() -> impl Strategy<Value = &'static str> {
    prop_oneof![Just("red"), Just("green"), Just("blue"), Just("grey")]
}

/// A flat row: `kind`, `n`, `label` always present, `m` sometimes missing.
fn arb_row() -> impl Strategy<Value = Document> {
    (
        arb_kind(),
        0i64..10,
        proptest::option::of(0i64..6),
        arb_label(),
    )
        .prop_map(|(kind, n, m, label)| {
            let mut doc = Document::new();
            doc.insert("kind".to_string(), json!(kind));
            doc.insert("n".to_string(), json!(n));
            if let Some(m) = m {
                doc.insert("m".to_string(), json!(m));
            }
            doc.insert("label".to_string(), json!(label));
            doc
        })
}

fn arb_condition() -> impl Strategy<Value = FilterCondition> {
    prop_oneof![
        arb_kind().prop_map(|kind| FilterCondition::eq("kind", json!(kind))),
        arb_label().prop_map(|label| {
            FilterCondition::new("label", FilterOperator::Ne, json!(label))
        }),
        (0i64..10).prop_map(|n| FilterCondition::new("n", FilterOperator::Gt, json!(n))),
        (0i64..10).prop_map(|n| FilterCondition::new("n", FilterOperator::Gte, json!(n))),
        (0i64..10).prop_map(|n| FilterCondition::new("n", FilterOperator::Lt, json!(n))),
        (0i64..10).prop_map(|n| FilterCondition::new("n", FilterOperator::Lte, json!(n))),
        (0i64..6).prop_map(|m| FilterCondition::new("m", FilterOperator::Ne, json!(m))),
        (0i64..6).prop_map(|m| FilterCondition::new("m", FilterOperator::Gt, json!(m))),
        any::<bool>().prop_map(|wanted| {
            FilterCondition::new("m", FilterOperator::Exists, json!(wanted))
        }),
        prop_oneof![
            Just(json!(["alpha"])),
            Just(json!(["alpha", "beta"])),
            Just(json!(["beta", "gamma"])),
        ]
        .prop_map(|list| FilterCondition::new("kind", FilterOperator::In, list)),
        prop_oneof![Just(json!(["red"])), Just(json!(["green", "blue"]))]
            .prop_map(|list| FilterCondition::new("label", FilterOperator::Nin, list)),
    ]
}

fn arb_sort_key() -> impl Strategy<Value = SortKey> {
    let field = prop_oneof![Just("n"), Just("m"), Just("kind"), Just("label")];
    (field, any::<bool>()).prop_map(|(field, ascending)| {
        if ascending {
            SortKey::asc(field)
        } else {
            SortKey::desc(field)
        }
    })
}

/// Drop repeated (field, operator) pairs: the translator overwrites them,
/// so the model is only a plain conjunction over distinct pairs.
fn distinct_conditions(conditions: Vec<FilterCondition>) -> Vec<FilterCondition> {
    let mut seen = HashSet::new();
    conditions
        .into_iter()
        .filter(|condition| seen.insert((condition.field.clone(), condition.operator)))
        .collect()
}

fn arb_criteria() -> impl Strategy<Value = SearchCriteria> {
    (
        proptest::collection::vec(arb_condition(), 0..4),
        proptest::collection::vec(proptest::collection::vec(arb_condition(), 1..3), 0..3),
        proptest::collection::vec(arb_sort_key(), 0..3),
        0u32..6,
        proptest::option::of(1u32..9),
    )
        .prop_map(|(filters, groups, sort, skip, limit)| SearchCriteria {
            filters: distinct_conditions(filters),
            or_groups: groups.into_iter().map(OrGroup::new).collect(),
            sort,
            limit,
            skip,
        })
}

/// Fixed ids keep stored rows byte-identical to the model's input.
fn with_row_ids(docs: Vec<Document>) -> Vec<Document> {
    docs.into_iter()
        .enumerate()
        .map(|(index, mut doc)| {
            doc.insert(ID_FIELD.to_string(), json!(format!("row-{index:03}")));
            doc
        })
        .collect()
}

// ============================================================================
// REFERENCE MODEL
// ============================================================================

fn equals(found: Option<&Value>, probe: &Value) -> bool {
    found == Some(probe)
}

/// Range order over the generated universe: integers and strings only.
fn range_ordering(found: Option<&Value>, operand: &Value) -> Option<Ordering> {
    match (found?, operand) {
        (Value::Number(found), Value::Number(operand)) => {
            found.as_i64()?.partial_cmp(&operand.as_i64()?)
        }
        (Value::String(found), Value::String(operand)) => Some(found.cmp(operand)),
        _ => None,
    }
}

fn condition_holds(doc: &Document, condition: &FilterCondition) -> bool {
    let found = doc.get(condition.field.as_str());
    let value = &condition.value;
    match condition.operator {
        FilterOperator::Eq => equals(found, value),
        FilterOperator::Ne => !equals(found, value),
        FilterOperator::Gt => range_ordering(found, value) == Some(Ordering::Greater),
        FilterOperator::Gte => matches!(
            range_ordering(found, value),
            Some(Ordering::Greater) | Some(Ordering::Equal)
        ),
        FilterOperator::Lt => range_ordering(found, value) == Some(Ordering::Less),
        FilterOperator::Lte => matches!(
            range_ordering(found, value),
            Some(Ordering::Less) | Some(Ordering::Equal)
        ),
        FilterOperator::In => value
            .as_array()
            .is_some_and(|list| list.iter().any(|candidate| equals(found, candidate))),
        FilterOperator::Nin => !value
            .as_array()
            .is_some_and(|list| list.iter().any(|candidate| equals(found, candidate))),
        FilterOperator::Exists => value
            .as_bool()
            .is_some_and(|wanted| found.is_some() == wanted),
        other => unreachable!("generator never emits {other:?}"),
    }
}

fn model_compare(a: Option<&Value>, b: Option<&Value>) -> Ordering {
    fn rank(value: &Value) -> u8 {
        match value {
            Value::Number(_) => 1,
            Value::String(_) => 2,
            _ => 3,
        }
    }
    match (a, b) {
        (None, None) => Ordering::Equal,
        (None, Some(_)) => Ordering::Less,
        (Some(_), None) => Ordering::Greater,
        (Some(x), Some(y)) => {
            let ranks = rank(x).cmp(&rank(y));
            if ranks != Ordering::Equal {
                return ranks;
            }
            match (x, y) {
                (Value::Number(x), Value::Number(y)) => {
                    x.as_i64().unwrap_or(0).cmp(&y.as_i64().unwrap_or(0))
                }
                (Value::String(x), Value::String(y)) => x.cmp(y),
                _ => Ordering::Equal,
            }
        }
    }
}

/// Direct reading of the criteria: every filter holds, and when any
/// or-group was given at least one branch of the combined list holds.
fn reference_find(docs: &[Document], criteria: &SearchCriteria) -> Vec<Document> {
    let or_branches: Vec<&FilterCondition> = criteria
        .or_groups
        .iter()
        .flat_map(|group| group.conditions.iter())
        .collect();
    let mut matched: Vec<Document> = docs
        .iter()
        .filter(|doc| {
            criteria
                .filters
                .iter()
                .all(|condition| condition_holds(doc, condition))
                && (or_branches.is_empty()
                    || or_branches
                        .iter()
                        .any(|condition| condition_holds(doc, condition)))
        })
        .cloned()
        .collect();
    if !criteria.sort.is_empty() {
        matched.sort_by(|a, b| {
            for key in &criteria.sort {
                let mut ord = model_compare(a.get(key.field.as_str()), b.get(key.field.as_str()));
                if key.direction == SortDirection::Desc {
                    ord = ord.reverse();
                }
                if ord != Ordering::Equal {
                    return ord;
                }
            }
            Ordering::Equal
        });
    }
    let page = matched.into_iter().skip(criteria.skip as usize);
    match criteria.limit {
        Some(limit) => page.take(limit as usize).collect(),
        None => page.collect(),
    }
}

// ============================================================================
// PROPERTIES
// ============================================================================

proptest! {
    #![proptest_config(ProptestConfig::with_cases(48))]

    #[test]
    fn prop_execute_matches_reference_model(
        docs in proptest::collection::vec(arb_row(), 0..30),
        criteria in arb_criteria(),
    ) {
        let docs = with_row_ids(docs);
        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let got = runtime.block_on(async {
            let collection = Arc::new(MemoryCollection::new("rows"));
            collection.insert_many(docs.clone()).await.unwrap();
            let translator = QueryTranslator::from_criteria(collection, &criteria).unwrap();
            translator.execute().await.unwrap()
        });
        prop_assert_eq!(got, reference_find(&docs, &criteria));
    }

    #[test]
    fn prop_count_matches_reference_model(
        docs in proptest::collection::vec(arb_row(), 0..30),
        conditions in proptest::collection::vec(arb_condition(), 0..3),
    ) {
        let conditions = distinct_conditions(conditions);
        let expected = docs
            .iter()
            .filter(|doc| conditions.iter().all(|condition| condition_holds(doc, condition)))
            .count() as u64;

        let runtime = tokio::runtime::Builder::new_current_thread().build().unwrap();
        let got = runtime.block_on(async {
            let collection = Arc::new(MemoryCollection::new("rows"));
            collection.insert_many(docs.clone()).await.unwrap();
            let mut translator = QueryTranslator::new(collection.clone());
            for condition in &conditions {
                translator.add_filter(condition).unwrap();
            }
            collection.count(&translator.base_filter()).await.unwrap()
        });
        prop_assert_eq!(got, expected);
    }
}

// ============================================================================
// END-TO-END ANCHOR
// ============================================================================

/// One hand-checked page through the whole path: range filter, two
/// or-groups flattened into one branch list, descending sort, skip, limit.
#[tokio::test]
async fn test_filtered_sorted_page_end_to_end() {
    let rows = vec![
        json!({"kind": "alpha", "n": 5, "label": "red"}),
        json!({"kind": "beta", "n": 2, "label": "blue"}),
        json!({"kind": "alpha", "n": 2, "label": "grey"}),
        json!({"kind": "gamma", "n": 7, "label": "red"}),
        json!({"kind": "beta", "n": 9, "label": "red"}),
        json!({"kind": "alpha", "n": 0, "label": "blue"}),
    ];
    let docs = with_row_ids(
        rows.into_iter()
            .map(|row| row.as_object().cloned().unwrap_or_default())
            .collect(),
    );

    let collection = Arc::new(MemoryCollection::new("rows"));
    collection.insert_many(docs).await.unwrap();

    let criteria = SearchCriteria {
        filters: vec![FilterCondition::new("n", FilterOperator::Gte, json!(2))],
        or_groups: vec![
            OrGroup::new(vec![FilterCondition::eq("kind", json!("alpha"))]),
            OrGroup::new(vec![FilterCondition::eq("label", json!("red"))]),
        ],
        sort: vec![SortKey::desc("n")],
        limit: Some(2),
        skip: 1,
    };
    let translator = QueryTranslator::from_criteria(collection, &criteria).unwrap();

    // n >= 2 and (alpha or red) leaves rows 0, 2, 3, 4; by n descending
    // that is 4, 3, 0, 2; skip one and take two.
    let page = translator.execute().await.unwrap();
    let ids: Vec<Value> = page
        .iter()
        .filter_map(|doc| doc.get(ID_FIELD).cloned())
        .collect();
    assert_eq!(ids, vec![json!("row-003"), json!("row-000")]);
}

/// Skip 2, limit 3 over ten sorted rows is exactly rows 3 through 5.
#[tokio::test]
async fn test_pagination_window_over_ten_rows() {
    let docs: Vec<Document> = (1..=10)
        .map(|n| {
            let mut doc = Document::new();
            doc.insert("n".to_string(), json!(n));
            doc
        })
        .collect();

    let collection = Arc::new(MemoryCollection::new("rows"));
    collection.insert_many(docs).await.unwrap();

    let criteria = SearchCriteria {
        sort: vec![SortKey::asc("n")],
        limit: Some(3),
        skip: 2,
        ..Default::default()
    };
    let translator = QueryTranslator::from_criteria(collection, &criteria).unwrap();

    let page = translator.execute().await.unwrap();
    let ns: Vec<Value> = page.iter().filter_map(|doc| doc.get("n").cloned()).collect();
    assert_eq!(ns, vec![json!(3), json!(4), json!(5)]);
}
