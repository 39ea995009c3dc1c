//! Collection Routes
//!
//! Ingest and inspection endpoints for named collections: bulk document
//! insert, collection listing, filtered counts, and distinct values.

use std::sync::Arc;

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use once_cell::sync::Lazy;
use regex::Regex;
use serde::Deserialize;
use serde_json::{json, Value};
use tally_core::Document;
use tally_store::DocumentCollection;

use crate::error::{ApiError, ApiResult, ErrorCode};
use crate::state::AppState;

// ============================================================================
// COLLECTION NAMES
// ============================================================================

/// Collection names travel in URL segments; keep them word-like.
static COLLECTION_NAME: Lazy<Result<Regex, regex::Error>> =
    Lazy::new(|| Regex::new(r"^[A-Za-z_][A-Za-z0-9_.-]{0,127}$"));

fn validate_collection_name(name: &str) -> ApiResult<()> {
    match COLLECTION_NAME.as_ref() {
        Ok(pattern) if pattern.is_match(name) => Ok(()),
        Ok(_) => Err(ApiError::invalid_format(
            "collection",
            "a letter or underscore followed by letters, digits, '_', '.' or '-'",
        )),
        Err(_) => Err(ApiError::from_code(ErrorCode::InternalError)),
    }
}

/// Look a collection up without creating it. GETs must not create
/// collections as a side effect.
fn existing_collection(state: &AppState, name: &str) -> Option<Arc<dyn DocumentCollection>> {
    if state.store.collection_names().iter().any(|n| n == name) {
        Some(state.store.collection(name))
    } else {
        None
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/collections/:name/documents
///
/// Bulk-insert a JSON array of documents. Ids are assigned where absent
/// and echoed back in insertion order.
async fn ingest_documents(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Json(body): Json<Value>,
) -> ApiResult<impl IntoResponse> {
    validate_collection_name(&name)?;

    let Value::Array(rows) = body else {
        return Err(ApiError::invalid_input(
            "Request body must be a JSON array of documents",
        ));
    };
    let mut documents: Vec<Document> = Vec::with_capacity(rows.len());
    for (index, row) in rows.into_iter().enumerate() {
        match row {
            Value::Object(map) => documents.push(map),
            other => {
                return Err(ApiError::invalid_input(format!(
                    "Document at index {} must be a JSON object, got {}",
                    index,
                    type_name(&other)
                )));
            }
        }
    }

    let ids = state.store.collection(&name).insert_many(documents).await?;
    tracing::info!(collection = %name, inserted = ids.len(), "documents ingested");

    Ok((
        StatusCode::CREATED,
        Json(json!({
            "collection": name,
            "inserted": ids.len(),
            "ids": ids,
        })),
    ))
}

/// GET /api/v1/collections - every collection with its document count
async fn list_collections(State(state): State<AppState>) -> ApiResult<impl IntoResponse> {
    let names = state.store.collection_names();
    let mut collections = Vec::with_capacity(names.len());
    for name in names {
        let count = state.store.collection(&name).count(&Value::Null).await?;
        collections.push(json!({ "name": name, "documents": count }));
    }
    Ok(Json(json!({
        "count": collections.len(),
        "collections": collections,
    })))
}

#[derive(Debug, Deserialize)]
struct CountParams {
    field: Option<String>,
    value: Option<String>,
}

/// GET /api/v1/collections/:name/count
///
/// Document count, optionally narrowed by one `field`/`value` equality
/// pair. Counting a collection that was never written returns zero.
async fn count_documents(
    State(state): State<AppState>,
    Path(name): Path<String>,
    Query(params): Query<CountParams>,
) -> ApiResult<impl IntoResponse> {
    let filter = match (&params.field, &params.value) {
        (Some(field), Some(value)) => {
            let mut filter = serde_json::Map::new();
            filter.insert(field.clone(), coerce_query_value(value));
            Value::Object(filter)
        }
        (Some(_), None) => return Err(ApiError::missing_field("value")),
        (None, Some(_)) => return Err(ApiError::missing_field("field")),
        (None, None) => Value::Null,
    };

    let count = match existing_collection(&state, &name) {
        Some(collection) => collection.count(&filter).await?,
        None => 0,
    };
    Ok(Json(json!({ "collection": name, "count": count })))
}

/// GET /api/v1/collections/:name/distinct/:field
async fn distinct_values(
    State(state): State<AppState>,
    Path((name, field)): Path<(String, String)>,
) -> ApiResult<impl IntoResponse> {
    let values = match existing_collection(&state, &name) {
        Some(collection) => collection.distinct(&field, &Value::Null).await?,
        None => Vec::new(),
    };
    Ok(Json(json!({
        "collection": name,
        "field": field,
        "count": values.len(),
        "values": values,
    })))
}

/// Query-string values arrive as strings; read numbers and booleans as
/// their JSON types so equality filters match typed fields.
fn coerce_query_value(raw: &str) -> Value {
    serde_json::from_str(raw).unwrap_or_else(|_| Value::String(raw.to_string()))
}

fn type_name(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the collections router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/", get(list_collections))
        .route("/:name/documents", post(ingest_documents))
        .route("/:name/count", get(count_documents))
        .route("/:name/distinct/:field", get(distinct_values))
}

// =============================================================================
// TESTS
// =============================================================================
