//! Store boundary traits
//!
//! Every consumer receives these handles already constructed. Nothing in the
//! workspace reaches for a global store; swapping the backend for a test
//! double is a constructor argument.

use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tally_core::{Document, StoreError};

use crate::query::TranslatedQuery;

/// A named collection of schemaless documents.
#[async_trait]
pub trait DocumentCollection: Send + Sync {
    /// Collection name as addressed by the API.
    fn name(&self) -> &str;

    /// Run a translated query: filter, then sort, then skip, then limit.
    async fn find(&self, query: &TranslatedQuery) -> Result<Vec<Document>, StoreError>;

    /// Run an aggregation pipeline over the collection.
    async fn aggregate(&self, stages: &[Value]) -> Result<Vec<Document>, StoreError>;

    /// Insert documents, assigning ids where absent. Returns the ids.
    async fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<String>, StoreError>;

    /// Count documents matching a raw filter document.
    async fn count(&self, filter: &Value) -> Result<u64, StoreError>;

    /// Distinct values of a field across documents matching the filter.
    async fn distinct(&self, field: &str, filter: &Value) -> Result<Vec<Value>, StoreError>;

    /// Liveness probe against the backing store.
    async fn ping(&self) -> Result<(), StoreError>;
}

/// A store holding named collections.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Get a collection handle, creating the collection on first use.
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection>;

    /// Names of all collections present, sorted.
    fn collection_names(&self) -> Vec<String>;

    /// Liveness probe against the backing store.
    async fn ping(&self) -> Result<(), StoreError>;
}
