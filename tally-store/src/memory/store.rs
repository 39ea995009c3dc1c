//! Named-collection map

use std::sync::Arc;

use async_trait::async_trait;
use dashmap::DashMap;
use tally_core::{Document, StoreError};

use crate::collection::{DocumentCollection, DocumentStore};
use crate::memory::collection::MemoryCollection;

/// Thread-safe set of named in-memory collections.
///
/// Collections come into existence on first use, the document-store
/// convention both the ingest and analyze endpoints rely on.
#[derive(Default)]
pub struct MemoryStore {
    collections: DashMap<String, Arc<MemoryCollection>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Bulk-load documents, creating the collection if needed.
    pub async fn seed(
        &self,
        collection: &str,
        documents: Vec<Document>,
    ) -> Result<Vec<String>, StoreError> {
        self.collection(collection).insert_many(documents).await
    }
}

#[async_trait]
impl DocumentStore for MemoryStore {
    fn collection(&self, name: &str) -> Arc<dyn DocumentCollection> {
        let handle = self
            .collections
            .entry(name.to_string())
            .or_insert_with(|| Arc::new(MemoryCollection::new(name)))
            .clone();
        handle
    }

    fn collection_names(&self) -> Vec<String> {
        let mut names: Vec<String> = self
            .collections
            .iter()
            .map(|entry| entry.key().clone())
            .collect();
        names.sort();
        names
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::{json, Value};

    fn docs(values: Value) -> Vec<Document> {
        values
            .as_array()
            .unwrap()
            .iter()
            .map(|v| v.as_object().unwrap().clone())
            .collect()
    }

    #[tokio::test]
    async fn test_collection_created_on_first_use_and_shared() {
        let store = MemoryStore::new();
        let first = store.collection("events");
        first
            .insert_many(docs(json!([{"n": 1}])))
            .await
            .unwrap();

        // Second handle sees what the first one wrote.
        let second = store.collection("events");
        assert_eq!(second.count(&Value::Null).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn test_collection_names_are_sorted() {
        let store = MemoryStore::new();
        store.collection("zeta");
        store.collection("alpha");
        store.collection("mid");

        assert_eq!(
            store.collection_names(),
            vec!["alpha".to_string(), "mid".to_string(), "zeta".to_string()]
        );
    }

    #[tokio::test]
    async fn test_seed_loads_documents() {
        let store = MemoryStore::new();
        let ids = store
            .seed("sales", docs(json!([{"amount": 1}, {"amount": 2}])))
            .await
            .unwrap();
        assert_eq!(ids.len(), 2);
        assert_eq!(
            store.collection("sales").count(&Value::Null).await.unwrap(),
            2
        );
    }
}
