//! In-memory collection

use std::sync::RwLock;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tally_core::{lookup_path, Document, StoreError, ID_FIELD};
use uuid::Uuid;

use crate::collection::DocumentCollection;
use crate::memory::filter::{matches_filter, sort_documents};
use crate::memory::pipeline;
use crate::query::TranslatedQuery;

/// One named collection guarded by a readers-writer lock.
///
/// Lock scopes never cross an await point; the async surface exists so
/// callers are already shaped for a networked backend.
pub struct MemoryCollection {
    name: String,
    rows: RwLock<Vec<Document>>,
}

impl MemoryCollection {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            rows: RwLock::new(Vec::new()),
        }
    }

    /// Number of documents currently stored.
    pub fn len(&self) -> usize {
        self.rows.read().map(|rows| rows.len()).unwrap_or(0)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn snapshot(&self) -> Result<Vec<Document>, StoreError> {
        Ok(self
            .rows
            .read()
            .map_err(|_| StoreError::LockPoisoned)?
            .clone())
    }
}

/// Raw filters arrive as JSON: an object, or null for "match everything".
fn as_filter(filter: &Value) -> Result<Map<String, Value>, StoreError> {
    match filter {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        _ => Err(StoreError::MalformedFilter {
            reason: "filter must be an object".to_string(),
        }),
    }
}

#[async_trait]
impl DocumentCollection for MemoryCollection {
    fn name(&self) -> &str {
        &self.name
    }

    async fn find(&self, query: &TranslatedQuery) -> Result<Vec<Document>, StoreError> {
        let mut matched = {
            let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
            let mut matched = Vec::new();
            for row in rows.iter() {
                if matches_filter(row, &query.filter)? {
                    matched.push(row.clone());
                }
            }
            matched
        };
        sort_documents(&mut matched, &query.sort);
        let mut page: Vec<Document> = matched.into_iter().skip(query.skip as usize).collect();
        if let Some(limit) = query.limit {
            page.truncate(limit as usize);
        }
        Ok(page)
    }

    async fn aggregate(&self, stages: &[Value]) -> Result<Vec<Document>, StoreError> {
        pipeline::run(self.snapshot()?, stages)
    }

    async fn insert_many(&self, documents: Vec<Document>) -> Result<Vec<String>, StoreError> {
        let mut rows = self.rows.write().map_err(|_| StoreError::LockPoisoned)?;
        let mut ids = Vec::with_capacity(documents.len());
        for mut document in documents {
            let id = match document.get(ID_FIELD) {
                Some(Value::String(id)) => id.clone(),
                Some(other) => other.to_string(),
                None => Uuid::now_v7().to_string(),
            };
            document.insert(ID_FIELD.to_string(), Value::String(id.clone()));
            ids.push(id);
            rows.push(document);
        }
        Ok(ids)
    }

    async fn count(&self, filter: &Value) -> Result<u64, StoreError> {
        let filter = as_filter(filter)?;
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut total = 0u64;
        for row in rows.iter() {
            if matches_filter(row, &filter)? {
                total += 1;
            }
        }
        Ok(total)
    }

    async fn distinct(&self, field: &str, filter: &Value) -> Result<Vec<Value>, StoreError> {
        let filter = as_filter(filter)?;
        let rows = self.rows.read().map_err(|_| StoreError::LockPoisoned)?;
        let mut seen: Vec<Value> = Vec::new();
        for row in rows.iter() {
            if !matches_filter(row, &filter)? {
                continue;
            }
            match lookup_path(row, field) {
                Some(Value::Array(items)) => {
                    for item in items {
                        if !seen.contains(item) {
                            seen.push(item.clone());
                        }
                    }
                }
                Some(value) => {
                    if !seen.contains(value) {
                        seen.push(value.clone());
                    }
                }
                None => {}
            }
        }
        Ok(seen)
    }

    async fn ping(&self) -> Result<(), StoreError> {
        Ok(())
    }
}

// =============================================================================
// TESTS
// =============================================================================
