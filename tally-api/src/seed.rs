//! Startup Seeding
//!
//! `TALLY_SEED_FILE` names a JSON object mapping collection names to
//! arrays of documents. The whole file is loaded into the store before
//! the server accepts traffic.

use std::path::Path;

use serde_json::Value;
use tally_core::Document;
use tally_store::MemoryStore;

use crate::error::{ApiError, ApiResult};

/// Parse seed JSON into named document batches.
pub fn parse_seed(raw: &str) -> ApiResult<Vec<(String, Vec<Document>)>> {
    let parsed: Value = serde_json::from_str(raw)?;
    let Value::Object(collections) = parsed else {
        return Err(ApiError::invalid_input(
            "Seed file must be a JSON object mapping collection names to arrays",
        ));
    };

    let mut batches = Vec::with_capacity(collections.len());
    for (name, rows) in collections {
        let Value::Array(rows) = rows else {
            return Err(ApiError::invalid_input(format!(
                "Seed collection '{}' must be a JSON array",
                name
            )));
        };
        let mut documents = Vec::with_capacity(rows.len());
        for (index, row) in rows.into_iter().enumerate() {
            match row {
                Value::Object(map) => documents.push(map),
                _ => {
                    return Err(ApiError::invalid_input(format!(
                        "Seed document {}[{}] must be a JSON object",
                        name, index
                    )));
                }
            }
        }
        batches.push((name, documents));
    }
    Ok(batches)
}

/// Read a seed file and load every collection into the store.
/// Returns the total number of documents loaded.
pub async fn load_seed_file(store: &MemoryStore, path: &Path) -> ApiResult<u64> {
    let raw = tokio::fs::read_to_string(path).await.map_err(|err| {
        ApiError::invalid_input(format!(
            "Cannot read seed file {}: {}",
            path.display(),
            err
        ))
    })?;

    let mut total = 0u64;
    for (name, documents) in parse_seed(&raw)? {
        let ids = store.seed(&name, documents).await?;
        tracing::info!(collection = %name, documents = ids.len(), "seeded collection");
        total += ids.len() as u64;
    }
    Ok(total)
}

// =============================================================================
// TESTS
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::Value;
    use tally_store::DocumentStore;

    #[test]
    fn test_parse_seed_two_collections() {
        let raw = r#"{
            "sales": [{ "region": "North", "sales_amount": 100.0 }],
            "people": [{ "name": "ann" }, { "name": "bob" }]
        }"#;
        let batches = parse_seed(raw).unwrap();
        assert_eq!(batches.len(), 2);

        let people = batches.iter().find(|(name, _)| name == "people").unwrap();
        assert_eq!(people.1.len(), 2);
    }

    #[test]
    fn test_parse_seed_rejects_non_object_top_level() {
        let err = parse_seed("[1, 2, 3]").unwrap_err();
        assert!(err.message.contains("JSON object"));
    }

    #[test]
    fn test_parse_seed_rejects_non_array_collection() {
        let err = parse_seed(r#"{ "sales": { "region": "North" } }"#).unwrap_err();
        assert!(err.message.contains("sales"));
        assert!(err.message.contains("array"));
    }

    #[test]
    fn test_parse_seed_rejects_non_object_document() {
        let err = parse_seed(r#"{ "sales": [{ "ok": true }, 42] }"#).unwrap_err();
        assert!(err.message.contains("sales[1]"));
    }

    #[tokio::test]
    async fn test_load_seed_file_populates_store() {
        let path = std::env::temp_dir().join(format!("tally-seed-{}.json", std::process::id()));
        std::fs::write(
            &path,
            r#"{ "sales": [{ "region": "North" }, { "region": "West" }] }"#,
        )
        .unwrap();

        let store = MemoryStore::new();
        let total = load_seed_file(&store, &path).await.unwrap();
        std::fs::remove_file(&path).unwrap();

        assert_eq!(total, 2);
        assert_eq!(
            store
                .collection("sales")
                .count(&Value::Null)
                .await
                .unwrap(),
            2
        );
    }
}
