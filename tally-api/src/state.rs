//! Shared application state for Axum routers.

use std::sync::Arc;

use tally_analytics::AnalysisRegistry;
use tally_store::DocumentStore;

/// State threaded through every route handler.
#[derive(Clone)]
pub struct AppState {
    /// Document store the routes read and write
    pub store: Arc<dyn DocumentStore>,
    /// Analysis services available to the analyze endpoint
    pub registry: Arc<AnalysisRegistry>,
}

impl AppState {
    pub fn new(store: Arc<dyn DocumentStore>, registry: Arc<AnalysisRegistry>) -> Self {
        Self { store, registry }
    }
}
