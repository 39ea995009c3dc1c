//! Tally API - REST Surface
//!
//! Axum layer over the Tally workspace: one analyze endpoint that
//! translates declarative criteria, fans a batch of analyses out over the
//! matching documents, and returns the combined results, plus collection
//! ingest, inspection, and health probes.

pub mod config;
pub mod error;
pub mod routes;
pub mod seed;
pub mod state;

pub use config::ApiConfig;
pub use error::{ApiError, ApiResult, ErrorCode};
pub use routes::create_api_router;
pub use seed::load_seed_file;
pub use state::AppState;
