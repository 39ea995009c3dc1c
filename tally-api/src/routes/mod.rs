//! REST API Routes
//!
//! Route modules and the top-level router assembly: the analysis surface
//! under `/api/v1`, probes under `/health`, request tracing and CORS
//! layered around everything.

pub mod analyze;
pub mod collections;
pub mod health;

use std::time::Duration;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::config::ApiConfig;
use crate::state::AppState;

/// Assemble the full application router.
pub fn create_api_router(state: AppState, config: &ApiConfig) -> Router {
    let api_routes = Router::new()
        .merge(analyze::create_router())
        .nest("/collections", collections::create_router())
        .with_state(state.clone());

    Router::new()
        .nest("/api/v1", api_routes)
        .nest("/health", health::create_router(state.store))
        .layer(TraceLayer::new_for_http())
        .layer(build_cors_layer(config))
}

/// CORS policy: wide open in development, origin-listed in production.
/// Credentials are only allowed together with an explicit origin list.
fn build_cors_layer(config: &ApiConfig) -> CorsLayer {
    let cors = CorsLayer::new()
        .allow_methods([Method::GET, Method::POST, Method::OPTIONS])
        .max_age(Duration::from_secs(config.cors_max_age_secs));

    if config.is_production() {
        let origins: Vec<HeaderValue> = config
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();
        tracing::info!(
            origins = origins.len(),
            "CORS restricted to configured origins"
        );
        let cors = cors.allow_headers([header::CONTENT_TYPE, header::ACCEPT]);
        if config.cors_allow_credentials {
            cors.allow_origin(origins).allow_credentials(true)
        } else {
            cors.allow_origin(origins)
        }
    } else {
        tracing::info!("CORS open to any origin (development mode)");
        cors.allow_origin(Any).allow_headers(Any)
    }
}
