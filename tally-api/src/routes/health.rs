//! Health Check Routes
//!
//! A bare ping, a liveness probe, and a readiness probe that actually
//! checks the document store and reports per-component health.

use std::sync::Arc;
use std::time::Instant;

use axum::{extract::State, http::StatusCode, response::IntoResponse, routing::get, Json, Router};
use serde::{Deserialize, Serialize};
use tally_core::num::round_to;
use tally_store::DocumentStore;

// ============================================================================
// RESPONSE TYPES
// ============================================================================

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: HealthStatus,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<HealthDetails>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthStatus {
    Healthy,
    Degraded,
    Unhealthy,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct HealthDetails {
    pub store: ComponentHealth,
    pub version: String,
    pub uptime_seconds: u64,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ComponentHealth {
    pub status: HealthStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub latency_ms: Option<f64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// ============================================================================
// STATE
// ============================================================================

pub struct HealthState {
    store: Arc<dyn DocumentStore>,
    start_time: Instant,
}

impl HealthState {
    pub fn new(store: Arc<dyn DocumentStore>) -> Self {
        Self {
            store,
            start_time: Instant::now(),
        }
    }
}

// ============================================================================
// HANDLERS
// ============================================================================

/// GET /health/ping - cheapest possible reachability check
async fn ping() -> impl IntoResponse {
    (StatusCode::OK, "pong")
}

/// GET /health/live - the process is up and serving requests
async fn live() -> impl IntoResponse {
    Json(HealthResponse {
        status: HealthStatus::Healthy,
        message: "Service is live".to_string(),
        details: None,
    })
}

/// GET /health/ready - the service can answer queries right now
async fn ready(State(state): State<Arc<HealthState>>) -> impl IntoResponse {
    let store = check_store(state.store.as_ref()).await;
    let healthy = store.status == HealthStatus::Healthy;

    let response = HealthResponse {
        status: store.status,
        message: if healthy {
            "Service is ready".to_string()
        } else {
            "Document store is not responding".to_string()
        },
        details: Some(HealthDetails {
            store,
            version: env!("CARGO_PKG_VERSION").to_string(),
            uptime_seconds: state.start_time.elapsed().as_secs(),
        }),
    };

    let status = if healthy {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    (status, Json(response))
}

async fn check_store(store: &dyn DocumentStore) -> ComponentHealth {
    let started = Instant::now();
    match store.ping().await {
        Ok(()) => ComponentHealth {
            status: HealthStatus::Healthy,
            latency_ms: Some(round_to(started.elapsed().as_secs_f64() * 1000.0, 2)),
            error: None,
        },
        Err(err) => ComponentHealth {
            status: HealthStatus::Unhealthy,
            latency_ms: None,
            error: Some(err.to_string()),
        },
    }
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the health check router with its own probe state.
pub fn create_router(store: Arc<dyn DocumentStore>) -> Router {
    let state = Arc::new(HealthState::new(store));
    Router::new()
        .route("/ping", get(ping))
        .route("/live", get(live))
        .route("/ready", get(ready))
        .with_state(state)
}

// =============================================================================
// TESTS
// =============================================================================
