//! Tally API Server
//!
//! Binds the REST router to a TCP listener, optionally preloading the
//! in-memory store from `TALLY_SEED_FILE`, and serves until Ctrl-C.

use std::net::SocketAddr;
use std::sync::Arc;

use tally_analytics::AnalysisRegistry;
use tally_api::{create_api_router, load_seed_file, ApiConfig, ApiError, ApiResult, AppState};
use tally_store::MemoryStore;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> ApiResult<()> {
    init_tracing()?;

    let config = ApiConfig::from_env();

    let store = Arc::new(MemoryStore::new());
    if let Some(path) = &config.seed_file {
        let total = load_seed_file(store.as_ref(), path).await?;
        tracing::info!(documents = total, path = %path.display(), "seed file loaded");
    }

    let registry = Arc::new(AnalysisRegistry::with_defaults());
    let state = AppState::new(store, registry);
    let app = create_api_router(state, &config);

    let addr = resolve_bind_addr()?;
    tracing::info!(%addr, "Starting Tally API server");
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .map_err(|err| ApiError::internal_error(format!("Failed to bind {}: {}", addr, err)))?;

    let server = axum::serve(listener, app);
    tokio::select! {
        result = server => {
            result.map_err(|err| ApiError::internal_error(format!("Server error: {}", err)))?;
        }
        _ = tokio::signal::ctrl_c() => {
            tracing::info!("Shutdown signal received");
        }
    }

    Ok(())
}

fn init_tracing() -> ApiResult<()> {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new("tally_api=debug,tower_http=debug,info"));

    tracing_subscriber::registry()
        .with(env_filter)
        .with(tracing_subscriber::fmt::layer().json())
        .try_init()
        .map_err(|err| ApiError::internal_error(format!("Failed to init subscriber: {}", err)))
}

/// Bind address from `TALLY_API_BIND` and `PORT`/`TALLY_API_PORT`,
/// defaulting to 0.0.0.0:3000.
fn resolve_bind_addr() -> ApiResult<SocketAddr> {
    let host = std::env::var("TALLY_API_BIND").unwrap_or_else(|_| "0.0.0.0".to_string());
    let port_str = std::env::var("PORT")
        .ok()
        .or_else(|| std::env::var("TALLY_API_PORT").ok())
        .unwrap_or_else(|| "3000".to_string());
    let port = port_str
        .parse::<u16>()
        .map_err(|_| ApiError::invalid_input(format!("Invalid port value: {}", port_str)))?;

    let addr = format!("{}:{}", host, port);
    addr.parse::<SocketAddr>()
        .map_err(|err| ApiError::invalid_input(format!("Invalid bind address {}: {}", addr, err)))
}
