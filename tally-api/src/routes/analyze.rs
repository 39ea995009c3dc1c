//! Analyze Routes
//!
//! The main entry point of the API: one POST carries a collection name,
//! declarative search criteria, and the list of analyses to run over the
//! matching documents. Unknown analysis names become error entries in the
//! result map so valid siblings still run.

use std::time::Instant;

use axum::{
    extract::State,
    response::IntoResponse,
    routing::{get, post},
    Json, Router,
};
use serde_json::{json, Map};
use tally_analytics::PipelineManager;
use tally_core::num::round_to;
use tally_core::{AnalysisRequest, AnalysisResponse, QueryRequest};
use tally_store::QueryTranslator;

use crate::error::ApiResult;
use crate::state::AppState;

// ============================================================================
// HANDLERS
// ============================================================================

/// POST /api/v1/analyze
///
/// Translates the criteria once, then fans out to every requested
/// analysis. With no analyses requested the endpoint degrades to a
/// matched-row count.
async fn analyze(
    State(state): State<AppState>,
    Json(request): Json<QueryRequest>,
) -> ApiResult<impl IntoResponse> {
    let started = Instant::now();

    let collection = state.store.collection(&request.collection);
    let translator = QueryTranslator::from_criteria(collection, &request.criteria)?;

    if request.analyses.is_empty() {
        let rows = translator.execute().await?;
        return Ok(Json(AnalysisResponse {
            raw_data_count: rows.len() as u64,
            analyses_results: Map::new(),
            execution_time_ms: elapsed_ms(started),
        }));
    }

    let names: Vec<String> = request
        .analyses
        .iter()
        .map(|analysis| analysis.name.clone())
        .collect();
    let (known, unknown) = state.registry.validate(&names);

    let mut analyses_results = Map::new();
    for name in &unknown {
        tracing::warn!(analysis = %name, "requested analysis is not registered");
        analyses_results.insert(
            name.clone(),
            json!({ "error": format!("Analysis service '{}' not found", name) }),
        );
    }

    let mut raw_data_count = 0;
    if !known.is_empty() {
        let requests: Vec<AnalysisRequest> = request
            .analyses
            .iter()
            .filter(|analysis| known.contains(&analysis.name))
            .cloned()
            .collect();
        let manager = PipelineManager::new(state.registry.clone());
        let report = manager.run(&translator, &requests).await?;
        raw_data_count = report.raw_count.unwrap_or(0);
        analyses_results.extend(report.results);
    }

    Ok(Json(AnalysisResponse {
        raw_data_count,
        analyses_results,
        execution_time_ms: elapsed_ms(started),
    }))
}

/// GET /api/v1/analyses - names the registry can resolve
async fn list_analyses(State(state): State<AppState>) -> impl IntoResponse {
    let analyses = state.registry.available();
    Json(json!({
        "analyses": analyses,
        "count": analyses.len(),
    }))
}

fn elapsed_ms(started: Instant) -> f64 {
    round_to(started.elapsed().as_secs_f64() * 1000.0, 2)
}

// ============================================================================
// ROUTER
// ============================================================================

/// Create the analyze router.
pub fn create_router() -> Router<AppState> {
    Router::new()
        .route("/analyze", post(analyze))
        .route("/analyses", get(list_analyses))
}

// =============================================================================
// TESTS
// =============================================================================
