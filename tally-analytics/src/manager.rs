//! Analysis execution manager

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Map, Value};
use tally_core::num::round_to;
use tally_core::{AnalysisError, AnalysisRequest, Document, TallyError};
use tally_store::QueryTranslator;

use crate::registry::AnalysisRegistry;
use crate::service::{AnalysisPayload, AnalysisService};

/// Runs a batch of analyses against one translated query.
///
/// Raw rows are fetched at most once per batch and shared by every
/// analysis that wants them. A failure inside one analysis becomes an
/// error entry under that analysis's name; failures outside any single
/// analysis (an unknown name, the shared fetch) abort the whole batch.
pub struct PipelineManager {
    registry: Arc<AnalysisRegistry>,
}

/// Everything a batch run produced.
#[derive(Debug)]
pub struct PipelineReport {
    /// Per-analysis payloads or error entries, keyed by analysis name
    pub results: Map<String, Value>,
    /// Wall-clock duration of each analysis, in request order
    pub durations_ms: Vec<(String, f64)>,
    /// Sum of the per-analysis durations
    pub total_duration_ms: f64,
    /// Raw rows fetched for the batch; None when no analysis needed them
    pub raw_count: Option<u64>,
}

impl PipelineManager {
    pub fn new(registry: Arc<AnalysisRegistry>) -> Self {
        Self { registry }
    }

    /// Resolve, execute, and time every requested analysis.
    pub async fn run(
        &self,
        translator: &QueryTranslator,
        requests: &[AnalysisRequest],
    ) -> Result<PipelineReport, TallyError> {
        // Resolve everything up front so an unknown name fails the batch
        // before any data moves.
        let mut resolved: Vec<(&AnalysisRequest, Box<dyn AnalysisService>)> =
            Vec::with_capacity(requests.len());
        for request in requests {
            let service = self.registry.get(&request.name).ok_or_else(|| {
                AnalysisError::UnknownAnalysis {
                    name: request.name.clone(),
                }
            })?;
            resolved.push((request, service));
        }

        let raw_rows = if resolved.iter().any(|(_, service)| service.needs_raw_rows()) {
            Some(translator.execute().await?)
        } else {
            None
        };

        let mut results = Map::new();
        let mut durations_ms = Vec::with_capacity(resolved.len());
        for (request, service) in &resolved {
            let started = Instant::now();
            let outcome = self
                .run_one(translator, service.as_ref(), request, raw_rows.as_deref())
                .await;
            let elapsed = round_to(started.elapsed().as_secs_f64() * 1000.0, 2);
            durations_ms.push((request.name.clone(), elapsed));
            match outcome {
                Ok(payload) => {
                    results.insert(request.name.clone(), payload.into_value());
                }
                Err(error) => {
                    tracing::warn!(analysis = %request.name, error = %error, "analysis failed");
                    results.insert(request.name.clone(), json!({ "error": message(&error) }));
                }
            }
        }

        let total_duration_ms = round_to(durations_ms.iter().map(|(_, ms)| ms).sum(), 2);
        tracing::info!(
            analyses = durations_ms.len(),
            total_duration_ms,
            "analysis batch complete"
        );

        Ok(PipelineReport {
            results,
            durations_ms,
            total_duration_ms,
            raw_count: raw_rows.as_ref().map(|rows| rows.len() as u64),
        })
    }

    async fn run_one(
        &self,
        translator: &QueryTranslator,
        service: &dyn AnalysisService,
        request: &AnalysisRequest,
        raw_rows: Option<&[Document]>,
    ) -> Result<AnalysisPayload, TallyError> {
        service.validate_params(&request.params)?;
        if service.needs_raw_rows() {
            let rows = raw_rows.unwrap_or(&[]);
            if rows.is_empty() {
                return Ok(AnalysisPayload::NoData);
            }
            Ok(service.compute_in_memory(rows, &request.params)?)
        } else {
            let stages = service.build_pipeline(&translator.base_filter(), &request.params)?;
            let rows = translator.execute_pipeline(&stages).await?;
            if rows.is_empty() {
                return Ok(AnalysisPayload::NoData);
            }
            Ok(service.post_process(rows, &request.params)?)
        }
    }
}

/// Innermost message, without the master enum's category prefix.
fn message(error: &TallyError) -> String {
    match error {
        TallyError::Query(e) => e.to_string(),
        TallyError::Analysis(e) => e.to_string(),
        TallyError::Store(e) => e.to_string(),
    }
}

// =============================================================================
// TESTS
// =============================================================================
