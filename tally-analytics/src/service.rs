//! Analysis service boundary
//!
//! Every analysis implements [`AnalysisService`] with two interchangeable
//! strategies: an in-memory pass over rows fetched once, and a compiled
//! aggregation pipeline pushed down to the store. The manager picks the
//! strategy per analysis; both must produce the same payload shape.

use serde::Serialize;
use serde_json::{json, Map, Value};
use tally_core::{AnalysisError, Document};

/// Normalized result of one analysis run.
#[derive(Debug, Clone, PartialEq)]
pub enum AnalysisPayload {
    Report(AnalysisReport),
    /// The criteria matched no documents.
    NoData,
}

/// The report shape every analysis produces.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct AnalysisReport {
    /// Whole-result-set figures
    pub summary: Value,
    /// One entry per group, best first where the analysis defines an order
    pub by_group: Vec<Value>,
    /// Leading group or entity
    pub top: Option<Value>,
    /// Trailing group or entity
    pub bottom: Option<Value>,
}

impl AnalysisPayload {
    /// Wire form of the payload.
    pub fn into_value(self) -> Value {
        match self {
            AnalysisPayload::Report(report) => json!({
                "summary": report.summary,
                "by_group": report.by_group,
                "top": report.top,
                "bottom": report.bottom,
            }),
            AnalysisPayload::NoData => json!({
                "message": "No data to analyze",
                "result": [],
            }),
        }
    }

    pub fn is_no_data(&self) -> bool {
        matches!(self, AnalysisPayload::NoData)
    }
}

/// One registered analysis.
///
/// `needs_raw_rows` decides the strategy: `true` routes through
/// `compute_in_memory` over rows the manager fetched once for the whole
/// batch, `false` routes through `build_pipeline` and `post_process`
/// around a store-side aggregation.
pub trait AnalysisService: Send + Sync {
    /// Registry name.
    fn name(&self) -> &'static str;

    /// Whether this analysis consumes raw rows instead of pushing a
    /// pipeline down to the store.
    fn needs_raw_rows(&self) -> bool;

    /// Reject malformed parameters before any data moves.
    fn validate_params(&self, params: &Map<String, Value>) -> Result<(), AnalysisError>;

    /// In-memory strategy over fetched rows.
    fn compute_in_memory(
        &self,
        rows: &[Document],
        params: &Map<String, Value>,
    ) -> Result<AnalysisPayload, AnalysisError>;

    /// Pipeline strategy: compile to stages seeded with the translated
    /// filter of the surrounding request.
    fn build_pipeline(
        &self,
        base_filter: &Value,
        params: &Map<String, Value>,
    ) -> Result<Vec<Value>, AnalysisError>;

    /// Reassemble store-side aggregation rows into the payload.
    fn post_process(
        &self,
        rows: Vec<Document>,
        params: &Map<String, Value>,
    ) -> Result<AnalysisPayload, AnalysisError>;
}

// =============================================================================
// TESTS
// =============================================================================
