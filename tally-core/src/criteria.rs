//! Search criteria and analysis request/response shapes

use crate::error::QueryError;
use crate::filter::{FilterCondition, OrGroup};
use crate::sort::SortKey;
use serde::{Deserialize, Serialize};

/// Hard ceiling on the page size a request may ask for.
pub const MAX_LIMIT: u32 = 10_000;

/// Declarative description of which documents to read and in what order.
///
/// Everything defaults to empty so a bare `{}` selects a whole collection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct SearchCriteria {
    /// Field conditions, implicitly AND-ed
    #[serde(default)]
    pub filters: Vec<FilterCondition>,
    /// Disjunctive groups, flattened into one top-level OR
    #[serde(default)]
    pub or_groups: Vec<OrGroup>,
    /// Compound sort keys, applied left to right
    #[serde(default)]
    pub sort: Vec<SortKey>,
    /// Page size; absent means unbounded
    #[serde(default)]
    pub limit: Option<u32>,
    /// Documents to skip before the page starts
    #[serde(default)]
    pub skip: u32,
}

impl SearchCriteria {
    /// Check bounds that wire decoding cannot enforce.
    pub fn validate(&self) -> Result<(), QueryError> {
        if let Some(limit) = self.limit {
            if limit == 0 || limit > MAX_LIMIT {
                return Err(QueryError::LimitOutOfRange {
                    limit,
                    max: MAX_LIMIT,
                });
            }
        }
        for group in &self.or_groups {
            if group.conditions.is_empty() {
                return Err(QueryError::EmptyOrGroup);
            }
        }
        Ok(())
    }
}

/// One analysis to run, addressed by registry name.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AnalysisRequest {
    pub name: String,
    /// Analysis-specific parameters; shape is defined by the analysis itself
    #[serde(default)]
    pub params: serde_json::Map<String, serde_json::Value>,
}

impl AnalysisRequest {
    pub fn named(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            params: serde_json::Map::new(),
        }
    }
}

/// Top-level analyze request: a collection, criteria, and what to compute.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QueryRequest {
    pub collection: String,
    #[serde(default)]
    pub criteria: SearchCriteria,
    #[serde(default)]
    pub analyses: Vec<AnalysisRequest>,
}

/// Envelope returned for an analyze request.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AnalysisResponse {
    /// Rows fetched for in-memory analyses; 0 when nothing needed them
    pub raw_data_count: u64,
    /// Per-analysis results keyed by analysis name
    pub analyses_results: serde_json::Map<String, serde_json::Value>,
    /// Total analysis wall-clock time in milliseconds
    pub execution_time_ms: f64,
}

// =============================================================================
// TESTS
// =============================================================================
