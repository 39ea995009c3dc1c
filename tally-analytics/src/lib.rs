//! Tally Analytics - Analysis Services and Execution
//!
//! Each analysis is a small service with two interchangeable strategies:
//! an in-memory pass over rows fetched once per batch, and an aggregation
//! pipeline pushed down to the document store. The registry maps wire
//! names to services; the manager resolves, executes, and times a batch,
//! keeping per-analysis failures contained to their own result entry.

pub mod analyses;
pub mod frame;
pub mod manager;
pub mod registry;
pub mod service;

pub use analyses::{GroupAndAggregate, SalesByRegion, UserActivitySummary};
pub use manager::{PipelineManager, PipelineReport};
pub use registry::AnalysisRegistry;
pub use service::{AnalysisPayload, AnalysisReport, AnalysisService};
