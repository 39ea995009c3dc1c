//! Error types for tally operations

use thiserror::Error;

/// Query translation errors.
///
/// Raised while turning declarative search criteria into a native store
/// query. These are request-shape problems: the caller sent something the
/// translator refuses to encode, and the whole request fails.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum QueryError {
    #[error("Invalid operand for `{operator}` on field `{field}`: expected {expected}")]
    InvalidOperand {
        field: String,
        operator: String,
        expected: String,
    },

    #[error("Invalid regex pattern on field `{field}`: {reason}")]
    InvalidPattern { field: String, reason: String },

    #[error("Limit {limit} out of range (1..={max})")]
    LimitOutOfRange { limit: u32, max: u32 },

    #[error("Or-group must contain at least one condition")]
    EmptyOrGroup,
}

/// Analysis-level errors.
///
/// With the exception of `UnknownAnalysis` (a request-shape problem), these
/// stay contained to the analysis that raised them and never abort sibling
/// analyses in the same batch.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum AnalysisError {
    #[error("Unknown analysis: {name}")]
    UnknownAnalysis { name: String },

    #[error("Missing required column `{column}` for analysis `{analysis}`")]
    MissingColumn { analysis: String, column: String },

    #[error("Invalid parameter `{param}` for analysis `{analysis}`: {reason}")]
    InvalidParams {
        analysis: String,
        param: String,
        reason: String,
    },

    #[error("Malformed aggregation result for analysis `{analysis}`: {reason}")]
    MalformedResult { analysis: String, reason: String },

    #[error("Analysis `{analysis}` failed: {reason}")]
    Failed { analysis: String, reason: String },
}

/// Document store errors.
///
/// Infrastructure failures. Unlike analysis errors these always abort the
/// request; they are never silently converted into an empty result set.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StoreError {
    #[error("Collection `{name}` unavailable: {reason}")]
    Unavailable { name: String, reason: String },

    #[error("Unsupported operator `{operator}` in filter document")]
    UnsupportedOperator { operator: String },

    #[error("Unsupported pipeline stage `{stage}`")]
    UnsupportedStage { stage: String },

    #[error("Unsupported aggregation expression `{operator}`")]
    UnsupportedExpression { operator: String },

    #[error("Malformed pipeline stage `{stage}`: {reason}")]
    MalformedStage { stage: String, reason: String },

    #[error("Malformed filter document: {reason}")]
    MalformedFilter { reason: String },

    #[error("Invalid argument for `{operator}`: {reason}")]
    InvalidArgument { operator: String, reason: String },

    #[error("Storage lock poisoned")]
    LockPoisoned,
}

/// Master error type for all tally operations.
#[derive(Debug, Clone, Error)]
pub enum TallyError {
    #[error("Query error: {0}")]
    Query(#[from] QueryError),

    #[error("Analysis error: {0}")]
    Analysis(#[from] AnalysisError),

    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

/// Result type alias for tally operations.
pub type TallyResult<T> = Result<T, TallyError>;

// =============================================================================
// TESTS
// =============================================================================
