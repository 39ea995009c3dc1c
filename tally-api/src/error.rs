//! Error Types for the Tally API
//!
//! [`ApiError`] is the one error type handlers return. It pairs a
//! machine-readable [`ErrorCode`] with a human-readable message and
//! optional structured details, and renders itself as a JSON body with
//! the matching HTTP status.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tally_core::{AnalysisError, QueryError, StoreError, TallyError};

// ============================================================================
// ERROR CODES
// ============================================================================

/// Machine-readable error codes for the REST surface.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Request-shape errors (400)
    ValidationFailed,
    InvalidInput,
    MissingField,
    InvalidRange,
    InvalidFormat,
    AnalysisNotFound,

    // Server-side errors (5xx)
    InternalError,
    StorageError,
    ServiceUnavailable,
}

impl ErrorCode {
    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::ValidationFailed
            | ErrorCode::InvalidInput
            | ErrorCode::MissingField
            | ErrorCode::InvalidRange
            | ErrorCode::InvalidFormat
            | ErrorCode::AnalysisNotFound => StatusCode::BAD_REQUEST,
            ErrorCode::InternalError | ErrorCode::StorageError => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Default human-readable message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::ValidationFailed => "Request validation failed",
            ErrorCode::InvalidInput => "Invalid input provided",
            ErrorCode::MissingField => "Required field is missing",
            ErrorCode::InvalidRange => "Value is out of the allowed range",
            ErrorCode::InvalidFormat => "Value has an invalid format",
            ErrorCode::AnalysisNotFound => "Requested analysis is not registered",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::StorageError => "Storage operation failed",
            ErrorCode::ServiceUnavailable => "Service temporarily unavailable",
        }
    }
}

impl std::fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR
// ============================================================================

/// Structured error response for the REST API.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Machine-readable error code
    pub code: ErrorCode,
    /// Human-readable error message
    pub message: String,
    /// Optional structured details about the error
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<Value>,
}

impl ApiError {
    /// Create a new API error with a custom message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create an API error with the code's default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Attach structured details to the error.
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = Some(details);
        self
    }

    /// HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    // Convenience constructors for common cases

    pub fn validation_failed(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ValidationFailed, message)
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn missing_field(field: &str) -> Self {
        Self::new(
            ErrorCode::MissingField,
            format!("Required field '{}' is missing", field),
        )
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' must be {}", field, expected),
        )
    }

    pub fn analysis_not_found(name: &str) -> Self {
        Self::new(
            ErrorCode::AnalysisNotFound,
            format!("Analysis service '{}' not found", name),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }
}

impl std::fmt::Display for ApiError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        (status, Json(self)).into_response()
    }
}

// ============================================================================
// CONVERSIONS FROM DOMAIN ERRORS
// ============================================================================

impl From<QueryError> for ApiError {
    fn from(err: QueryError) -> Self {
        // Query errors describe the caller's own request, safe to echo back.
        let code = match &err {
            QueryError::InvalidOperand { .. } => ErrorCode::ValidationFailed,
            QueryError::InvalidPattern { .. } => ErrorCode::InvalidFormat,
            QueryError::LimitOutOfRange { .. } => ErrorCode::InvalidRange,
            QueryError::EmptyOrGroup => ErrorCode::ValidationFailed,
        };
        ApiError::new(code, err.to_string())
    }
}

impl From<AnalysisError> for ApiError {
    fn from(err: AnalysisError) -> Self {
        match &err {
            AnalysisError::UnknownAnalysis { name } => ApiError::analysis_not_found(name),
            AnalysisError::InvalidParams { .. } | AnalysisError::MissingColumn { .. } => {
                ApiError::new(ErrorCode::InvalidInput, err.to_string())
            }
            AnalysisError::MalformedResult { .. } | AnalysisError::Failed { .. } => {
                tracing::error!(error = %err, "Analysis failure reached the API boundary");
                ApiError::from_code(ErrorCode::InternalError)
            }
        }
    }
}

impl From<StoreError> for ApiError {
    fn from(err: StoreError) -> Self {
        // Storage details stay in the logs; clients get a generic message.
        tracing::error!(error = %err, "Store operation failed");
        match err {
            StoreError::Unavailable { .. } => ApiError::from_code(ErrorCode::ServiceUnavailable),
            _ => ApiError::from_code(ErrorCode::StorageError),
        }
    }
}

impl From<TallyError> for ApiError {
    fn from(err: TallyError) -> Self {
        match err {
            TallyError::Query(source) => source.into(),
            TallyError::Analysis(source) => source.into(),
            TallyError::Store(source) => source.into(),
        }
    }
}

impl From<serde_json::Error> for ApiError {
    fn from(err: serde_json::Error) -> Self {
        ApiError::invalid_input(format!("Invalid JSON: {}", err))
    }
}

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

// =============================================================================
// TESTS
// =============================================================================
