//! Error Types for the Motorway API
//!
//! This module defines error handling for the HTTP layer:
//! - ErrorCode enum for categorizing errors
//! - ApiError struct for structured error responses
//! - IntoResponse implementation for Axum HTTP responses
//! - Conversion from storage failures, keeping the retry attempt count
//!
//! All errors are serialized as JSON with appropriate HTTP status codes.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use motorway_core::{CachedResult, ConfigError, ErrorClass, StorageError};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::monitor::MonitorError;

// ============================================================================
// ERROR CODE ENUM
// ============================================================================

/// Error codes for API responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // ========================================================================
    // Validation Errors (400)
    // ========================================================================
    /// Request contains invalid input data
    InvalidInput,

    /// Field format is incorrect
    InvalidFormat,

    // ========================================================================
    // Not Found Errors (404)
    // ========================================================================
    /// Requested entity does not exist
    EntityNotFound,

    // ========================================================================
    // Conflict Errors (409)
    // ========================================================================
    /// Storage rejected the write with a constraint violation
    ConstraintViolation,

    // ========================================================================
    // Server Errors (500, 503)
    // ========================================================================
    /// Internal server error
    InternalError,

    /// Storage stayed unavailable after retrying
    ServiceUnavailable,
}

impl ErrorCode {
    /// Get the HTTP status code for this error code.
    pub fn status_code(&self) -> StatusCode {
        match self {
            ErrorCode::InvalidInput | ErrorCode::InvalidFormat => StatusCode::BAD_REQUEST,
            ErrorCode::EntityNotFound => StatusCode::NOT_FOUND,
            ErrorCode::ConstraintViolation => StatusCode::CONFLICT,
            ErrorCode::InternalError => StatusCode::INTERNAL_SERVER_ERROR,
            ErrorCode::ServiceUnavailable => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Get a default message for this error code.
    pub fn default_message(&self) -> &'static str {
        match self {
            ErrorCode::InvalidInput => "Invalid input data",
            ErrorCode::InvalidFormat => "Invalid format",
            ErrorCode::EntityNotFound => "Entity not found",
            ErrorCode::ConstraintViolation => "Write rejected by a storage constraint",
            ErrorCode::InternalError => "Internal server error",
            ErrorCode::ServiceUnavailable => "Storage temporarily unavailable",
        }
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}", self)
    }
}

// ============================================================================
// API ERROR STRUCT
// ============================================================================

/// Structured error response for API operations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ApiError {
    /// Error code categorizing the error
    pub code: ErrorCode,

    /// Human-readable error message
    pub message: String,

    /// Optional additional details (storage code, attempts...)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub details: Option<serde_json::Value>,
}

impl ApiError {
    /// Create a new API error with the given code and message.
    pub fn new(code: ErrorCode, message: impl Into<String>) -> Self {
        Self {
            code,
            message: message.into(),
            details: None,
        }
    }

    /// Create a new API error with the given code, using the default message.
    pub fn from_code(code: ErrorCode) -> Self {
        Self::new(code, code.default_message())
    }

    /// Add additional details to the error.
    pub fn with_details(mut self, details: serde_json::Value) -> Self {
        self.details = Some(details);
        self
    }

    /// Get the HTTP status code for this error.
    pub fn status_code(&self) -> StatusCode {
        self.code.status_code()
    }

    pub fn invalid_input(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InvalidInput, message)
    }

    pub fn invalid_format(field: &str, expected: &str) -> Self {
        Self::new(
            ErrorCode::InvalidFormat,
            format!("Field '{}' has invalid format, expected {}", field, expected),
        )
    }

    pub fn entity_not_found(entity_type: &str, id: impl fmt::Display) -> Self {
        Self::new(
            ErrorCode::EntityNotFound,
            format!("{} with id {} not found", entity_type, id),
        )
    }

    pub fn internal_error(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::InternalError, message)
    }

    pub fn service_unavailable(message: impl Into<String>) -> Self {
        Self::new(ErrorCode::ServiceUnavailable, message)
    }

    /// Map a storage failure after `attempts` tries.
    ///
    /// Constraint violations become 409, everything else 503. The storage
    /// message is logged, not returned.
    pub fn storage_failure(error: &StorageError, attempts: u32) -> Self {
        tracing::error!(
            code = error.code().unwrap_or("none"),
            attempts,
            error = %error,
            "Storage operation failed"
        );

        let code = match error.class() {
            ErrorClass::NonRetryable => ErrorCode::ConstraintViolation,
            ErrorClass::Transient => ErrorCode::ServiceUnavailable,
        };
        Self::from_code(code).with_details(serde_json::json!({
            "storageCode": error.code(),
            "attempts": attempts,
        }))
    }
}

impl fmt::Display for ApiError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.code, self.message)
    }
}

impl std::error::Error for ApiError {}

// ============================================================================
// AXUM INTEGRATION
// ============================================================================

/// Allows ApiError to be returned directly from Axum handlers.
impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = Json(self);
        (status, body).into_response()
    }
}

// ============================================================================
// CONVERSIONS
// ============================================================================

impl From<StorageError> for ApiError {
    fn from(err: StorageError) -> Self {
        ApiError::storage_failure(&err, 1)
    }
}

impl From<ConfigError> for ApiError {
    fn from(err: ConfigError) -> Self {
        ApiError::invalid_input(err.to_string())
    }
}

impl From<MonitorError> for ApiError {
    fn from(err: MonitorError) -> Self {
        ApiError::internal_error(format!("Monitoring error: {}", err))
    }
}

impl From<prometheus::Error> for ApiError {
    fn from(err: prometheus::Error) -> Self {
        ApiError::internal_error(format!("Metrics error: {}", err))
    }
}

/// Turn a [`CachedResult`] into an [`ApiResult`], keeping the attempt count
/// on failure.
pub trait CachedResultExt<T> {
    fn into_api_result(self) -> ApiResult<T>;
}

impl<T> CachedResultExt<T> for CachedResult<T> {
    fn into_api_result(self) -> ApiResult<T> {
        let attempts = self.attempts();
        self.into_result()
            .map_err(|error| ApiError::storage_failure(&error, attempts))
    }
}

// ============================================================================
// RESULT TYPE ALIAS
// ============================================================================

/// Result type alias for API operations.
pub type ApiResult<T> = Result<T, ApiError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_status_mapping() {
        assert_eq!(ErrorCode::InvalidInput.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(ErrorCode::EntityNotFound.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(ErrorCode::ConstraintViolation.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            ErrorCode::ServiceUnavailable.status_code(),
            StatusCode::SERVICE_UNAVAILABLE
        );
        assert_eq!(
            ErrorCode::InternalError.status_code(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[test]
    fn test_constraint_violation_maps_to_conflict() {
        let err = ApiError::storage_failure(&StorageError::unique_violation("dup"), 1);
        assert_eq!(err.status_code(), StatusCode::CONFLICT);
        assert_eq!(
            err.details,
            Some(serde_json::json!({"storageCode": "23505", "attempts": 1}))
        );
    }

    #[test]
    fn test_transient_failure_maps_to_unavailable() {
        let result: CachedResult<()> =
            CachedResult::failure(StorageError::connection_failed("refused"), 3);
        let err = match result.into_api_result() {
            Ok(()) => panic!("failed result converted to Ok"),
            Err(err) => err,
        };
        assert_eq!(err.code, ErrorCode::ServiceUnavailable);
        assert_eq!(err.details.as_ref().map(|d| d["attempts"].clone()), Some(3.into()));
    }

    #[test]
    fn test_storage_message_not_exposed() {
        let err = ApiError::from(StorageError::new("password=hunter2 in DSN"));
        assert!(!err.message.contains("hunter2"));
    }

    #[test]
    fn test_error_serialization() -> Result<(), serde_json::Error> {
        let err = ApiError::entity_not_found("car", "123");
        let json = serde_json::to_string(&err)?;

        assert!(json.contains("ENTITY_NOT_FOUND"));
        assert!(json.contains("car with id 123 not found"));
        assert!(!json.contains("details"));

        let deserialized: ApiError = serde_json::from_str(&json)?;
        assert_eq!(deserialized, err);
        Ok(())
    }

    #[test]
    fn test_error_display() {
        let err = ApiError::internal_error("boom");
        let display = format!("{}", err);
        assert!(display.contains("InternalError"));
        assert!(display.contains("boom"));
    }
}
