//! Error types for Motorway operations

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// SQLSTATE codes the storage layer attaches to failed operations.
pub mod codes {
    /// Unique constraint violation.
    pub const UNIQUE_VIOLATION: &str = "23505";
    /// Foreign key constraint violation.
    pub const FOREIGN_KEY_VIOLATION: &str = "23503";
    /// NOT NULL constraint violation.
    pub const NOT_NULL_VIOLATION: &str = "23502";
    /// Generic connection failure (class 08).
    pub const CONNECTION_FAILURE: &str = "08006";
    /// Statement cancelled, typically a statement timeout.
    pub const QUERY_CANCELED: &str = "57014";

    /// Codes for which a retry can never succeed.
    pub const NON_RETRYABLE: &[&str] = &[UNIQUE_VIOLATION, FOREIGN_KEY_VIOLATION, NOT_NULL_VIOLATION];
}

/// How a storage failure should be treated by the retry executor.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorClass {
    /// Constraint violations: the same request will fail the same way again.
    NonRetryable,
    /// Connection failures, timeouts and anything without a recognised code.
    Transient,
}

impl ErrorClass {
    /// Classify an optional error code.
    pub fn from_code(code: Option<&str>) -> Self {
        match code {
            Some(code) if codes::NON_RETRYABLE.contains(&code) => ErrorClass::NonRetryable,
            _ => ErrorClass::Transient,
        }
    }
}

/// Failure reported by the storage collaborator.
///
/// The optional `code` is what retry classification looks at; the message is
/// diagnostic only.
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
#[error("{} (code: {})", .message, .code.as_deref().unwrap_or("none"))]
pub struct StorageError {
    code: Option<String>,
    message: String,
}

impl StorageError {
    /// Error without a code. Always classified as transient.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            code: None,
            message: message.into(),
        }
    }

    /// Error carrying a storage error code.
    pub fn with_code(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: Some(code.into()),
            message: message.into(),
        }
    }

    pub fn unique_violation(message: impl Into<String>) -> Self {
        Self::with_code(codes::UNIQUE_VIOLATION, message)
    }

    pub fn foreign_key_violation(message: impl Into<String>) -> Self {
        Self::with_code(codes::FOREIGN_KEY_VIOLATION, message)
    }

    pub fn not_null_violation(message: impl Into<String>) -> Self {
        Self::with_code(codes::NOT_NULL_VIOLATION, message)
    }

    pub fn connection_failed(message: impl Into<String>) -> Self {
        Self::with_code(codes::CONNECTION_FAILURE, message)
    }

    pub fn timeout(message: impl Into<String>) -> Self {
        Self::with_code(codes::QUERY_CANCELED, message)
    }

    pub fn code(&self) -> Option<&str> {
        self.code.as_deref()
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn class(&self) -> ErrorClass {
        ErrorClass::from_code(self.code())
    }

    pub fn is_retryable(&self) -> bool {
        self.class() == ErrorClass::Transient
    }
}

/// Configuration errors.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ConfigError {
    #[error("Invalid value for {field}: {value} - {reason}")]
    InvalidValue {
        field: String,
        value: String,
        reason: String,
    },
}

impl ConfigError {
    pub fn invalid(field: &str, value: impl ToString, reason: &str) -> Self {
        ConfigError::InvalidValue {
            field: field.to_string(),
            value: value.to_string(),
            reason: reason.to_string(),
        }
    }
}

/// Master error type for all Motorway errors.
#[derive(Debug, Clone, Error)]
pub enum MotorwayError {
    #[error("Storage error: {0}")]
    Storage(#[from] StorageError),

    #[error("Config error: {0}")]
    Config(#[from] ConfigError),
}

/// Result type alias for Motorway operations.
pub type MotorwayResult<T> = Result<T, MotorwayError>;

/// Result type returned by the storage collaborator.
pub type StorageResult<T> = Result<T, StorageError>;

// =============================================================================
// TESTS
// =============================================================================
