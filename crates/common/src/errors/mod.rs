//! Error types for Bibnet
//!
//! Provides a single error enum shared by the fact store and the engine:
//! - Distinct variants for caller-correctable and operator-facing failures
//! - Machine-readable error codes
//! - Severity-aware logging

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;

/// Error codes for machine-readable error identification
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorCode {
    // Validation errors (1xxx)
    ValidationError,
    InvalidRecord,

    // Resource errors (4xxx)
    NotFound,

    // Storage errors (7xxx)
    ConsistencyError,

    // Internal errors (9xxx)
    InternalError,
    ConfigurationError,
    SerializationError,
}

impl ErrorCode {
    /// Get the numeric code for this error
    pub fn as_code(&self) -> u16 {
        match self {
            ErrorCode::ValidationError => 1001,
            ErrorCode::InvalidRecord => 1002,

            ErrorCode::NotFound => 4001,

            ErrorCode::ConsistencyError => 7001,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Invalid record: {0}")]
    InvalidRecord(#[from] validator::ValidationErrors),

    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    /// A join row points at a row that does not exist. Never skipped.
    #[error("Consistency violation: {message}")]
    Consistency { message: String },

    #[error("Internal error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a validation error tied to a request field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    pub fn consistency(message: impl Into<String>) -> Self {
        AppError::Consistency {
            message: message.into(),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidRecord(_) => ErrorCode::InvalidRecord,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::Consistency { .. } => ErrorCode::ConsistencyError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Caller-correctable errors: never retried, surfaced verbatim
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            AppError::Validation { .. } | AppError::InvalidRecord(_) | AppError::NotFound { .. }
        )
    }

    /// Check if this error needs operator attention
    pub fn is_server_error(&self) -> bool {
        !self.is_client_error()
    }

    /// Log the error at a level matching its severity
    pub fn log(&self) {
        let code = self.code();
        if self.is_server_error() {
            tracing::error!(
                error = %self,
                code = ?code,
                numeric_code = code.as_code(),
                "Engine error"
            );
        } else {
            tracing::warn!(
                error = %self,
                code = ?code,
                numeric_code = code.as_code(),
                "Rejected request"
            );
        }
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Internal {
            message: err.to_string(),
        }
    }
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Configuration {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("author", 42);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.code().as_code(), 4001);
        assert_eq!(err.to_string(), "Resource not found: author with id 42");
    }

    #[test]
    fn test_validation_error() {
        let err = AppError::validation("layer", "unknown layer 'venues'");
        assert!(err.is_client_error());
        assert!(!err.is_server_error());
        match err {
            AppError::Validation { field, .. } => assert_eq!(field.as_deref(), Some("layer")),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn test_consistency_error_is_server_side() {
        let err = AppError::consistency("work_authors row references missing work 7");
        assert_eq!(err.code(), ErrorCode::ConsistencyError);
        assert!(err.is_server_error());
    }
}
