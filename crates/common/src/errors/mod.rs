//! Error types for the EBMS review core
//!
//! Provides a comprehensive error handling system with:
//! - The review taxonomy (stale transitions, scope failures, bad decision codes, lost races)
//! - HTTP status code mapping
//! - Structured error responses
//! - Error codes for client handling

use crate::domain::PairKey;
use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
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
    InvalidDecisionCode,

    // Authentication errors (2xxx)
    Unauthenticated,
    ExpiredToken,

    // Authorization errors (3xxx)
    Unauthorized,

    // Resource errors (4xxx)
    NotFound,

    // Conflict errors (5xxx)
    InvalidTransition,
    ConcurrentModification,

    // Database errors (7xxx)
    DatabaseError,
    ConnectionError,

    // External service errors (8xxx)
    ActivityError,

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
            ErrorCode::InvalidDecisionCode => 1002,

            ErrorCode::Unauthenticated => 2001,
            ErrorCode::ExpiredToken => 2002,

            ErrorCode::Unauthorized => 3001,

            ErrorCode::NotFound => 4001,

            ErrorCode::InvalidTransition => 5001,
            ErrorCode::ConcurrentModification => 5002,

            ErrorCode::DatabaseError => 7001,
            ErrorCode::ConnectionError => 7002,

            ErrorCode::ActivityError => 8001,

            ErrorCode::InternalError => 9001,
            ErrorCode::ConfigurationError => 9002,
            ErrorCode::SerializationError => 9003,
        }
    }
}

/// Application error types
#[derive(Error, Debug)]
pub enum AppError {
    // Validation errors
    #[error("Validation failed: {message}")]
    Validation {
        message: String,
        field: Option<String>,
    },

    #[error("Decision code {code} is not valid for the {queue} queue")]
    InvalidDecisionCode { queue: String, code: String },

    // Authentication errors
    #[error("Unauthenticated: {message}")]
    Unauthenticated { message: String },

    #[error("Token expired")]
    ExpiredToken,

    // Authorization errors
    #[error("Unauthorized: {message}")]
    Unauthorized { message: String },

    // Resource errors
    #[error("Resource not found: {resource_type} with id {id}")]
    NotFound { resource_type: String, id: String },

    // State errors
    #[error("Invalid transition for {pair}: expected state {expected}, found {actual}")]
    InvalidTransition {
        pair: PairKey,
        expected: String,
        actual: String,
    },

    #[error("Concurrent modification of {pair}: current state changed before the write")]
    ConcurrentModification { pair: PairKey },

    // Database errors
    #[error("Database error: {0}")]
    Database(#[from] sea_orm::DbErr),

    #[error("Database connection error: {message}")]
    DatabaseConnection { message: String },

    // External service errors
    #[error("Activity publisher error: {message}")]
    ActivityError { message: String },

    // Internal errors
    #[error("Internal server error: {message}")]
    Internal { message: String },

    #[error("Configuration error: {message}")]
    Configuration { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    // Generic
    #[error("{0}")]
    Other(#[from] anyhow::Error),
}

impl AppError {
    /// Shorthand for a missing entity
    pub fn not_found(resource_type: &str, id: impl ToString) -> Self {
        AppError::NotFound {
            resource_type: resource_type.to_string(),
            id: id.to_string(),
        }
    }

    /// Shorthand for a validation failure tied to one input field
    pub fn validation(field: &str, message: impl Into<String>) -> Self {
        AppError::Validation {
            message: message.into(),
            field: Some(field.to_string()),
        }
    }

    /// Get the error code for this error
    pub fn code(&self) -> ErrorCode {
        match self {
            AppError::Validation { .. } => ErrorCode::ValidationError,
            AppError::InvalidDecisionCode { .. } => ErrorCode::InvalidDecisionCode,
            AppError::Unauthenticated { .. } => ErrorCode::Unauthenticated,
            AppError::ExpiredToken => ErrorCode::ExpiredToken,
            AppError::Unauthorized { .. } => ErrorCode::Unauthorized,
            AppError::NotFound { .. } => ErrorCode::NotFound,
            AppError::InvalidTransition { .. } => ErrorCode::InvalidTransition,
            AppError::ConcurrentModification { .. } => ErrorCode::ConcurrentModification,
            AppError::Database(_) => ErrorCode::DatabaseError,
            AppError::DatabaseConnection { .. } => ErrorCode::ConnectionError,
            AppError::ActivityError { .. } => ErrorCode::ActivityError,
            AppError::Internal { .. } => ErrorCode::InternalError,
            AppError::Configuration { .. } => ErrorCode::ConfigurationError,
            AppError::Serialization(_) => ErrorCode::SerializationError,
            AppError::Other(_) => ErrorCode::InternalError,
        }
    }

    /// Get the HTTP status code for this error
    pub fn status_code(&self) -> StatusCode {
        match self {
            // 400 Bad Request
            AppError::Validation { .. } => StatusCode::BAD_REQUEST,

            // 401 Unauthorized
            AppError::Unauthenticated { .. } | AppError::ExpiredToken => StatusCode::UNAUTHORIZED,

            // 403 Forbidden
            AppError::Unauthorized { .. } => StatusCode::FORBIDDEN,

            // 404 Not Found
            AppError::NotFound { .. } => StatusCode::NOT_FOUND,

            // 409 Conflict
            AppError::InvalidTransition { .. } | AppError::ConcurrentModification { .. } => {
                StatusCode::CONFLICT
            }

            // 422 Unprocessable Entity
            AppError::InvalidDecisionCode { .. } => StatusCode::UNPROCESSABLE_ENTITY,

            // 500 Internal Server Error
            AppError::Database(_)
            | AppError::DatabaseConnection { .. }
            | AppError::Internal { .. }
            | AppError::Configuration { .. }
            | AppError::Serialization(_)
            | AppError::Other(_) => StatusCode::INTERNAL_SERVER_ERROR,

            // 503 Service Unavailable
            AppError::ActivityError { .. } => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// A lost compare-and-swap; the only failure worth re-reading and retrying
    pub fn is_retryable(&self) -> bool {
        matches!(self, AppError::ConcurrentModification { .. })
    }

    /// Check if this error should be logged at error level
    pub fn is_server_error(&self) -> bool {
        self.status_code().is_server_error()
    }

    /// Check if this error is a client error
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }
}

/// Structured error response for API
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: ErrorDetails,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorDetails {
    pub code: ErrorCode,
    pub numeric_code: u16,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub field: Option<String>,
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let code = self.code();
        let message = self.to_string();

        if self.is_server_error() {
            tracing::error!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Server error"
            );
        } else if self.is_client_error() {
            tracing::warn!(
                error = %message,
                code = ?code,
                status = status.as_u16(),
                "Client error"
            );
        }

        let field = match &self {
            AppError::Validation { field, .. } => field.clone(),
            _ => None,
        };

        let body = ErrorResponse {
            error: ErrorDetails {
                code,
                numeric_code: code.as_code(),
                message,
                field,
            },
        };

        (status, Json(body)).into_response()
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
    use crate::domain::{ArticleId, TopicId};

    fn pair() -> PairKey {
        PairKey::new(ArticleId(7), TopicId(3))
    }

    #[test]
    fn test_error_code_mapping() {
        let err = AppError::not_found("packet", 12);
        assert_eq!(err.code(), ErrorCode::NotFound);
        assert_eq!(err.status_code(), StatusCode::NOT_FOUND);
        assert_eq!(err.to_string(), "Resource not found: packet with id 12");
    }

    #[test]
    fn test_transition_errors_are_conflicts() {
        let stale = AppError::InvalidTransition {
            pair: pair(),
            expected: "passed_bm_review".into(),
            actual: "passed_full_review".into(),
        };
        let race = AppError::ConcurrentModification { pair: pair() };
        assert_eq!(stale.status_code(), StatusCode::CONFLICT);
        assert_eq!(race.status_code(), StatusCode::CONFLICT);
        assert!(!stale.is_retryable());
        assert!(race.is_retryable());
        assert!(stale.to_string().contains("article 7 / topic 3"));
    }

    #[test]
    fn test_scope_failure_is_forbidden() {
        let err = AppError::Unauthorized {
            message: "not a reviewer for topic 3".into(),
        };
        assert_eq!(err.status_code(), StatusCode::FORBIDDEN);
        assert!(err.is_client_error());
        assert!(!err.is_retryable());
    }

    #[test]
    fn test_server_error() {
        let err = AppError::Internal {
            message: "Something went wrong".into(),
        };
        assert_eq!(err.status_code(), StatusCode::INTERNAL_SERVER_ERROR);
        assert!(err.is_server_error());
    }
}
