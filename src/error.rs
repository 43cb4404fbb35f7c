//! Error types for the REC observation API
//!
//! Every fallible operation in the crate returns [`Result`]. Errors carry a
//! human-readable message and map onto an HTTP status when they reach the
//! presentation layer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use thiserror::Error;

/// Result type alias for REC operations
pub type Result<T> = std::result::Result<T, RecError>;

/// Error types for REC operations
#[derive(Error, Debug)]
pub enum RecError {
    /// Store errors (connection loss, constraint violations, decode failures)
    #[error("Database error: {0}")]
    Database(String),

    /// Configuration errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Request payload could not be parsed or is missing required parts
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    /// Envelope was well-formed JSON but did not map to any observation
    #[error("Envelope rejected: {0}")]
    Rejected(String),

    /// Entity or relation lookups that found nothing
    #[error("Not found: {0}")]
    NotFound(String),

    /// JSON parsing errors
    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    /// Generic I/O errors
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Internal errors
    #[error("Internal error: {0}")]
    Internal(String),
}

impl RecError {
    /// Create a store error
    pub fn database<S: Into<String>>(msg: S) -> Self {
        Self::Database(msg.into())
    }

    /// Create a configuration error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    /// Create an invalid input error
    pub fn invalid_input<S: Into<String>>(msg: S) -> Self {
        Self::InvalidInput(msg.into())
    }

    /// Create an envelope rejection
    pub fn rejected<S: Into<String>>(msg: S) -> Self {
        Self::Rejected(msg.into())
    }

    /// Create a not found error
    pub fn not_found<S: Into<String>>(msg: S) -> Self {
        Self::NotFound(msg.into())
    }

    /// Create an internal error
    pub fn internal<S: Into<String>>(msg: S) -> Self {
        Self::Internal(msg.into())
    }

    /// HTTP status this error maps to when surfaced by a handler
    pub fn status_code(&self) -> StatusCode {
        match self {
            RecError::InvalidInput(_) | RecError::Rejected(_) | RecError::Json(_) => {
                StatusCode::BAD_REQUEST
            }
            RecError::NotFound(_) => StatusCode::NOT_FOUND,
            RecError::Database(_)
            | RecError::Config(_)
            | RecError::Io(_)
            | RecError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }

    /// Check if the caller may reasonably retry the failed operation.
    ///
    /// Nothing in this crate retries on its own; this only informs callers.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RecError::Database(_) | RecError::Io(_))
    }

    /// Check if the error was caused by the client's request
    pub fn is_client_error(&self) -> bool {
        self.status_code().is_client_error()
    }

    /// Message safe to hand back to API clients.
    ///
    /// Server-side failures are collapsed to their category so store
    /// internals never leak into responses.
    pub fn sanitized_message(&self) -> String {
        #[cfg(debug_assertions)]
        {
            self.to_string()
        }

        #[cfg(not(debug_assertions))]
        {
            match self {
                RecError::Database(_) => "Database error".to_string(),
                RecError::Config(_) => "Configuration error".to_string(),
                RecError::Io(_) => "I/O error".to_string(),
                RecError::Internal(_) => "Internal error".to_string(),
                _ => self.to_string(),
            }
        }
    }
}

/// Body returned to API clients for failed requests
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub status: u16,
    pub error: String,
}

impl IntoResponse for RecError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!("Request failed: {}", self);
        } else {
            tracing::debug!("Request rejected: {}", self);
        }

        let body = ErrorBody {
            status: status.as_u16(),
            error: self.sanitized_message(),
        };
        (status, Json(body)).into_response()
    }
}

impl From<sqlx::Error> for RecError {
    fn from(err: sqlx::Error) -> Self {
        match err {
            sqlx::Error::RowNotFound => RecError::NotFound("row not found".to_string()),
            other => RecError::Database(other.to_string()),
        }
    }
}

impl From<config::ConfigError> for RecError {
    fn from(err: config::ConfigError) -> Self {
        RecError::Config(err.to_string())
    }
}
