//! Error types for the model tracker.
//!
//! Storage, validation and upstream-ingestion failures share one error enum so
//! the server can map them to HTTP status codes and the crawlers can decide
//! which failures are worth retrying.

use std::path::PathBuf;
use thiserror::Error;

/// Main error type for the tracker library.
#[derive(Debug, Error)]
pub enum TrackerError {
    // Network errors
    #[error("Network error: {message}")]
    Network {
        message: String,
        /// Optional cause description
        cause: Option<String>,
    },

    #[error("Request timeout after {0:?}")]
    Timeout(std::time::Duration),

    #[error("Rate limited by {service}, retry after {retry_after_secs:?} seconds")]
    RateLimited {
        service: String,
        retry_after_secs: Option<u64>,
    },

    #[error("{url} returned HTTP {status}")]
    HttpStatus { url: String, status: u16 },

    // Database errors
    #[error("Database error: {message}")]
    Database {
        message: String,
        #[source]
        source: Option<rusqlite::Error>,
    },

    /// A write referenced a row that does not exist (e.g. a snapshot for an
    /// unknown model).
    #[error("Data integrity violation: {message}")]
    Integrity { message: String },

    // File system errors
    #[error("IO error at {path:?}: {message}")]
    Io {
        message: String,
        path: Option<PathBuf>,
        #[source]
        source: Option<std::io::Error>,
    },

    // Serialization errors
    #[error("JSON error: {message}")]
    Json {
        message: String,
        #[source]
        source: Option<serde_json::Error>,
    },

    #[error("Failed to parse {what}: {message}")]
    Parse { what: String, message: String },

    // Model registry errors
    #[error("Model not found: {model_id}")]
    ModelNotFound { model_id: String },

    // Configuration errors
    #[error("Configuration error: {message}")]
    Config { message: String },

    // Validation errors
    #[error("Validation error for {field}: {message}")]
    Validation { field: String, message: String },

    // Generic errors
    #[error("{0}")]
    Other(String),
}

/// Result type alias for tracker operations.
pub type Result<T> = std::result::Result<T, TrackerError>;

impl From<std::io::Error> for TrackerError {
    fn from(err: std::io::Error) -> Self {
        TrackerError::Io {
            message: err.to_string(),
            path: None,
            source: Some(err),
        }
    }
}

impl From<serde_json::Error> for TrackerError {
    fn from(err: serde_json::Error) -> Self {
        TrackerError::Json {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<rusqlite::Error> for TrackerError {
    fn from(err: rusqlite::Error) -> Self {
        if let rusqlite::Error::SqliteFailure(ffi_err, msg) = &err {
            if ffi_err.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_FOREIGNKEY {
                return TrackerError::Integrity {
                    message: msg
                        .clone()
                        .unwrap_or_else(|| "FOREIGN KEY constraint failed".to_string()),
                };
            }
        }
        TrackerError::Database {
            message: err.to_string(),
            source: Some(err),
        }
    }
}

impl From<reqwest::Error> for TrackerError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_timeout() {
            TrackerError::Timeout(std::time::Duration::from_secs(0))
        } else {
            TrackerError::Network {
                message: err.to_string(),
                cause: err.url().map(|u| u.to_string()),
            }
        }
    }
}

impl TrackerError {
    /// Create a validation error for a request field.
    pub fn validation(field: impl Into<String>, message: impl Into<String>) -> Self {
        TrackerError::Validation {
            field: field.into(),
            message: message.into(),
        }
    }

    /// Create a parse error for an upstream payload.
    pub fn parse(what: impl Into<String>, message: impl std::fmt::Display) -> Self {
        TrackerError::Parse {
            what: what.into(),
            message: message.to_string(),
        }
    }

    /// Whether the caller sent a bad request (as opposed to a server-side
    /// failure).
    pub fn is_client_error(&self) -> bool {
        matches!(self, TrackerError::Validation { .. })
    }

    /// Check if this error should trigger a retry.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            TrackerError::Network { .. }
                | TrackerError::Timeout(_)
                | TrackerError::RateLimited { .. }
        ) || matches!(
            self,
            TrackerError::HttpStatus { status, .. } if matches!(*status, 408 | 500 | 502 | 503 | 504)
        )
    }
}
