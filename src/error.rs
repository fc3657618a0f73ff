//! Error types for the volume gateway
//!
//! Provides the error taxonomy surfaced at the foreign API boundary
//! (`InvalidInput`, `UnsupportedOperation`, `AuthFailure`) together with the
//! internal error variants, and the closed condition set reported by the
//! block-storage backend.

use thiserror::Error;

/// Unified error type for the gateway
#[derive(Error, Debug)]
pub enum Error {
    // =========================================================================
    // Foreign API Errors
    // =========================================================================
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("The requested operation is not supported")]
    UnsupportedOperation,

    #[error("Request context failed authorization")]
    AuthFailure,

    // =========================================================================
    // Collaborator Errors
    // =========================================================================
    #[error("Backend error: {0}")]
    Backend(#[from] BackendError),

    #[error("Identity service error: {0}")]
    Identity(String),

    #[error("Malformed backend response: {0}")]
    MalformedResponse(String),

    // =========================================================================
    // Internal Errors
    // =========================================================================
    #[error("Configuration error: {0}")]
    Configuration(String),

    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Condition set raised by the block-storage backend.
///
/// The gateway maps `NotFound` and `BadRequest` explicitly where the foreign
/// API demands it; everything else propagates unmodified via
/// [`Error::Backend`]. The gateway never retries.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("resource not found: {0}")]
    NotFound(String),

    #[error("bad request: {0}")]
    BadRequest(String),

    #[error("{0}")]
    Other(String),
}

impl Error {
    /// Check if this error is attributable to the caller's request
    pub fn is_client_error(&self) -> bool {
        matches!(
            self,
            Error::InvalidInput(_) | Error::UnsupportedOperation | Error::AuthFailure
        )
    }

    /// Foreign API error code for this error
    pub fn code(&self) -> &'static str {
        match self {
            Error::InvalidInput(_) => "InvalidInput",
            Error::UnsupportedOperation => "UnsupportedOperation",
            Error::AuthFailure => "AuthFailure",
            Error::Backend(_) | Error::MalformedResponse(_) => "InternalError",
            Error::Identity(_) => "InternalError",
            Error::Configuration(_) | Error::Json(_) => "InternalError",
        }
    }
}

/// Result type alias for the gateway
pub type Result<T> = std::result::Result<T, Error>;

/// Result type alias for backend operations
pub type BackendResult<T> = std::result::Result<T, BackendError>;
