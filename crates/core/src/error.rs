//! Error types for the ToF domain.
//!
//! Uses `thiserror` for ergonomic error definitions.
//! Each external capability has its own error enum; the top-level [`Error`]
//! folds them into the engine's taxonomy.
//!
//! Failed validations and unrecoverable contexts are *not* errors; they are
//! ordinary return values (`ValidationResult::passed == false`,
//! `RecoverySource::Unrecovered`). Only unknown ids and infrastructure faults
//! show up here.

use thiserror::Error;

use crate::context::ContextState;

/// The top-level error type for all ToF operations.
#[derive(Debug, Error)]
pub enum Error {
    /// No context is registered under this id.
    #[error("Context not found: {0}")]
    NotFound(String),

    /// The embedding or index capability failed. `retryable` carries the
    /// capability error's own classification.
    #[error("External service unavailable ({service}): {reason}")]
    ExternalServiceUnavailable {
        service: String,
        reason: String,
        retryable: bool,
    },

    /// A lifecycle transition the state machine does not permit.
    #[error("Invalid state transition for {context_id}: {from} -> {to}")]
    InvalidTransition {
        context_id: String,
        from: ContextState,
        to: ContextState,
    },

    #[error("Configuration error: {message}")]
    Config { message: String },

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl Error {
    /// Whether retrying the failed call may succeed.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            Error::ExternalServiceUnavailable {
                retryable: true,
                ..
            }
        )
    }
}

impl From<IndexError> for Error {
    fn from(err: IndexError) -> Self {
        Error::ExternalServiceUnavailable {
            service: "semantic_index".into(),
            reason: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

impl From<EmbeddingError> for Error {
    fn from(err: EmbeddingError) -> Self {
        Error::ExternalServiceUnavailable {
            service: "embedding".into(),
            reason: err.to_string(),
            retryable: err.is_retryable(),
        }
    }
}

/// Result type alias using our Error.
pub type Result<T> = std::result::Result<T, Error>;

// --- Capability errors ---

#[derive(Debug, Clone, Error)]
pub enum IndexError {
    #[error("Index unreachable: {0}")]
    Unavailable(String),

    #[error("Index request failed: {message} (status: {status_code})")]
    Request { status_code: u16, message: String },

    #[error("Index request timed out: {0}")]
    Timeout(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Invalid index payload: {0}")]
    InvalidPayload(String),

    #[error("Index storage error: {0}")]
    Storage(String),
}

impl IndexError {
    /// Unreachability, timeouts, rate limits and server-side failures are
    /// transient; everything else will fail the same way again.
    pub fn is_retryable(&self) -> bool {
        match self {
            IndexError::Unavailable(_) | IndexError::Timeout(_) => true,
            IndexError::Request { status_code, .. } => {
                *status_code == 429 || *status_code >= 500
            }
            _ => false,
        }
    }
}

#[derive(Debug, Clone, Error)]
pub enum EmbeddingError {
    #[error("Embedding provider unreachable: {0}")]
    Unavailable(String),

    #[error("Embedding request failed: {message} (status: {status_code})")]
    ApiError { status_code: u16, message: String },

    #[error("Rate limited by embedding provider, retry after {retry_after_secs}s")]
    RateLimited { retry_after_secs: u64 },

    #[error("Authentication failed: {0}")]
    AuthenticationFailed(String),

    #[error("Embedding dimension mismatch for {model}: expected {expected}, got {actual}")]
    DimensionMismatch {
        model: String,
        expected: usize,
        actual: usize,
    },
}

impl EmbeddingError {
    pub fn is_retryable(&self) -> bool {
        match self {
            EmbeddingError::Unavailable(_) | EmbeddingError::RateLimited { .. } => true,
            EmbeddingError::ApiError { status_code, .. } => *status_code >= 500,
            _ => false,
        }
    }
}
