use serde::Deserialize;
use thiserror::Error;

/// Every failure the console can observe, in three recoverable kinds.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum OrderError {
    /// Client-side precondition failure; never reaches the network.
    #[error("validation failed: {0}")]
    Validation(String),
    /// The service explicitly reported that the order does not exist.
    #[error("order {0} not found")]
    NotFound(String),
    /// Anything else: connectivity, timeout, malformed body, unexpected status.
    #[error("order service unavailable: {0}")]
    Transport(String),
}

impl OrderError {
    pub fn validation(message: impl Into<String>) -> Self {
        Self::Validation(message.into())
    }

    pub fn not_found(code: impl Into<String>) -> Self {
        Self::NotFound(code.into())
    }

    pub fn transport(message: impl Into<String>) -> Self {
        Self::Transport(message.into())
    }
}

/// Error body returned by the order service, e.g. `{"detail": "Orden no encontrada"}`.
#[derive(Debug, Clone, Deserialize)]
pub struct ServiceErrorBody {
    pub detail: String,
}
