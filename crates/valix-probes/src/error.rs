//! Capability provider error types.

use thiserror::Error;

/// Error raised by a capability provider operation.
#[derive(Debug, Error)]
pub enum ProviderError {
    /// Authentication against the provider failed.
    #[error("Authentication error: {0}")]
    Auth(String),

    /// The management API rejected the call.
    #[error("API error {status}: {message}")]
    Api { status: u16, message: String },

    /// HTTP transport error.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// Response body could not be parsed.
    #[error("Invalid response: {0}")]
    InvalidResponse(String),

    /// A long-running operation did not reach a terminal state in time.
    #[error("Operation timed out: {0}")]
    OperationTimeout(String),
}

pub type ProviderResult<T> = Result<T, ProviderError>;
