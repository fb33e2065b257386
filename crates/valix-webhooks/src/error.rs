//! Webhook delivery error types.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum WebhookError {
    /// The destination URL is not a well-formed http(s) URL.
    #[error("Invalid webhook URL: {0}")]
    InvalidUrl(String),

    /// Every attempt failed; the caller's outer retry policy decides next.
    #[error("Webhook delivery failed after {attempts} attempts")]
    Exhausted { attempts: u32 },

    /// Audit record update failed.
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// The payload snapshot could not be serialized.
    #[error("Payload serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
