//! Orchestration error types.

use thiserror::Error;

use valix_queue::QueueError;
use valix_webhooks::WebhookError;

#[derive(Debug, Error)]
pub enum OrchestratorError {
    /// The submission was rejected before anything was persisted or enqueued.
    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Queue error: {0}")]
    Queue(#[from] QueueError),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

impl From<WebhookError> for OrchestratorError {
    fn from(err: WebhookError) -> Self {
        match err {
            WebhookError::InvalidUrl(msg) => Self::InvalidRequest(format!("webhook_url: {msg}")),
            other => Self::InvalidRequest(other.to_string()),
        }
    }
}
