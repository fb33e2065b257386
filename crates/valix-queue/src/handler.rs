//! Job handler contract between the queue worker and its consumers.

use async_trait::async_trait;
use thiserror::Error;

use crate::queue::QueuedJob;

/// Failure reported by a job handler.
///
/// The retryable/permanent split decides whether the worker schedules the
/// job again or moves it straight to `dead`.
#[derive(Debug, Error)]
pub enum HandlerError {
    /// Transient failure; the job should run again after backoff.
    #[error("{0}")]
    Retryable(String),

    /// Permanent failure; retrying would not help.
    #[error("{0}")]
    Permanent(String),
}

impl HandlerError {
    #[must_use]
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Retryable(_))
    }

    pub fn retryable(err: impl std::fmt::Display) -> Self {
        Self::Retryable(err.to_string())
    }

    pub fn permanent(err: impl std::fmt::Display) -> Self {
        Self::Permanent(err.to_string())
    }
}

/// Consumer of one job type.
#[async_trait]
pub trait JobHandler: Send + Sync {
    /// Execute one job. Runs under the job's wall-clock timeout; a timeout
    /// abort is treated as a retryable failure by the worker.
    async fn handle(&self, job: &QueuedJob) -> Result<(), HandlerError>;

    /// Called once when a job is about to go dead (permanent failure, or
    /// attempt budget spent). Lets a consumer record a terminal outcome of
    /// its own; the job itself is already lost.
    async fn on_exhausted(&self, _job: &QueuedJob, _error: &HandlerError) {}
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retryable_classification() {
        assert!(HandlerError::retryable("connection reset").is_retryable());
        assert!(!HandlerError::permanent("bad payload").is_retryable());
    }

    #[test]
    fn test_display_passthrough() {
        assert_eq!(
            HandlerError::retryable("connection reset").to_string(),
            "connection reset"
        );
    }
}
