//! Postgres-backed job queue operations.

use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use thiserror::Error;
use uuid::Uuid;

use valix_core::backoff_delay;

/// Default bounded attempt budget per job.
pub const DEFAULT_MAX_ATTEMPTS: i32 = 3;

/// Base delay for queue-level retries.
pub const RETRY_BASE: Duration = Duration::from_secs(2);

/// Cap on queue-level retry delay.
pub const RETRY_CAP: Duration = Duration::from_secs(60);

/// How long a claimed job may sit in `processing` before the stale sweep
/// returns it to `pending`.
pub const STALE_LOCK_AFTER: Duration = Duration::from_secs(600);

/// Queue operation errors.
#[derive(Debug, Error)]
pub enum QueueError {
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("Failed to serialize job payload: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Job not found: {0}")]
    JobNotFound(Uuid),
}

/// The two kinds of work the queue carries.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobType {
    Validation,
    Webhook,
}

impl JobType {
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Validation => "validation",
            Self::Webhook => "webhook",
        }
    }
}

impl std::fmt::Display for JobType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Lifecycle status of a queued job.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Type, Serialize, Deserialize)]
#[sqlx(type_name = "job_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Ready to be claimed once `next_run_at` has passed.
    #[default]
    Pending,
    /// Claimed by a worker.
    Processing,
    /// Handler finished successfully.
    Completed,
    /// Transient failure; will run again after backoff.
    Failed,
    /// Attempt budget exhausted or permanent failure; never runs again.
    Dead,
}

/// A job claimed from the queue.
#[derive(Debug, Clone, FromRow)]
pub struct QueuedJob {
    pub id: Uuid,
    pub job_type: String,
    pub payload: serde_json::Value,
    pub status: JobStatus,
    pub attempts: i32,
    pub max_attempts: i32,
    /// Outer wall-clock budget for one execution, enforced by the worker.
    pub timeout_secs: i32,
    pub next_run_at: DateTime<Utc>,
    pub locked_at: Option<DateTime<Utc>>,
    pub locked_by: Option<String>,
    pub last_error: Option<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl QueuedJob {
    /// Deserialize the payload into a concrete job type.
    pub fn payload_as<T: serde::de::DeserializeOwned>(&self) -> Result<T, QueueError> {
        Ok(serde_json::from_value(self.payload.clone())?)
    }
}

/// Data for enqueueing a new job.
#[derive(Debug, Clone)]
pub struct NewJob {
    pub job_type: JobType,
    pub payload: serde_json::Value,
    pub max_attempts: i32,
    pub timeout: Duration,
}

impl NewJob {
    /// Build a job with the default attempt budget and a 300s timeout.
    pub fn new<T: Serialize>(job_type: JobType, payload: &T) -> Result<Self, QueueError> {
        Ok(Self {
            job_type,
            payload: serde_json::to_value(payload)?,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            timeout: Duration::from_secs(300),
        })
    }

    #[must_use]
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    #[must_use]
    pub fn with_max_attempts(mut self, max_attempts: i32) -> Self {
        self.max_attempts = max_attempts;
        self
    }
}

/// Durable work queue over the `jobs` table.
#[derive(Clone)]
pub struct JobQueue {
    pool: PgPool,
}

impl JobQueue {
    #[must_use]
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Get a reference to the connection pool.
    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }

    /// Enqueue a job, returning its id.
    pub async fn enqueue(&self, job: NewJob) -> Result<Uuid, QueueError> {
        let id = Uuid::new_v4();
        sqlx::query(
            r#"
            INSERT INTO jobs (id, job_type, payload, status, max_attempts, timeout_secs)
            VALUES ($1, $2, $3, 'pending', $4, $5)
            "#,
        )
        .bind(id)
        .bind(job.job_type.as_str())
        .bind(&job.payload)
        .bind(job.max_attempts)
        .bind(job.timeout.as_secs() as i32)
        .execute(&self.pool)
        .await?;

        tracing::debug!(job_id = %id, job_type = %job.job_type, "Job enqueued");
        Ok(id)
    }

    /// Claim up to `batch_size` ready jobs of one type.
    ///
    /// Uses `FOR UPDATE SKIP LOCKED` so concurrent workers never claim the
    /// same row; claimed rows move to `processing` in the same statement.
    pub async fn dequeue(
        &self,
        job_type: JobType,
        worker_id: &str,
        batch_size: i32,
    ) -> Result<Vec<QueuedJob>, QueueError> {
        let jobs = sqlx::query_as::<_, QueuedJob>(
            r#"
            UPDATE jobs
            SET status = 'processing',
                attempts = attempts + 1,
                locked_at = NOW(),
                locked_by = $2,
                updated_at = NOW()
            WHERE id IN (
                SELECT id FROM jobs
                WHERE job_type = $1
                  AND status = 'pending'
                  AND next_run_at <= NOW()
                ORDER BY next_run_at
                LIMIT $3
                FOR UPDATE SKIP LOCKED
            )
            RETURNING *
            "#,
        )
        .bind(job_type.as_str())
        .bind(worker_id)
        .bind(batch_size)
        .fetch_all(&self.pool)
        .await?;

        Ok(jobs)
    }

    /// Mark a job completed.
    pub async fn complete(&self, job_id: Uuid) -> Result<(), QueueError> {
        sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'completed', locked_at = NULL, locked_by = NULL, updated_at = NOW()
            WHERE id = $1
            "#,
        )
        .bind(job_id)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    /// Mark a job failed.
    ///
    /// A retryable failure with attempts remaining goes back to `pending`
    /// with `next_run_at` pushed out by the backoff delay; otherwise the job
    /// is dead.
    pub async fn fail(&self, job: &QueuedJob, error: &str, retryable: bool) -> Result<(), QueueError> {
        let retry = retryable && job.attempts < job.max_attempts;

        if retry {
            let delay = backoff_delay(job.attempts as u32, RETRY_BASE, RETRY_CAP);
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'pending',
                    next_run_at = NOW() + make_interval(secs => $2),
                    locked_at = NULL,
                    locked_by = NULL,
                    last_error = $3,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job.id)
            .bind(delay.as_secs_f64())
            .bind(error)
            .execute(&self.pool)
            .await?;

            tracing::warn!(
                job_id = %job.id,
                attempts = job.attempts,
                max_attempts = job.max_attempts,
                delay_secs = delay.as_secs(),
                "Job failed, scheduled for retry"
            );
        } else {
            sqlx::query(
                r#"
                UPDATE jobs
                SET status = 'dead',
                    locked_at = NULL,
                    locked_by = NULL,
                    last_error = $2,
                    updated_at = NOW()
                WHERE id = $1
                "#,
            )
            .bind(job.id)
            .bind(error)
            .execute(&self.pool)
            .await?;

            tracing::error!(
                job_id = %job.id,
                attempts = job.attempts,
                error = %error,
                "Job exhausted its attempt budget"
            );
        }

        Ok(())
    }

    /// Return stuck `processing` jobs to `pending`.
    ///
    /// Covers workers that died mid-job; redelivery happens on the next poll.
    pub async fn release_stale(&self) -> Result<u64, QueueError> {
        let result = sqlx::query(
            r#"
            UPDATE jobs
            SET status = 'pending', locked_at = NULL, locked_by = NULL, updated_at = NOW()
            WHERE status = 'processing'
              AND locked_at < NOW() - make_interval(secs => $1)
            "#,
        )
        .bind(STALE_LOCK_AFTER.as_secs_f64())
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_job_type_labels() {
        assert_eq!(JobType::Validation.as_str(), "validation");
        assert_eq!(JobType::Webhook.as_str(), "webhook");
    }

    #[test]
    fn test_new_job_defaults() {
        let job = NewJob::new(JobType::Webhook, &serde_json::json!({"k": "v"})).unwrap();
        assert_eq!(job.max_attempts, DEFAULT_MAX_ATTEMPTS);
        assert_eq!(job.timeout, Duration::from_secs(300));
    }

    #[test]
    fn test_new_job_builder() {
        let job = NewJob::new(JobType::Validation, &serde_json::json!({}))
            .unwrap()
            .with_timeout(Duration::from_secs(60))
            .with_max_attempts(5);
        assert_eq!(job.timeout, Duration::from_secs(60));
        assert_eq!(job.max_attempts, 5);
    }

    #[test]
    fn test_payload_roundtrip() {
        #[derive(Serialize, Deserialize, PartialEq, Debug)]
        struct P {
            name: String,
        }

        let job = QueuedJob {
            id: Uuid::new_v4(),
            job_type: "webhook".to_string(),
            payload: serde_json::json!({"name": "hook"}),
            status: JobStatus::Processing,
            attempts: 1,
            max_attempts: 3,
            timeout_secs: 300,
            next_run_at: Utc::now(),
            locked_at: Some(Utc::now()),
            locked_by: Some("worker-1".to_string()),
            last_error: None,
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };

        let p: P = job.payload_as().unwrap();
        assert_eq!(
            p,
            P {
                name: "hook".to_string()
            }
        );
    }
}
