//! Queue worker.
//!
//! Polls one job type, runs claimed jobs through a [`JobHandler`] with
//! bounded concurrency and a per-job wall-clock timeout, and periodically
//! releases stale locks left by dead workers.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::Semaphore;
use tokio::time::interval;
use tracing::{debug, error, info, warn};

use crate::handler::{HandlerError, JobHandler};
use crate::queue::{JobQueue, JobType, QueuedJob};

/// Worker configuration.
#[derive(Debug, Clone)]
pub struct WorkerConfig {
    /// Number of jobs processed concurrently.
    pub concurrency: usize,

    /// How often to poll the queue.
    pub poll_interval: Duration,

    /// How often to release stale locks.
    pub stale_release_interval: Duration,

    /// Maximum jobs claimed per poll.
    pub batch_size: i32,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            concurrency: 4,
            poll_interval: Duration::from_secs(1),
            stale_release_interval: Duration::from_secs(300),
            batch_size: 10,
        }
    }
}

/// A worker pool draining one job type.
pub struct Worker {
    queue: JobQueue,
    job_type: JobType,
    handler: Arc<dyn JobHandler>,
    worker_id: String,
    config: WorkerConfig,
    shutdown: Arc<AtomicBool>,
}

impl Worker {
    pub fn new(
        queue: JobQueue,
        job_type: JobType,
        handler: Arc<dyn JobHandler>,
        config: WorkerConfig,
    ) -> Self {
        let worker_id = format!("{}-{}", job_type, uuid::Uuid::new_v4());
        Self {
            queue,
            job_type,
            handler,
            worker_id,
            config,
            shutdown: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Run the poll loop until shutdown is requested.
    pub async fn run(&self) {
        info!(
            worker_id = %self.worker_id,
            job_type = %self.job_type,
            concurrency = self.config.concurrency,
            "Starting queue worker"
        );

        let semaphore = Arc::new(Semaphore::new(self.config.concurrency));
        let mut poll_interval = interval(self.config.poll_interval);
        let mut stale_interval = interval(self.config.stale_release_interval);

        loop {
            tokio::select! {
                _ = poll_interval.tick() => {
                    if self.shutdown.load(Ordering::Relaxed) {
                        info!(worker_id = %self.worker_id, "Worker shutdown requested, stopping poll loop");
                        break;
                    }
                    self.poll_and_process(&semaphore).await;
                }
                _ = stale_interval.tick() => {
                    self.release_stale().await;
                }
            }
        }

        // Wait for in-flight jobs to complete.
        let _ = semaphore
            .acquire_many(self.config.concurrency as u32)
            .await;
        info!(worker_id = %self.worker_id, "Worker stopped");
    }

    /// Request graceful shutdown.
    pub fn shutdown(&self) {
        self.shutdown.store(true, Ordering::Relaxed);
    }

    async fn poll_and_process(&self, semaphore: &Arc<Semaphore>) {
        let jobs = match self
            .queue
            .dequeue(self.job_type, &self.worker_id, self.config.batch_size)
            .await
        {
            Ok(jobs) => jobs,
            Err(e) => {
                error!(error = %e, "Failed to dequeue jobs");
                return;
            }
        };

        if jobs.is_empty() {
            return;
        }

        debug!(count = jobs.len(), job_type = %self.job_type, "Claimed jobs");

        for job in jobs {
            let permit = match semaphore.clone().try_acquire_owned() {
                Ok(p) => p,
                Err(_) => {
                    debug!("All worker slots busy, skipping remaining jobs");
                    return;
                }
            };

            let queue = self.queue.clone();
            let handler = self.handler.clone();

            tokio::spawn(async move {
                let _permit = permit; // Hold until the job finishes.
                process_job(queue, handler, job).await;
            });
        }
    }

    async fn release_stale(&self) {
        match self.queue.release_stale().await {
            Ok(count) if count > 0 => {
                warn!(count, "Released stale job locks");
            }
            Ok(_) => {}
            Err(e) => {
                error!(error = %e, "Failed to release stale job locks");
            }
        }
    }
}

/// Run a single claimed job through the handler, under its timeout.
async fn process_job(queue: JobQueue, handler: Arc<dyn JobHandler>, job: QueuedJob) {
    let job_id = job.id;
    let timeout = Duration::from_secs(job.timeout_secs.max(1) as u64);
    let start = std::time::Instant::now();

    debug!(job_id = %job_id, attempts = job.attempts, "Processing job");

    let outcome = match tokio::time::timeout(timeout, handler.handle(&job)).await {
        Ok(result) => result,
        Err(_) => Err(HandlerError::retryable(format!(
            "job timed out after {}s",
            timeout.as_secs()
        ))),
    };

    let duration_ms = start.elapsed().as_millis() as u64;

    match outcome {
        Ok(()) => {
            debug!(job_id = %job_id, duration_ms, "Job completed");
            if let Err(e) = queue.complete(job_id).await {
                error!(job_id = %job_id, error = %e, "Failed to mark job completed");
            }
        }
        Err(e) => {
            warn!(
                job_id = %job_id,
                duration_ms,
                attempts = job.attempts,
                error = %e,
                "Job failed"
            );
            let exhausted = !e.is_retryable() || job.attempts >= job.max_attempts;
            if let Err(qe) = queue.fail(&job, &e.to_string(), e.is_retryable()).await {
                error!(job_id = %job_id, error = %qe, "Failed to record job failure");
            }
            if exhausted {
                handler.on_exhausted(&job, &e).await;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_worker_config_default() {
        let config = WorkerConfig::default();
        assert_eq!(config.concurrency, 4);
        assert_eq!(config.poll_interval, Duration::from_secs(1));
        assert_eq!(config.batch_size, 10);
    }
}
