//! Durable job queue for valix.
//!
//! Jobs live in the `jobs` table and are claimed with
//! `FOR UPDATE SKIP LOCKED`, so multiple workers can drain the same queue
//! without double-claiming. Delivery is at-least-once: a worker crash leaves
//! a `processing` row whose lock is released by the stale sweep, and the job
//! runs again from scratch. Idempotency is the consumer's responsibility.

pub mod handler;
pub mod queue;
pub mod worker;

pub use handler::{HandlerError, JobHandler};
pub use queue::{JobQueue, JobStatus, JobType, NewJob, QueueError, QueuedJob};
pub use worker::{Worker, WorkerConfig};
