//! Validation lifecycle orchestration.
//!
//! Owns the `ValidationRequest` state machine: [`ValidationService`] accepts
//! submissions and enqueues work; the job handlers drain the queue, run the
//! probe sequence, drive records to a terminal status, and hand completed
//! runs to the webhook delivery engine.

pub mod error;
pub mod handlers;
pub mod jobs;
pub mod service;

pub use error::OrchestratorError;
pub use handlers::{ValidationJobHandler, WebhookJobHandler};
pub use jobs::{JobCredentials, ValidationJobPayload, WebhookJobPayload};
pub use service::{SubmitRequest, ValidationService};
