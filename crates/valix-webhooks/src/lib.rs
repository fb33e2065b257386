//! Durable webhook delivery.
//!
//! The [`WebhookSender`] takes an immutable payload snapshot and a
//! destination URL and guarantees bounded delivery attempts with exponential
//! backoff, a read-style fallback transport for receivers that reject POST,
//! and a persisted audit trail covering every attempt.

pub mod error;
pub mod payload;
pub mod sender;
pub mod validation;

pub use error::WebhookError;
pub use payload::{flatten_to_query_params, CredentialsOut, WebhookPayload};
pub use sender::{SenderConfig, WebhookSender};
pub use validation::validate_webhook_url;
