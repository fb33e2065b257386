//! Persistence layer for valix.
//!
//! Validation lifecycle records and the webhook delivery audit trail, backed
//! by Postgres via sqlx. Components never share in-memory state; this store
//! is the single source of truth between the API, the orchestrator, and the
//! delivery engine.

pub mod error;
pub mod migrations;
pub mod models;

pub use error::DbError;
pub use migrations::run_migrations;
pub use models::{
    DeliveryStatus, NewValidation, NewWebhookDelivery, Validation, ValidationStatus,
    WebhookDelivery,
};
