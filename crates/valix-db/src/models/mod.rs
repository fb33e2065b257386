//! Database entity models.

pub mod validation;
pub mod webhook_delivery;

pub use validation::{NewValidation, Validation, ValidationStatus};
pub use webhook_delivery::{DeliveryStatus, NewWebhookDelivery, WebhookDelivery};
