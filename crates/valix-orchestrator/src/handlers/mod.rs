//! Queue consumers for the two job types.

mod validation;
mod webhook;

pub use validation::ValidationJobHandler;
pub use webhook::WebhookJobHandler;
