//! The delivery loop: bounded retries, exponential backoff, and a read-style
//! fallback for receivers that reject body-bearing requests.

use std::time::Duration;

use sqlx::PgPool;
use tracing::{debug, info, instrument, warn};

use valix_core::backoff::backoff_delay;
use valix_db::models::webhook_delivery::{DeliveryStatus, WebhookDelivery};

use crate::error::WebhookError;
use crate::payload::flatten_to_query_params;

/// Correlation header carrying the delivery-group id.
pub const DELIVERY_ID_HEADER: &str = "X-Webhook-Delivery-Id";

/// Correlation header carrying the validation id.
pub const VALIDATION_ID_HEADER: &str = "X-Validation-Id";

/// Response-body signature of a receiver that only accepts read-style
/// requests. Together with a 404 it triggers the GET fallback.
const WRONG_TRANSPORT_MARKER: &str = "not registered for POST requests";

/// Delivery policy knobs.
#[derive(Debug, Clone)]
pub struct SenderConfig {
    /// Attempts per delivery group before surfacing failure to the caller.
    pub max_retries: u32,

    /// Per-attempt timeout, covering the fallback sub-step separately.
    pub attempt_timeout: Duration,

    /// Exponential backoff base between attempts.
    pub backoff_base: Duration,

    /// Backoff ceiling.
    pub backoff_cap: Duration,
}

impl Default for SenderConfig {
    fn default() -> Self {
        Self {
            max_retries: 3,
            attempt_timeout: Duration::from_secs(30),
            backoff_base: Duration::from_secs(1),
            backoff_cap: Duration::from_secs(30),
        }
    }
}

/// Outcome of one attempt cycle (primary request plus optional fallback).
struct AttemptOutcome {
    status: Option<u16>,
    body: String,
}

impl AttemptOutcome {
    fn is_success(&self) -> bool {
        self.status.is_some_and(|s| (200..300).contains(&s))
    }
}

/// Delivers webhook notifications and keeps the audit record current.
pub struct WebhookSender {
    http: reqwest::Client,
    pool: PgPool,
    config: SenderConfig,
}

impl WebhookSender {
    pub fn new(http: reqwest::Client, pool: PgPool, config: SenderConfig) -> Self {
        Self { http, pool, config }
    }

    /// Run the full attempt loop for one delivery group.
    ///
    /// Every attempt, success included, updates the audit row. Exhausting
    /// the budget returns [`WebhookError::Exhausted`] so the job queue's
    /// outer retry policy can decide whether the group runs again.
    #[instrument(skip(self, delivery), fields(delivery_id = %delivery.id, validation_id = %delivery.validation_id))]
    pub async fn deliver(&self, delivery: &WebhookDelivery) -> Result<(), WebhookError> {
        for attempt in 1..=self.config.max_retries {
            let outcome = self.attempt_once(delivery).await;

            if outcome.is_success() {
                WebhookDelivery::record_attempt(
                    &self.pool,
                    delivery.id,
                    DeliveryStatus::Delivered,
                    attempt as i32,
                    outcome.status.map(i32::from),
                    Some(&outcome.body),
                )
                .await?;
                info!(attempt, "Webhook delivered");
                return Ok(());
            }

            let exhausted = attempt == self.config.max_retries;
            let status = if exhausted {
                DeliveryStatus::Failed
            } else {
                DeliveryStatus::Retrying
            };
            warn!(
                attempt,
                response_status = ?outcome.status,
                "Webhook attempt failed"
            );
            WebhookDelivery::record_attempt(
                &self.pool,
                delivery.id,
                status,
                attempt as i32,
                outcome.status.map(i32::from),
                Some(&outcome.body),
            )
            .await?;

            if !exhausted {
                let delay =
                    backoff_delay(attempt, self.config.backoff_base, self.config.backoff_cap);
                tokio::time::sleep(delay).await;
            }
        }

        Err(WebhookError::Exhausted {
            attempts: self.config.max_retries,
        })
    }

    /// One attempt cycle: primary POST, then the GET fallback when the
    /// receiver signals it only takes read-style requests. The fallback is
    /// part of the same attempt, not a retry of its own.
    async fn attempt_once(&self, delivery: &WebhookDelivery) -> AttemptOutcome {
        let primary = self
            .http
            .post(&delivery.webhook_url)
            .timeout(self.config.attempt_timeout)
            .header(DELIVERY_ID_HEADER, delivery.id.to_string())
            .header(VALIDATION_ID_HEADER, delivery.validation_id.to_string())
            .json(&delivery.payload)
            .send()
            .await;

        let outcome = match primary {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                AttemptOutcome {
                    status: Some(status),
                    body,
                }
            }
            Err(e) => AttemptOutcome {
                status: None,
                body: e.to_string(),
            },
        };

        if !wrong_transport(&outcome) {
            return outcome;
        }

        debug!("Receiver rejects POST, falling back to GET");
        let params = flatten_to_query_params(&delivery.payload);
        let fallback = self
            .http
            .get(&delivery.webhook_url)
            .timeout(self.config.attempt_timeout)
            .header(DELIVERY_ID_HEADER, delivery.id.to_string())
            .header(VALIDATION_ID_HEADER, delivery.validation_id.to_string())
            .query(&params)
            .send()
            .await;

        match fallback {
            Ok(response) => {
                let status = response.status().as_u16();
                let body = response.text().await.unwrap_or_default();
                AttemptOutcome {
                    status: Some(status),
                    body,
                }
            }
            Err(e) => AttemptOutcome {
                status: None,
                body: e.to_string(),
            },
        }
    }
}

fn wrong_transport(outcome: &AttemptOutcome) -> bool {
    outcome.status == Some(404) && outcome.body.contains(WRONG_TRANSPORT_MARKER)
}
