//! Consumer for webhook jobs: replays the stored delivery group through the
//! sender.

use async_trait::async_trait;
use sqlx::PgPool;
use tracing::{debug, instrument};
use uuid::Uuid;

use valix_db::models::webhook_delivery::{DeliveryStatus, NewWebhookDelivery, WebhookDelivery};
use valix_queue::{HandlerError, JobHandler, QueuedJob};
use valix_webhooks::{WebhookError, WebhookSender};

use crate::jobs::WebhookJobPayload;

pub struct WebhookJobHandler {
    pool: PgPool,
    sender: WebhookSender,
}

impl WebhookJobHandler {
    pub fn new(pool: PgPool, sender: WebhookSender) -> Self {
        Self { pool, sender }
    }
}

#[async_trait]
impl JobHandler for WebhookJobHandler {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn handle(&self, job: &QueuedJob) -> Result<(), HandlerError> {
        let payload: WebhookJobPayload = job.payload_as().map_err(HandlerError::permanent)?;

        let delivery = WebhookDelivery::find_by_id(&self.pool, payload.delivery_id)
            .await
            .map_err(HandlerError::retryable)?
            .ok_or_else(|| {
                HandlerError::permanent(format!(
                    "delivery record {} does not exist",
                    payload.delivery_id
                ))
            })?;

        // Redelivered job for a group that already got through: no-op.
        if delivery.status == DeliveryStatus::Delivered {
            debug!(delivery_id = %delivery.id, "Delivery already succeeded, skipping");
            return Ok(());
        }

        // A `failed` group is terminal. When the queue runs the job again,
        // the rerun gets a fresh group carrying the same payload snapshot;
        // the old row keeps its audit trail untouched.
        let delivery = if delivery.status == DeliveryStatus::Failed {
            let fresh = WebhookDelivery::create(
                &self.pool,
                &NewWebhookDelivery {
                    id: Uuid::new_v4(),
                    validation_id: delivery.validation_id,
                    webhook_url: delivery.webhook_url.clone(),
                    payload: delivery.payload.clone(),
                },
            )
            .await
            .map_err(HandlerError::retryable)?;
            debug!(
                superseded = %delivery.id,
                delivery_id = %fresh.id,
                "Failed delivery group superseded by a fresh one"
            );
            fresh
        } else {
            delivery
        };

        self.sender.deliver(&delivery).await.map_err(|e| match e {
            // The engine's own budget is spent; the queue decides whether
            // the whole group runs again.
            WebhookError::Exhausted { .. } => HandlerError::retryable(e),
            WebhookError::Database(_) => HandlerError::retryable(e),
            WebhookError::InvalidUrl(_) | WebhookError::Serialization(_) => {
                HandlerError::permanent(e)
            }
        })
    }
}
