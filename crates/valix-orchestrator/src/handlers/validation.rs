//! Consumer for validation jobs: runs the probe sequence and drives the
//! record to a terminal status.

use std::sync::Arc;

use async_trait::async_trait;
use chrono::Utc;
use secrecy::SecretString;
use sqlx::PgPool;
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use valix_db::models::validation::{Validation, ValidationStatus};
use valix_db::models::webhook_delivery::{NewWebhookDelivery, WebhookDelivery};
use valix_probes::{ProbeExecutor, ProbeReport, ServicePrincipalCredentials};
use valix_queue::{HandlerError, JobHandler, JobQueue, JobType, NewJob, QueuedJob};
use valix_webhooks::{CredentialsOut, WebhookPayload};

use crate::jobs::{ValidationJobPayload, WebhookJobPayload};

pub struct ValidationJobHandler {
    pool: PgPool,
    queue: JobQueue,
    executor: Arc<ProbeExecutor>,
}

impl ValidationJobHandler {
    pub fn new(pool: PgPool, queue: JobQueue, executor: Arc<ProbeExecutor>) -> Self {
        Self {
            pool,
            queue,
            executor,
        }
    }

    /// Create the delivery audit row with its payload snapshot, then enqueue
    /// the notification job pointing at it. Called at most once per terminal
    /// transition, guarded by the status machine.
    async fn enqueue_notification(
        &self,
        validation_id: Uuid,
        webhook_url: &str,
        notification: &WebhookPayload,
    ) -> Result<(), HandlerError> {
        let payload = serde_json::to_value(notification).map_err(HandlerError::permanent)?;
        let delivery = WebhookDelivery::create(
            &self.pool,
            &NewWebhookDelivery {
                id: Uuid::new_v4(),
                validation_id,
                webhook_url: webhook_url.to_string(),
                payload,
            },
        )
        .await
        .map_err(HandlerError::retryable)?;

        self.queue
            .enqueue(NewJob::new(
                JobType::Webhook,
                &WebhookJobPayload {
                    delivery_id: delivery.id,
                    validation_id,
                },
            )
            .map_err(HandlerError::permanent)?)
            .await
            .map_err(HandlerError::retryable)?;

        debug!(%validation_id, delivery_id = %delivery.id, "Webhook job enqueued");
        Ok(())
    }
}

/// Assemble the notification body from the job inputs and the probe report.
fn build_notification(
    payload: &ValidationJobPayload,
    status: ValidationStatus,
    report: &ProbeReport,
) -> WebhookPayload {
    WebhookPayload {
        validation_id: payload.validation_id,
        timestamp: Utc::now(),
        status: status.as_str().to_string(),
        credentials: CredentialsOut {
            tenant_id: payload.credentials.tenant_id.clone(),
            client_id: payload.credentials.client_id.clone(),
            client_secret: payload.credentials.client_secret.clone(),
            display_name: payload.credentials.display_name.clone(),
            subscription_id: payload.subscription_id.clone(),
            valid: report.is_valid,
        },
        permissions: report.permissions.clone(),
        errors: report.errors.clone(),
        storage_account_created: report.storage_account_name.clone(),
        website_url: report.website_url.clone(),
        test_config: serde_json::to_value(&payload.test_config)
            .unwrap_or(serde_json::Value::Null),
    }
}

#[async_trait]
impl JobHandler for ValidationJobHandler {
    #[instrument(skip(self, job), fields(job_id = %job.id))]
    async fn handle(&self, job: &QueuedJob) -> Result<(), HandlerError> {
        let payload: ValidationJobPayload = job.payload_as().map_err(HandlerError::permanent)?;
        let validation_id = payload.validation_id;

        // Claim the record. A redelivered job whose record already reached a
        // terminal status is a no-op: at-least-once delivery, idempotent
        // consumption.
        let claimed = Validation::mark_in_progress(&self.pool, validation_id)
            .await
            .map_err(HandlerError::retryable)?;
        if claimed.is_none() {
            debug!(%validation_id, "Record already terminal, skipping redelivered job");
            return Ok(());
        }

        let credentials = ServicePrincipalCredentials {
            tenant_id: payload.credentials.tenant_id.clone(),
            client_id: payload.credentials.client_id.clone(),
            client_secret: SecretString::new(payload.credentials.client_secret.clone()),
            display_name: payload.credentials.display_name.clone(),
        };

        // The executor captures probe failures in the report; this call does
        // not fail, it concludes.
        let report = self
            .executor
            .run(&credentials, &payload.subscription_id, &payload.test_config)
            .await;

        let status = if report.is_valid {
            ValidationStatus::Valid
        } else {
            ValidationStatus::Invalid
        };
        let report_json = serde_json::to_value(&report).map_err(HandlerError::permanent)?;

        let completed = Validation::mark_completed(&self.pool, validation_id, status, &report_json)
            .await
            .map_err(HandlerError::retryable)?;

        // None means another worker beat us to the terminal transition; it
        // owns the notification too.
        if completed.is_some() {
            info!(%validation_id, status = %status, "Validation completed");
            if let Some(url) = &payload.webhook_url {
                let notification = build_notification(&payload, status, &report);
                self.enqueue_notification(validation_id, url, &notification)
                    .await?;
            }
        }

        Ok(())
    }

    /// The queue has given up on this job: leave the record `failed` with a
    /// synthetic error and still notify the webhook, best effort.
    async fn on_exhausted(&self, job: &QueuedJob, error: &HandlerError) {
        let Ok(payload) = job.payload_as::<ValidationJobPayload>() else {
            error!(job_id = %job.id, "Exhausted validation job has undecodable payload");
            return;
        };
        let validation_id = payload.validation_id;

        let report = ProbeReport {
            errors: vec![format!("Validation failed: {error}")],
            ..ProbeReport::default()
        };
        let report_json = match serde_json::to_value(&report) {
            Ok(v) => v,
            Err(e) => {
                error!(%validation_id, error = %e, "Failed to serialize synthetic report");
                return;
            }
        };

        match Validation::mark_failed(&self.pool, validation_id, &report_json).await {
            Ok(Some(_)) => {
                warn!(%validation_id, "Validation marked failed after exhausting retries");
                if let Some(url) = &payload.webhook_url {
                    let notification =
                        build_notification(&payload, ValidationStatus::Failed, &report);
                    if let Err(e) = self
                        .enqueue_notification(validation_id, url, &notification)
                        .await
                    {
                        error!(%validation_id, error = %e, "Failed to enqueue failure notification");
                    }
                }
            }
            Ok(None) => {
                debug!(%validation_id, "Record already terminal, no failure mark needed");
            }
            Err(e) => {
                error!(%validation_id, error = %e, "Failed to mark validation failed");
            }
        }
    }
}
