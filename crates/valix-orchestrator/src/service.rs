//! Submission surface: validate, persist, enqueue.

use std::time::Duration;

use sqlx::PgPool;
use tracing::{info, instrument};
use uuid::Uuid;

use valix_db::models::validation::{NewValidation, Validation};
use valix_probes::TestConfig;
use valix_queue::{JobQueue, JobType, NewJob};
use valix_webhooks::validate_webhook_url;

use crate::error::OrchestratorError;
use crate::jobs::{JobCredentials, ValidationJobPayload};

/// Outer wall-clock budget for one probe run.
const DEFAULT_VALIDATION_TIMEOUT: Duration = Duration::from_secs(300);

/// One submission, as accepted from the API layer.
#[derive(Debug, Clone)]
pub struct SubmitRequest {
    /// Caller-supplied id makes resubmission idempotent; absent means a
    /// fresh one is generated.
    pub id: Option<Uuid>,
    pub credentials: JobCredentials,
    pub subscription_id: String,
    pub test_config: TestConfig,
    pub webhook_url: Option<String>,
}

/// Front door of the validation pipeline.
#[derive(Clone)]
pub struct ValidationService {
    pool: PgPool,
    queue: JobQueue,
    validation_timeout: Duration,
}

impl ValidationService {
    #[must_use]
    pub fn new(pool: PgPool, queue: JobQueue) -> Self {
        Self {
            pool,
            queue,
            validation_timeout: DEFAULT_VALIDATION_TIMEOUT,
        }
    }

    #[must_use]
    pub fn with_validation_timeout(mut self, timeout: Duration) -> Self {
        self.validation_timeout = timeout;
        self
    }

    /// Accept a submission: reject bad input synchronously, persist a
    /// pending record, enqueue the probe job. A resubmission with a known id
    /// returns the existing record without enqueueing a second job.
    #[instrument(skip(self, request), fields(client_id = %request.credentials.client_id))]
    pub async fn submit(&self, request: SubmitRequest) -> Result<Validation, OrchestratorError> {
        if request.credentials.tenant_id.trim().is_empty()
            || request.credentials.client_id.trim().is_empty()
            || request.credentials.client_secret.is_empty()
        {
            return Err(OrchestratorError::InvalidRequest(
                "tenant_id, client_id and client_secret are required".to_string(),
            ));
        }
        if request.subscription_id.trim().is_empty() {
            return Err(OrchestratorError::InvalidRequest(
                "subscription_id is required".to_string(),
            ));
        }
        if let Some(url) = &request.webhook_url {
            validate_webhook_url(url)?;
        }

        let id = request.id.unwrap_or_else(Uuid::new_v4);
        let (validation, inserted) = Validation::create(
            &self.pool,
            &NewValidation {
                id,
                tenant_id: request.credentials.tenant_id.clone(),
                client_id: request.credentials.client_id.clone(),
                subscription_id: request.subscription_id.clone(),
                webhook_url: request.webhook_url.clone(),
            },
        )
        .await?;

        if !inserted {
            info!(validation_id = %id, "Resubmission of known id, returning existing record");
            return Ok(validation);
        }

        let payload = ValidationJobPayload {
            validation_id: id,
            credentials: request.credentials,
            subscription_id: request.subscription_id,
            test_config: request.test_config,
            webhook_url: request.webhook_url,
        };
        self.queue
            .enqueue(
                NewJob::new(JobType::Validation, &payload)?
                    .with_timeout(self.validation_timeout),
            )
            .await?;

        info!(validation_id = %id, "Validation accepted and queued");
        Ok(validation)
    }

    /// Look up a validation record.
    pub async fn find(&self, id: Uuid) -> Result<Option<Validation>, OrchestratorError> {
        Ok(Validation::find_by_id(&self.pool, id).await?)
    }
}
