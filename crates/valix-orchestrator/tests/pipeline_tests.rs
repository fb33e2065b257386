//! End-to-end pipeline tests: submit, probe, terminal status, notification.
//! Needs Postgres (DATABASE_URL).

#![cfg(feature = "integration")]

mod common;

use std::time::Duration;

use common::{stub_executor, submit_request, test_pool};
use uuid::Uuid;
use wiremock::matchers::method;
use wiremock::{Mock, MockServer, ResponseTemplate};

use valix_db::models::validation::{Validation, ValidationStatus};
use valix_db::models::webhook_delivery::{DeliveryStatus, WebhookDelivery};
use valix_orchestrator::{
    OrchestratorError, ValidationJobHandler, ValidationService, WebhookJobHandler,
};
use valix_queue::{JobHandler, JobQueue, JobType, QueuedJob};
use valix_webhooks::{SenderConfig, WebhookSender};

fn fast_sender(pool: sqlx::PgPool) -> WebhookSender {
    WebhookSender::new(
        reqwest::Client::new(),
        pool,
        SenderConfig {
            backoff_base: Duration::from_millis(10),
            backoff_cap: Duration::from_millis(50),
            ..SenderConfig::default()
        },
    )
}

/// Claim the pending job belonging to one validation. Tests share a
/// database, so claiming by id keeps parallel tests out of each other's way.
async fn claim_job(pool: &sqlx::PgPool, job_type: JobType, validation_id: Uuid) -> QueuedJob {
    sqlx::query_as::<_, QueuedJob>(
        r#"
        UPDATE jobs
        SET status = 'processing', attempts = attempts + 1, locked_at = NOW(), locked_by = 'test'
        WHERE id = (
            SELECT id FROM jobs
            WHERE job_type = $1 AND payload->>'validation_id' = $2 AND status = 'pending'
            LIMIT 1
        )
        RETURNING *
        "#,
    )
    .bind(job_type.as_str())
    .bind(validation_id.to_string())
    .fetch_one(pool)
    .await
    .expect("expected a pending job for this validation")
}

/// Run one validation's job of the given type through its handler.
async fn run_one(
    pool: &sqlx::PgPool,
    queue: &JobQueue,
    job_type: JobType,
    handler: &dyn JobHandler,
    validation_id: Uuid,
) {
    let job = claim_job(pool, job_type, validation_id).await;
    handler.handle(&job).await.unwrap();
    queue.complete(job.id).await.unwrap();
}

#[tokio::test]
async fn test_valid_credential_reaches_valid_and_notifies() {
    let pool = test_pool().await;
    let queue = JobQueue::new(pool.clone());
    let service = ValidationService::new(pool.clone(), queue.clone());
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let submitted = service
        .submit(submit_request(Some(server.uri())))
        .await
        .unwrap();
    assert_eq!(submitted.status, ValidationStatus::Pending);

    let validation_handler =
        ValidationJobHandler::new(pool.clone(), queue.clone(), stub_executor(false));
    run_one(&pool, &queue, JobType::Validation, &validation_handler, submitted.id).await;

    let record = Validation::find_by_id(&pool, submitted.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ValidationStatus::Valid);
    assert!(record.completed_at.is_some());
    let report = record.report.unwrap();
    assert_eq!(report["is_valid"], true);

    let webhook_handler = WebhookJobHandler::new(pool.clone(), fast_sender(pool.clone()));
    run_one(&pool, &queue, JobType::Webhook, &webhook_handler, submitted.id).await;

    let deliveries = WebhookDelivery::list_by_validation(&pool, submitted.id)
        .await
        .unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, DeliveryStatus::Delivered);
    assert_eq!(deliveries[0].attempts, 1);
    // The snapshot carries the secret for the receiver.
    assert_eq!(
        deliveries[0].payload["credentials"]["client_secret"],
        "test-secret"
    );
}

#[tokio::test]
async fn test_denied_credential_reaches_invalid() {
    let pool = test_pool().await;
    let queue = JobQueue::new(pool.clone());
    let service = ValidationService::new(pool.clone(), queue.clone());

    let submitted = service.submit(submit_request(None)).await.unwrap();

    let handler = ValidationJobHandler::new(pool.clone(), queue.clone(), stub_executor(true));
    run_one(&pool, &queue, JobType::Validation, &handler, submitted.id).await;

    let record = Validation::find_by_id(&pool, submitted.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(record.status, ValidationStatus::Invalid);
    let report = record.report.unwrap();
    assert_eq!(report["is_valid"], false);
    // Mandatory abort: one error, empty permissions.
    assert_eq!(report["errors"].as_array().unwrap().len(), 1);
    assert!(report["permissions"].as_object().unwrap().is_empty());
    // No webhook_url, so nothing was enqueued.
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM jobs WHERE job_type = 'webhook' AND payload->>'validation_id' = $1",
    )
    .bind(submitted.id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 0);
}

#[tokio::test]
async fn test_resubmission_with_same_id_is_idempotent() {
    let pool = test_pool().await;
    let queue = JobQueue::new(pool.clone());
    let service = ValidationService::new(pool.clone(), queue.clone());

    let mut request = submit_request(None);
    request.id = Some(Uuid::new_v4());

    let first = service.submit(request.clone()).await.unwrap();
    let second = service.submit(request).await.unwrap();

    assert_eq!(first.id, second.id);
    assert_eq!(first.started_at, second.started_at);

    // Only one job exists for this validation.
    let count: i64 = sqlx::query_scalar(
        "SELECT COUNT(*) FROM jobs WHERE job_type = 'validation' AND payload->>'validation_id' = $1",
    )
    .bind(first.id.to_string())
    .fetch_one(&pool)
    .await
    .unwrap();
    assert_eq!(count, 1);
}

#[tokio::test]
async fn test_bad_webhook_url_rejected_before_enqueue() {
    let pool = test_pool().await;
    let queue = JobQueue::new(pool.clone());
    let service = ValidationService::new(pool.clone(), queue.clone());

    let err = service
        .submit(submit_request(Some("ftp://example.com/hook".to_string())))
        .await
        .unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_missing_fields_rejected() {
    let pool = test_pool().await;
    let queue = JobQueue::new(pool.clone());
    let service = ValidationService::new(pool.clone(), queue.clone());

    let mut request = submit_request(None);
    request.credentials.client_secret = String::new();

    let err = service.submit(request).await.unwrap_err();
    assert!(matches!(err, OrchestratorError::InvalidRequest(_)));
}

#[tokio::test]
async fn test_redelivered_validation_job_is_noop_after_terminal() {
    let pool = test_pool().await;
    let queue = JobQueue::new(pool.clone());
    let service = ValidationService::new(pool.clone(), queue.clone());

    let submitted = service.submit(submit_request(None)).await.unwrap();

    let handler = ValidationJobHandler::new(pool.clone(), queue.clone(), stub_executor(false));
    let job = claim_job(&pool, JobType::Validation, submitted.id).await;
    handler.handle(&job).await.unwrap();

    let first = Validation::find_by_id(&pool, submitted.id)
        .await
        .unwrap()
        .unwrap();

    // Replay the same job, as a crashed worker's redelivery would.
    handler.handle(&job).await.unwrap();

    let second = Validation::find_by_id(&pool, submitted.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.status, ValidationStatus::Valid);
    assert_eq!(first.completed_at, second.completed_at);
}

#[tokio::test]
async fn test_failed_delivery_group_superseded_on_queue_rerun() {
    let pool = test_pool().await;
    let queue = JobQueue::new(pool.clone());
    let service = ValidationService::new(pool.clone(), queue.clone());
    let server = MockServer::start().await;

    // Receiver down for the whole first delivery budget, then healthy.
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(3)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let submitted = service
        .submit(submit_request(Some(server.uri())))
        .await
        .unwrap();
    let validation_handler =
        ValidationJobHandler::new(pool.clone(), queue.clone(), stub_executor(false));
    run_one(&pool, &queue, JobType::Validation, &validation_handler, submitted.id).await;

    let webhook_handler = WebhookJobHandler::new(pool.clone(), fast_sender(pool.clone()));
    let job = claim_job(&pool, JobType::Webhook, submitted.id).await;
    let err = webhook_handler.handle(&job).await.unwrap_err();
    assert!(err.is_retryable());
    queue.fail(&job, &err.to_string(), true).await.unwrap();

    let deliveries = WebhookDelivery::list_by_validation(&pool, submitted.id)
        .await
        .unwrap();
    assert_eq!(deliveries.len(), 1);
    assert_eq!(deliveries[0].status, DeliveryStatus::Failed);
    assert_eq!(deliveries[0].attempts, 3);

    // Queue-level rerun: a fresh group delivers, the failed one stays put.
    let rerun = claim_job(&pool, JobType::Webhook, submitted.id).await;
    webhook_handler.handle(&rerun).await.unwrap();
    queue.complete(rerun.id).await.unwrap();

    let deliveries = WebhookDelivery::list_by_validation(&pool, submitted.id)
        .await
        .unwrap();
    assert_eq!(deliveries.len(), 2);
    let failed = deliveries
        .iter()
        .find(|d| d.status == DeliveryStatus::Failed)
        .expect("original group keeps its failed audit trail");
    let delivered = deliveries
        .iter()
        .find(|d| d.status == DeliveryStatus::Delivered)
        .expect("rerun gets a fresh group");
    assert_eq!(failed.attempts, 3);
    assert_eq!(delivered.attempts, 1);
    // The fresh group replays the identical snapshot.
    assert_eq!(failed.payload, delivered.payload);
}
