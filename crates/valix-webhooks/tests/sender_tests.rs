//! Delivery loop integration tests: retries, backoff, fallback transport,
//! and the audit trail. Needs Postgres (DATABASE_URL).

#![cfg(feature = "integration")]

mod common;

use std::time::Duration;

use common::{seed_delivery, test_pool};
use wiremock::matchers::{header_exists, method, query_param};
use wiremock::{Mock, MockServer, ResponseTemplate};

use valix_db::models::webhook_delivery::{DeliveryStatus, WebhookDelivery};
use valix_webhooks::{SenderConfig, WebhookError, WebhookSender};

fn fast_config() -> SenderConfig {
    SenderConfig {
        backoff_base: Duration::from_millis(10),
        backoff_cap: Duration::from_millis(50),
        attempt_timeout: Duration::from_secs(5),
        ..SenderConfig::default()
    }
}

fn sender(pool: sqlx::PgPool) -> WebhookSender {
    WebhookSender::new(reqwest::Client::new(), pool, fast_config())
}

#[tokio::test]
async fn test_first_attempt_success_is_audited() {
    let pool = test_pool().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .and(header_exists("x-webhook-delivery-id"))
        .and(header_exists("x-validation-id"))
        .respond_with(ResponseTemplate::new(200).set_body_string("ok"))
        .expect(1)
        .mount(&server)
        .await;

    let delivery = seed_delivery(&pool, &server.uri()).await;
    sender(pool.clone()).deliver(&delivery).await.unwrap();

    let stored = WebhookDelivery::find_by_id(&pool, delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DeliveryStatus::Delivered);
    assert_eq!(stored.attempts, 1);
    assert_eq!(stored.response_status, Some(200));
    assert_eq!(stored.response_body.as_deref(), Some("ok"));
    assert!(stored.last_attempt_at.is_some());
}

#[tokio::test]
async fn test_retry_then_success() {
    let pool = test_pool().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(500))
        .up_to_n_times(1)
        .mount(&server)
        .await;
    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(200))
        .mount(&server)
        .await;

    let delivery = seed_delivery(&pool, &server.uri()).await;
    sender(pool.clone()).deliver(&delivery).await.unwrap();

    let stored = WebhookDelivery::find_by_id(&pool, delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DeliveryStatus::Delivered);
    assert_eq!(stored.attempts, 2);
}

#[tokio::test]
async fn test_exhausted_attempts_leave_failed_audit() {
    let pool = test_pool().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
        .expect(3)
        .mount(&server)
        .await;

    let delivery = seed_delivery(&pool, &server.uri()).await;
    let err = sender(pool.clone()).deliver(&delivery).await.unwrap_err();
    assert!(matches!(err, WebhookError::Exhausted { attempts: 3 }));

    let stored = WebhookDelivery::find_by_id(&pool, delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DeliveryStatus::Failed);
    assert_eq!(stored.attempts, 3);
    assert_eq!(stored.response_status, Some(503));
}

#[tokio::test]
async fn test_wrong_transport_falls_back_to_get_within_one_attempt() {
    let pool = test_pool().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string(
            r#"{"message":"this endpoint is not registered for POST requests"}"#,
        ))
        .expect(1)
        .mount(&server)
        .await;
    // The fallback flattens the payload to top-level params, secret included.
    Mock::given(method("GET"))
        .and(query_param("status", "valid"))
        .and(query_param("client_secret", "test-secret"))
        .and(query_param("credentials_valid", "true"))
        .and(query_param("resource_group_create", "true"))
        .and(header_exists("x-webhook-delivery-id"))
        .respond_with(ResponseTemplate::new(200))
        .expect(1)
        .mount(&server)
        .await;

    let delivery = seed_delivery(&pool, &server.uri()).await;
    sender(pool.clone()).deliver(&delivery).await.unwrap();

    let stored = WebhookDelivery::find_by_id(&pool, delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DeliveryStatus::Delivered);
    // The fallback is part of the first attempt, not a second one.
    assert_eq!(stored.attempts, 1);
}

#[tokio::test]
async fn test_plain_404_does_not_fall_back() {
    let pool = test_pool().await;
    let server = MockServer::start().await;

    Mock::given(method("POST"))
        .respond_with(ResponseTemplate::new(404).set_body_string("not found"))
        .expect(3)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .respond_with(ResponseTemplate::new(200))
        .expect(0)
        .mount(&server)
        .await;

    let delivery = seed_delivery(&pool, &server.uri()).await;
    let err = sender(pool.clone()).deliver(&delivery).await.unwrap_err();
    assert!(matches!(err, WebhookError::Exhausted { .. }));
}

#[tokio::test]
async fn test_connection_error_counts_as_attempt() {
    let pool = test_pool().await;
    // Nothing listens here.
    let delivery = seed_delivery(&pool, "http://127.0.0.1:1/hook").await;

    let err = sender(pool.clone()).deliver(&delivery).await.unwrap_err();
    assert!(matches!(err, WebhookError::Exhausted { attempts: 3 }));

    let stored = WebhookDelivery::find_by_id(&pool, delivery.id)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(stored.status, DeliveryStatus::Failed);
    assert_eq!(stored.response_status, None);
    assert!(stored.response_body.is_some());
}
