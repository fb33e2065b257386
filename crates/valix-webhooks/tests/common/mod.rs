//! Shared fixtures for delivery integration tests.

#![allow(dead_code)]

use std::collections::BTreeMap;

use chrono::Utc;
use sqlx::PgPool;
use uuid::Uuid;

use valix_db::models::validation::{NewValidation, Validation};
use valix_db::models::webhook_delivery::{NewWebhookDelivery, WebhookDelivery};
use valix_webhooks::{CredentialsOut, WebhookPayload};

/// Connect to the test database and run migrations.
pub async fn test_pool() -> PgPool {
    let url = std::env::var("DATABASE_URL")
        .expect("DATABASE_URL must be set for integration tests");
    let pool = PgPool::connect(&url).await.expect("connect to test db");
    valix_db::migrations::run_migrations(&pool)
        .await
        .expect("run migrations");
    pool
}

pub fn sample_payload(validation_id: Uuid) -> WebhookPayload {
    WebhookPayload {
        validation_id,
        timestamp: Utc::now(),
        status: "valid".to_string(),
        credentials: CredentialsOut {
            tenant_id: "00000000-0000-0000-0000-000000000001".to_string(),
            client_id: "00000000-0000-0000-0000-000000000002".to_string(),
            client_secret: "test-secret".to_string(),
            display_name: None,
            subscription_id: "11111111-1111-1111-1111-111111111111".to_string(),
            valid: true,
        },
        permissions: BTreeMap::from([
            ("resource_group_create".to_string(), true),
            ("blob_upload".to_string(), true),
        ]),
        errors: vec![],
        storage_account_created: Some("azvalabc123000001".to_string()),
        website_url: Some("https://azvalabc123000001.z13.web.core.windows.net".to_string()),
        test_config: serde_json::json!({ "location": "eastus" }),
    }
}

/// Insert a validation row and a pending delivery row pointing at `url`.
pub async fn seed_delivery(pool: &PgPool, url: &str) -> WebhookDelivery {
    let (validation, _) = Validation::create(
        pool,
        &NewValidation {
            id: Uuid::new_v4(),
            tenant_id: "00000000-0000-0000-0000-000000000001".to_string(),
            client_id: "00000000-0000-0000-0000-000000000002".to_string(),
            subscription_id: "11111111-1111-1111-1111-111111111111".to_string(),
            webhook_url: Some(url.to_string()),
        },
    )
    .await
    .expect("create validation");

    let payload = serde_json::to_value(sample_payload(validation.id)).expect("payload");
    WebhookDelivery::create(
        pool,
        &NewWebhookDelivery {
            id: Uuid::new_v4(),
            validation_id: validation.id,
            webhook_url: url.to_string(),
            payload,
        },
    )
    .await
    .expect("create delivery")
}
