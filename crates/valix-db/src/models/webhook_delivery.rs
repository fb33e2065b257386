//! Webhook delivery audit record.
//!
//! One row per delivery-attempt group. The payload column is an immutable
//! snapshot taken when the notification job was created; every retry replays
//! it verbatim. The audit fields (`attempts`, `response_status`,
//! `response_body`) are updated on every attempt, success included.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use uuid::Uuid;

/// Maximum stored length of a destination response body.
pub const RESPONSE_BODY_LIMIT: usize = 1000;

/// Status of a webhook delivery-attempt group.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Type, Serialize, Deserialize)]
#[sqlx(type_name = "delivery_status", rename_all = "lowercase")]
#[serde(rename_all = "lowercase")]
pub enum DeliveryStatus {
    /// Created, no attempt made yet.
    #[default]
    Pending,
    /// A non-final attempt failed; another will follow.
    Retrying,
    /// A 2xx response was observed (terminal).
    Delivered,
    /// All attempts exhausted without a 2xx response (terminal).
    Failed,
}

impl DeliveryStatus {
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Delivered | Self::Failed)
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::Retrying => "retrying",
            Self::Delivered => "delivered",
            Self::Failed => "failed",
        }
    }
}

/// A webhook delivery audit record.
#[derive(Debug, Clone, FromRow)]
pub struct WebhookDelivery {
    /// One id per delivery-attempt group.
    pub id: Uuid,

    /// The validation this notification belongs to.
    pub validation_id: Uuid,

    /// Destination URL.
    pub webhook_url: String,

    /// Immutable payload snapshot, replayed verbatim on every retry.
    pub payload: serde_json::Value,

    pub status: DeliveryStatus,

    /// Attempts made so far (bounded by the sender's max retries).
    pub attempts: i32,

    pub last_attempt_at: Option<DateTime<Utc>>,

    /// HTTP status of the most recent response, if one was received.
    pub response_status: Option<i32>,

    /// Truncated body of the most recent response (or transport error text).
    pub response_body: Option<String>,

    pub created_at: DateTime<Utc>,
}

impl WebhookDelivery {
    /// Insert a new pending delivery record with its payload snapshot.
    pub async fn create(pool: &PgPool, new: &NewWebhookDelivery) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO webhook_deliveries (id, validation_id, webhook_url, payload, status, attempts)
            VALUES ($1, $2, $3, $4, 'pending', 0)
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(new.validation_id)
        .bind(&new.webhook_url)
        .bind(&new.payload)
        .fetch_one(pool)
        .await
    }

    /// Find a delivery record by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM webhook_deliveries WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// List delivery groups for a validation, newest first.
    pub async fn list_by_validation(
        pool: &PgPool,
        validation_id: Uuid,
    ) -> Result<Vec<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            SELECT * FROM webhook_deliveries
            WHERE validation_id = $1
            ORDER BY created_at DESC
            "#,
        )
        .bind(validation_id)
        .fetch_all(pool)
        .await
    }

    /// Record the outcome of one delivery attempt.
    ///
    /// The response body is truncated to [`RESPONSE_BODY_LIMIT`] characters
    /// before storage.
    pub async fn record_attempt(
        pool: &PgPool,
        id: Uuid,
        status: DeliveryStatus,
        attempts: i32,
        response_status: Option<i32>,
        response_body: Option<&str>,
    ) -> Result<(), sqlx::Error> {
        let truncated = response_body.map(truncate_body);

        sqlx::query(
            r#"
            UPDATE webhook_deliveries
            SET status = $2,
                attempts = $3,
                last_attempt_at = NOW(),
                response_status = $4,
                response_body = $5
            WHERE id = $1
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(attempts)
        .bind(response_status)
        .bind(truncated)
        .execute(pool)
        .await?;
        Ok(())
    }
}

fn truncate_body(body: &str) -> String {
    body.chars().take(RESPONSE_BODY_LIMIT).collect()
}

/// Data for creating a new delivery record.
#[derive(Debug, Clone)]
pub struct NewWebhookDelivery {
    pub id: Uuid,
    pub validation_id: Uuid,
    pub webhook_url: String,
    pub payload: serde_json::Value,
}
