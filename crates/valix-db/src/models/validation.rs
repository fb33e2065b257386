//! Validation request lifecycle record.
//!
//! Each submitted credential check gets one row whose status moves
//! `pending -> in_progress -> {valid, invalid, failed}` exactly once. Status
//! monotonicity is enforced in SQL: every transition is a guarded `UPDATE`
//! that matches only the states it may leave, so a redelivered job can never
//! regress a terminal record.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sqlx::{FromRow, PgPool, Type};
use uuid::Uuid;

/// Status of a validation request.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Type, Serialize, Deserialize)]
#[sqlx(type_name = "validation_status", rename_all = "snake_case")]
#[serde(rename_all = "snake_case")]
pub enum ValidationStatus {
    /// Accepted, waiting for a worker.
    #[default]
    Pending,
    /// A worker is running the probe sequence.
    InProgress,
    /// Probes ran and the credential proved the required capabilities.
    Valid,
    /// Probes ran and the credential failed one or more required capabilities.
    Invalid,
    /// Orchestration could not complete after exhausting its retry budget.
    Failed,
}

impl ValidationStatus {
    /// Terminal statuses admit no further transition.
    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Valid | Self::Invalid | Self::Failed)
    }

    /// Stable string form, matching the Postgres enum labels.
    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Pending => "pending",
            Self::InProgress => "in_progress",
            Self::Valid => "valid",
            Self::Invalid => "invalid",
            Self::Failed => "failed",
        }
    }
}

impl std::fmt::Display for ValidationStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A validation request record.
///
/// The client secret is deliberately absent: it travels only inside the
/// queued job payload and the webhook notification, never this table.
#[derive(Debug, Clone, FromRow)]
pub struct Validation {
    /// Opaque, immutable identifier.
    pub id: Uuid,

    /// Azure AD tenant the credential belongs to.
    pub tenant_id: String,

    /// Application (client) id of the service principal.
    pub client_id: String,

    /// Subscription the probes run against.
    pub subscription_id: String,

    /// Current lifecycle status.
    pub status: ValidationStatus,

    /// Destination notified on terminal entry, if any.
    pub webhook_url: Option<String>,

    /// When the record was created and queued.
    pub started_at: DateTime<Utc>,

    /// Set exactly once, on entering a terminal status.
    pub completed_at: Option<DateTime<Utc>>,

    /// Probe report, present iff status is terminal.
    pub report: Option<serde_json::Value>,

    pub created_at: DateTime<Utc>,
}

impl Validation {
    /// Insert a new pending validation.
    ///
    /// Uses `ON CONFLICT DO NOTHING` so a caller-supplied id makes submission
    /// idempotent: if the row already exists the existing record is returned
    /// untouched. The flag reports whether a row was actually inserted, so
    /// callers can skip enqueueing a second job for a resubmission.
    pub async fn create(pool: &PgPool, new: &NewValidation) -> Result<(Self, bool), sqlx::Error> {
        let inserted = sqlx::query_as::<_, Self>(
            r#"
            INSERT INTO validations (id, tenant_id, client_id, subscription_id, status, webhook_url)
            VALUES ($1, $2, $3, $4, 'pending', $5)
            ON CONFLICT (id) DO NOTHING
            RETURNING *
            "#,
        )
        .bind(new.id)
        .bind(&new.tenant_id)
        .bind(&new.client_id)
        .bind(&new.subscription_id)
        .bind(&new.webhook_url)
        .fetch_optional(pool)
        .await?;

        match inserted {
            Some(v) => Ok((v, true)),
            // Conflict: a record with this id already exists.
            None => sqlx::query_as::<_, Self>("SELECT * FROM validations WHERE id = $1")
                .bind(new.id)
                .fetch_one(pool)
                .await
                .map(|v| (v, false)),
        }
    }

    /// Find a validation by id.
    pub async fn find_by_id(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>("SELECT * FROM validations WHERE id = $1")
            .bind(id)
            .fetch_optional(pool)
            .await
    }

    /// Claim the record for probe execution: `pending -> in_progress`.
    ///
    /// An `in_progress` record is also claimable, so a job redelivered after
    /// a worker crash can redo the whole sequence. Returns `None` when the
    /// record is already terminal (the redelivery is then a no-op).
    pub async fn mark_in_progress(pool: &PgPool, id: Uuid) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE validations
            SET status = 'in_progress'
            WHERE id = $1 AND status IN ('pending', 'in_progress')
            RETURNING *
            "#,
        )
        .bind(id)
        .fetch_optional(pool)
        .await
    }

    /// Enter a terminal status, setting `completed_at` and the report exactly
    /// once. Returns `None` if the record was not `in_progress` (already
    /// terminal, or never claimed).
    pub async fn mark_completed(
        pool: &PgPool,
        id: Uuid,
        status: ValidationStatus,
        report: &serde_json::Value,
    ) -> Result<Option<Self>, sqlx::Error> {
        debug_assert!(status.is_terminal());

        sqlx::query_as::<_, Self>(
            r#"
            UPDATE validations
            SET status = $2, completed_at = NOW(), report = $3
            WHERE id = $1 AND status = 'in_progress'
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(status)
        .bind(report)
        .fetch_optional(pool)
        .await
    }

    /// Force the record to `failed` with a synthetic report, used when the
    /// job queue gives up on a validation. Unlike [`Self::mark_completed`]
    /// this also covers records a worker never got to claim.
    pub async fn mark_failed(
        pool: &PgPool,
        id: Uuid,
        report: &serde_json::Value,
    ) -> Result<Option<Self>, sqlx::Error> {
        sqlx::query_as::<_, Self>(
            r#"
            UPDATE validations
            SET status = 'failed', completed_at = NOW(), report = $2
            WHERE id = $1 AND status IN ('pending', 'in_progress')
            RETURNING *
            "#,
        )
        .bind(id)
        .bind(report)
        .fetch_optional(pool)
        .await
    }
}

/// Data for creating a new validation record.
#[derive(Debug, Clone)]
pub struct NewValidation {
    pub id: Uuid,
    pub tenant_id: String,
    pub client_id: String,
    pub subscription_id: String,
    pub webhook_url: Option<String>,
}
