//! Validation submission and lookup handlers.

use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

use valix_db::models::validation::Validation;
use valix_orchestrator::{JobCredentials, SubmitRequest};
use valix_probes::TestConfig;

use crate::error::{ApiError, ApiResult};
use crate::state::AppState;

/// Service-principal credentials as submitted by the caller.
#[derive(Clone, Deserialize, ToSchema)]
pub struct CredentialsBody {
    pub tenant_id: String,
    pub client_id: String,
    pub client_secret: String,
    #[serde(default)]
    pub display_name: Option<String>,
}

/// Body of `POST /api/validate`.
#[derive(Deserialize, ToSchema)]
pub struct ValidateRequest {
    /// Caller-supplied id; resubmitting it returns the existing record.
    #[serde(default)]
    pub validation_id: Option<Uuid>,

    pub credentials: CredentialsBody,

    /// Subscription the probes run against.
    pub subscription_id: String,

    /// Probe parameters; omitted fields fall back to service defaults.
    #[serde(default)]
    #[schema(value_type = Option<Object>)]
    pub test_config: Option<TestConfig>,

    /// Destination notified when the validation reaches a terminal status.
    #[serde(default)]
    pub webhook_url: Option<String>,
}

/// Accepted-submission response.
#[derive(Serialize, ToSchema)]
pub struct ValidateResponse {
    pub validation_id: Uuid,
    pub status: String,
    pub status_url: String,
}

/// Lifecycle status response.
#[derive(Serialize, ToSchema)]
pub struct StatusResponse {
    pub validation_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed_at: Option<DateTime<Utc>>,
}

/// Full report, available once the validation is terminal.
#[derive(Serialize, ToSchema)]
pub struct ReportResponse {
    pub validation_id: Uuid,
    pub status: String,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    #[schema(value_type = Object)]
    pub report: serde_json::Value,
}

/// Still-processing signal for the report endpoint.
#[derive(Serialize, ToSchema)]
pub struct ProcessingResponse {
    pub validation_id: Uuid,
    pub status: String,
    pub message: String,
}

/// Submit credentials for validation.
///
/// The probe run happens asynchronously; the response only confirms the
/// submission was accepted and queued.
#[utoipa::path(
    post,
    path = "/api/validate",
    tag = "Validations",
    request_body = ValidateRequest,
    responses(
        (status = 202, description = "Validation accepted and queued", body = ValidateResponse),
        (status = 400, description = "Malformed submission"),
        (status = 401, description = "Invalid or missing API key"),
    ),
    security(("api_key" = []))
)]
pub async fn validate_handler(
    State(state): State<AppState>,
    Json(request): Json<ValidateRequest>,
) -> ApiResult<(StatusCode, Json<ValidateResponse>)> {
    let submit = SubmitRequest {
        id: request.validation_id,
        credentials: JobCredentials {
            tenant_id: request.credentials.tenant_id,
            client_id: request.credentials.client_id,
            client_secret: request.credentials.client_secret,
            display_name: request.credentials.display_name,
        },
        subscription_id: request.subscription_id,
        test_config: request.test_config.unwrap_or_default(),
        webhook_url: request.webhook_url,
    };

    let validation = state.service.submit(submit).await?;

    Ok((
        StatusCode::ACCEPTED,
        Json(ValidateResponse {
            validation_id: validation.id,
            status: validation.status.to_string(),
            status_url: format!("/api/validation/{}/status", validation.id),
        }),
    ))
}

/// Look up the lifecycle status of a validation.
#[utoipa::path(
    get,
    path = "/api/validation/{id}/status",
    tag = "Validations",
    params(("id" = Uuid, Path, description = "Validation id")),
    responses(
        (status = 200, description = "Current status", body = StatusResponse),
        (status = 404, description = "Unknown validation id"),
        (status = 401, description = "Invalid or missing API key"),
    ),
    security(("api_key" = []))
)]
pub async fn status_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Json<StatusResponse>> {
    let validation = find_or_404(&state, id).await?;

    Ok(Json(StatusResponse {
        validation_id: validation.id,
        status: validation.status.to_string(),
        started_at: validation.started_at,
        completed_at: validation.completed_at,
    }))
}

/// Fetch the probe report of a terminal validation.
///
/// A validation that is still pending or in progress answers 202 with a
/// distinct still-processing body rather than an error.
#[utoipa::path(
    get,
    path = "/api/validation/{id}/report",
    tag = "Validations",
    params(("id" = Uuid, Path, description = "Validation id")),
    responses(
        (status = 200, description = "Terminal report", body = ReportResponse),
        (status = 202, description = "Validation still in progress", body = ProcessingResponse),
        (status = 404, description = "Unknown validation id"),
        (status = 401, description = "Invalid or missing API key"),
    ),
    security(("api_key" = []))
)]
pub async fn report_handler(
    State(state): State<AppState>,
    Path(id): Path<Uuid>,
) -> ApiResult<Response> {
    let validation = find_or_404(&state, id).await?;

    let response = match (validation.status.is_terminal(), validation.report) {
        (true, Some(report)) => (
            StatusCode::OK,
            Json(ReportResponse {
                validation_id: validation.id,
                status: validation.status.to_string(),
                started_at: validation.started_at,
                completed_at: validation.completed_at,
                report,
            }),
        )
            .into_response(),
        _ => (
            StatusCode::ACCEPTED,
            Json(ProcessingResponse {
                validation_id: validation.id,
                status: validation.status.to_string(),
                message: "Validation still in progress".to_string(),
            }),
        )
            .into_response(),
    };
    Ok(response)
}

async fn find_or_404(state: &AppState, id: Uuid) -> Result<Validation, ApiError> {
    state.service.find(id).await?.ok_or(ApiError::NotFound)
}
