//! OpenAPI document generation.

use axum::Json;
use utoipa::openapi::security::{ApiKey, ApiKeyValue, SecurityScheme};
use utoipa::{Modify, OpenApi};

use crate::error::ErrorResponse;
use crate::handlers::health::HealthResponse;
use crate::handlers::validations::{
    CredentialsBody, ProcessingResponse, ReportResponse, StatusResponse, ValidateRequest,
    ValidateResponse,
};

#[derive(OpenApi)]
#[openapi(
    paths(
        crate::handlers::health::health_handler,
        crate::handlers::validations::validate_handler,
        crate::handlers::validations::status_handler,
        crate::handlers::validations::report_handler,
    ),
    components(schemas(
        HealthResponse,
        CredentialsBody,
        ValidateRequest,
        ValidateResponse,
        StatusResponse,
        ReportResponse,
        ProcessingResponse,
        ErrorResponse,
    )),
    modifiers(&SecurityAddon),
    tags(
        (name = "Validations", description = "Credential validation submission and results"),
        (name = "Health", description = "Service health"),
    ),
    info(
        title = "Valix API",
        description = "Cloud credential validation service",
    )
)]
pub struct ApiDoc;

struct SecurityAddon;

impl Modify for SecurityAddon {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "api_key",
                SecurityScheme::ApiKey(ApiKey::Header(ApiKeyValue::new("X-API-Key"))),
            );
        }
    }
}

/// Serve the generated OpenAPI document.
pub async fn openapi_handler() -> Json<utoipa::openapi::OpenApi> {
    Json(ApiDoc::openapi())
}
