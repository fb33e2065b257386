//! Route table assembly.

use axum::routing::{get, post};
use axum::Router;
use tower_http::cors::{Any, CorsLayer};
use tower_http::trace::TraceLayer;

use crate::auth::require_api_key;
use crate::handlers::{health, validations};
use crate::openapi::openapi_handler;
use crate::state::AppState;

/// Build the full application router.
///
/// Validation routes sit behind the API-key middleware; health and the
/// OpenAPI document stay public.
pub fn build_router(state: AppState) -> Router {
    let protected = Router::new()
        .route("/api/validate", post(validations::validate_handler))
        .route(
            "/api/validation/:id/status",
            get(validations::status_handler),
        )
        .route(
            "/api/validation/:id/report",
            get(validations::report_handler),
        )
        .layer(axum::middleware::from_fn_with_state(
            state.clone(),
            require_api_key,
        ));

    let cors = CorsLayer::new()
        .allow_origin(Any)
        .allow_methods(Any)
        .allow_headers(Any);

    Router::new()
        .route("/health", get(health::health_handler))
        .route("/api-docs/openapi.json", get(openapi_handler))
        .merge(protected)
        .with_state(state)
        .layer(TraceLayer::new_for_http())
        .layer(cors)
}
