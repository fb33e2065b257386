//! API-key authentication middleware.
//!
//! The key is accepted either as an `X-API-Key` header or as a bearer
//! token. Comparison happens against the single configured key; there is
//! no per-caller key store.

use axum::extract::{Request, State};
use axum::http::HeaderMap;
use axum::middleware::Next;
use axum::response::Response;

use crate::error::ApiError;
use crate::state::AppState;

const API_KEY_HEADER: &str = "x-api-key";

/// Reject requests that do not carry the configured API key.
pub async fn require_api_key(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    match extract_api_key(request.headers()) {
        Some(presented) if presented == state.api_key => Ok(next.run(request).await),
        _ => Err(ApiError::Unauthorized),
    }
}

/// Pull the presented key out of the request headers.
fn extract_api_key(headers: &HeaderMap) -> Option<&str> {
    if let Some(value) = headers.get(API_KEY_HEADER).and_then(|v| v.to_str().ok()) {
        return Some(value);
    }
    headers
        .get(axum::http::header::AUTHORIZATION)
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.strip_prefix("Bearer "))
}
