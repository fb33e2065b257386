//! Shared application state.

use sqlx::PgPool;

use valix_orchestrator::ValidationService;

/// State handed to every handler.
#[derive(Clone)]
pub struct AppState {
    pub pool: PgPool,
    pub service: ValidationService,
    pub api_key: String,
}

impl AppState {
    pub fn new(pool: PgPool, service: ValidationService, api_key: String) -> Self {
        Self {
            pool,
            service,
            api_key,
        }
    }
}
