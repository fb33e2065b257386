//! Error types for the valix-db crate.

use thiserror::Error;

/// Database operation errors.
///
/// Query-level failures surface as plain `sqlx::Error` from the model
/// functions; this enum only wraps the failures that need extra context.
#[derive(Debug, Error)]
pub enum DbError {
    /// A database migration failed to apply.
    #[error("Migration failed: {0}")]
    MigrationFailed(#[source] sqlx::migrate::MigrateError),
}
