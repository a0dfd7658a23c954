//! Error types for the state store.
//!
//! All errors are propagated via [`DbError`] which wraps the underlying
//! [`sqlx`] errors with additional context about which operation failed.

/// Errors that can occur in the state store.
#[derive(Debug, thiserror::Error)]
pub enum DbError {
    /// A `PostgreSQL` operation failed.
    #[error("PostgreSQL error: {0}")]
    Postgres(#[from] sqlx::Error),

    /// A `PostgreSQL` migration failed.
    #[error("PostgreSQL migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    /// A configuration error.
    #[error("Configuration error: {0}")]
    Config(String),

    /// A value does not fit the column it is stored in.
    #[error("Value out of range: {0}")]
    OutOfRange(String),
}
