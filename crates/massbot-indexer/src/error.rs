//! Error types for the indexer.

use massbot_chain::ChainError;
use massbot_db::DbError;

/// Errors raised while reconciling or applying events.
#[derive(Debug, thiserror::Error)]
pub enum IndexerError {
    /// A ledger read failed.
    #[error("ledger error: {0}")]
    Chain(#[from] ChainError),

    /// A store operation failed.
    #[error("store error: {0}")]
    Store(#[from] DbError),

    /// An event referenced state the store does not have.
    ///
    /// The event is skipped; processing continues with the next one.
    #[error("inconsistent state: {0}")]
    InconsistentState(String),

    /// The notification template could not be loaded or rendered.
    #[error("template error: {0}")]
    Template(String),

    /// A notification could not be delivered.
    #[error("notification error: {0}")]
    Notify(String),
}
