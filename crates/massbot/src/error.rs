//! Error types for the massbot binary.
//!
//! [`BotError`] wraps every subsystem error so `main` can propagate with
//! `?`.

use massbot_api::ServerError;
use massbot_chain::ChainError;
use massbot_db::DbError;
use massbot_indexer::IndexerError;

/// Top-level error for the massbot binary.
#[derive(Debug, thiserror::Error)]
pub enum BotError {
    /// Configuration is invalid or missing.
    #[error("config error: {0}")]
    Config(String),

    /// The ledger could not be read.
    #[error("ledger error: {source}")]
    Chain {
        /// The underlying ledger error.
        #[from]
        source: ChainError,
    },

    /// The state store failed.
    #[error("store error: {source}")]
    Db {
        /// The underlying store error.
        #[from]
        source: DbError,
    },

    /// Reconciliation or notification setup failed.
    #[error("indexer error: {source}")]
    Indexer {
        /// The underlying indexer error.
        #[from]
        source: IndexerError,
    },

    /// The read endpoint failed.
    #[error("server error: {source}")]
    Server {
        /// The underlying server error.
        #[from]
        source: ServerError,
    },
}
