//! Error types for ledger access.
//!
//! Callers must tell [`ChainError::NotFound`] apart from
//! [`ChainError::Unavailable`]: the first is a legitimate terminal state
//! (the token was never minted or has been destroyed), the second is a
//! transport failure that says nothing about the token.

/// Errors returned by a [`ChainReader`](crate::ChainReader).
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum ChainError {
    /// The token does not exist on the ledger.
    #[error("not found: {0}")]
    NotFound(String),

    /// The ledger could not be reached or did not answer in time.
    #[error("ledger unavailable: {0}")]
    Unavailable(String),

    /// The ledger answered with data that could not be decoded.
    #[error("decode error: {0}")]
    Decode(String),

    /// The reader was constructed with an invalid configuration.
    #[error("configuration error: {0}")]
    Config(String),
}

impl ChainError {
    /// Whether the failure is transient and the call may be retried.
    pub const fn is_retryable(&self) -> bool {
        matches!(self, Self::Unavailable(_))
    }

    /// Whether the failure means the token is genuinely absent.
    pub const fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound(_))
    }
}
