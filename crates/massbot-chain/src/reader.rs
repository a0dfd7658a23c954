//! The read-only contract every ledger backend implements.
//!
//! A [`ChainReader`] is constructed once at startup and handed to every
//! component that needs it. All operations are idempotent reads; any of
//! them may fail with [`ChainError::Unavailable`], and the per-token reads
//! fail with [`ChainError::NotFound`] for tokens that were never minted or
//! have been destroyed.

use std::future::Future;

use alloy_primitives::{Address, U256};
use massbot_types::{Mass, OwnerInfo, Tier, TokenId};

use crate::error::ChainError;

/// Opaque encoded value of a token as stored by the collection contract.
///
/// Only [`ChainReader::decode`] knows how to split it into tier and mass.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct TokenValue(pub U256);

impl From<u64> for TokenValue {
    fn from(raw: u64) -> Self {
        Self(U256::from(raw))
    }
}

/// Read access to the ledger oracle.
///
/// Methods return `Send` futures so readers can be shared across spawned
/// tasks behind an [`Arc`](std::sync::Arc).
pub trait ChainReader: Send + Sync {
    /// Fetch the encoded value of a token.
    fn value_of(&self, id: TokenId) -> impl Future<Output = Result<TokenValue, ChainError>> + Send;

    /// Split an encoded value into its tier and mass.
    fn decode(
        &self,
        value: TokenValue,
    ) -> impl Future<Output = Result<(Tier, Mass), ChainError>> + Send;

    /// Fetch the current owner of a token.
    fn owner_of(&self, id: TokenId) -> impl Future<Output = Result<Address, ChainError>> + Send;

    /// Resolve a human-readable alias for an address. Best effort.
    fn resolve_alias(&self, address: Address) -> impl Future<Output = Option<String>> + Send;

    /// Number of identifiers minted so far. The universe is `1..=size`.
    fn universe_size(&self) -> impl Future<Output = Result<u64, ChainError>> + Send;

    /// The identifier currently holding the alpha position.
    fn current_alpha(&self) -> impl Future<Output = Result<TokenId, ChainError>> + Send;

    /// Fetch and decode a token's tier and mass in one step.
    fn read_token(&self, id: TokenId) -> impl Future<Output = Result<(Tier, Mass), ChainError>> + Send {
        async move {
            let value = self.value_of(id).await?;
            self.decode(value).await
        }
    }

    /// Fetch a token's owner together with their alias.
    fn owner_info(&self, id: TokenId) -> impl Future<Output = Result<OwnerInfo, ChainError>> + Send {
        async move {
            let address = self.owner_of(id).await?;
            let alias = self.resolve_alias(address).await;
            Ok(OwnerInfo {
                address: address.to_checksum(None),
                alias,
            })
        }
    }
}
