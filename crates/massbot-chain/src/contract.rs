//! [`ChainReader`] implementation backed by the collection contract.
//!
//! Every read is an `eth_call` against the latest block. Reverts on the
//! per-token reads mean the token does not exist; every other failure is a
//! transport problem.

use alloy_primitives::{Address, B256, U256};
use massbot_types::{Mass, Tier, TokenId};

use crate::abi;
use crate::ens;
use crate::error::ChainError;
use crate::reader::{ChainReader, TokenValue};
use crate::rpc::{JsonRpcClient, RpcError};

/// Signature of the encoded-value getter.
const GET_VALUE_OF: &str = "getValueOf(uint256)";
/// Signature of the value decoder.
const DECODE_CLASS_AND_MASS: &str = "decodeClassAndMass(uint256)";
/// Signature of the ERC-721 owner getter.
const OWNER_OF: &str = "ownerOf(uint256)";
/// Signature of the next-mint counter.
const NEXT_MINT_ID: &str = "_nextMintId()";
/// Signature of the alpha id getter.
const ALPHA_ID: &str = "_alphaId()";

/// Signature of the merge event.
pub const MASS_UPDATE_EVENT: &str = "MassUpdate(uint256,uint256,uint256)";
/// Signature of the alpha change event.
pub const ALPHA_MASS_UPDATE_EVENT: &str = "AlphaMassUpdate(uint256,uint256)";

/// Handle to the collection contract. Cheap to clone.
#[derive(Debug, Clone)]
pub struct MergeContract {
    rpc: JsonRpcClient,
    address: Address,
    ens_registry: Address,
}

impl MergeContract {
    /// Bind to the contract at `address`, resolving aliases through the
    /// ENS registry at `ens_registry`.
    pub const fn new(rpc: JsonRpcClient, address: Address, ens_registry: Address) -> Self {
        Self {
            rpc,
            address,
            ens_registry,
        }
    }

    /// Address of the bound contract.
    pub const fn address(&self) -> Address {
        self.address
    }

    /// The underlying JSON-RPC client.
    pub const fn rpc(&self) -> &JsonRpcClient {
        &self.rpc
    }

    async fn call(&self, signature: &str, args: &[B256]) -> Result<Vec<u8>, RpcError> {
        let data = abi::encode_call(signature, args);
        self.rpc.eth_call(self.address, &data).await
    }

    /// Call a per-token getter, mapping reverts to [`ChainError::NotFound`].
    async fn call_for_token(&self, signature: &str, id: TokenId) -> Result<Vec<u8>, ChainError> {
        self.call(signature, &[token_word(id)])
            .await
            .map_err(|e| not_found_on_revert(e, id))
    }
}

impl ChainReader for MergeContract {
    async fn value_of(&self, id: TokenId) -> Result<TokenValue, ChainError> {
        let data = self.call_for_token(GET_VALUE_OF, id).await?;
        let value = abi::decode_uint(&data, 0)?;
        if value.is_zero() {
            return Err(ChainError::NotFound(format!("token {id} has no value")));
        }
        Ok(TokenValue(value))
    }

    async fn decode(&self, value: TokenValue) -> Result<(Tier, Mass), ChainError> {
        let data = self
            .call(DECODE_CLASS_AND_MASS, &[abi::uint_word(value.0)])
            .await?;
        let tier = abi::to_u32(abi::decode_uint(&data, 0)?)?;
        let mass = abi::to_u64(abi::decode_uint(&data, 1)?)?;
        Ok((Tier(tier), Mass(mass)))
    }

    async fn owner_of(&self, id: TokenId) -> Result<Address, ChainError> {
        let data = self.call_for_token(OWNER_OF, id).await?;
        let owner = abi::decode_address(&data, 0)?;
        if owner == Address::ZERO {
            return Err(ChainError::NotFound(format!("token {id} has no owner")));
        }
        Ok(owner)
    }

    async fn resolve_alias(&self, address: Address) -> Option<String> {
        match ens::reverse_lookup(&self.rpc, self.ens_registry, address).await {
            Ok(alias) => alias,
            Err(e) => {
                tracing::debug!(%address, error = %e, "alias lookup failed");
                None
            }
        }
    }

    async fn universe_size(&self) -> Result<u64, ChainError> {
        let data = self.call(NEXT_MINT_ID, &[]).await?;
        let next = abi::to_u64(abi::decode_uint(&data, 0)?)?;
        Ok(next.saturating_sub(1))
    }

    async fn current_alpha(&self) -> Result<TokenId, ChainError> {
        let data = self.call(ALPHA_ID, &[]).await?;
        let raw = abi::to_u64(abi::decode_uint(&data, 0)?)?;
        TokenId::from_ledger(raw).ok_or_else(|| ChainError::NotFound("no alpha token".to_owned()))
    }
}

fn token_word(id: TokenId) -> B256 {
    abi::uint_word(U256::from(id.get()))
}

fn not_found_on_revert(err: RpcError, id: TokenId) -> ChainError {
    if err.is_revert() {
        ChainError::NotFound(format!("token {id}: {err}"))
    } else {
        err.into()
    }
}
