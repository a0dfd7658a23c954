//! Minimal JSON-RPC 2.0 client over HTTP.
//!
//! Only the three methods the indexer needs are wrapped: `eth_call`,
//! `eth_blockNumber` and `eth_getLogs`. Errors are classified into
//! [`RpcError`] so the contract layer can map reverts to
//! [`ChainError::NotFound`] and everything else to
//! [`ChainError::Unavailable`].

use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use alloy_primitives::{Address, B256, hex};
use serde::Deserialize;
use serde::de::DeserializeOwned;

use crate::error::ChainError;

/// JSON-RPC error code used by most nodes for `execution reverted`.
const REVERT_CODE: i64 = 3;

/// Failure of a single JSON-RPC request.
#[derive(Debug, Clone, thiserror::Error)]
pub enum RpcError {
    /// The request never produced a JSON-RPC response.
    #[error("transport error: {0}")]
    Transport(String),

    /// The node answered with a JSON-RPC error object.
    #[error("rpc error {code}: {message}")]
    Rpc {
        /// JSON-RPC error code.
        code: i64,
        /// Error message from the node.
        message: String,
    },

    /// The node answered with something that is not a valid response.
    #[error("invalid response: {0}")]
    InvalidResponse(String),
}

impl RpcError {
    /// Whether the node reported that the call reverted.
    pub fn is_revert(&self) -> bool {
        match self {
            Self::Rpc { code, message } => {
                *code == REVERT_CODE || message.to_ascii_lowercase().contains("revert")
            }
            Self::Transport(_) | Self::InvalidResponse(_) => false,
        }
    }
}

impl From<RpcError> for ChainError {
    fn from(err: RpcError) -> Self {
        match err {
            RpcError::InvalidResponse(msg) => Self::Decode(msg),
            other => Self::Unavailable(other.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct Response<T> {
    result: Option<T>,
    error: Option<ErrorObject>,
}

#[derive(Debug, Deserialize)]
struct ErrorObject {
    code: i64,
    message: String,
}

/// A log entry as returned by `eth_getLogs`.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RawLog {
    /// Contract that emitted the log.
    pub address: String,
    /// Indexed topics, hex encoded.
    pub topics: Vec<String>,
    /// Non-indexed data, hex encoded.
    pub data: String,
    /// Block number, hex encoded. Absent for pending logs.
    pub block_number: Option<String>,
    /// Index of the log within the block, hex encoded.
    pub log_index: Option<String>,
    /// Set when the log was dropped by a reorganisation.
    #[serde(default)]
    pub removed: bool,
}

/// HTTP JSON-RPC client. Cheap to clone.
#[derive(Debug, Clone)]
pub struct JsonRpcClient {
    http: reqwest::Client,
    url: String,
    next_id: Arc<AtomicU64>,
}

impl JsonRpcClient {
    /// Create a client for `url` with a per-request timeout.
    ///
    /// # Errors
    ///
    /// Returns [`ChainError::Config`] if the HTTP client cannot be built.
    pub fn new(url: &str, timeout: Duration) -> Result<Self, ChainError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| ChainError::Config(format!("failed to build HTTP client: {e}")))?;
        Ok(Self {
            http,
            url: url.to_owned(),
            next_id: Arc::new(AtomicU64::new(1)),
        })
    }

    /// Send one JSON-RPC request and decode its `result`.
    pub async fn request<T: DeserializeOwned>(
        &self,
        method: &str,
        params: serde_json::Value,
    ) -> Result<T, RpcError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let body = serde_json::json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response = self
            .http
            .post(&self.url)
            .json(&body)
            .send()
            .await
            .map_err(|e| RpcError::Transport(format!("{method} request failed: {e}")))?;

        let status = response.status();
        if !status.is_success() {
            return Err(RpcError::Transport(format!("{method} returned HTTP {status}")));
        }

        let parsed: Response<T> = response
            .json()
            .await
            .map_err(|e| RpcError::InvalidResponse(format!("{method} response parse failed: {e}")))?;

        if let Some(error) = parsed.error {
            return Err(RpcError::Rpc {
                code: error.code,
                message: error.message,
            });
        }

        parsed
            .result
            .ok_or_else(|| RpcError::InvalidResponse(format!("{method} response has no result")))
    }

    /// Execute a read-only call against the latest block.
    pub async fn eth_call(&self, to: Address, data: &[u8]) -> Result<Vec<u8>, RpcError> {
        let params = serde_json::json!([
            { "to": hex::encode_prefixed(to), "data": hex::encode_prefixed(data) },
            "latest",
        ]);
        let result: String = self.request("eth_call", params).await?;
        hex::decode(&result)
            .map_err(|e| RpcError::InvalidResponse(format!("eth_call returned invalid hex: {e}")))
    }

    /// Current head block number.
    pub async fn block_number(&self) -> Result<u64, RpcError> {
        let result: String = self.request("eth_blockNumber", serde_json::json!([])).await?;
        parse_quantity(&result)
    }

    /// Logs emitted by `address` with any of `topics` as first topic, in the
    /// inclusive block range.
    pub async fn get_logs(
        &self,
        address: Address,
        topics: &[B256],
        from_block: u64,
        to_block: u64,
    ) -> Result<Vec<RawLog>, RpcError> {
        let topic0: Vec<String> = topics.iter().map(hex::encode_prefixed).collect();
        let params = serde_json::json!([{
            "address": hex::encode_prefixed(address),
            "topics": [topic0],
            "fromBlock": format!("{from_block:#x}"),
            "toBlock": format!("{to_block:#x}"),
        }]);
        self.request("eth_getLogs", params).await
    }
}

/// Parse a hex `QUANTITY` such as `"0x1b4"`.
pub fn parse_quantity(value: &str) -> Result<u64, RpcError> {
    let digits = value.strip_prefix("0x").unwrap_or(value);
    u64::from_str_radix(digits, 16)
        .map_err(|e| RpcError::InvalidResponse(format!("invalid quantity {value:?}: {e}")))
}
