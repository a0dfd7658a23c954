//! Ledger access for the massbot token indexer.
//!
//! Everything the indexer knows about on-chain state comes through this
//! crate. The collection contract is treated as an opaque oracle: values,
//! tiers, masses, owners and the alpha id are read with `eth_call`, never
//! computed locally.
//!
//! # Architecture
//!
//! ```text
//! Reconciler / Applicator / Rank endpoint
//!     |
//!     +-- ChainReader (trait)
//!           |-- RetryingReader    (timeout + bounded retry on Unavailable)
//!           +-- MergeContract     (eth_call bindings, ENS reverse lookup)
//!                 +-- JsonRpcClient (reqwest, JSON-RPC 2.0 over HTTP)
//!
//! LogSubscription --(mpsc, chain order)--> Event Applicator
//! ```
//!
//! # Modules
//!
//! - [`reader`] -- the [`ChainReader`] contract and the opaque [`TokenValue`]
//! - [`contract`] -- [`MergeContract`], the JSON-RPC backed reader
//! - [`retry`] -- [`RetryPolicy`] and [`RetryingReader`]
//! - [`subscription`] -- [`LogSubscription`], the live event feed
//! - [`rpc`] -- minimal JSON-RPC client
//! - [`abi`] -- 32-byte word encoding helpers
//! - [`ens`] -- reverse alias resolution
//! - [`error`] -- [`ChainError`]

pub mod abi;
pub mod contract;
pub mod ens;
pub mod error;
pub mod reader;
pub mod retry;
pub mod rpc;
pub mod subscription;

pub use alloy_primitives::Address;
pub use contract::MergeContract;
pub use error::ChainError;
pub use reader::{ChainReader, TokenValue};
pub use retry::{RetryPolicy, RetryingReader};
pub use rpc::JsonRpcClient;
pub use subscription::{LogSubscription, SubscriptionConfig};
