//! Shared type definitions for the massbot token indexer.
//!
//! This crate defines the vocabulary shared by every other crate in the
//! workspace: strongly-typed scalars for token identifiers, tiers and
//! masses, the mirrored [`TokenRecord`], and the ephemeral ledger events
//! that mutate it.
//!
//! # Modules
//!
//! - [`ids`] -- `TokenId`, `Tier`, `Mass` newtypes
//! - [`record`] -- the off-chain mirror of one token
//! - [`events`] -- merge and alpha-change events from the ledger
//! - [`rank`] -- rank report and owner projection served over HTTP

pub mod events;
pub mod ids;
pub mod rank;
pub mod record;

pub use events::{AlphaChangeEvent, LedgerEvent, MergeEvent, ObservedEvent};
pub use ids::{Mass, Tier, TokenId};
pub use rank::{OwnerInfo, RankReport};
pub use record::TokenRecord;
