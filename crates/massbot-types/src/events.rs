//! Mutation events delivered by the ledger subscription.
//!
//! Events are ephemeral: the applicator folds them into the state store
//! and they are never persisted themselves.

use serde::{Deserialize, Serialize};

use crate::ids::{Mass, TokenId};

/// Two tokens collided and the smaller one was absorbed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct MergeEvent {
    /// The token being retired.
    pub loser: TokenId,
    /// The surviving token, or `None` when the loser vanished without a
    /// successor.
    pub winner: Option<TokenId>,
    /// The winner's new total mass, as reported by the ledger.
    pub combined_mass: Mass,
}

/// A token became the new alpha.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct AlphaChangeEvent {
    /// The token now holding the alpha position.
    pub new_alpha: TokenId,
}

/// Any event the applicator understands.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LedgerEvent {
    /// See [`MergeEvent`].
    Merge(MergeEvent),
    /// See [`AlphaChangeEvent`].
    AlphaChange(AlphaChangeEvent),
}

/// A ledger event together with its position in chain order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ObservedEvent {
    /// Block that emitted the event.
    pub block_number: u64,
    /// Position of the log within its block.
    pub log_index: u64,
    /// The decoded event.
    pub event: LedgerEvent,
}

impl ObservedEvent {
    /// Wrap an event that has no chain position (tests, replays).
    pub const fn unpositioned(event: LedgerEvent) -> Self {
        Self {
            block_number: 0,
            log_index: 0,
            event,
        }
    }
}

impl From<MergeEvent> for LedgerEvent {
    fn from(event: MergeEvent) -> Self {
        Self::Merge(event)
    }
}

impl From<AlphaChangeEvent> for LedgerEvent {
    fn from(event: AlphaChangeEvent) -> Self {
        Self::AlphaChange(event)
    }
}
