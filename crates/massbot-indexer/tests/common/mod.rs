//! Scripted ledger and recording sink shared by the indexer tests.

#![allow(
    dead_code,
    missing_docs,
    clippy::unwrap_used,
    clippy::arithmetic_side_effects
)]

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Mutex;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use massbot_chain::{Address, ChainError, ChainReader, TokenValue};
use massbot_indexer::{IndexerError, Notification, NotificationSink};
use massbot_types::{Mass, Tier, TokenId};

/// Encoding used by the collection contract: `tier * 10^8 + mass`.
pub const CLASS_MULTIPLIER: u64 = 100_000_000;

/// In-process ledger with scripted failures and latency.
#[derive(Debug, Default)]
pub struct FakeLedger {
    pub tokens: BTreeMap<u64, (u32, u64)>,
    pub unavailable: BTreeSet<u64>,
    pub latency: BTreeMap<u64, Duration>,
    pub alpha: u64,
    pub owner_down: bool,
    pub value_calls: AtomicU64,
}

impl FakeLedger {
    pub fn with_tokens(tokens: &[(u64, u32, u64)]) -> Self {
        Self {
            tokens: tokens.iter().map(|&(id, tier, mass)| (id, (tier, mass))).collect(),
            ..Self::default()
        }
    }

    pub fn calls(&self) -> u64 {
        self.value_calls.load(Ordering::SeqCst)
    }
}

impl ChainReader for FakeLedger {
    async fn value_of(&self, id: TokenId) -> Result<TokenValue, ChainError> {
        self.value_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.latency.get(&id.get()) {
            tokio::time::sleep(*delay).await;
        }
        if self.unavailable.contains(&id.get()) {
            return Err(ChainError::Unavailable(format!("read of {id} timed out")));
        }
        self.tokens
            .get(&id.get())
            .map(|&(tier, mass)| TokenValue::from(u64::from(tier) * CLASS_MULTIPLIER + mass))
            .ok_or_else(|| ChainError::NotFound(format!("token {id}")))
    }

    async fn decode(&self, value: TokenValue) -> Result<(Tier, Mass), ChainError> {
        let raw = value.0.to::<u64>();
        let tier = u32::try_from(raw / CLASS_MULTIPLIER).unwrap();
        Ok((Tier(tier), Mass(raw % CLASS_MULTIPLIER)))
    }

    async fn owner_of(&self, id: TokenId) -> Result<Address, ChainError> {
        if self.owner_down {
            return Err(ChainError::Unavailable("owner lookup down".to_owned()));
        }
        if !self.tokens.contains_key(&id.get()) {
            return Err(ChainError::NotFound(format!("token {id}")));
        }
        Ok(Address::with_last_byte(0x42))
    }

    async fn resolve_alias(&self, address: Address) -> Option<String> {
        (address == Address::with_last_byte(0x42)).then(|| "pak.eth".to_owned())
    }

    async fn universe_size(&self) -> Result<u64, ChainError> {
        Ok(self.tokens.keys().next_back().copied().unwrap_or_default())
    }

    async fn current_alpha(&self) -> Result<TokenId, ChainError> {
        TokenId::from_ledger(self.alpha).ok_or_else(|| ChainError::NotFound("no alpha".to_owned()))
    }
}

/// Sink that records every delivery, optionally failing.
#[derive(Debug, Default)]
pub struct RecordingSink {
    pub delivered: Mutex<Vec<Notification>>,
    pub fail: bool,
}

impl RecordingSink {
    pub fn failing() -> Self {
        Self {
            fail: true,
            ..Self::default()
        }
    }

    pub fn texts(&self) -> Vec<String> {
        self.delivered.lock().unwrap().iter().map(|n| n.text.clone()).collect()
    }
}

impl NotificationSink for RecordingSink {
    async fn deliver(&self, notification: &Notification) -> Result<(), IndexerError> {
        if self.fail {
            return Err(IndexerError::Notify("sink offline".to_owned()));
        }
        self.delivered.lock().unwrap().push(notification.clone());
        Ok(())
    }
}
