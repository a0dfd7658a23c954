//! Live event feed from the collection contract.
//!
//! [`LogSubscription`] polls `eth_getLogs` from a block cursor and pushes
//! decoded events onto an ordered channel. The cursor only advances once
//! every event of a block range has been handed to the channel, so a
//! failed poll re-reads the same range: delivery is at-least-once and the
//! consumer must tolerate replays.
//!
//! # Event mapping
//!
//! | Log | Event |
//! |-----|-------|
//! | `MassUpdate(small, large, combinedMass)` | [`MergeEvent`]; `large == 0` means no successor |
//! | `AlphaMassUpdate(tokenId, alphaMass)` | [`AlphaChangeEvent`] |

use std::time::Duration;

use alloy_primitives::{Address, B256, U256, hex};
use massbot_types::{AlphaChangeEvent, LedgerEvent, Mass, MergeEvent, ObservedEvent, TokenId};
use tokio::sync::{mpsc, watch};
use tracing::{debug, info, warn};

use crate::abi;
use crate::contract::{ALPHA_MASS_UPDATE_EVENT, MASS_UPDATE_EVENT};
use crate::error::ChainError;
use crate::rpc::{JsonRpcClient, RawLog, parse_quantity};

/// Default delay between polls once the cursor has caught up.
const DEFAULT_POLL_INTERVAL_MS: u64 = 12_000;

/// Default maximum number of blocks per `eth_getLogs` query.
const DEFAULT_MAX_BLOCK_RANGE: u64 = 2_000;

/// Tuning for [`LogSubscription`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SubscriptionConfig {
    /// Delay between polls once caught up with the head.
    pub poll_interval: Duration,
    /// Maximum blocks covered by one log query.
    pub max_block_range: u64,
    /// Blocks to stay behind the head.
    pub confirmations: u64,
}

impl Default for SubscriptionConfig {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            max_block_range: DEFAULT_MAX_BLOCK_RANGE,
            confirmations: 0,
        }
    }
}

/// Why a poll did not complete.
#[derive(Debug, thiserror::Error)]
pub enum PollError {
    /// The ledger could not be queried; the range will be retried.
    #[error(transparent)]
    Chain(#[from] ChainError),

    /// The consumer dropped its receiver.
    #[error("event channel closed")]
    ChannelClosed,
}

/// Polling subscription to the contract's merge and alpha events.
#[derive(Debug)]
pub struct LogSubscription {
    rpc: JsonRpcClient,
    contract: Address,
    config: SubscriptionConfig,
    next_block: u64,
    topics: [B256; 2],
}

impl LogSubscription {
    /// Create a subscription delivering events from `start_block` on.
    pub fn new(
        rpc: JsonRpcClient,
        contract: Address,
        config: SubscriptionConfig,
        start_block: u64,
    ) -> Self {
        Self {
            rpc,
            contract,
            config,
            next_block: start_block,
            topics: [
                abi::event_topic(MASS_UPDATE_EVENT),
                abi::event_topic(ALPHA_MASS_UPDATE_EVENT),
            ],
        }
    }

    /// First block that has not been delivered yet.
    pub const fn next_block(&self) -> u64 {
        self.next_block
    }

    /// Poll until `shutdown` flips to `true` or the receiver is dropped.
    ///
    /// Dropping `tx` on return closes the channel, which lets the consumer
    /// drain what is queued and stop.
    pub async fn run(mut self, tx: mpsc::Sender<ObservedEvent>, mut shutdown: watch::Receiver<bool>) {
        info!(
            contract = %self.contract,
            start_block = self.next_block,
            "log subscription started"
        );

        loop {
            if *shutdown.borrow() {
                break;
            }

            let caught_up = match self.poll_once(&tx).await {
                Ok(caught_up) => caught_up,
                Err(PollError::ChannelClosed) => {
                    info!("event consumer gone, stopping subscription");
                    break;
                }
                Err(PollError::Chain(e)) => {
                    warn!(next_block = self.next_block, error = %e, "log poll failed, will retry");
                    true
                }
            };

            if caught_up {
                tokio::select! {
                    () = tokio::time::sleep(self.config.poll_interval) => {}
                    changed = shutdown.changed() => {
                        if changed.is_err() {
                            break;
                        }
                    }
                }
            }
        }

        info!(next_block = self.next_block, "log subscription stopped");
    }

    /// Deliver the events of the next block range.
    ///
    /// Returns `Ok(true)` when the cursor has reached the confirmed head.
    pub async fn poll_once(&mut self, tx: &mpsc::Sender<ObservedEvent>) -> Result<bool, PollError> {
        let head = self.rpc.block_number().await.map_err(ChainError::from)?;
        let confirmed = head.saturating_sub(self.config.confirmations);
        if self.next_block > confirmed {
            return Ok(true);
        }

        let span = self.config.max_block_range.max(1).saturating_sub(1);
        let to_block = self.next_block.saturating_add(span).min(confirmed);

        let logs = self
            .rpc
            .get_logs(self.contract, &self.topics, self.next_block, to_block)
            .await
            .map_err(ChainError::from)?;

        let mut events = Vec::with_capacity(logs.len());
        for log in &logs {
            if log.removed {
                warn!(block = ?log.block_number, "skipping log removed by reorg");
                continue;
            }
            match decode_log(log) {
                Ok(Some(event)) => events.push(event),
                Ok(None) => debug!(topics = ?log.topics, "ignoring unrelated log"),
                Err(e) => warn!(error = %e, block = ?log.block_number, "undecodable log skipped"),
            }
        }
        events.sort_by_key(|e| (e.block_number, e.log_index));

        let delivered = events.len();
        for event in events {
            tx.send(event).await.map_err(|_closed| PollError::ChannelClosed)?;
        }

        debug!(
            from_block = self.next_block,
            to_block,
            delivered,
            "log range delivered"
        );
        self.next_block = to_block.saturating_add(1);
        Ok(to_block >= confirmed)
    }
}

/// Decode a raw log into a ledger event.
///
/// Returns `Ok(None)` for logs whose first topic is neither contract
/// event.
pub fn decode_log(log: &RawLog) -> Result<Option<ObservedEvent>, ChainError> {
    let Some(topic0) = log.topics.first() else {
        return Ok(None);
    };
    let topic0 = parse_word(topic0)?;

    let event = if topic0 == abi::event_topic(MASS_UPDATE_EVENT) {
        let loser = topic_u64(log, 1)?;
        let winner = topic_u64(log, 2)?;
        let data = hex::decode(&log.data)
            .map_err(|e| ChainError::Decode(format!("invalid log data: {e}")))?;
        let combined_mass = abi::to_u64(abi::decode_uint(&data, 0)?)?;
        LedgerEvent::Merge(MergeEvent {
            loser: TokenId::from_ledger(loser)
                .ok_or_else(|| ChainError::Decode("merge event without a loser".to_owned()))?,
            winner: TokenId::from_ledger(winner),
            combined_mass: Mass(combined_mass),
        })
    } else if topic0 == abi::event_topic(ALPHA_MASS_UPDATE_EVENT) {
        let alpha = topic_u64(log, 1)?;
        LedgerEvent::AlphaChange(AlphaChangeEvent {
            new_alpha: TokenId::from_ledger(alpha)
                .ok_or_else(|| ChainError::Decode("alpha event without a token".to_owned()))?,
        })
    } else {
        return Ok(None);
    };

    Ok(Some(ObservedEvent {
        block_number: quantity_or_zero(log.block_number.as_deref())?,
        log_index: quantity_or_zero(log.log_index.as_deref())?,
        event,
    }))
}

fn parse_word(hex_word: &str) -> Result<B256, ChainError> {
    let bytes = hex::decode(hex_word).map_err(|e| ChainError::Decode(format!("invalid topic: {e}")))?;
    B256::try_from(bytes.as_slice()).map_err(|e| ChainError::Decode(format!("invalid topic length: {e}")))
}

fn topic_u64(log: &RawLog, index: usize) -> Result<u64, ChainError> {
    let topic = log
        .topics
        .get(index)
        .ok_or_else(|| ChainError::Decode(format!("log is missing topic {index}")))?;
    let word = parse_word(topic)?;
    abi::to_u64(U256::from_be_bytes(word.0))
}

fn quantity_or_zero(value: Option<&str>) -> Result<u64, ChainError> {
    value.map_or(Ok(0), |v| parse_quantity(v).map_err(ChainError::from))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn word_hex(value: u64) -> String {
        hex::encode_prefixed(abi::uint_word(U256::from(value)))
    }

    fn mass_update(loser: u64, winner: u64, mass: u64, block: u64, index: u64) -> RawLog {
        RawLog {
            address: "0xc3f8a0f5841abff777d3eefa5047e8d413a1c9ab".to_owned(),
            topics: vec![
                hex::encode_prefixed(abi::event_topic(MASS_UPDATE_EVENT)),
                word_hex(loser),
                word_hex(winner),
            ],
            data: word_hex(mass),
            block_number: Some(format!("{block:#x}")),
            log_index: Some(format!("{index:#x}")),
            removed: false,
        }
    }

    #[test]
    fn decodes_merge_log() {
        let event = decode_log(&mass_update(7, 9, 120, 15_000_000, 4)).unwrap().unwrap();
        assert_eq!(event.block_number, 15_000_000);
        assert_eq!(event.log_index, 4);
        assert_eq!(
            event.event,
            LedgerEvent::Merge(MergeEvent {
                loser: TokenId(7),
                winner: Some(TokenId(9)),
                combined_mass: Mass(120),
            })
        );
    }

    #[test]
    fn zero_winner_is_no_successor() {
        let event = decode_log(&mass_update(7, 0, 0, 1, 0)).unwrap().unwrap();
        assert!(matches!(
            event.event,
            LedgerEvent::Merge(MergeEvent { winner: None, .. })
        ));
    }

    #[test]
    fn decodes_alpha_log() {
        let log = RawLog {
            address: String::new(),
            topics: vec![
                hex::encode_prefixed(abi::event_topic(ALPHA_MASS_UPDATE_EVENT)),
                word_hex(26984),
            ],
            data: word_hex(5000),
            block_number: Some("0x1".to_owned()),
            log_index: Some("0x0".to_owned()),
            removed: false,
        };
        let event = decode_log(&log).unwrap().unwrap();
        assert_eq!(
            event.event,
            LedgerEvent::AlphaChange(AlphaChangeEvent {
                new_alpha: TokenId(26984)
            })
        );
    }

    #[test]
    fn unrelated_logs_are_ignored() {
        let mut log = mass_update(1, 2, 3, 1, 0);
        log.topics[0] = hex::encode_prefixed(abi::event_topic("Transfer(address,address,uint256)"));
        assert_eq!(decode_log(&log).unwrap(), None);
        log.topics.clear();
        assert_eq!(decode_log(&log).unwrap(), None);
    }

    #[test]
    fn truncated_merge_log_is_an_error() {
        let mut log = mass_update(1, 2, 3, 1, 0);
        log.topics.truncate(2);
        assert!(decode_log(&log).is_err());
    }
}
