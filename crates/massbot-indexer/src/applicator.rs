//! Live event state machine.
//!
//! A single [`EventApplicator`] drains the subscription channel and applies
//! each event to completion, notification included, before taking the
//! next one.
//!
//! # Merge
//!
//! 1. Retire the loser. No record: [`IndexerError::InconsistentState`].
//!    Already retired (a redelivery, or a placeholder left by a failed bulk
//!    read): set the winner's mass and stop, without notifying.
//! 2. No winner: done.
//! 3. Set the winner's mass to the reported combined mass. No record:
//!    [`IndexerError::InconsistentState`] (the loser stays retired).
//! 4. Build, render and deliver a [`MergeNotification`]. Failures are
//!    logged and do not undo steps 1 to 3.
//!
//! # Alpha change
//!
//! Flag the new alpha and clear every other holder. No record:
//! [`IndexerError::InconsistentState`].

use std::sync::Arc;

use massbot_chain::ChainReader;
use massbot_db::{CountFilter, TokenStore};
use massbot_types::{AlphaChangeEvent, LedgerEvent, MergeEvent, ObservedEvent, TokenId};
use tokio::sync::mpsc;
use tracing::{debug, info, warn};

use crate::error::IndexerError;
use crate::notify::{MergeNotification, Notification, NotificationRenderer, NotificationSink};

/// What applying one event did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ApplyOutcome {
    /// The loser was retired and the winner's mass updated.
    Merged {
        /// The retired token.
        loser: TokenId,
        /// The surviving token.
        winner: TokenId,
        /// Whether the notification reached the sink.
        notified: bool,
    },
    /// The loser was retired without a successor.
    Vanished {
        /// The retired token.
        loser: TokenId,
    },
    /// The loser was already retired; only the winner's mass was
    /// (re)applied.
    Replayed {
        /// The already-retired token.
        loser: TokenId,
    },
    /// The alpha flag moved.
    AlphaMoved {
        /// The new alpha.
        alpha: TokenId,
        /// Previous holders whose flag was cleared.
        cleared: Vec<TokenId>,
    },
}

/// Applies ledger events to the store, one at a time.
#[derive(Debug)]
pub struct EventApplicator<R, S, N> {
    reader: Arc<R>,
    store: Arc<S>,
    renderer: NotificationRenderer,
    sink: N,
}

impl<R, S, N> EventApplicator<R, S, N>
where
    R: ChainReader,
    S: TokenStore,
    N: NotificationSink,
{
    /// Create an applicator.
    pub const fn new(reader: Arc<R>, store: Arc<S>, renderer: NotificationRenderer, sink: N) -> Self {
        Self {
            reader,
            store,
            renderer,
            sink,
        }
    }

    /// The notification sink.
    pub const fn sink(&self) -> &N {
        &self.sink
    }

    /// Drain `events` until every sender is dropped.
    ///
    /// Returns the number of events received. Failures are logged per
    /// event and never stop the loop.
    pub async fn run(&self, mut events: mpsc::Receiver<ObservedEvent>) -> u64 {
        info!("event applicator started");
        let mut received = 0_u64;

        while let Some(observed) = events.recv().await {
            received = received.saturating_add(1);
            match self.apply(observed).await {
                Ok(outcome) => debug!(
                    block = observed.block_number,
                    log_index = observed.log_index,
                    ?outcome,
                    "event applied"
                ),
                Err(IndexerError::InconsistentState(reason)) => warn!(
                    block = observed.block_number,
                    log_index = observed.log_index,
                    %reason,
                    "event skipped: inconsistent state"
                ),
                Err(e) => warn!(
                    block = observed.block_number,
                    log_index = observed.log_index,
                    error = %e,
                    "event failed"
                ),
            }
        }

        info!(received, "event applicator stopped");
        received
    }

    /// Apply one event to completion.
    pub async fn apply(&self, observed: ObservedEvent) -> Result<ApplyOutcome, IndexerError> {
        match observed.event {
            LedgerEvent::Merge(merge) => self.apply_merge(observed.block_number, merge).await,
            LedgerEvent::AlphaChange(alpha) => self.apply_alpha(alpha).await,
        }
    }

    async fn apply_merge(&self, block_number: u64, event: MergeEvent) -> Result<ApplyOutcome, IndexerError> {
        let Some(loser) = self.store.retire(event.loser).await? else {
            return Err(IndexerError::InconsistentState(format!(
                "merge retires unknown token {}",
                event.loser
            )));
        };
        if !loser.exists {
            return self.reapply_winner_mass(event).await;
        }

        let Some(winner_id) = event.winner else {
            info!(token_id = %event.loser, "token retired without successor");
            return Ok(ApplyOutcome::Vanished { loser: event.loser });
        };

        let Some(winner_before) = self.store.set_mass(winner_id, event.combined_mass).await? else {
            return Err(IndexerError::InconsistentState(format!(
                "merge of {} into unknown token {winner_id}",
                event.loser
            )));
        };

        info!(
            loser = %event.loser,
            winner = %winner_id,
            combined_mass = %event.combined_mass,
            "merge applied"
        );

        let notification = MergeNotification::new(block_number, loser, winner_before, event.combined_mass);
        let notified = self.notify(notification).await;
        Ok(ApplyOutcome::Merged {
            loser: event.loser,
            winner: winner_id,
            notified,
        })
    }

    /// The loser was already retired, by an earlier delivery of this event
    /// or by a bulk read that failed. The winner still takes the reported
    /// mass; no notification is sent.
    async fn reapply_winner_mass(&self, event: MergeEvent) -> Result<ApplyOutcome, IndexerError> {
        if let Some(winner_id) = event.winner {
            let prior = self.store.set_mass(winner_id, event.combined_mass).await?;
            if prior.is_none() {
                return Err(IndexerError::InconsistentState(format!(
                    "merge of retired {} into unknown token {winner_id}",
                    event.loser
                )));
            }
        }
        debug!(token_id = %event.loser, "loser already retired, winner mass reapplied");
        Ok(ApplyOutcome::Replayed { loser: event.loser })
    }

    async fn apply_alpha(&self, event: AlphaChangeEvent) -> Result<ApplyOutcome, IndexerError> {
        let update = self.store.mark_alpha(event.new_alpha).await?;
        if !update.found {
            return Err(IndexerError::InconsistentState(format!(
                "alpha moved to unknown token {}",
                event.new_alpha
            )));
        }
        info!(token_id = %event.new_alpha, cleared = ?update.cleared, "alpha moved");
        Ok(ApplyOutcome::AlphaMoved {
            alpha: event.new_alpha,
            cleared: update.cleared,
        })
    }

    /// Enrich, render and deliver. Returns whether the sink accepted it.
    async fn notify(&self, mut notification: MergeNotification) -> bool {
        let winner = notification.winner_after.id;
        match self.store.count(CountFilter::existing()).await {
            Ok(remaining) => notification.remaining = remaining,
            Err(e) => warn!(error = %e, "remaining count unavailable"),
        }
        notification.owner = match self.reader.owner_info(winner).await {
            Ok(owner) => Some(owner),
            Err(e) => {
                debug!(token_id = %winner, error = %e, "winner owner unavailable");
                None
            }
        };

        let text = match self.renderer.render(&notification) {
            Ok(text) => text,
            Err(e) => {
                warn!(token_id = %winner, error = %e, "notification render failed");
                return false;
            }
        };

        match self.sink.deliver(&Notification { text, image: None }).await {
            Ok(()) => true,
            Err(e) => {
                warn!(token_id = %winner, error = %e, "notification delivery failed");
                false
            }
        }
    }
}

