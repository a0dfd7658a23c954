//! Reconciliation engine for the massbot token indexer.
//!
//! Keeps the off-chain token mirror ([`massbot_db::TokenStore`]) consistent
//! with the ledger ([`massbot_chain::ChainReader`]) in two ways:
//!
//! - [`BulkReconciler`] takes a best-effort snapshot of the whole universe
//!   `1..=N`, partitioned into concurrent lanes by `id % K`.
//! - [`EventApplicator`] folds the live merge and alpha events into the
//!   store one at a time, in chain order, and hands a
//!   [`MergeNotification`] to a [`NotificationSink`].
//!
//! [`rank_of`] answers the read side: where a token stands by mass.
//!
//! # Modules
//!
//! - [`reconciler`] -- bulk pass and post-pass alpha sync
//! - [`applicator`] -- merge / alpha state machine
//! - [`rank`] -- rank query
//! - [`notify`] -- notification payload, template rendering and sinks
//! - [`error`] -- Shared error types

pub mod applicator;
pub mod error;
pub mod notify;
pub mod rank;
pub mod reconciler;

pub use applicator::{ApplyOutcome, EventApplicator};
pub use error::IndexerError;
pub use notify::{
    ConfiguredSink, LogSink, MergeNotification, Notification, NotificationRenderer,
    NotificationSink, WebhookSink,
};
pub use rank::rank_of;
pub use reconciler::{BulkReconciler, ReconcileConfig, ReconcileReport};
