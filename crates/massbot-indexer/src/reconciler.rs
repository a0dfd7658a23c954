//! Full-universe bulk reconciliation.
//!
//! The identifiers `1..=N` are split into `K` lanes by `id % K`. Each lane
//! walks its identifiers in ascending order, one ledger read at a time, and
//! writes the results in batches; all lanes run concurrently. A lane owns
//! its identifiers exclusively, so no identifier is ever written out of
//! order with respect to itself.
//!
//! Every ledger failure degrades to an "absent" placeholder. The pass is a
//! point-in-time approximation that live events correct afterwards.

use std::sync::Arc;

use massbot_chain::ChainReader;
use massbot_db::TokenStore;
use massbot_types::{TokenId, TokenRecord};
use tokio::task::JoinSet;
use tracing::{debug, error, info, warn};

use crate::error::IndexerError;

/// Default number of lanes.
const DEFAULT_CONCURRENCY: usize = 1_000;

/// Default records per store write within a lane.
const DEFAULT_BATCH_SIZE: usize = 100;

/// Tuning for [`BulkReconciler`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconcileConfig {
    /// Number of lanes (`K`). At least 1.
    pub concurrency: usize,
    /// Records buffered per lane before a batch upsert. At least 1.
    pub batch_size: usize,
}

impl Default for ReconcileConfig {
    fn default() -> Self {
        Self {
            concurrency: DEFAULT_CONCURRENCY,
            batch_size: DEFAULT_BATCH_SIZE,
        }
    }
}

/// Tally of a bulk pass (or of one lane).
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// Identifiers visited.
    pub visited: u64,
    /// Tokens found on the ledger.
    pub existing: u64,
    /// Tokens the ledger reported as absent.
    pub not_found: u64,
    /// Reads that failed for other reasons (stored as absent).
    pub unavailable: u64,
    /// Records whose batch could not be written.
    pub unwritten: u64,
    /// Lanes that terminated abnormally.
    pub failed_lanes: u64,
}

impl ReconcileReport {
    fn absorb(&mut self, other: &Self) {
        self.visited = self.visited.saturating_add(other.visited);
        self.existing = self.existing.saturating_add(other.existing);
        self.not_found = self.not_found.saturating_add(other.not_found);
        self.unavailable = self.unavailable.saturating_add(other.unavailable);
        self.unwritten = self.unwritten.saturating_add(other.unwritten);
        self.failed_lanes = self.failed_lanes.saturating_add(other.failed_lanes);
    }

    /// Records written to the store.
    pub const fn written(&self) -> u64 {
        self.visited.saturating_sub(self.unwritten)
    }
}

/// Populates the store with one record per identifier of the universe.
#[derive(Debug)]
pub struct BulkReconciler<R, S> {
    reader: Arc<R>,
    store: Arc<S>,
    config: ReconcileConfig,
}

impl<R, S> BulkReconciler<R, S>
where
    R: ChainReader + 'static,
    S: TokenStore + 'static,
{
    /// Create a reconciler over a shared reader and store.
    pub const fn new(reader: Arc<R>, store: Arc<S>, config: ReconcileConfig) -> Self {
        Self {
            reader,
            store,
            config,
        }
    }

    /// Reconcile `1..=universe`, returning once every lane has drained.
    pub async fn run(&self, universe: u64) -> ReconcileReport {
        let lanes = self.config.concurrency.max(1);
        let batch_size = self.config.batch_size.max(1);
        info!(universe, lanes, batch_size, "bulk reconciliation started");

        let mut set = JoinSet::new();
        for lane in 0..lanes {
            let ids = lane_ids(lane, lanes, universe);
            let reader = Arc::clone(&self.reader);
            let store = Arc::clone(&self.store);
            set.spawn(async move { run_lane(reader.as_ref(), store.as_ref(), ids, batch_size).await });
        }

        let mut report = ReconcileReport::default();
        while let Some(joined) = set.join_next().await {
            match joined {
                Ok(lane) => report.absorb(&lane),
                Err(e) => {
                    error!(error = %e, "reconciliation lane aborted");
                    report.failed_lanes = report.failed_lanes.saturating_add(1);
                }
            }
        }

        info!(
            visited = report.visited,
            existing = report.existing,
            not_found = report.not_found,
            unavailable = report.unavailable,
            unwritten = report.unwritten,
            failed_lanes = report.failed_lanes,
            "bulk reconciliation finished"
        );
        report
    }

    /// Mark the ledger's current alpha in the store.
    ///
    /// Returns the alpha identifier, or `None` when the store has no
    /// record for it.
    pub async fn sync_alpha(&self) -> Result<Option<TokenId>, IndexerError> {
        let alpha = self.reader.current_alpha().await?;
        let update = self.store.mark_alpha(alpha).await?;
        if !update.found {
            warn!(token_id = %alpha, "alpha token has no record, not marked");
            return Ok(None);
        }
        info!(token_id = %alpha, cleared = ?update.cleared, "alpha synced");
        Ok(Some(alpha))
    }
}

/// The identifiers of lane `lane` out of `lanes`, ascending.
///
/// Lane `0` holds the multiples of `lanes`; lane `l > 0` holds
/// `l, l + lanes, l + 2 * lanes, ...`.
pub fn lane_ids(lane: usize, lanes: usize, universe: u64) -> impl Iterator<Item = TokenId> + Send + 'static {
    let step = u64::try_from(lanes.max(1)).unwrap_or(u64::MAX);
    let offset = u64::try_from(lane)
        .unwrap_or(u64::MAX)
        .checked_rem(step)
        .unwrap_or_default();
    let first = if offset == 0 { step } else { offset };
    let step = usize::try_from(step).unwrap_or(usize::MAX);
    (first..=universe).step_by(step).map(TokenId)
}

/// Walk one lane sequentially, writing every `batch_size` records.
pub async fn run_lane<R, S>(
    reader: &R,
    store: &S,
    ids: impl Iterator<Item = TokenId> + Send,
    batch_size: usize,
) -> ReconcileReport
where
    R: ChainReader,
    S: TokenStore,
{
    let batch_size = batch_size.max(1);
    let mut report = ReconcileReport::default();
    let mut batch = Vec::with_capacity(batch_size);

    for id in ids {
        let record = read_record(reader, id, &mut report).await;
        batch.push(record);
        if batch.len() >= batch_size {
            flush(store, &mut batch, &mut report).await;
        }
    }
    flush(store, &mut batch, &mut report).await;
    report
}

async fn read_record<R: ChainReader>(reader: &R, id: TokenId, report: &mut ReconcileReport) -> TokenRecord {
    report.visited = report.visited.saturating_add(1);
    match reader.read_token(id).await {
        Ok((tier, mass)) => {
            report.existing = report.existing.saturating_add(1);
            TokenRecord::existing(id, tier, mass)
        }
        Err(e) if e.is_not_found() => {
            report.not_found = report.not_found.saturating_add(1);
            TokenRecord::absent(id)
        }
        Err(e) => {
            debug!(token_id = %id, error = %e, "token read failed, storing placeholder");
            report.unavailable = report.unavailable.saturating_add(1);
            TokenRecord::absent(id)
        }
    }
}

async fn flush<S: TokenStore>(store: &S, batch: &mut Vec<TokenRecord>, report: &mut ReconcileReport) {
    if batch.is_empty() {
        return;
    }
    if let Err(e) = store.upsert_batch(batch).await {
        let lost = u64::try_from(batch.len()).unwrap_or(u64::MAX);
        warn!(
            first = ?batch.first().map(|r| r.id),
            records = lost,
            error = %e,
            "batch upsert failed"
        );
        report.unwritten = report.unwritten.saturating_add(lost);
    }
    batch.clear();
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    fn ids(lane: usize, lanes: usize, universe: u64) -> Vec<u64> {
        lane_ids(lane, lanes, universe).map(TokenId::get).collect()
    }

    #[test]
    fn lanes_partition_the_universe() {
        assert_eq!(ids(0, 3, 10), vec![3, 6, 9]);
        assert_eq!(ids(1, 3, 10), vec![1, 4, 7, 10]);
        assert_eq!(ids(2, 3, 10), vec![2, 5, 8]);

        let mut all: Vec<u64> = (0..7).flat_map(|lane| ids(lane, 7, 50)).collect();
        all.sort_unstable();
        assert_eq!(all, (1..=50).collect::<Vec<_>>());
    }

    #[test]
    fn more_lanes_than_tokens() {
        assert_eq!(ids(0, 1_000, 5), Vec::<u64>::new());
        assert_eq!(ids(4, 1_000, 5), vec![4]);
        assert_eq!(ids(999, 1_000, 5), Vec::<u64>::new());
    }

    #[test]
    fn empty_universe_has_no_ids() {
        assert!(ids(1, 4, 0).is_empty());
        assert_eq!(ids(0, 1, 3), vec![1, 2, 3]);
    }

    #[test]
    fn report_totals() {
        let mut total = ReconcileReport::default();
        total.absorb(&ReconcileReport {
            visited: 10,
            existing: 7,
            not_found: 2,
            unavailable: 1,
            unwritten: 3,
            failed_lanes: 0,
        });
        total.absorb(&ReconcileReport {
            visited: 5,
            existing: 5,
            ..ReconcileReport::default()
        });
        assert_eq!(total.visited, 15);
        assert_eq!(total.existing, 12);
        assert_eq!(total.written(), 12);
    }
}
