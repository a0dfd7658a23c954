//! Bulk reconciliation against a scripted ledger and the in-memory store.

#![allow(
    clippy::unwrap_used,
    clippy::expect_used,
    clippy::panic,
    clippy::indexing_slicing,
    clippy::arithmetic_side_effects,
    clippy::missing_panics_doc
)]

mod common;

use std::sync::Arc;
use std::time::Duration;

use common::FakeLedger;
use massbot_chain::{Address, ChainError, ChainReader, TokenValue};
use massbot_db::{AlphaUpdate, CountFilter, DbError, MemoryStore, TokenStore};
use massbot_indexer::{BulkReconciler, ReconcileConfig};
use massbot_types::{Mass, Tier, TokenId, TokenRecord};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

fn config(concurrency: usize, batch_size: usize) -> ReconcileConfig {
    ReconcileConfig {
        concurrency,
        batch_size,
    }
}

#[tokio::test]
async fn unminted_ids_become_placeholders() {
    let ledger = Arc::new(FakeLedger::with_tokens(&[
        (1, 3, 10),
        (2, 1, 4),
        (4, 3, 20),
        (5, 2, 7),
    ]));
    let store = Arc::new(MemoryStore::new());
    let report = BulkReconciler::new(ledger, Arc::clone(&store), config(3, 2))
        .run(8)
        .await;

    assert_eq!(report.visited, 8);
    assert_eq!(report.existing, 4);
    assert_eq!(report.not_found, 4);
    assert_eq!(report.failed_lanes, 0);

    let records = store.snapshot().await;
    assert_eq!(records.len(), 8);
    for id in [3, 6, 7, 8] {
        assert_eq!(records[id - 1], TokenRecord::absent(TokenId(id as u64)));
    }
    assert_eq!(
        records[3],
        TokenRecord::existing(TokenId(4), Tier(3), Mass(20))
    );
}

#[tokio::test]
async fn unavailable_reads_do_not_abort_the_pass() {
    let mut ledger = FakeLedger::with_tokens(&[(1, 1, 1), (2, 1, 2), (3, 1, 3), (4, 1, 4)]);
    ledger.unavailable.insert(2);
    let store = Arc::new(MemoryStore::new());
    let report = BulkReconciler::new(Arc::new(ledger), Arc::clone(&store), config(2, 10))
        .run(4)
        .await;

    assert_eq!(report.unavailable, 1);
    assert_eq!(report.existing, 3);
    assert_eq!(
        store.get(TokenId(2)).await.unwrap(),
        Some(TokenRecord::absent(TokenId(2)))
    );
    assert_eq!(store.count(CountFilter::existing()).await.unwrap(), 3);
}

#[tokio::test]
async fn second_pass_converges_to_the_same_state() {
    let ledger = Arc::new(FakeLedger::with_tokens(&[(1, 3, 10), (3, 4, 99), (9, 2, 5)]));
    let store = Arc::new(MemoryStore::new());
    let reconciler = BulkReconciler::new(ledger, Arc::clone(&store), config(4, 3));

    reconciler.run(10).await;
    let first = store.snapshot().await;
    reconciler.run(10).await;
    assert_eq!(store.snapshot().await, first);
}

#[tokio::test]
async fn bulk_pass_overwrites_stale_records() {
    let ledger = Arc::new(FakeLedger::with_tokens(&[(1, 3, 15)]));
    let store = Arc::new(MemoryStore::new());
    store
        .upsert_batch(&[
            TokenRecord::existing(TokenId(1), Tier(3), Mass(10)),
            TokenRecord::existing(TokenId(2), Tier(1), Mass(3)),
        ])
        .await
        .unwrap();

    BulkReconciler::new(ledger, Arc::clone(&store), config(1, 1)).run(2).await;
    assert_eq!(store.get(TokenId(1)).await.unwrap().unwrap().mass, Mass(15));
    assert!(!store.get(TokenId(2)).await.unwrap().unwrap().exists);
}

/// Random latency and failures, decided up front per identifier so that a
/// concurrent and a sequential pass see the same ledger.
fn chaotic_ledger(seed: u64, universe: u64) -> FakeLedger {
    let mut rng = StdRng::seed_from_u64(seed);
    let mut ledger = FakeLedger::default();
    for id in 1..=universe {
        if rng.random_bool(0.7) {
            ledger
                .tokens
                .insert(id, (rng.random_range(1..=4), rng.random_range(1..1_000)));
        }
        if rng.random_bool(0.1) {
            ledger.unavailable.insert(id);
        }
        ledger
            .latency
            .insert(id, Duration::from_millis(rng.random_range(0..25)));
    }
    ledger
}

#[tokio::test(start_paused = true)]
async fn concurrent_lanes_match_a_sequential_run() {
    let universe = 240;

    let concurrent_store = Arc::new(MemoryStore::new());
    let concurrent = BulkReconciler::new(
        Arc::new(chaotic_ledger(7, universe)),
        Arc::clone(&concurrent_store),
        config(16, 4),
    )
    .run(universe)
    .await;

    let sequential_store = Arc::new(MemoryStore::new());
    let sequential = BulkReconciler::new(
        Arc::new(chaotic_ledger(7, universe)),
        Arc::clone(&sequential_store),
        config(1, 4),
    )
    .run(universe)
    .await;

    assert_eq!(concurrent, sequential);
    assert_eq!(concurrent.visited, universe);
    assert_eq!(concurrent_store.len().await, 240);
    assert_eq!(concurrent_store.snapshot().await, sequential_store.snapshot().await);
}

/// Ledger that panics when asked about one identifier.
struct PanickyLedger {
    inner: FakeLedger,
    poison: u64,
}

impl ChainReader for PanickyLedger {
    async fn value_of(&self, id: TokenId) -> Result<TokenValue, ChainError> {
        if id.get() == self.poison {
            panic!("poisoned token {id}");
        }
        self.inner.value_of(id).await
    }

    async fn decode(&self, value: TokenValue) -> Result<(Tier, Mass), ChainError> {
        self.inner.decode(value).await
    }

    async fn owner_of(&self, id: TokenId) -> Result<Address, ChainError> {
        self.inner.owner_of(id).await
    }

    async fn resolve_alias(&self, address: Address) -> Option<String> {
        self.inner.resolve_alias(address).await
    }

    async fn universe_size(&self) -> Result<u64, ChainError> {
        self.inner.universe_size().await
    }

    async fn current_alpha(&self) -> Result<TokenId, ChainError> {
        self.inner.current_alpha().await
    }
}

#[tokio::test]
async fn a_dead_lane_does_not_truncate_the_others() {
    let tokens: Vec<_> = (1..=12).map(|id| (id, 1, id)).collect();
    let ledger = PanickyLedger {
        inner: FakeLedger::with_tokens(&tokens),
        poison: 5,
    };
    let store = Arc::new(MemoryStore::new());
    // Lanes of 3: {3,6,9,12}, {1,4,7,10}, {2,5,8,11}. The third dies at 5.
    let report = BulkReconciler::new(Arc::new(ledger), Arc::clone(&store), config(3, 1))
        .run(12)
        .await;

    assert_eq!(report.failed_lanes, 1);
    for id in [1, 3, 4, 6, 7, 9, 10, 12, 2] {
        assert!(store.get(TokenId(id)).await.unwrap().is_some(), "token {id} missing");
    }
    for id in [5, 8, 11] {
        assert_eq!(store.get(TokenId(id)).await.unwrap(), None);
    }
}

/// Store that rejects any batch containing one identifier.
#[derive(Default)]
struct FlakyStore {
    inner: MemoryStore,
    reject: u64,
}

impl TokenStore for FlakyStore {
    async fn get(&self, id: TokenId) -> Result<Option<TokenRecord>, DbError> {
        self.inner.get(id).await
    }

    async fn upsert(&self, record: TokenRecord) -> Result<(), DbError> {
        self.inner.upsert(record).await
    }

    async fn upsert_batch(&self, records: &[TokenRecord]) -> Result<(), DbError> {
        if records.iter().any(|r| r.id.get() == self.reject) {
            return Err(DbError::Config("write rejected".to_owned()));
        }
        self.inner.upsert_batch(records).await
    }

    async fn retire(&self, id: TokenId) -> Result<Option<TokenRecord>, DbError> {
        self.inner.retire(id).await
    }

    async fn set_mass(&self, id: TokenId, mass: Mass) -> Result<Option<TokenRecord>, DbError> {
        self.inner.set_mass(id, mass).await
    }

    async fn mark_alpha(&self, id: TokenId) -> Result<AlphaUpdate, DbError> {
        self.inner.mark_alpha(id).await
    }

    async fn count(&self, filter: CountFilter) -> Result<u64, DbError> {
        self.inner.count(filter).await
    }
}

#[tokio::test]
async fn failed_batch_write_keeps_the_lane_going() {
    let ledger = FakeLedger::with_tokens(&[(1, 1, 1), (2, 1, 2), (3, 1, 3), (4, 1, 4), (5, 1, 5)]);
    let store = Arc::new(FlakyStore {
        reject: 2,
        ..FlakyStore::default()
    });
    let report = BulkReconciler::new(Arc::new(ledger), Arc::clone(&store), config(1, 2))
        .run(5)
        .await;

    assert_eq!(report.unwritten, 2);
    assert_eq!(report.written(), 3);
    assert_eq!(store.inner.get(TokenId(1)).await.unwrap(), None);
    assert!(store.inner.get(TokenId(3)).await.unwrap().is_some());
    assert!(store.inner.get(TokenId(5)).await.unwrap().is_some());
}

#[tokio::test]
async fn alpha_sync_marks_the_current_alpha() {
    let mut ledger = FakeLedger::with_tokens(&[(1, 4, 900), (2, 4, 100)]);
    ledger.alpha = 1;
    let store = Arc::new(MemoryStore::new());
    let reconciler = BulkReconciler::new(Arc::new(ledger), Arc::clone(&store), config(2, 2));

    assert_eq!(reconciler.sync_alpha().await.unwrap(), None);
    reconciler.run(2).await;
    assert_eq!(reconciler.sync_alpha().await.unwrap(), Some(TokenId(1)));
    assert!(store.get(TokenId(1)).await.unwrap().unwrap().is_alpha);
}

#[tokio::test]
async fn alpha_sync_surfaces_ledger_errors() {
    let store = Arc::new(MemoryStore::new());
    let reconciler = BulkReconciler::new(Arc::new(FakeLedger::default()), store, config(1, 1));
    assert!(reconciler.sync_alpha().await.is_err());
}
