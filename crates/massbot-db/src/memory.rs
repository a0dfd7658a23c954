//! In-memory implementation of [`TokenStore`].
//!
//! Same semantics as the `PostgreSQL` store, held in a [`BTreeMap`] behind
//! a [`tokio::sync::RwLock`]. Used by tests and by `--memory` runs.

use std::collections::BTreeMap;

use massbot_types::{Mass, TokenId, TokenRecord};
use tokio::sync::RwLock;

use crate::error::DbError;
use crate::store::{AlphaUpdate, CountFilter, TokenStore};

/// Token mirror kept in process memory.
#[derive(Debug, Default)]
pub struct MemoryStore {
    records: RwLock<BTreeMap<TokenId, TokenRecord>>,
}

impl MemoryStore {
    /// An empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// A copy of every record, ordered by identifier.
    pub async fn snapshot(&self) -> Vec<TokenRecord> {
        self.records.read().await.values().copied().collect()
    }

    /// Number of records held.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    /// Whether the store holds no records.
    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }

    fn write_record(records: &mut BTreeMap<TokenId, TokenRecord>, record: TokenRecord) {
        let keep_alpha = record.exists
            && records.get(&record.id).is_some_and(|prior| prior.is_alpha);
        records.insert(
            record.id,
            TokenRecord {
                is_alpha: keep_alpha,
                ..record
            },
        );
    }
}

impl TokenStore for MemoryStore {
    async fn get(&self, id: TokenId) -> Result<Option<TokenRecord>, DbError> {
        Ok(self.records.read().await.get(&id).copied())
    }

    async fn upsert(&self, record: TokenRecord) -> Result<(), DbError> {
        Self::write_record(&mut *self.records.write().await, record);
        Ok(())
    }

    async fn upsert_batch(&self, records: &[TokenRecord]) -> Result<(), DbError> {
        let mut map = self.records.write().await;
        for record in records {
            Self::write_record(&mut map, *record);
        }
        Ok(())
    }

    async fn retire(&self, id: TokenId) -> Result<Option<TokenRecord>, DbError> {
        let mut map = self.records.write().await;
        let prior = map.get(&id).copied();
        if let Some(record) = prior.filter(|p| p.exists) {
            map.insert(id, record.retired());
        }
        Ok(prior)
    }

    async fn set_mass(&self, id: TokenId, mass: Mass) -> Result<Option<TokenRecord>, DbError> {
        let mut map = self.records.write().await;
        let Some(record) = map.get_mut(&id) else {
            return Ok(None);
        };
        let prior = *record;
        *record = prior.with_mass(mass);
        Ok(Some(prior))
    }

    async fn mark_alpha(&self, id: TokenId) -> Result<AlphaUpdate, DbError> {
        let mut map = self.records.write().await;
        if !map.contains_key(&id) {
            return Ok(AlphaUpdate::default());
        }

        let mut cleared = Vec::new();
        for record in map.values_mut() {
            if record.id == id {
                record.is_alpha = true;
            } else if record.is_alpha {
                record.is_alpha = false;
                cleared.push(record.id);
            }
        }

        Ok(AlphaUpdate {
            found: true,
            cleared,
        })
    }

    async fn count(&self, filter: CountFilter) -> Result<u64, DbError> {
        let map = self.records.read().await;
        let count = map.values().filter(|record| filter.matches(record)).count();
        u64::try_from(count).map_err(|e| DbError::OutOfRange(format!("row count {count}: {e}")))
    }
}
