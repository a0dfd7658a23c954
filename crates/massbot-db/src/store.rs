//! The contract both store backends implement.
//!
//! Every write is keyed by token identifier and idempotent, so the bulk
//! reconciler and the event applicator can write concurrently. The
//! read-modify-write operations ([`TokenStore::retire`],
//! [`TokenStore::set_mass`], [`TokenStore::mark_alpha`]) are atomic per
//! call and hand back the record as it was before the write.
//!
//! The alpha flag is owned by [`TokenStore::mark_alpha`]: plain upserts
//! never set it, and only clear it when the record stops existing.

use std::future::Future;

use massbot_types::{Mass, Tier, TokenId, TokenRecord};

use crate::error::DbError;

/// Predicate for [`TokenStore::count`]. Unset fields match everything.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CountFilter {
    /// Match only records with this existence flag.
    pub exists: Option<bool>,
    /// Match only records of this tier.
    pub tier: Option<Tier>,
    /// Match only records strictly heavier than this.
    pub mass_above: Option<Mass>,
}

impl CountFilter {
    /// Records that currently exist.
    pub const fn existing() -> Self {
        Self {
            exists: Some(true),
            tier: None,
            mass_above: None,
        }
    }

    /// Restrict to one tier.
    #[must_use]
    pub const fn in_tier(mut self, tier: Tier) -> Self {
        self.tier = Some(tier);
        self
    }

    /// Restrict to records with mass strictly greater than `mass`.
    #[must_use]
    pub const fn heavier_than(mut self, mass: Mass) -> Self {
        self.mass_above = Some(mass);
        self
    }

    /// Whether `record` satisfies the predicate.
    pub fn matches(&self, record: &TokenRecord) -> bool {
        self.exists.is_none_or(|exists| record.exists == exists)
            && self.tier.is_none_or(|tier| record.tier == tier)
            && self.mass_above.is_none_or(|mass| record.mass > mass)
    }
}

/// Result of [`TokenStore::mark_alpha`].
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AlphaUpdate {
    /// Whether a record existed for the new alpha. Nothing is written
    /// when it did not.
    pub found: bool,
    /// Previous holders whose flag was cleared.
    pub cleared: Vec<TokenId>,
}

/// Durable mapping from token identifier to [`TokenRecord`].
pub trait TokenStore: Send + Sync {
    /// Point lookup.
    fn get(&self, id: TokenId) -> impl Future<Output = Result<Option<TokenRecord>, DbError>> + Send;

    /// Insert or overwrite one record. `is_alpha` is ignored on input.
    fn upsert(&self, record: TokenRecord) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Insert or overwrite many records atomically.
    fn upsert_batch(&self, records: &[TokenRecord]) -> impl Future<Output = Result<(), DbError>> + Send;

    /// Mark a token as consumed by a merge.
    ///
    /// Returns the prior record, or `None` when there was none. A prior
    /// record that already shows `exists == false` is left untouched.
    fn retire(&self, id: TokenId) -> impl Future<Output = Result<Option<TokenRecord>, DbError>> + Send;

    /// Set a token's mass, keeping tier and existence.
    ///
    /// Returns the prior record, or `None` (and writes nothing) when there
    /// was none.
    fn set_mass(
        &self,
        id: TokenId,
        mass: Mass,
    ) -> impl Future<Output = Result<Option<TokenRecord>, DbError>> + Send;

    /// Make `id` the single alpha, clearing the flag everywhere else.
    fn mark_alpha(&self, id: TokenId) -> impl Future<Output = Result<AlphaUpdate, DbError>> + Send;

    /// Number of records matching `filter`.
    fn count(&self, filter: CountFilter) -> impl Future<Output = Result<u64, DbError>> + Send;
}
