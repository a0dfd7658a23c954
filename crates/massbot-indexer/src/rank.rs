//! Rank of a token by mass.
//!
//! Rank is `1 + number of existing tokens strictly heavier`, counted once
//! within the token's tier and once across all tiers. Ties share a rank.
//! The counts run at read-committed isolation, so a merge landing
//! mid-query may or may not be reflected.

use massbot_db::{CountFilter, TokenStore};
use massbot_types::{RankReport, TokenId};

use crate::error::IndexerError;

/// Compute the rank report for `id`, without owner information.
///
/// Returns `Ok(None)` when the store has no record for `id`.
pub async fn rank_of<S: TokenStore>(store: &S, id: TokenId) -> Result<Option<RankReport>, IndexerError> {
    let Some(record) = store.get(id).await? else {
        return Ok(None);
    };

    let heavier = CountFilter::existing().heavier_than(record.mass);
    let in_tier = store.count(heavier.in_tier(record.tier)).await?;
    let overall = store.count(heavier).await?;

    Ok(Some(RankReport {
        token_id: id,
        exists: record.exists,
        tier: record.tier,
        mass: record.mass,
        rank: in_tier.saturating_add(1),
        overall_rank: overall.saturating_add(1),
        owner: None,
    }))
}
