//! The off-chain mirror of a single token.

use serde::{Deserialize, Serialize};

use crate::ids::{Mass, Tier, TokenId};

/// Last-known state of one token identifier.
///
/// Records are never deleted. A token consumed by a merge keeps its row
/// with `exists == false`, a neutral tier and zero mass, so it stays
/// queryable after destruction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenRecord {
    /// Stable identifier of the token.
    pub id: TokenId,
    /// Whether the token currently exists on the ledger.
    pub exists: bool,
    /// Class of the token. [`Tier::NEUTRAL`] once destroyed.
    pub tier: Tier,
    /// Current mass. [`Mass::ZERO`] once destroyed.
    pub mass: Mass,
    /// Whether this token is the current alpha (maximum mass).
    pub is_alpha: bool,
}

impl TokenRecord {
    /// A live token with the given class and mass.
    pub const fn existing(id: TokenId, tier: Tier, mass: Mass) -> Self {
        Self {
            id,
            exists: true,
            tier,
            mass,
            is_alpha: false,
        }
    }

    /// Placeholder for a token that was never minted, was destroyed, or
    /// could not be read.
    pub const fn absent(id: TokenId) -> Self {
        Self {
            id,
            exists: false,
            tier: Tier::NEUTRAL,
            mass: Mass::ZERO,
            is_alpha: false,
        }
    }

    /// The same record after being consumed by a merge.
    #[must_use]
    pub const fn retired(self) -> Self {
        Self::absent(self.id)
    }

    /// The same record carrying a new mass. Tier and existence are kept.
    #[must_use]
    pub const fn with_mass(mut self, mass: Mass) -> Self {
        self.mass = mass;
        self
    }
}
