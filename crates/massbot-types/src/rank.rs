//! Rank report returned by the read endpoint.

use serde::{Deserialize, Serialize};

use crate::ids::{Mass, Tier, TokenId};

/// Where a token stands by mass, within its tier and overall.
///
/// Ranks are 1-indexed: the heaviest existing token has rank 1.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RankReport {
    /// The token the report is about.
    pub token_id: TokenId,
    /// Whether the token currently exists.
    pub exists: bool,
    /// The token's tier.
    pub tier: Tier,
    /// The token's mass.
    pub mass: Mass,
    /// Rank among existing tokens of the same tier.
    pub rank: u64,
    /// Rank among all existing tokens.
    pub overall_rank: u64,
    /// Current owner, when it could be resolved.
    pub owner: Option<OwnerInfo>,
}

/// Owner of a token as shown to humans.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OwnerInfo {
    /// Checksummed account address.
    pub address: String,
    /// Reverse-resolved alias, if the owner has one.
    pub alias: Option<String>,
}

impl OwnerInfo {
    /// The alias when present, otherwise the address.
    pub fn display_name(&self) -> &str {
        self.alias.as_deref().unwrap_or(&self.address)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn report_uses_camel_case_fields() {
        let report = RankReport {
            token_id: TokenId(26984),
            exists: true,
            tier: Tier(3),
            mass: Mass(20),
            rank: 2,
            overall_rank: 9,
            owner: None,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["tokenId"], 26984);
        assert_eq!(json["overallRank"], 9);
        assert_eq!(json["mass"], 20);
        assert!(json["owner"].is_null());
    }

    #[test]
    fn display_name_prefers_alias() {
        let mut owner = OwnerInfo {
            address: "0xabc".to_owned(),
            alias: None,
        };
        assert_eq!(owner.display_name(), "0xabc");
        owner.alias = Some("pak.eth".to_owned());
        assert_eq!(owner.display_name(), "pak.eth");
    }
}
