//! Claim and fulfillment identifier grammars.
//!
//! Claim ids look like `CLAIM_9F3A02BC_20250805`: an 8-character token from
//! a v4 uuid plus the mint date. A fresh id is minted for every inbound
//! message; there is no thread continuity between messages from the same
//! sender. The 8-character token space carries a birthday-bound collision
//! risk at high volume and no uniqueness is enforced downstream.

use std::fmt;
use std::sync::LazyLock;

use chrono::Utc;
use regex::Regex;
use serde::{Deserialize, Serialize};
use uuid::Uuid;

static CLAIM_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^CLAIM_[A-Z0-9]{8}_[0-9]{8}$").unwrap());

static FULFILLMENT_ID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^FULFILL_[A-Z0-9]{8}$").unwrap());

/// A minted claim identifier, `CLAIM_<8 alphanumeric>_<YYYYMMDD>`.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ClaimId(String);

impl ClaimId {
    /// Mint a fresh claim id for today.
    pub fn mint() -> Self {
        let token: String = Uuid::new_v4()
            .simple()
            .to_string()
            .to_uppercase()
            .chars()
            .take(8)
            .collect();
        let date = Utc::now().format("%Y%m%d");
        Self(format!("CLAIM_{token}_{date}"))
    }

    /// Parse a string that must already match the claim id grammar.
    pub fn parse(s: &str) -> Option<Self> {
        CLAIM_ID_RE.is_match(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for ClaimId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// A fulfillment record identifier, `FULFILL_<8 alphanumeric>`.
///
/// Minted by the record store collaborator; validated here when echoed back.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct FulfillmentId(String);

impl FulfillmentId {
    pub fn parse(s: &str) -> Option<Self> {
        FULFILLMENT_ID_RE.is_match(s).then(|| Self(s.to_string()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for FulfillmentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

#[cfg(test)]
mod tests {
    use std::collections::HashSet;

    use super::*;

    #[test]
    fn minted_id_matches_grammar() {
        let id = ClaimId::mint();
        assert!(CLAIM_ID_RE.is_match(id.as_str()), "bad id: {id}");
    }

    #[test]
    fn minted_id_date_suffix_is_today() {
        let id = ClaimId::mint();
        let expected = Utc::now().format("%Y%m%d").to_string();
        assert!(id.as_str().ends_with(&expected));
    }

    #[test]
    fn parse_accepts_valid() {
        assert!(ClaimId::parse("CLAIM_9F3A02BC_20250805").is_some());
        assert!(ClaimId::parse("CLAIM_00000000_19991231").is_some());
    }

    #[test]
    fn parse_rejects_invalid() {
        assert!(ClaimId::parse("CLAIM_9f3a02bc_20250805").is_none());
        assert!(ClaimId::parse("CLAIM_9F3A02BC").is_none());
        assert!(ClaimId::parse("FULFILL_9F3A02BC").is_none());
        assert!(ClaimId::parse("CLAIM_9F3A02BC_2025080").is_none());
        assert!(ClaimId::parse("prefix CLAIM_9F3A02BC_20250805").is_none());
    }

    #[test]
    fn fulfillment_id_grammar() {
        assert!(FulfillmentId::parse("FULFILL_AB12CD34").is_some());
        assert!(FulfillmentId::parse("FULFILL_ab12cd34").is_none());
        assert!(FulfillmentId::parse("FULFILL_AB12CD345").is_none());
    }

    // The 8-char hex token space (16^8 ≈ 4.3e9) gives roughly a 1%
    // chance of any collision across 10k mints, so uniqueness at
    // genuinely large scale would need enforcement at the persistence
    // layer. The bound below tolerates the birthday-expected handful.
    #[test]
    fn ten_thousand_mints_grammar_and_collision_bound() {
        let mut seen = HashSet::new();
        for _ in 0..10_000 {
            let id = ClaimId::mint();
            assert!(CLAIM_ID_RE.is_match(id.as_str()));
            seen.insert(id.as_str().to_string());
        }
        assert!(seen.len() >= 9_995, "unexpected collision rate: {}", seen.len());
    }
}
