//! Ledger-facing types.
//!
//! The contract is the authority on who bid what. The read-model only mirrors
//! it, so the two directions get distinct types:
//! - [`MirrorBid`]: a client report of a bid the ledger already accepted.
//!   Ingestion records it best-effort; it never asserts anything about the ledger.
//! - [`LedgerBidders`]: the full bidder list as read from the ledger. Only
//!   settlement consumes it, and it overwrites whatever the mirror holds.

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::LedgerAuctionId;
use crate::serde_utils::{deserialize_u256_lenient, serialize_u256_decimal};

/// One bidder entry as recorded by the auction contract.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq, Eq)]
pub struct LedgerBid {
    pub bidder: Address,
    /// Integer token amount in the token's smallest unit.
    #[serde(
        rename = "bidAmount",
        deserialize_with = "deserialize_u256_lenient",
        serialize_with = "serialize_u256_decimal"
    )]
    pub raw_amount: U256,
    /// Social id reported with the bid (`fid` on the contract). May hold a
    /// wallet address or a `none...` marker when the bidder has no social id.
    #[serde(rename = "fid", default)]
    pub social_id: String,
}

/// Where a [`LedgerBidders`] list came from.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum LedgerSource {
    /// Read by this service through `getBidders`.
    ContractRead,
    /// Read by the host's client and forwarded with the settlement request.
    HostReported,
}

/// Authoritative bidder list of one auction. May be empty.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct LedgerBidders {
    auction: LedgerAuctionId,
    entries: Vec<LedgerBid>,
    source: LedgerSource,
}

impl LedgerBidders {
    pub(crate) fn from_contract(auction: LedgerAuctionId, entries: Vec<LedgerBid>) -> Self {
        Self {
            auction,
            entries,
            source: LedgerSource::ContractRead,
        }
    }

    pub fn host_reported(auction: LedgerAuctionId, entries: Vec<LedgerBid>) -> Self {
        Self {
            auction,
            entries,
            source: LedgerSource::HostReported,
        }
    }

    pub fn auction(&self) -> &LedgerAuctionId {
        &self.auction
    }

    pub fn entries(&self) -> &[LedgerBid] {
        &self.entries
    }

    pub fn source(&self) -> LedgerSource {
        self.source
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// A bid the ledger already accepted, reported back for the read-model.
#[derive(Clone, Debug, PartialEq)]
pub struct MirrorBid {
    pub auction: LedgerAuctionId,
    pub bidder: Address,
    /// Human units.
    pub amount: Decimal,
    /// Client-chosen key of this bid attempt; retries with the same key are
    /// answered with the first recorded bid.
    pub idempotency_key: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_bid_accepts_contract_json() {
        let json = r#"{
            "bidder": "0x00000000000000000000000000000000000000aa",
            "bidAmount": "1500000",
            "fid": "12345"
        }"#;
        let bid: LedgerBid = serde_json::from_str(json).unwrap();
        assert_eq!(bid.raw_amount, U256::from(1_500_000u64));
        assert_eq!(bid.social_id, "12345");
    }

    #[test]
    fn test_ledger_bid_accepts_numeric_and_hex_amounts() {
        let numeric: LedgerBid = serde_json::from_str(
            r#"{"bidder":"0x00000000000000000000000000000000000000aa","bidAmount":42}"#,
        )
        .unwrap();
        assert_eq!(numeric.raw_amount, U256::from(42u64));
        assert_eq!(numeric.social_id, "");

        let hex: LedgerBid = serde_json::from_str(
            r#"{"bidder":"0x00000000000000000000000000000000000000aa","bidAmount":"0x2a","fid":"none"}"#,
        )
        .unwrap();
        assert_eq!(hex.raw_amount, U256::from(42u64));
    }
}
