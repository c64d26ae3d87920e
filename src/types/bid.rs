//! Bid and winner records.

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::{AuctionKey, LedgerAuctionId};

/// One entry of an auction's bid list.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Bid {
    pub bidder: Address,
    /// Amount in human units, never negative.
    pub amount: Decimal,
    /// USD value computed when the bid was recorded. `None` means unknown, not zero.
    #[serde(default)]
    pub usd_value: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
}

/// Bid as returned to the bidder after ingestion.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidRecord {
    pub auction_id: LedgerAuctionId,
    pub bidder: Address,
    pub amount: Decimal,
    pub currency: String,
    pub usd_value: Option<Decimal>,
    pub timestamp: DateTime<Utc>,
    /// True when an earlier attempt with the same idempotency key was returned.
    #[serde(default)]
    pub replayed: bool,
}

/// Final winner of a settled auction; one per auction.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WinningBid {
    pub auction: AuctionKey,
    pub ledger_id: LedgerAuctionId,
    pub winner: Address,
    pub amount: Decimal,
    pub currency: String,
    pub usd_amount: Option<Decimal>,
    pub created_at: DateTime<Utc>,
}
