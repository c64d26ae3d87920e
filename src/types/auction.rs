//! Auction read-model types.

use std::collections::BTreeSet;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use super::{AuctionKey, Bid, LedgerAuctionId};
use crate::{consts::MAX_AUCTION_NAME_LEN, Error};

/// Host fee applied when the draft does not carry one.
pub const DEFAULT_HOST_FEE_PERCENTAGE: Decimal = dec!(2.5);

/// Lifecycle phase, derived from the clock and settlement state.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum AuctionPhase {
    /// Start time not reached.
    Upcoming,
    /// Accepting bids.
    Running,
    /// Closed to bids and awaiting (or undergoing) settlement.
    Ending,
    /// Settled; the bid list is final.
    Ended,
}

/// Which quantity decided the winner at settlement.
#[derive(Deserialize, Serialize, Clone, Copy, Debug, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum RankingBasis {
    /// Every entry had a USD value.
    Usd,
    /// At least one entry lacked a USD value, so all were ranked by amount.
    Amount,
}

/// Outcome written by the settlement reconciler, exactly once per auction.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementRecord {
    pub settled_at: DateTime<Utc>,
    pub winner: Option<Address>,
    pub winning_amount: Option<Decimal>,
    pub winning_usd: Option<Decimal>,
    pub ranking_basis: RankingBasis,
    /// Winning amount in human units, zero without bids.
    pub total_revenue: Decimal,
}

/// Host-reported auction, created after the ledger confirmed `startAuction`.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionDraft {
    pub ledger_id: LedgerAuctionId,
    pub name: String,
    pub token: Address,
    pub currency: String,
    pub minimum_bid: Decimal,
    #[serde(default)]
    pub reserve_price: Option<Decimal>,
    #[serde(default)]
    pub host_fee_percentage: Option<Decimal>,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    #[serde(default)]
    pub creation_hash: Option<String>,
}

impl AuctionDraft {
    /// Check the draft and return it with normalised fields.
    pub fn validated(mut self) -> Result<Self, Error> {
        self.name = self.name.trim().to_string();
        self.currency = self.currency.trim().to_uppercase();

        if self.ledger_id.is_empty() {
            return Err(Error::InvalidAuction("ledger auction id is required".into()));
        }
        if self.name.is_empty() {
            return Err(Error::InvalidAuction("auction name is required".into()));
        }
        if self.name.chars().count() > MAX_AUCTION_NAME_LEN {
            return Err(Error::InvalidAuction(format!(
                "auction name exceeds {MAX_AUCTION_NAME_LEN} characters"
            )));
        }
        if self.currency.is_empty() {
            return Err(Error::InvalidAuction("currency is required".into()));
        }
        if self.end_time <= self.start_time {
            return Err(Error::InvalidAuction(
                "End date must be after start date".into(),
            ));
        }
        if self.minimum_bid.is_sign_negative() {
            return Err(Error::InvalidAuction("minimum bid cannot be negative".into()));
        }
        if let Some(reserve) = self.reserve_price {
            if reserve < self.minimum_bid {
                return Err(Error::InvalidAuction(
                    "Reserve price must be greater than or equal to minimum bid".into(),
                ));
            }
        }
        if let Some(fee) = self.host_fee_percentage {
            if fee.is_sign_negative() || fee > dec!(100) {
                return Err(Error::InvalidAuction(
                    "host fee percentage must be between 0 and 100".into(),
                ));
            }
        }
        Ok(self)
    }
}

/// Denormalised auction as held by the read-model.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct Auction {
    pub key: AuctionKey,
    pub ledger_id: LedgerAuctionId,
    pub name: String,
    pub token: Address,
    pub currency: String,
    pub minimum_bid: Decimal,
    pub reserve_price: Option<Decimal>,
    pub host_fee_percentage: Decimal,
    pub start_time: DateTime<Utc>,
    pub end_time: DateTime<Utc>,
    pub host: Address,
    pub creation_hash: Option<String>,
    pub bids: Vec<Bid>,
    pub participants: BTreeSet<Address>,
    /// Highest recorded amount, maintained together with `bids`.
    pub highest_bid: Option<Decimal>,
    pub settlement: Option<SettlementRecord>,
    pub created_at: DateTime<Utc>,
}

impl Auction {
    pub fn from_draft(
        key: AuctionKey,
        host: Address,
        draft: AuctionDraft,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            key,
            ledger_id: draft.ledger_id,
            name: draft.name,
            token: draft.token,
            currency: draft.currency,
            minimum_bid: draft.minimum_bid,
            reserve_price: draft.reserve_price,
            host_fee_percentage: draft
                .host_fee_percentage
                .unwrap_or(DEFAULT_HOST_FEE_PERCENTAGE),
            start_time: draft.start_time,
            end_time: draft.end_time,
            host,
            creation_hash: draft.creation_hash,
            bids: Vec::new(),
            participants: BTreeSet::new(),
            highest_bid: None,
            settlement: None,
            created_at,
        }
    }

    /// Highest recorded bid, zero when there are none.
    pub fn current_highest_bid(&self) -> Decimal {
        self.highest_bid.unwrap_or(Decimal::ZERO)
    }

    pub fn is_settled(&self) -> bool {
        self.settlement.is_some()
    }

    /// `settling` is true while a settlement holds this auction's gate.
    pub fn phase(&self, now: DateTime<Utc>, settling: bool) -> AuctionPhase {
        if self.is_settled() {
            AuctionPhase::Ended
        } else if settling || now > self.end_time {
            AuctionPhase::Ending
        } else if now < self.start_time {
            AuctionPhase::Upcoming
        } else {
            AuctionPhase::Running
        }
    }

    /// First bid carrying the highest amount.
    pub fn top_bid(&self) -> Option<&Bid> {
        let highest = self.highest_bid?;
        self.bids.iter().find(|bid| bid.amount == highest)
    }

    pub fn participant_count(&self) -> usize {
        self.participants.len()
    }

    pub fn bid_count(&self) -> usize {
        self.bids.len()
    }

    /// Whole hours until the end time, floored at zero.
    pub fn hours_remaining(&self, now: DateTime<Utc>) -> i64 {
        (self.end_time - now).num_hours().max(0)
    }

    pub fn reserve_met(&self) -> bool {
        match self.reserve_price {
            None => true,
            Some(reserve) => self.highest_bid.is_some_and(|highest| highest >= reserve),
        }
    }

    pub fn total_revenue(&self) -> Decimal {
        self.settlement
            .as_ref()
            .map(|s| s.total_revenue)
            .unwrap_or(Decimal::ZERO)
    }

    /// Host's share of the revenue.
    pub fn host_revenue(&self) -> Decimal {
        self.total_revenue() * self.host_fee_percentage / dec!(100)
    }

    /// Append a bid and refresh the denormalised fields in one step.
    pub(crate) fn push_bid(&mut self, bid: Bid) {
        if self.highest_bid.map_or(true, |h| bid.amount > h) {
            self.highest_bid = Some(bid.amount);
        }
        self.participants.insert(bid.bidder);
        self.bids.push(bid);
    }

    /// Replace the bid list wholesale and recompute the denormalised fields.
    pub(crate) fn replace_bids(&mut self, bids: Vec<Bid>) {
        self.highest_bid = bids.iter().map(|b| b.amount).max();
        self.participants = bids.iter().map(|b| b.bidder).collect();
        self.bids = bids;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use alloy::primitives::address;
    use chrono::Duration;

    fn draft(now: DateTime<Utc>) -> AuctionDraft {
        AuctionDraft {
            ledger_id: LedgerAuctionId::new("auction-1"),
            name: "  Genesis drop ".into(),
            token: address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913"),
            currency: "usdc".into(),
            minimum_bid: dec!(100),
            reserve_price: None,
            host_fee_percentage: None,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(5),
            creation_hash: None,
        }
    }

    #[test]
    fn test_draft_normalises_fields() {
        let now = Utc::now();
        let d = draft(now).validated().unwrap();
        assert_eq!(d.name, "Genesis drop");
        assert_eq!(d.currency, "USDC");
    }

    #[test]
    fn test_draft_rejects_inverted_window() {
        let now = Utc::now();
        let mut d = draft(now);
        d.end_time = d.start_time;
        assert!(matches!(d.validated(), Err(Error::InvalidAuction(_))));
    }

    #[test]
    fn test_draft_rejects_reserve_below_minimum() {
        let now = Utc::now();
        let mut d = draft(now);
        d.reserve_price = Some(dec!(50));
        assert!(matches!(d.validated(), Err(Error::InvalidAuction(_))));
    }

    #[test]
    fn test_phase_transitions() {
        let now = Utc::now();
        let mut auction =
            Auction::from_draft(AuctionKey(1), Address::ZERO, draft(now).validated().unwrap(), now);

        assert_eq!(auction.phase(now, false), AuctionPhase::Running);
        assert_eq!(auction.phase(now, true), AuctionPhase::Ending);
        assert_eq!(
            auction.phase(now - Duration::hours(2), false),
            AuctionPhase::Upcoming
        );
        assert_eq!(
            auction.phase(now + Duration::hours(6), false),
            AuctionPhase::Ending
        );

        auction.settlement = Some(SettlementRecord {
            settled_at: now,
            winner: None,
            winning_amount: None,
            winning_usd: None,
            ranking_basis: RankingBasis::Amount,
            total_revenue: Decimal::ZERO,
        });
        assert_eq!(auction.phase(now, false), AuctionPhase::Ended);
    }

    #[test]
    fn test_push_bid_maintains_highest_and_participants() {
        let now = Utc::now();
        let mut auction =
            Auction::from_draft(AuctionKey(1), Address::ZERO, draft(now).validated().unwrap(), now);
        let alice = Address::repeat_byte(0x11);

        auction.push_bid(Bid {
            bidder: alice,
            amount: dec!(150),
            usd_value: None,
            timestamp: now,
        });
        auction.push_bid(Bid {
            bidder: alice,
            amount: dec!(200),
            usd_value: None,
            timestamp: now,
        });

        assert_eq!(auction.current_highest_bid(), dec!(200));
        assert_eq!(auction.participant_count(), 1);
        assert_eq!(auction.bid_count(), 2);
        assert_eq!(auction.top_bid().map(|b| b.amount), Some(dec!(200)));
    }

    #[test]
    fn test_host_revenue_uses_fee_percentage() {
        let now = Utc::now();
        let mut auction =
            Auction::from_draft(AuctionKey(1), Address::ZERO, draft(now).validated().unwrap(), now);
        auction.settlement = Some(SettlementRecord {
            settled_at: now,
            winner: Some(Address::repeat_byte(1)),
            winning_amount: Some(dec!(200)),
            winning_usd: Some(dec!(200)),
            ranking_basis: RankingBasis::Usd,
            total_revenue: dec!(200),
        });
        assert_eq!(auction.host_revenue(), dec!(5));
    }
}
