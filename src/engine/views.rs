//! Read-model queries shaped for listing pages.

use alloy::primitives::{Address, U256};
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::AuctionEngine;
use crate::{
    identity::DisplayIdentity,
    prelude::*,
    pricing::to_human_units,
    types::{Auction, AuctionKey, AuctionPhase, LedgerAuctionId, LedgerBidders, SettlementRecord},
};

/// Denormalized auction state as shown on detail pages.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct AuctionSummary {
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
    pub phase: AuctionPhase,
    pub highest_bid: Decimal,
    pub participant_count: usize,
    pub bid_count: usize,
    pub hours_remaining: i64,
    pub creation_hash: Option<String>,
    pub settlement: Option<SettlementRecord>,
    pub reserve_met: bool,
    pub host_revenue: Decimal,
}

impl AuctionSummary {
    fn new(auction: &Auction, now: DateTime<Utc>, settling: bool) -> Self {
        Self {
            key: auction.key,
            ledger_id: auction.ledger_id.clone(),
            name: auction.name.clone(),
            token: auction.token,
            currency: auction.currency.clone(),
            minimum_bid: auction.minimum_bid,
            reserve_price: auction.reserve_price,
            host_fee_percentage: auction.host_fee_percentage,
            start_time: auction.start_time,
            end_time: auction.end_time,
            host: auction.host,
            phase: auction.phase(now, settling),
            highest_bid: auction.current_highest_bid(),
            participant_count: auction.participant_count(),
            bid_count: auction.bid_count(),
            hours_remaining: auction.hours_remaining(now),
            creation_hash: auction.creation_hash.clone(),
            settlement: auction.settlement.clone(),
            reserve_met: auction.reserve_met(),
            host_revenue: auction.host_revenue(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RunningAuction {
    pub ledger_id: LedgerAuctionId,
    pub name: String,
    pub currency: String,
    pub minimum_bid: Decimal,
    pub highest_bid: Decimal,
    pub top_bidder: Option<DisplayIdentity>,
    pub participant_count: usize,
    pub bid_count: usize,
    pub hours_remaining: i64,
    pub end_time: DateTime<Utc>,
    pub host: DisplayIdentity,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct HostedEntry {
    #[serde(flatten)]
    pub auction: AuctionSummary,
    pub time_info: String,
}

#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
pub struct HostedAuctions {
    pub active: Vec<HostedEntry>,
    pub upcoming: Vec<HostedEntry>,
    pub ended: Vec<HostedEntry>,
}

impl HostedAuctions {
    pub fn total(&self) -> usize {
        self.active.len() + self.upcoming.len() + self.ended.len()
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ParticipatedEntry {
    #[serde(flatten)]
    pub auction: AuctionSummary,
    /// The user's own highest recorded bid.
    pub my_highest_bid: Option<Decimal>,
    pub won: bool,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidderRow {
    pub display_name: String,
    pub image: String,
    /// Raw ledger amount, base 10.
    pub bid_amount: String,
    /// Human units; `None` if the raw amount is out of range.
    pub amount: Option<Decimal>,
    pub wallet_address: Address,
}

/// Display list of a ledger bidder list.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct BidderBoard {
    pub auction_name: String,
    pub auction_status: String,
    pub end_date: DateTime<Utc>,
    pub currency: String,
    pub highest_bid: Option<Decimal>,
    pub bidders: Vec<BidderRow>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct LeaderboardEntry {
    pub rank: usize,
    pub ledger_id: LedgerAuctionId,
    pub auction_name: Option<String>,
    pub winner: DisplayIdentity,
    pub amount: Decimal,
    pub currency: String,
    pub usd_amount: Decimal,
}

/// Human-readable timing for a host's auction list.
pub(crate) fn time_info(auction: &Auction, phase: AuctionPhase, now: DateTime<Utc>) -> String {
    match phase {
        AuctionPhase::Running => format!("{} hours remaining", auction.hours_remaining(now)),
        AuctionPhase::Upcoming => {
            format!("Starts in {} hours", (auction.start_time - now).num_hours())
        }
        AuctionPhase::Ending | AuctionPhase::Ended => {
            let days = (now - auction.end_time).num_days().max(0);
            let plural = if days == 1 { "" } else { "s" };
            format!("Ended {days} day{plural} ago")
        }
    }
}

impl AuctionEngine {
    fn summarize(&self, auction: &Auction, now: DateTime<Utc>) -> AuctionSummary {
        AuctionSummary::new(auction, now, self.gates.is_settling(&auction.ledger_id))
    }

    async fn social_ids(&self, wallets: &[Address]) -> Result<Vec<(Address, Option<String>)>> {
        let users = self.store.users(wallets).await?;
        Ok(wallets
            .iter()
            .map(|wallet| {
                let social = users
                    .iter()
                    .find(|u| u.wallet == *wallet)
                    .and_then(|u| u.social_id.clone());
                (*wallet, social)
            })
            .collect())
    }

    pub async fn auction_detail(&self, id: &LedgerAuctionId) -> Result<AuctionSummary> {
        let auction = self.load_auction(id).await?;
        Ok(self.summarize(&auction, self.clock.now()))
    }

    /// Running auctions ending soonest first, with display identities for host
    /// and top bidder.
    pub async fn top_running(&self, limit: Option<usize>) -> Result<Vec<RunningAuction>> {
        let now = self.clock.now();
        let limit = limit.unwrap_or(self.config.top_running_limit);
        let mut running = self.store.running(now).await?;
        running.sort_by(|a, b| a.end_time.cmp(&b.end_time).then(a.key.cmp(&b.key)));
        running.truncate(limit);

        // Host first, then top bidder if any, for every auction.
        let mut wallets = Vec::new();
        for auction in &running {
            wallets.push(auction.host);
            if let Some(top) = auction.top_bid() {
                wallets.push(top.bidder);
            }
        }
        let subjects = self.social_ids(&wallets).await?;
        let mut identities = self.identity.resolve_batch(&subjects).await.into_iter();

        let mut listed = Vec::with_capacity(running.len());
        for auction in running {
            let host = identities
                .next()
                .unwrap_or_else(|| DisplayIdentity::placeholder(auction.host));
            let top_bidder = match auction.top_bid() {
                Some(top) => Some(
                    identities
                        .next()
                        .unwrap_or_else(|| DisplayIdentity::placeholder(top.bidder)),
                ),
                None => None,
            };
            listed.push(RunningAuction {
                highest_bid: auction.current_highest_bid(),
                participant_count: auction.participant_count(),
                bid_count: auction.bid_count(),
                hours_remaining: auction.hours_remaining(now),
                ledger_id: auction.ledger_id,
                name: auction.name,
                currency: auction.currency,
                minimum_bid: auction.minimum_bid,
                end_time: auction.end_time,
                top_bidder,
                host,
            });
        }
        Ok(listed)
    }

    /// A host's auctions grouped by phase, newest first within each group.
    pub async fn hosted_by(&self, host: &Address) -> Result<HostedAuctions> {
        let now = self.clock.now();
        let mut auctions = self.store.hosted_by(host).await?;
        auctions.sort_by(|a, b| b.created_at.cmp(&a.created_at).then(b.key.cmp(&a.key)));

        let mut grouped = HostedAuctions::default();
        for auction in &auctions {
            let summary = self.summarize(auction, now);
            let entry = HostedEntry {
                time_info: time_info(auction, summary.phase, now),
                auction: summary,
            };
            match entry.auction.phase {
                AuctionPhase::Running => grouped.active.push(entry),
                AuctionPhase::Upcoming => grouped.upcoming.push(entry),
                AuctionPhase::Ending | AuctionPhase::Ended => grouped.ended.push(entry),
            }
        }
        Ok(grouped)
    }

    /// Auctions the wallet bid in, most recently ending first.
    pub async fn participated_by(&self, wallet: &Address) -> Result<Vec<ParticipatedEntry>> {
        let now = self.clock.now();
        let mut auctions = self.store.participated_by(wallet).await?;
        auctions.sort_by(|a, b| b.end_time.cmp(&a.end_time).then(b.key.cmp(&a.key)));
        Ok(auctions
            .iter()
            .map(|auction| ParticipatedEntry {
                my_highest_bid: auction
                    .bids
                    .iter()
                    .filter(|bid| bid.bidder == *wallet)
                    .map(|bid| bid.amount)
                    .max(),
                won: auction
                    .settlement
                    .as_ref()
                    .is_some_and(|s| s.winner == Some(*wallet)),
                auction: self.summarize(auction, now),
            })
            .collect())
    }

    /// Display rows for a ledger bidder list, in ledger order.
    pub async fn bidder_board(&self, bidders: &LedgerBidders) -> Result<BidderBoard> {
        let auction = self.load_auction(bidders.auction()).await?;
        let now = self.clock.now();
        let decimals = self.normalizer.token_decimals(auction.token).await;

        let subjects: Vec<(Address, Option<String>)> = bidders
            .entries()
            .iter()
            .map(|entry| (entry.bidder, Some(entry.social_id.clone())))
            .collect();
        let identities = self.identity.resolve_batch(&subjects).await;

        let rows = bidders
            .entries()
            .iter()
            .zip(identities)
            .map(|(entry, identity)| BidderRow {
                display_name: identity.display_name,
                image: identity.avatar_url,
                bid_amount: entry.raw_amount.to_string(),
                amount: to_human_units(entry.raw_amount, decimals).ok(),
                wallet_address: entry.bidder,
            })
            .collect();
        let highest_raw = bidders
            .entries()
            .iter()
            .map(|e| e.raw_amount)
            .max()
            .unwrap_or(U256::ZERO);

        Ok(BidderBoard {
            auction_name: auction.name.clone(),
            auction_status: if now <= auction.end_time && !auction.is_settled() {
                "Running".to_string()
            } else {
                "Ended".to_string()
            },
            end_date: auction.end_time,
            currency: auction.currency.clone(),
            highest_bid: to_human_units(highest_raw, decimals).ok(),
            bidders: rows,
        })
    }

    /// Settled winners with a known USD value, highest first.
    pub async fn leaderboard(&self, limit: Option<usize>) -> Result<Vec<LeaderboardEntry>> {
        let limit = limit.unwrap_or(self.config.leaderboard_limit);
        let mut winners: Vec<_> = self
            .store
            .winning_bids()
            .await?
            .into_iter()
            .filter_map(|w| w.usd_amount.map(|usd| (usd, w)))
            .collect();
        winners.sort_by(|(a, wa), (b, wb)| b.cmp(a).then(wa.auction.cmp(&wb.auction)));
        winners.truncate(limit);

        let wallets: Vec<Address> = winners.iter().map(|(_, w)| w.winner).collect();
        let subjects = self.social_ids(&wallets).await?;
        let identities = self.identity.resolve_batch(&subjects).await;

        let mut board = Vec::with_capacity(winners.len());
        for (rank, ((usd, winning), identity)) in winners.into_iter().zip(identities).enumerate() {
            let auction_name = self
                .store
                .auction(&winning.ledger_id)
                .await?
                .map(|a| a.name);
            board.push(LeaderboardEntry {
                rank: rank + 1,
                ledger_id: winning.ledger_id,
                auction_name,
                winner: identity,
                amount: winning.amount,
                currency: winning.currency,
                usd_amount: usd,
            });
        }
        Ok(board)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::AuctionDraft;
    use chrono::Duration;
    use rust_decimal_macros::dec;

    fn auction(now: DateTime<Utc>, start_in: i64, end_in: i64) -> Auction {
        let draft = AuctionDraft {
            ledger_id: LedgerAuctionId::new("a-1"),
            name: "Lot".into(),
            token: Address::repeat_byte(0xee),
            currency: "USDC".into(),
            minimum_bid: dec!(1),
            reserve_price: None,
            host_fee_percentage: None,
            start_time: now + Duration::hours(start_in),
            end_time: now + Duration::hours(end_in),
            creation_hash: None,
        };
        Auction::from_draft(AuctionKey(1), Address::ZERO, draft, now)
    }

    #[test]
    fn test_time_info_running_floors_hours() {
        let now = Utc::now();
        let a = auction(now, -1, 5);
        let later = now + Duration::minutes(30);
        assert_eq!(
            time_info(&a, AuctionPhase::Running, later),
            "4 hours remaining"
        );
    }

    #[test]
    fn test_time_info_upcoming_and_ended() {
        let now = Utc::now();
        assert_eq!(
            time_info(&auction(now, 3, 5), AuctionPhase::Upcoming, now),
            "Starts in 3 hours"
        );
        assert_eq!(
            time_info(&auction(now, -72, -24), AuctionPhase::Ending, now),
            "Ended 1 day ago"
        );
        assert_eq!(
            time_info(&auction(now, -96, -48), AuctionPhase::Ended, now),
            "Ended 2 days ago"
        );
    }
}
