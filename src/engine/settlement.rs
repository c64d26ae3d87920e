//! Settlement reconciler.
//!
//! Rebuilds an auction's bid list from the ledger's bidder list and closes the
//! auction. Ledger data, prices, and users are all gathered before the
//! per-auction lock is taken. The commit itself is one atomic store write, so a
//! failure at any earlier point leaves the auction exactly as it was.

use std::collections::{HashMap, VecDeque};

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::AuctionEngine;
use crate::{
    identity::{parse_social_id, DisplayIdentity},
    logging::targets,
    prelude::*,
    pricing::to_human_units,
    store::SettlementCommit,
    types::{
        Auction, Bid, LedgerAuctionId, LedgerBid, LedgerBidders, LedgerSource, RankingBasis,
        SettlementRecord, WinningBid,
    },
    Error,
};

/// One ledger entry after normalization.
#[derive(Debug, Clone, PartialEq)]
pub struct RankedEntry {
    pub bidder: Address,
    /// Human units.
    pub amount: Decimal,
    pub usd_value: Option<Decimal>,
}

/// Pick the winning entry.
///
/// Entries are ranked by USD value only when every entry has one; otherwise
/// the whole batch is ranked by amount. Ties go to the earliest entry in
/// ledger order. Returns `None` as winner index for an empty batch.
pub fn rank_entries(entries: &[RankedEntry]) -> (RankingBasis, Option<usize>) {
    let basis = if !entries.is_empty() && entries.iter().all(|e| e.usd_value.is_some()) {
        RankingBasis::Usd
    } else {
        RankingBasis::Amount
    };
    let key = |entry: &RankedEntry| match basis {
        RankingBasis::Usd => entry.usd_value.unwrap_or(Decimal::ZERO),
        RankingBasis::Amount => entry.amount,
    };

    let mut winner: Option<usize> = None;
    for (index, entry) in entries.iter().enumerate() {
        if winner.map_or(true, |w| key(entry) > key(&entries[w])) {
            winner = Some(index);
        }
    }
    (basis, winner)
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WinnerSummary {
    pub wallet: Address,
    pub amount: Decimal,
    pub usd_amount: Option<Decimal>,
    pub currency: String,
    pub identity: DisplayIdentity,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct SettlementResult {
    pub auction: LedgerAuctionId,
    pub settled_at: DateTime<Utc>,
    pub source: LedgerSource,
    pub ranking_basis: RankingBasis,
    pub bid_count: usize,
    pub participant_count: usize,
    pub winner: Option<WinnerSummary>,
    pub reserve_met: bool,
    pub total_revenue: Decimal,
    pub host_revenue: Decimal,
}

/// Timestamp for each rebuilt bid: the mirror's timestamp when the mirror holds
/// the same bidder and amount, otherwise `now`. Each mirror bid is matched at
/// most once, earliest first.
fn carry_timestamps(
    mirror: &[Bid],
    entries: &[RankedEntry],
    now: DateTime<Utc>,
) -> Vec<DateTime<Utc>> {
    let mut by_bid: HashMap<(Address, Decimal), VecDeque<DateTime<Utc>>> = HashMap::new();
    for bid in mirror {
        by_bid
            .entry((bid.bidder, bid.amount.normalize()))
            .or_default()
            .push_back(bid.timestamp);
    }
    entries
        .iter()
        .map(|entry| {
            by_bid
                .get_mut(&(entry.bidder, entry.amount.normalize()))
                .and_then(VecDeque::pop_front)
                .unwrap_or(now)
        })
        .collect()
}

impl AuctionEngine {
    /// Settle an auction as its host.
    ///
    /// `bidders` is the ledger list forwarded by the host; without it the list
    /// is read from the ledger. Safe to retry after any failure. After success
    /// every further call fails with `AlreadySettled`.
    pub async fn settle(
        &self,
        caller: Address,
        id: &LedgerAuctionId,
        bidders: Option<LedgerBidders>,
    ) -> Result<SettlementResult> {
        let result = self.settle_inner(caller, id, bidders).await;
        match &result {
            Ok(settled) => {
                self.metrics.record_settlement(true);
                info!(
                    target: targets::SETTLE,
                    auction = %id,
                    winner = ?settled.winner.as_ref().map(|w| w.wallet),
                    bids = settled.bid_count,
                    basis = ?settled.ranking_basis,
                    source = ?settled.source,
                    total_revenue = %settled.total_revenue,
                    "Auction settled"
                );
            }
            Err(e) => {
                self.metrics.record_settlement(false);
                warn!(target: targets::SETTLE, auction = %id, error = %e, "Settlement refused");
            }
        }
        result
    }

    async fn settle_inner(
        &self,
        caller: Address,
        id: &LedgerAuctionId,
        supplied: Option<LedgerBidders>,
    ) -> Result<SettlementResult> {
        let auction = self.load_auction(id).await?;
        if auction.host != caller {
            return Err(Error::NotHost);
        }
        if auction.is_settled() {
            return Err(Error::AlreadySettled);
        }
        if self.clock.now() < auction.start_time {
            return Err(Error::StartsInFuture);
        }

        // From here bids on this auction fail fast.
        let gate = self.gates.gate(id);
        let _settling = gate.begin_settlement()?;

        let bidders = self.authoritative_bidders(id, supplied).await?;
        let entries = self.normalize_entries(&auction, bidders.entries()).await?;
        self.register_bidders(bidders.entries()).await?;
        let (basis, winner_index) = rank_entries(&entries);

        // Bids fail fast from here, so this mirror is final apart from a
        // commit already holding the lock.
        let mirror = self.load_auction(id).await?;
        let now = self.clock.now();
        let bids: Vec<Bid> = carry_timestamps(&mirror.bids, &entries, now)
            .into_iter()
            .zip(&entries)
            .map(|(timestamp, entry)| Bid {
                bidder: entry.bidder,
                amount: entry.amount,
                usd_value: entry.usd_value,
                timestamp,
            })
            .collect();
        let winner = winner_index.map(|i| &entries[i]);
        let record = SettlementRecord {
            settled_at: now,
            winner: winner.map(|w| w.bidder),
            winning_amount: winner.map(|w| w.amount),
            winning_usd: winner.and_then(|w| w.usd_value),
            ranking_basis: basis,
            total_revenue: winner.map_or(Decimal::ZERO, |w| w.amount),
        };
        let winning_bid = winner.map(|w| WinningBid {
            auction: mirror.key,
            ledger_id: mirror.ledger_id.clone(),
            winner: w.bidder,
            amount: w.amount,
            currency: mirror.currency.clone(),
            usd_amount: w.usd_value,
            created_at: now,
        });

        let lock = gate.lock().await;
        if self.load_auction(id).await?.is_settled() {
            return Err(Error::AlreadySettled);
        }
        let settled = self
            .store
            .commit_settlement(SettlementCommit {
                auction: id.clone(),
                bids,
                record,
                winning_bid,
            })
            .await?;
        drop(lock);

        let winner = match winner_index {
            Some(i) => {
                let entry = &entries[i];
                let social_id = bidders.entries()[i].social_id.as_str();
                Some(WinnerSummary {
                    wallet: entry.bidder,
                    amount: entry.amount,
                    usd_amount: entry.usd_value,
                    currency: settled.currency.clone(),
                    identity: self.identity.resolve(entry.bidder, Some(social_id)).await,
                })
            }
            None => None,
        };

        Ok(SettlementResult {
            auction: id.clone(),
            settled_at: now,
            source: bidders.source(),
            ranking_basis: basis,
            bid_count: settled.bid_count(),
            participant_count: settled.participant_count(),
            winner,
            reserve_met: settled.reserve_met(),
            total_revenue: settled.total_revenue(),
            host_revenue: settled.host_revenue(),
        })
    }

    async fn authoritative_bidders(
        &self,
        id: &LedgerAuctionId,
        supplied: Option<LedgerBidders>,
    ) -> Result<LedgerBidders> {
        if let Some(list) = supplied {
            if list.auction() != id {
                return Err(Error::InvalidAuction(format!(
                    "bidder list is for auction {}, not {id}",
                    list.auction()
                )));
            }
            return Ok(list);
        }

        let Some(ledger) = &self.ledger else {
            return Err(Error::LedgerUnavailable(
                "no bidder list supplied and no ledger configured".into(),
            ));
        };
        let read = tokio::time::timeout(self.config.ledger_timeout(), ledger.get_bidders(id)).await;
        match read {
            Ok(Ok(list)) => Ok(list),
            Ok(Err(e)) => {
                self.metrics.record_ledger_failure();
                Err(Error::LedgerUnavailable(e.to_string()))
            }
            Err(_) => {
                self.metrics.record_ledger_failure();
                Err(Error::Timeout("ledger bidder list"))
            }
        }
    }

    /// Human amounts and USD values for every entry. USD failures are per
    /// entry; an unrepresentable amount fails the whole settlement.
    async fn normalize_entries(
        &self,
        auction: &Auction,
        entries: &[LedgerBid],
    ) -> Result<Vec<RankedEntry>> {
        let decimals = self.normalizer.token_decimals(auction.token).await;
        let mut pass = self.normalizer.pass();
        let mut ranked = Vec::with_capacity(entries.len());
        for entry in entries {
            let amount = to_human_units(entry.raw_amount, decimals)?;
            let usd_value = pass.to_usd(amount, auction.token).await;
            ranked.push(RankedEntry {
                bidder: entry.bidder,
                amount,
                usd_value,
            });
        }
        debug!(
            target: targets::SETTLE,
            auction = %auction.ledger_id,
            entries = ranked.len(),
            decimals,
            priced = ranked.iter().filter(|e| e.usd_value.is_some()).count(),
            "Ledger entries normalized"
        );
        Ok(ranked)
    }

    /// Create users for every ledger bidder and attach reported social ids
    /// to users that have none.
    async fn register_bidders(&self, entries: &[LedgerBid]) -> Result<()> {
        let now = self.clock.now();
        for entry in entries {
            match parse_social_id(&entry.social_id) {
                Some(fid) => {
                    self.store
                        .set_social_id(entry.bidder, fid.to_string(), true, now)
                        .await?;
                }
                None => {
                    self.store.get_or_create_user(entry.bidder, now).await?;
                }
            }
        }
        Ok(())
    }
}
