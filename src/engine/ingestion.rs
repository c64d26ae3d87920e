//! Bid ingestion.
//!
//! Mirrors a bid the ledger already accepted. Nothing here talks to the
//! ledger; settlement overwrites whatever this records.

use tracing::{debug, info};

use super::{validate_bid, AuctionEngine};
use crate::{
    errors::BidRejection,
    logging::targets,
    prelude::*,
    types::{Bid, BidRecord, MirrorBid},
    Error,
};

impl AuctionEngine {
    /// Validate and record a reported bid.
    ///
    /// A repeated `idempotency_key` returns the bid recorded by the first
    /// attempt, flagged `replayed`. A bid that passed validation but was
    /// overtaken by a concurrent higher bid fails with `BidRaceLost`.
    pub async fn place_bid(&self, report: MirrorBid) -> Result<BidRecord> {
        let result = self.place_bid_inner(&report).await;
        match &result {
            Ok(record) if record.replayed => self.metrics.record_bid_replayed(),
            Ok(_) => self.metrics.record_bid_accepted(),
            Err(Error::Rejected(reason)) => {
                self.metrics.record_bid_rejected();
                debug!(
                    target: targets::INGEST,
                    auction = %report.auction,
                    bidder = %report.bidder,
                    amount = %report.amount,
                    reason = reason.code(),
                    "Bid rejected"
                );
            }
            Err(Error::BidRaceLost { current_highest }) => {
                self.metrics.record_bid_race_lost();
                info!(
                    target: targets::INGEST,
                    auction = %report.auction,
                    bidder = %report.bidder,
                    amount = %report.amount,
                    current_highest = %current_highest,
                    "Bid lost highest-bid race"
                );
            }
            Err(_) => {}
        }
        result
    }

    async fn place_bid_inner(&self, report: &MirrorBid) -> Result<BidRecord> {
        let now = self.clock.now();
        self.store.get_or_create_user(report.bidder, now).await?;
        let snapshot = self.load_auction(&report.auction).await?;

        if let Some(existing) = self.replayed_bid(report).await? {
            return Ok(existing);
        }

        // Cheap rejection before paying for a price lookup.
        validate_bid(report.amount, &snapshot, now)?;

        let usd_value = tokio::time::timeout(
            self.config.bid_pricing_timeout(),
            self.normalizer.to_usd(report.amount, snapshot.token),
        )
        .await
        .unwrap_or(None);

        let gate = self.gates.gate(&report.auction);
        if gate.is_settling() {
            return Err(BidRejection::AuctionEnded.into());
        }
        let _lock = gate.lock().await;
        if gate.is_settling() {
            return Err(BidRejection::AuctionEnded.into());
        }

        // A concurrent attempt with the same key may have committed meanwhile.
        if let Some(existing) = self.replayed_bid(report).await? {
            return Ok(existing);
        }

        let current = self.load_auction(&report.auction).await?;
        let now = self.clock.now();
        match validate_bid(report.amount, &current, now) {
            Ok(()) => {}
            Err(BidRejection::NotHighEnough {
                current_highest, ..
            }) if current.current_highest_bid() != snapshot.current_highest_bid() => {
                return Err(Error::BidRaceLost { current_highest });
            }
            Err(rejection) => return Err(rejection.into()),
        }

        let record = self
            .store
            .append_bid(
                &report.auction,
                Bid {
                    bidder: report.bidder,
                    amount: report.amount,
                    usd_value,
                    timestamp: now,
                },
                report.idempotency_key.clone(),
            )
            .await?;

        info!(
            target: targets::INGEST,
            auction = %record.auction_id,
            bidder = %record.bidder,
            amount = %record.amount,
            currency = %record.currency,
            usd_value = ?record.usd_value,
            "Bid recorded"
        );
        Ok(record)
    }

    async fn replayed_bid(&self, report: &MirrorBid) -> Result<Option<BidRecord>> {
        let Some(ref key) = report.idempotency_key else {
            return Ok(None);
        };
        Ok(self
            .store
            .recorded_bid(&report.auction, key)
            .await?
            .map(|existing| BidRecord {
                replayed: true,
                ..existing
            }))
    }
}
