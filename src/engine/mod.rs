//! Reconciliation core: bid ingestion, settlement, and read-model views.
//!
//! Bids are mirrored best-effort as clients report them; settlement later
//! replaces the mirror wholesale with what the ledger holds. Within one
//! auction, bid commits and the settlement commit are serialized through a
//! per-auction gate (see [`gate`]), and all external lookups happen before the
//! gate is taken.

mod gate;
mod ingestion;
mod settlement;
mod validator;
mod views;

#[cfg(test)]
mod tests;

use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};
use tracing::info;

pub use settlement::{rank_entries, RankedEntry, SettlementResult, WinnerSummary};
pub use validator::{amount_from_f64, validate_bid};
pub use views::{
    AuctionSummary, BidderBoard, BidderRow, HostedAuctions, HostedEntry, LeaderboardEntry,
    ParticipatedEntry, RunningAuction,
};

use gate::GateMap;

use crate::{
    chain::BidLedger,
    consts::{DEFAULT_LEADERBOARD_LIMIT, DEFAULT_TOP_RUNNING_LIMIT},
    helpers::{Clock, SystemClock},
    identity::{validate_social_id, IdentityService},
    logging::targets,
    metrics::ServiceMetrics,
    prelude::*,
    pricing::Normalizer,
    store::AuctionStore,
    types::{Auction, AuctionDraft, LedgerAuctionId, User},
};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct EngineConfig {
    /// Upper bound on one `getBidders` read during settlement.
    #[serde(default = "default_ledger_timeout_ms")]
    pub ledger_timeout_ms: u64,

    /// Upper bound on pricing a single bid at ingestion; past it the bid is
    /// recorded without a USD value.
    #[serde(default = "default_bid_pricing_timeout_ms")]
    pub bid_pricing_timeout_ms: u64,

    #[serde(default = "default_top_running_limit")]
    pub top_running_limit: usize,

    #[serde(default = "default_leaderboard_limit")]
    pub leaderboard_limit: usize,
}

fn default_ledger_timeout_ms() -> u64 {
    10_000
}

fn default_bid_pricing_timeout_ms() -> u64 {
    3_000
}

fn default_top_running_limit() -> usize {
    DEFAULT_TOP_RUNNING_LIMIT
}

fn default_leaderboard_limit() -> usize {
    DEFAULT_LEADERBOARD_LIMIT
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            ledger_timeout_ms: default_ledger_timeout_ms(),
            bid_pricing_timeout_ms: default_bid_pricing_timeout_ms(),
            top_running_limit: default_top_running_limit(),
            leaderboard_limit: default_leaderboard_limit(),
        }
    }
}

impl EngineConfig {
    pub fn ledger_timeout(&self) -> Duration {
        Duration::from_millis(self.ledger_timeout_ms)
    }

    pub fn bid_pricing_timeout(&self) -> Duration {
        Duration::from_millis(self.bid_pricing_timeout_ms)
    }
}

pub struct AuctionEngine {
    store: Arc<dyn AuctionStore>,
    normalizer: Arc<Normalizer>,
    identity: Arc<IdentityService>,
    ledger: Option<Arc<dyn BidLedger>>,
    clock: Arc<dyn Clock>,
    metrics: Arc<ServiceMetrics>,
    gates: GateMap,
    config: EngineConfig,
}

impl AuctionEngine {
    pub fn new(
        store: Arc<dyn AuctionStore>,
        normalizer: Arc<Normalizer>,
        identity: Arc<IdentityService>,
        metrics: Arc<ServiceMetrics>,
        config: EngineConfig,
    ) -> Self {
        Self {
            store,
            normalizer,
            identity,
            ledger: None,
            clock: Arc::new(SystemClock),
            metrics,
            gates: GateMap::default(),
            config,
        }
    }

    /// Ledger used when a settlement request carries no bidder list.
    pub fn with_ledger(mut self, ledger: Arc<dyn BidLedger>) -> Self {
        self.ledger = Some(ledger);
        self
    }

    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    pub fn store(&self) -> &Arc<dyn AuctionStore> {
        &self.store
    }

    pub fn metrics(&self) -> &Arc<ServiceMetrics> {
        &self.metrics
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Record an auction whose `startAuction` transaction the ledger confirmed.
    pub async fn register_auction(&self, host: Address, draft: AuctionDraft) -> Result<Auction> {
        let draft = draft.validated()?;
        let now = self.clock.now();
        let auction = self.store.insert_auction(host, draft, now).await?;
        info!(
            target: targets::INGEST,
            auction = %auction.ledger_id,
            key = %auction.key,
            host = %host,
            end_time = %auction.end_time,
            "Auction registered"
        );
        Ok(auction)
    }

    /// Attach a social id to the caller's user, creating the user if needed.
    pub async fn update_social_id(&self, wallet: Address, social_id: &str) -> Result<User> {
        let fid = validate_social_id(social_id)?;
        self.store
            .set_social_id(wallet, fid.to_string(), false, self.clock.now())
            .await
    }

    pub async fn user(&self, wallet: &Address) -> Result<Option<User>> {
        self.store.user(wallet).await
    }

    async fn load_auction(&self, id: &LedgerAuctionId) -> Result<Auction> {
        self.store
            .auction(id)
            .await?
            .ok_or(crate::Error::AuctionNotFound)
    }
}
