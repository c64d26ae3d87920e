//! Cross-module engine tests against in-memory fakes.

mod stress_tests;

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use alloy::primitives::{address, Address, U256};
use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use tokio::sync::{Notify, Semaphore};

use super::{AuctionEngine, EngineConfig};
use crate::{
    chain::BidLedger,
    helpers::{Clock, ManualClock},
    identity::{IdentityResolver, IdentityService, SocialProfile},
    metrics::ServiceMetrics,
    prelude::*,
    pricing::{DecimalsResolver, KnownToken, Normalizer, PriceOracle},
    store::MemoryStore,
    types::{Auction, AuctionDraft, LedgerAuctionId, LedgerBid, LedgerBidders, MirrorBid},
    Error,
};

pub(super) use crate::consts::BASE_USDC as USDC;
pub(super) const DEGEN: Address = address!("4ed4E862860beD51a9570b96d89aF5E1B0Efefed");
pub(super) const HOST: Address = Address::repeat_byte(0xaa);

pub(super) fn wallet(n: u8) -> Address {
    Address::repeat_byte(n)
}

pub(super) fn t0() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2025, 3, 1, 12, 0, 0).single().unwrap_or_default()
}

pub(super) fn entry(bidder: Address, raw: u128, fid: &str) -> LedgerBid {
    LedgerBid {
        bidder,
        raw_amount: U256::from(raw),
        social_id: fid.to_string(),
    }
}

/// `amount` whole units of a 6-decimal token.
pub(super) fn usdc_raw(amount: u64) -> u128 {
    amount as u128 * 1_000_000
}

/// `amount` whole units of an 18-decimal token.
pub(super) fn degen_raw(amount: u64) -> u128 {
    amount as u128 * 1_000_000_000_000_000_000
}

/// Ledger whose bidder lists are set by the test. Reads can be paused until
/// the test releases them.
pub(super) struct FakeLedger {
    lists: Mutex<HashMap<LedgerAuctionId, Vec<LedgerBid>>>,
    failing: AtomicBool,
    paused: AtomicBool,
    release: Semaphore,
    pub(super) entered: Notify,
    pub(super) reads: AtomicUsize,
}

impl Default for FakeLedger {
    fn default() -> Self {
        Self {
            lists: Mutex::new(HashMap::new()),
            failing: AtomicBool::new(false),
            paused: AtomicBool::new(false),
            release: Semaphore::new(0),
            entered: Notify::new(),
            reads: AtomicUsize::new(0),
        }
    }
}

impl FakeLedger {
    pub(super) fn set(&self, id: &str, entries: Vec<LedgerBid>) {
        self.lists
            .lock()
            .unwrap()
            .insert(LedgerAuctionId::new(id), entries);
    }

    pub(super) fn fail(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub(super) fn pause(&self) {
        self.paused.store(true, Ordering::SeqCst);
    }

    pub(super) fn resume(&self) {
        self.paused.store(false, Ordering::SeqCst);
        self.release.add_permits(1);
    }
}

#[async_trait]
impl BidLedger for FakeLedger {
    async fn get_bidders(&self, auction: &LedgerAuctionId) -> Result<LedgerBidders> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.entered.notify_one();
        if self.paused.load(Ordering::SeqCst) {
            let _permit = self
                .release
                .acquire()
                .await
                .map_err(|e| Error::GenericRequest(e.to_string()))?;
        }
        if self.failing.load(Ordering::SeqCst) {
            return Err(Error::server_error(503, "node unavailable"));
        }
        let entries = self
            .lists
            .lock()
            .unwrap()
            .get(auction)
            .cloned()
            .unwrap_or_default();
        Ok(LedgerBidders::from_contract(auction.clone(), entries))
    }
}

/// Oracle with one price per token; unknown tokens fail.
#[derive(Default)]
pub(super) struct FakeOracle {
    prices: Mutex<HashMap<Address, Decimal>>,
    pub(super) calls: AtomicUsize,
}

impl FakeOracle {
    pub(super) fn set(&self, token: Address, price: Decimal) {
        self.prices.lock().unwrap().insert(token, price);
    }

    pub(super) fn clear(&self) {
        self.prices.lock().unwrap().clear();
    }
}

#[async_trait]
impl PriceOracle for FakeOracle {
    async fn spot_price_usd(&self, token: Address) -> Result<Decimal> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        self.prices
            .lock()
            .unwrap()
            .get(&token)
            .copied()
            .ok_or_else(|| Error::OracleUnavailable("rate limited".into()))
    }
}

#[derive(Default)]
pub(super) struct FakeProfiles {
    profiles: Mutex<HashMap<u64, SocialProfile>>,
}

impl FakeProfiles {
    pub(super) fn add(&self, fid: u64, name: &str) {
        self.profiles.lock().unwrap().insert(
            fid,
            SocialProfile {
                fid,
                username: Some(name.to_lowercase()),
                display_name: Some(name.to_string()),
                pfp_url: Some(format!("https://img.example/{fid}.png")),
            },
        );
    }
}

#[async_trait]
impl IdentityResolver for FakeProfiles {
    async fn profiles(&self, fids: &[u64]) -> Result<Vec<SocialProfile>> {
        let known = self.profiles.lock().unwrap();
        Ok(fids.iter().filter_map(|f| known.get(f).cloned()).collect())
    }
}

pub(super) struct Harness {
    pub(super) engine: Arc<AuctionEngine>,
    pub(super) clock: Arc<ManualClock>,
    pub(super) store: Arc<MemoryStore>,
    pub(super) ledger: Arc<FakeLedger>,
    pub(super) oracle: Arc<FakeOracle>,
    pub(super) profiles: Arc<FakeProfiles>,
    pub(super) metrics: Arc<ServiceMetrics>,
}

impl Harness {
    pub(super) fn new() -> Self {
        let clock = Arc::new(ManualClock::new(t0()));
        let store = Arc::new(MemoryStore::new());
        let ledger = Arc::new(FakeLedger::default());
        let oracle = Arc::new(FakeOracle::default());
        let profiles = Arc::new(FakeProfiles::default());
        let metrics = Arc::new(ServiceMetrics::new());

        oracle.set(DEGEN, dec!(0.01));
        let known = vec![
            KnownToken::base_usdc(),
            KnownToken {
                address: DEGEN,
                symbol: "DEGEN".into(),
                decimals: 18,
                usd_pegged: false,
            },
        ];
        let normalizer = Normalizer::new(
            DecimalsResolver::offline(known),
            Some(oracle.clone()),
            Duration::from_millis(500),
            metrics.clone(),
        );
        let identity = IdentityService::new(
            Some(profiles.clone()),
            Duration::from_millis(500),
            metrics.clone(),
        );
        let engine = AuctionEngine::new(
            store.clone(),
            Arc::new(normalizer),
            Arc::new(identity),
            metrics.clone(),
            EngineConfig::default(),
        )
        .with_ledger(ledger.clone())
        .with_clock(clock.clone());

        Self {
            engine: Arc::new(engine),
            clock,
            store,
            ledger,
            oracle,
            profiles,
            metrics,
        }
    }

    /// Register a running auction: started an hour ago, ends in a day.
    pub(super) async fn running(&self, id: &str, token: Address, minimum: Decimal) -> Auction {
        let now = self.clock.now();
        self.engine
            .register_auction(
                HOST,
                AuctionDraft {
                    ledger_id: LedgerAuctionId::new(id),
                    name: format!("Lot {id}"),
                    token,
                    currency: if token == USDC { "USDC" } else { "DEGEN" }.into(),
                    minimum_bid: minimum,
                    reserve_price: None,
                    host_fee_percentage: None,
                    start_time: now - chrono::Duration::hours(1),
                    end_time: now + chrono::Duration::hours(24),
                    creation_hash: None,
                },
            )
            .await
            .unwrap()
    }

    pub(super) async fn bid(&self, id: &str, bidder: Address, amount: Decimal) -> Result<crate::types::BidRecord> {
        self.engine
            .place_bid(MirrorBid {
                auction: LedgerAuctionId::new(id),
                bidder,
                amount,
                idempotency_key: None,
            })
            .await
    }

    pub(super) async fn auction(&self, id: &str) -> Auction {
        use crate::store::AuctionStore;
        self.store
            .auction(&LedgerAuctionId::new(id))
            .await
            .unwrap()
            .unwrap()
    }
}
