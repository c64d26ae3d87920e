//! Auction read-model store.
//!
//! Every mutating method is atomic: it either applies completely or leaves the
//! store untouched. Conditional writes (`append_bid`, `commit_settlement`)
//! re-check their preconditions inside that atomic step.

mod memory;

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};

pub use memory::{MemoryStore, RecordedAttempt, StoreSnapshot};

use crate::{
    prelude::*,
    types::{
        Auction, AuctionDraft, Bid, BidRecord, LedgerAuctionId, SettlementRecord,
        User, WinningBid,
    },
};

/// Everything settlement writes, applied in one step.
#[derive(Debug, Clone)]
pub struct SettlementCommit {
    pub auction: LedgerAuctionId,
    /// Replaces the mirrored bid list.
    pub bids: Vec<Bid>,
    pub record: SettlementRecord,
    pub winning_bid: Option<WinningBid>,
}

#[async_trait]
pub trait AuctionStore: Send + Sync {
    /// Existing user for the wallet, or a new one.
    async fn get_or_create_user(&self, wallet: Address, now: DateTime<Utc>) -> Result<User>;

    async fn user(&self, wallet: &Address) -> Result<Option<User>>;

    /// Users known for the given wallets; unknown wallets are skipped.
    async fn users(&self, wallets: &[Address]) -> Result<Vec<User>>;

    /// Attach a social id. With `only_if_absent` an existing id is kept.
    async fn set_social_id(
        &self,
        wallet: Address,
        social_id: String,
        only_if_absent: bool,
        now: DateTime<Utc>,
    ) -> Result<User>;

    /// Fails with `DuplicateAuction` when the ledger id is taken.
    async fn insert_auction(
        &self,
        host: Address,
        draft: AuctionDraft,
        now: DateTime<Utc>,
    ) -> Result<Auction>;

    async fn auction(&self, id: &LedgerAuctionId) -> Result<Option<Auction>>;

    /// Bid recorded earlier under `idempotency_key` for this auction.
    async fn recorded_bid(
        &self,
        id: &LedgerAuctionId,
        idempotency_key: &str,
    ) -> Result<Option<BidRecord>>;

    /// Append a bid only if it still beats the stored highest bid and the
    /// auction is not settled. Adds the bidder to the participant set and the
    /// auction to the bidder's participated list.
    async fn append_bid(
        &self,
        id: &LedgerAuctionId,
        bid: Bid,
        idempotency_key: Option<String>,
    ) -> Result<BidRecord>;

    /// Replace the bid list, close the auction at `record.settled_at` and
    /// record the winner. Fails with `AlreadySettled` if a settlement exists.
    async fn commit_settlement(&self, commit: SettlementCommit) -> Result<Auction>;

    /// Auctions with `start <= now <= end` and no settlement.
    async fn running(&self, now: DateTime<Utc>) -> Result<Vec<Auction>>;

    async fn hosted_by(&self, host: &Address) -> Result<Vec<Auction>>;

    async fn participated_by(&self, wallet: &Address) -> Result<Vec<Auction>>;

    async fn winning_bids(&self) -> Result<Vec<WinningBid>>;
}
