//! In-process store with JSON snapshot persistence.
//!
//! All state sits behind one `RwLock`, so each trait method is a single
//! critical section. Snapshots are written to `<path>.tmp` and renamed over
//! the target so a crash never leaves a torn file.

use std::collections::{BTreeMap, HashMap};
use std::path::Path;

use alloy::primitives::Address;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, info};

use super::{AuctionStore, SettlementCommit};
use crate::{
    errors::BidRejection,
    logging::targets,
    prelude::*,
    types::{
        Auction, AuctionDraft, AuctionKey, Bid, BidRecord, LedgerAuctionId, User, UserId,
        WinningBid,
    },
    Error,
};

const SNAPSHOT_VERSION: u32 = 1;

/// Bid attempt remembered under its idempotency key.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct RecordedAttempt {
    pub auction: AuctionKey,
    pub key: String,
    pub record: BidRecord,
}

/// Serialized form of the whole store.
#[derive(Debug, Clone, Default, Deserialize, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct StoreSnapshot {
    pub version: u32,
    pub saved_at: Option<DateTime<Utc>>,
    pub next_user_id: u64,
    pub next_auction_key: u64,
    pub users: Vec<User>,
    pub auctions: Vec<Auction>,
    pub winning_bids: Vec<WinningBid>,
    #[serde(default)]
    pub attempts: Vec<RecordedAttempt>,
}

#[derive(Debug, Default)]
struct Inner {
    users: HashMap<Address, User>,
    auctions: BTreeMap<AuctionKey, Auction>,
    by_ledger_id: HashMap<LedgerAuctionId, AuctionKey>,
    winning_bids: BTreeMap<AuctionKey, WinningBid>,
    attempts: HashMap<(AuctionKey, String), BidRecord>,
    next_user_id: u64,
    next_auction_key: u64,
}

fn ensure_user<'a>(
    users: &'a mut HashMap<Address, User>,
    next_user_id: &mut u64,
    wallet: Address,
    now: DateTime<Utc>,
) -> &'a mut User {
    users.entry(wallet).or_insert_with(|| {
        *next_user_id += 1;
        debug!(target: targets::STORE, wallet = %wallet, user_id = *next_user_id, "User created");
        User::new(UserId(*next_user_id), wallet, now)
    })
}

impl Inner {
    fn key_of(&self, id: &LedgerAuctionId) -> Result<AuctionKey> {
        self.by_ledger_id
            .get(id)
            .copied()
            .ok_or(Error::AuctionNotFound)
    }

    fn to_snapshot(&self, now: DateTime<Utc>) -> StoreSnapshot {
        let mut users: Vec<User> = self.users.values().cloned().collect();
        users.sort_by_key(|u| u.id);
        let mut attempts: Vec<RecordedAttempt> = self
            .attempts
            .iter()
            .map(|((auction, key), record)| RecordedAttempt {
                auction: *auction,
                key: key.clone(),
                record: record.clone(),
            })
            .collect();
        attempts.sort_by(|a, b| (a.auction, &a.key).cmp(&(b.auction, &b.key)));
        StoreSnapshot {
            version: SNAPSHOT_VERSION,
            saved_at: Some(now),
            next_user_id: self.next_user_id,
            next_auction_key: self.next_auction_key,
            users,
            auctions: self.auctions.values().cloned().collect(),
            winning_bids: self.winning_bids.values().cloned().collect(),
            attempts,
        }
    }

    fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(Error::Snapshot(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }
        let mut inner = Inner {
            next_user_id: snapshot.next_user_id,
            next_auction_key: snapshot.next_auction_key,
            ..Default::default()
        };
        for user in snapshot.users {
            inner.next_user_id = inner.next_user_id.max(user.id.0);
            inner.users.insert(user.wallet, user);
        }
        for auction in snapshot.auctions {
            inner.next_auction_key = inner.next_auction_key.max(auction.key.0);
            if inner
                .by_ledger_id
                .insert(auction.ledger_id.clone(), auction.key)
                .is_some()
            {
                return Err(Error::Snapshot(format!(
                    "ledger id {} appears twice",
                    auction.ledger_id
                )));
            }
            inner.auctions.insert(auction.key, auction);
        }
        for winning in snapshot.winning_bids {
            inner.winning_bids.insert(winning.auction, winning);
        }
        for attempt in snapshot.attempts {
            inner
                .attempts
                .insert((attempt.auction, attempt.key), attempt.record);
        }
        Ok(inner)
    }
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    inner: RwLock<Inner>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn from_snapshot(snapshot: StoreSnapshot) -> Result<Self> {
        Ok(Self {
            inner: RwLock::new(Inner::from_snapshot(snapshot)?),
        })
    }

    pub async fn snapshot(&self, now: DateTime<Utc>) -> StoreSnapshot {
        self.inner.read().await.to_snapshot(now)
    }

    /// Write the current state to `path` atomically.
    pub async fn save_snapshot(&self, path: &Path, now: DateTime<Utc>) -> Result<()> {
        let snapshot = self.snapshot(now).await;
        let json = serde_json::to_vec_pretty(&snapshot)
            .map_err(|e| Error::Snapshot(format!("serialize: {e}")))?;

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| Error::Snapshot(format!("create {}: {e}", parent.display())))?;
        }
        let tmp_path = path.with_extension("json.tmp");
        tokio::fs::write(&tmp_path, &json)
            .await
            .map_err(|e| Error::Snapshot(format!("write {}: {e}", tmp_path.display())))?;
        tokio::fs::rename(&tmp_path, path)
            .await
            .map_err(|e| Error::Snapshot(format!("rename to {}: {e}", path.display())))?;

        debug!(
            target: targets::STORE,
            path = %path.display(),
            auctions = snapshot.auctions.len(),
            users = snapshot.users.len(),
            bytes = json.len(),
            "Snapshot saved"
        );
        Ok(())
    }

    /// Load a store from `path`; `None` when the file does not exist.
    pub async fn load_snapshot(path: &Path) -> Result<Option<Self>> {
        let bytes = match tokio::fs::read(path).await {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(Error::Snapshot(format!("read {}: {e}", path.display()))),
        };
        let snapshot: StoreSnapshot = serde_json::from_slice(&bytes)
            .map_err(|e| Error::Snapshot(format!("parse {}: {e}", path.display())))?;
        info!(
            target: targets::STORE,
            path = %path.display(),
            auctions = snapshot.auctions.len(),
            users = snapshot.users.len(),
            "Snapshot loaded"
        );
        Self::from_snapshot(snapshot).map(Some)
    }
}

#[async_trait]
impl AuctionStore for MemoryStore {
    async fn get_or_create_user(&self, wallet: Address, now: DateTime<Utc>) -> Result<User> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        Ok(ensure_user(&mut inner.users, &mut inner.next_user_id, wallet, now).clone())
    }

    async fn user(&self, wallet: &Address) -> Result<Option<User>> {
        Ok(self.inner.read().await.users.get(wallet).cloned())
    }

    async fn users(&self, wallets: &[Address]) -> Result<Vec<User>> {
        let inner = self.inner.read().await;
        Ok(wallets
            .iter()
            .filter_map(|w| inner.users.get(w).cloned())
            .collect())
    }

    async fn set_social_id(
        &self,
        wallet: Address,
        social_id: String,
        only_if_absent: bool,
        now: DateTime<Utc>,
    ) -> Result<User> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let user = ensure_user(&mut inner.users, &mut inner.next_user_id, wallet, now);
        if !(only_if_absent && user.social_id.is_some()) {
            user.social_id = Some(social_id);
        }
        Ok(user.clone())
    }

    async fn insert_auction(
        &self,
        host: Address,
        draft: AuctionDraft,
        now: DateTime<Utc>,
    ) -> Result<Auction> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        if inner.by_ledger_id.contains_key(&draft.ledger_id) {
            return Err(Error::DuplicateAuction(draft.ledger_id.to_string()));
        }
        inner.next_auction_key += 1;
        let key = AuctionKey(inner.next_auction_key);
        let auction = Auction::from_draft(key, host, draft, now);

        ensure_user(&mut inner.users, &mut inner.next_user_id, host, now).add_hosted(key);
        inner.by_ledger_id.insert(auction.ledger_id.clone(), key);
        inner.auctions.insert(key, auction.clone());
        Ok(auction)
    }

    async fn auction(&self, id: &LedgerAuctionId) -> Result<Option<Auction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .by_ledger_id
            .get(id)
            .and_then(|key| inner.auctions.get(key))
            .cloned())
    }

    async fn recorded_bid(
        &self,
        id: &LedgerAuctionId,
        idempotency_key: &str,
    ) -> Result<Option<BidRecord>> {
        let inner = self.inner.read().await;
        let key = inner.key_of(id)?;
        Ok(inner
            .attempts
            .get(&(key, idempotency_key.to_string()))
            .cloned())
    }

    async fn append_bid(
        &self,
        id: &LedgerAuctionId,
        bid: Bid,
        idempotency_key: Option<String>,
    ) -> Result<BidRecord> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let key = inner.key_of(id)?;

        if let Some(ref attempt) = idempotency_key {
            if let Some(existing) = inner.attempts.get(&(key, attempt.clone())) {
                return Ok(BidRecord {
                    replayed: true,
                    ..existing.clone()
                });
            }
        }

        let auction = inner.auctions.get_mut(&key).ok_or(Error::AuctionNotFound)?;
        if auction.is_settled() {
            return Err(BidRejection::AuctionEnded.into());
        }
        if let Some(highest) = auction.highest_bid {
            if bid.amount <= highest {
                return Err(Error::BidRaceLost {
                    current_highest: highest,
                });
            }
        }

        let record = BidRecord {
            auction_id: auction.ledger_id.clone(),
            bidder: bid.bidder,
            amount: bid.amount,
            currency: auction.currency.clone(),
            usd_value: bid.usd_value,
            timestamp: bid.timestamp,
            replayed: false,
        };
        let (bidder, timestamp) = (bid.bidder, bid.timestamp);
        auction.push_bid(bid);
        ensure_user(&mut inner.users, &mut inner.next_user_id, bidder, timestamp)
            .add_participated(key);
        if let Some(attempt) = idempotency_key {
            inner.attempts.insert((key, attempt), record.clone());
        }
        Ok(record)
    }

    async fn commit_settlement(&self, commit: SettlementCommit) -> Result<Auction> {
        let mut guard = self.inner.write().await;
        let inner = &mut *guard;
        let key = inner.key_of(&commit.auction)?;
        let auction = inner.auctions.get_mut(&key).ok_or(Error::AuctionNotFound)?;
        if auction.is_settled() {
            return Err(Error::AlreadySettled);
        }

        let settled_at = commit.record.settled_at;
        auction.replace_bids(commit.bids);
        auction.end_time = settled_at;
        auction.settlement = Some(commit.record);
        let settled = auction.clone();

        for bidder in &settled.participants {
            ensure_user(&mut inner.users, &mut inner.next_user_id, *bidder, settled_at)
                .add_participated(key);
        }
        if let Some(winning) = commit.winning_bid {
            ensure_user(&mut inner.users, &mut inner.next_user_id, winning.winner, settled_at)
                .add_won(key);
            inner.winning_bids.insert(key, winning);
        }
        // Settled auctions keep no attempt keys.
        inner.attempts.retain(|(auction, _), _| *auction != key);
        Ok(settled)
    }

    async fn running(&self, now: DateTime<Utc>) -> Result<Vec<Auction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .auctions
            .values()
            .filter(|a| !a.is_settled() && a.start_time <= now && now <= a.end_time)
            .cloned()
            .collect())
    }

    async fn hosted_by(&self, host: &Address) -> Result<Vec<Auction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .auctions
            .values()
            .filter(|a| a.host == *host)
            .cloned()
            .collect())
    }

    async fn participated_by(&self, wallet: &Address) -> Result<Vec<Auction>> {
        let inner = self.inner.read().await;
        Ok(inner
            .auctions
            .values()
            .filter(|a| a.participants.contains(wallet))
            .cloned()
            .collect())
    }

    async fn winning_bids(&self) -> Result<Vec<WinningBid>> {
        Ok(self.inner.read().await.winning_bids.values().cloned().collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::{RankingBasis, SettlementRecord};
    use chrono::Duration;
    use rust_decimal::Decimal;
    use rust_decimal_macros::dec;

    fn draft(id: &str, now: DateTime<Utc>) -> AuctionDraft {
        AuctionDraft {
            ledger_id: LedgerAuctionId::new(id),
            name: "Lot".into(),
            token: Address::repeat_byte(0xee),
            currency: "USDC".into(),
            minimum_bid: dec!(100),
            reserve_price: None,
            host_fee_percentage: None,
            start_time: now - Duration::hours(1),
            end_time: now + Duration::hours(1),
            creation_hash: None,
        }
    }

    fn bid(bidder: Address, amount: Decimal, now: DateTime<Utc>) -> Bid {
        Bid {
            bidder,
            amount,
            usd_value: Some(amount),
            timestamp: now,
        }
    }

    #[tokio::test]
    async fn test_user_created_once_per_wallet() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let wallet = Address::repeat_byte(1);

        let first = store.get_or_create_user(wallet, now).await.unwrap();
        let second = store.get_or_create_user(wallet, now).await.unwrap();
        assert_eq!(first.id, second.id);
    }

    #[tokio::test]
    async fn test_insert_auction_rejects_duplicate_ledger_id() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let host = Address::repeat_byte(1);

        store.insert_auction(host, draft("a-1", now), now).await.unwrap();
        let err = store
            .insert_auction(host, draft("a-1", now), now)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::DuplicateAuction(_)));

        let user = store.user(&host).await.unwrap().unwrap();
        assert_eq!(user.hosted_auctions.len(), 1);
    }

    #[tokio::test]
    async fn test_append_bid_is_conditional() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = LedgerAuctionId::new("a-1");
        store
            .insert_auction(Address::repeat_byte(1), draft("a-1", now), now)
            .await
            .unwrap();

        let alice = Address::repeat_byte(2);
        store
            .append_bid(&id, bid(alice, dec!(150), now), None)
            .await
            .unwrap();
        let err = store
            .append_bid(&id, bid(alice, dec!(150), now), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::BidRaceLost { current_highest } if current_highest == dec!(150)));

        let auction = store.auction(&id).await.unwrap().unwrap();
        assert_eq!(auction.bid_count(), 1);
        let user = store.user(&alice).await.unwrap().unwrap();
        assert_eq!(user.participated_auctions, vec![auction.key]);
    }

    #[tokio::test]
    async fn test_append_bid_replays_idempotency_key() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = LedgerAuctionId::new("a-1");
        store
            .insert_auction(Address::repeat_byte(1), draft("a-1", now), now)
            .await
            .unwrap();

        let alice = Address::repeat_byte(2);
        let first = store
            .append_bid(&id, bid(alice, dec!(150), now), Some("k1".into()))
            .await
            .unwrap();
        let again = store
            .append_bid(&id, bid(alice, dec!(150), now), Some("k1".into()))
            .await
            .unwrap();

        assert!(!first.replayed);
        assert!(again.replayed);
        assert_eq!(again.amount, first.amount);
        assert_eq!(store.auction(&id).await.unwrap().unwrap().bid_count(), 1);
        assert!(store.recorded_bid(&id, "k1").await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_commit_settlement_once() {
        let store = MemoryStore::new();
        let now = Utc::now();
        let id = LedgerAuctionId::new("a-1");
        let auction = store
            .insert_auction(Address::repeat_byte(1), draft("a-1", now), now)
            .await
            .unwrap();
        let winner = Address::repeat_byte(3);
        store
            .append_bid(&id, bid(Address::repeat_byte(2), dec!(150), now), Some("k1".into()))
            .await
            .unwrap();
        assert!(store.recorded_bid(&id, "k1").await.unwrap().is_some());

        let commit = SettlementCommit {
            auction: id.clone(),
            bids: vec![bid(winner, dec!(300), now)],
            record: SettlementRecord {
                settled_at: now,
                winner: Some(winner),
                winning_amount: Some(dec!(300)),
                winning_usd: Some(dec!(300)),
                ranking_basis: RankingBasis::Usd,
                total_revenue: dec!(300),
            },
            winning_bid: Some(WinningBid {
                auction: auction.key,
                ledger_id: id.clone(),
                winner,
                amount: dec!(300),
                currency: "USDC".into(),
                usd_amount: Some(dec!(300)),
                created_at: now,
            }),
        };

        let settled = store.commit_settlement(commit.clone()).await.unwrap();
        assert_eq!(settled.end_time, now);
        assert_eq!(settled.current_highest_bid(), dec!(300));
        assert!(matches!(
            store.commit_settlement(commit).await,
            Err(Error::AlreadySettled)
        ));

        let user = store.user(&winner).await.unwrap().unwrap();
        assert_eq!(user.auctions_won, vec![auction.key]);
        assert_eq!(store.winning_bids().await.unwrap().len(), 1);
        assert!(store.recorded_bid(&id, "k1").await.unwrap().is_none());
        assert!(store.snapshot(now).await.attempts.is_empty());

        let err = store
            .append_bid(&id, bid(winner, dec!(900), now), None)
            .await
            .unwrap_err();
        assert!(matches!(err, Error::Rejected(BidRejection::AuctionEnded)));
    }

    #[tokio::test]
    async fn test_snapshot_round_trip_through_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state/read_model.json");
        let now = Utc::now();

        let store = MemoryStore::new();
        let id = LedgerAuctionId::new("a-1");
        store
            .insert_auction(Address::repeat_byte(1), draft("a-1", now), now)
            .await
            .unwrap();
        store
            .append_bid(&id, bid(Address::repeat_byte(2), dec!(150), now), Some("k".into()))
            .await
            .unwrap();
        store.save_snapshot(&path, now).await.unwrap();
        assert!(!path.with_extension("json.tmp").exists());

        let restored = MemoryStore::load_snapshot(&path).await.unwrap().unwrap();
        assert_eq!(restored.snapshot(now).await, store.snapshot(now).await);

        let next = restored
            .insert_auction(Address::repeat_byte(1), draft("a-2", now), now)
            .await
            .unwrap();
        assert_eq!(next.key, AuctionKey(2));
    }

    #[tokio::test]
    async fn test_load_missing_snapshot() {
        let dir = tempfile::tempdir().unwrap();
        let loaded = MemoryStore::load_snapshot(&dir.path().join("absent.json"))
            .await
            .unwrap();
        assert!(loaded.is_none());
    }
}
