//! User identity registry types.

use std::str::FromStr;

use alloy::primitives::Address;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::{AuctionKey, UserId};
use crate::Error;

/// Parse a wallet address in any letter case.
///
/// Addresses are stored as bytes, so two spellings of the same wallet always
/// resolve to the same user.
pub fn parse_wallet(input: &str) -> Result<Address, Error> {
    Address::from_str(input.trim()).map_err(|_| Error::InvalidWallet(input.to_string()))
}

/// Lower-case `0x` form of a wallet, the canonical text key.
pub fn wallet_key(wallet: &Address) -> String {
    format!("{wallet:#x}")
}

/// A registered user. Never deleted once created.
#[derive(Deserialize, Serialize, Clone, Debug, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct User {
    pub id: UserId,
    pub wallet: Address,
    /// Social identity handle (Farcaster fid) if known.
    #[serde(default)]
    pub social_id: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub hosted_auctions: Vec<AuctionKey>,
    #[serde(default)]
    pub participated_auctions: Vec<AuctionKey>,
    #[serde(default)]
    pub auctions_won: Vec<AuctionKey>,
    pub created_at: DateTime<Utc>,
}

impl User {
    pub fn new(id: UserId, wallet: Address, created_at: DateTime<Utc>) -> Self {
        Self {
            id,
            wallet,
            social_id: None,
            display_name: None,
            hosted_auctions: Vec::new(),
            participated_auctions: Vec::new(),
            auctions_won: Vec::new(),
            created_at,
        }
    }

    pub fn wallet_key(&self) -> String {
        wallet_key(&self.wallet)
    }

    pub(crate) fn add_hosted(&mut self, key: AuctionKey) {
        push_unique(&mut self.hosted_auctions, key);
    }

    pub(crate) fn add_participated(&mut self, key: AuctionKey) {
        push_unique(&mut self.participated_auctions, key);
    }

    pub(crate) fn add_won(&mut self, key: AuctionKey) {
        push_unique(&mut self.auctions_won, key);
    }
}

fn push_unique(list: &mut Vec<AuctionKey>, key: AuctionKey) {
    if !list.contains(&key) {
        list.push(key);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_wallet_is_case_insensitive() {
        let lower = parse_wallet("0x833589fcd6edb6e08f4c7c32d4f71b54bda02913").unwrap();
        let mixed = parse_wallet("0x833589fCD6eDb6E08f4c7C32D4f71b54bdA02913").unwrap();
        assert_eq!(lower, mixed);
        assert_eq!(
            wallet_key(&mixed),
            "0x833589fcd6edb6e08f4c7c32d4f71b54bda02913"
        );
    }

    #[test]
    fn test_parse_wallet_rejects_garbage() {
        assert!(matches!(
            parse_wallet("not-a-wallet"),
            Err(Error::InvalidWallet(_))
        ));
    }

    #[test]
    fn test_participation_is_idempotent() {
        let mut user = User::new(UserId(1), Address::ZERO, Utc::now());
        user.add_participated(AuctionKey(7));
        user.add_participated(AuctionKey(7));
        assert_eq!(user.participated_auctions, vec![AuctionKey(7)]);
    }
}
