//! Auction contract and ERC-20 metadata readers.

use std::sync::Arc;

use alloy::primitives::{Address, Bytes};
use alloy::sol_types::{SolCall, SolValue};
use async_trait::async_trait;
use tracing::debug;

use super::JsonRpcClient;
use crate::{
    logging::targets,
    prelude::*,
    pricing::TokenMetadataSource,
    types::{LedgerAuctionId, LedgerBid, LedgerBidders},
    Error,
};

mod abi {
    #![allow(unreachable_pub)]

    alloy::sol! {
        /// One bidder entry as stored by the auction contract.
        struct Bidders {
            address bidder;
            uint256 bidAmount;
            string fid;
        }

        interface IAuctionHouse {
            function getBidders(string auctionId) external view returns (Bidders[] memory);
        }

        interface IERC20Metadata {
            function decimals() external view returns (uint8);
        }
    }
}

use abi::{Bidders, IAuctionHouse, IERC20Metadata};

/// Authoritative read of an auction's bidder list.
#[async_trait]
pub trait BidLedger: Send + Sync {
    async fn get_bidders(&self, auction: &LedgerAuctionId) -> Result<LedgerBidders>;
}

/// Reads `getBidders` from the deployed auction contract.
pub struct RpcBidLedger {
    rpc: Arc<JsonRpcClient>,
    contract: Address,
}

impl RpcBidLedger {
    pub fn new(rpc: Arc<JsonRpcClient>, contract: Address) -> Self {
        Self { rpc, contract }
    }
}

pub(crate) fn decode_bidders(auction: &LedgerAuctionId, data: &[u8]) -> Result<LedgerBidders> {
    let rows = <Vec<Bidders>>::abi_decode(data).map_err(|e| Error::AbiDecode(e.to_string()))?;
    let entries = rows
        .into_iter()
        .map(|row| LedgerBid {
            bidder: row.bidder,
            raw_amount: row.bidAmount,
            social_id: row.fid,
        })
        .collect();
    Ok(LedgerBidders::from_contract(auction.clone(), entries))
}

#[async_trait]
impl BidLedger for RpcBidLedger {
    async fn get_bidders(&self, auction: &LedgerAuctionId) -> Result<LedgerBidders> {
        let call = IAuctionHouse::getBiddersCall {
            auctionId: auction.to_string(),
        };
        let data = self
            .rpc
            .eth_call(self.contract, Bytes::from(call.abi_encode()))
            .await?;
        let bidders = decode_bidders(auction, &data)?;
        debug!(
            target: targets::SETTLE,
            auction = %auction,
            entries = bidders.len(),
            "Ledger bidders read"
        );
        Ok(bidders)
    }
}

pub(crate) fn decode_decimals(data: &[u8]) -> Result<u8> {
    IERC20Metadata::decimalsCall::abi_decode_returns(data)
        .map_err(|e| Error::AbiDecode(e.to_string()))
}

/// `decimals()` over JSON-RPC.
pub struct RpcTokenMetadata {
    rpc: Arc<JsonRpcClient>,
}

impl RpcTokenMetadata {
    pub fn new(rpc: Arc<JsonRpcClient>) -> Self {
        Self { rpc }
    }
}

#[async_trait]
impl TokenMetadataSource for RpcTokenMetadata {
    async fn decimals(&self, token: Address) -> Result<u8> {
        let call = IERC20Metadata::decimalsCall {};
        let data = self.rpc.eth_call(token, Bytes::from(call.abi_encode())).await?;
        decode_decimals(&data)
    }
}
