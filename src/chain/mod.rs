//! Read-only access to the auction contract.

mod contract;
mod rpc;

pub use contract::{BidLedger, RpcBidLedger, RpcTokenMetadata};
pub use rpc::JsonRpcClient;
