use alloy::primitives::{address, Address};

/// USDC on Base.
pub const BASE_USDC: Address = address!("833589fCD6eDb6E08f4c7C32D4f71b54bdA02913");

/// Decimal count used when a token's `decimals()` cannot be read.
pub const DEFAULT_TOKEN_DECIMALS: u8 = 18;

/// Decimal count of the known USD stablecoins.
pub const STABLECOIN_DECIMALS: u8 = 6;

/// Largest scale representable by `rust_decimal`.
pub const MAX_DECIMAL_SCALE: u8 = 28;

pub const DEXSCREENER_API_URL: &str = "https://api.dexscreener.com";
pub const DEXSCREENER_CHAIN: &str = "base";
pub const NEYNAR_API_URL: &str = "https://api.neynar.com";
pub const BASE_RPC_URL: &str = "https://mainnet.base.org";
pub const IDENTICON_URL: &str = "https://api.dicebear.com/5.x/identicon/svg";

/// Header carrying the wallet authenticated by the upstream session gateway.
pub const AUTH_WALLET_HEADER: &str = "x-wallet-address";

pub const DEFAULT_TOP_RUNNING_LIMIT: usize = 5;
pub const DEFAULT_LEADERBOARD_LIMIT: usize = 20;
pub const MAX_AUCTION_NAME_LEN: usize = 200;
