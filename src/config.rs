//! Service configuration, read from a TOML file.
//!
//! Every field has a default, so an absent file or an empty section yields a
//! runnable mainnet configuration with identity enrichment disabled.

use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::time::Duration;

use alloy::primitives::Address;
use serde::{Deserialize, Serialize};

use crate::{
    consts::{BASE_RPC_URL, DEXSCREENER_API_URL, DEXSCREENER_CHAIN, MAX_DECIMAL_SCALE, NEYNAR_API_URL},
    engine::EngineConfig,
    logging::LogConfig,
    prelude::*,
    pricing::KnownToken,
    Error,
};

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct AppConfig {
    #[serde(default)]
    pub server: ServerConfig,
    #[serde(default)]
    pub chain: ChainConfig,
    #[serde(default)]
    pub oracle: OracleConfig,
    #[serde(default)]
    pub identity: IdentityConfig,
    #[serde(default)]
    pub store: StoreConfig,
    #[serde(default)]
    pub engine: EngineConfig,
    #[serde(default)]
    pub logging: LogConfig,
    /// Tokens with fixed decimals; `usd_pegged` ones are priced at 1 USD.
    #[serde(default = "default_tokens")]
    pub tokens: Vec<KnownToken>,
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ServerConfig {
    #[serde(default = "default_bind")]
    pub bind: String,

    /// Overall bound on one HTTP request.
    #[serde(default = "default_request_timeout_ms")]
    pub request_timeout_ms: u64,

    /// Allowed browser origins. Empty allows any origin.
    #[serde(default)]
    pub cors_origins: Vec<String>,
}

fn default_bind() -> String {
    "0.0.0.0:8080".to_string()
}

fn default_request_timeout_ms() -> u64 {
    30_000
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            bind: default_bind(),
            request_timeout_ms: default_request_timeout_ms(),
            cors_origins: Vec::new(),
        }
    }
}

impl ServerConfig {
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn bind_addr(&self) -> Result<SocketAddr> {
        self.bind
            .parse()
            .map_err(|e| Error::Config(format!("invalid bind address '{}': {e}", self.bind)))
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct ChainConfig {
    #[serde(default = "default_rpc_url")]
    pub rpc_url: String,

    /// Auction contract exposing `getBidders`. Without it settlement needs a
    /// bidder list in the request.
    #[serde(default)]
    pub auction_contract: Option<Address>,

    #[serde(default = "default_rpc_timeout_ms")]
    pub rpc_timeout_ms: u64,
}

fn default_rpc_url() -> String {
    BASE_RPC_URL.to_string()
}

fn default_rpc_timeout_ms() -> u64 {
    8_000
}

impl Default for ChainConfig {
    fn default() -> Self {
        Self {
            rpc_url: default_rpc_url(),
            auction_contract: None,
            rpc_timeout_ms: default_rpc_timeout_ms(),
        }
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct OracleConfig {
    #[serde(default = "default_true")]
    pub enabled: bool,

    #[serde(default = "default_oracle_url")]
    pub base_url: String,

    /// Chain slug in the DexScreener path.
    #[serde(default = "default_oracle_chain")]
    pub chain: String,

    #[serde(default = "default_oracle_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_true() -> bool {
    true
}

fn default_oracle_url() -> String {
    DEXSCREENER_API_URL.to_string()
}

fn default_oracle_chain() -> String {
    DEXSCREENER_CHAIN.to_string()
}

fn default_oracle_timeout_ms() -> u64 {
    2_500
}

impl Default for OracleConfig {
    fn default() -> Self {
        Self {
            enabled: true,
            base_url: default_oracle_url(),
            chain: default_oracle_chain(),
            timeout_ms: default_oracle_timeout_ms(),
        }
    }
}

impl OracleConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct IdentityConfig {
    #[serde(default = "default_identity_url")]
    pub base_url: String,

    /// Neynar API key. Usually supplied through `NEYNAR_API_KEY`; without
    /// one every identity is a placeholder.
    #[serde(default)]
    pub api_key: Option<String>,

    #[serde(default = "default_identity_timeout_ms")]
    pub timeout_ms: u64,
}

fn default_identity_url() -> String {
    NEYNAR_API_URL.to_string()
}

fn default_identity_timeout_ms() -> u64 {
    2_000
}

impl Default for IdentityConfig {
    fn default() -> Self {
        Self {
            base_url: default_identity_url(),
            api_key: None,
            timeout_ms: default_identity_timeout_ms(),
        }
    }
}

impl IdentityConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_millis(self.timeout_ms)
    }
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct StoreConfig {
    /// JSON snapshot loaded at startup and rewritten periodically.
    #[serde(default)]
    pub snapshot_path: Option<PathBuf>,

    #[serde(default = "default_snapshot_interval_secs")]
    pub snapshot_interval_secs: u64,
}

fn default_snapshot_interval_secs() -> u64 {
    60
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            snapshot_path: None,
            snapshot_interval_secs: default_snapshot_interval_secs(),
        }
    }
}

fn default_tokens() -> Vec<KnownToken> {
    vec![KnownToken::base_usdc()]
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            server: ServerConfig::default(),
            chain: ChainConfig::default(),
            oracle: OracleConfig::default(),
            identity: IdentityConfig::default(),
            store: StoreConfig::default(),
            engine: EngineConfig::default(),
            logging: LogConfig::default(),
            tokens: default_tokens(),
        }
    }
}

impl AppConfig {
    /// Read `path`, falling back to defaults when the file does not exist.
    pub fn load(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }
        let content = std::fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("cannot read {}: {e}", path.display())))?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> Result<Self> {
        toml::from_str(content).map_err(|e| Error::Config(e.to_string()))
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string_pretty(self).map_err(|e| Error::Config(e.to_string()))
    }

    /// Write a commented sample configuration.
    pub fn write_sample(path: &Path) -> Result<()> {
        let body = Self::default().to_toml_string()?;
        let content = format!(
            "# house_auction configuration\n\
             # NEYNAR_API_KEY and HOUSE_RPC_URL are read from the environment.\n\n{body}"
        );
        std::fs::write(path, content)
            .map_err(|e| Error::Config(format!("cannot write {}: {e}", path.display())))
    }

    /// Reject values the service cannot start with.
    pub fn validate(&self) -> Result<()> {
        self.server.bind_addr()?;
        if self.server.request_timeout_ms == 0 {
            return Err(Error::Config("server.request_timeout_ms must be positive".into()));
        }
        if self.chain.rpc_url.trim().is_empty() {
            return Err(Error::Config("chain.rpc_url is required".into()));
        }
        if self.chain.rpc_timeout_ms == 0 {
            return Err(Error::Config("chain.rpc_timeout_ms must be positive".into()));
        }
        if self.oracle.enabled && self.oracle.base_url.trim().is_empty() {
            return Err(Error::Config("oracle.base_url is required when enabled".into()));
        }
        if self.engine.ledger_timeout_ms == 0 || self.engine.bid_pricing_timeout_ms == 0 {
            return Err(Error::Config("engine timeouts must be positive".into()));
        }
        if self.engine.top_running_limit == 0 || self.engine.leaderboard_limit == 0 {
            return Err(Error::Config("engine listing limits must be positive".into()));
        }
        if self.store.snapshot_path.is_some() && self.store.snapshot_interval_secs == 0 {
            return Err(Error::Config(
                "store.snapshot_interval_secs must be positive".into(),
            ));
        }
        for token in &self.tokens {
            if token.decimals > MAX_DECIMAL_SCALE {
                return Err(Error::Config(format!(
                    "token {} has {} decimals; at most {MAX_DECIMAL_SCALE} are supported",
                    token.symbol, token.decimals
                )));
            }
        }
        Ok(())
    }
}
