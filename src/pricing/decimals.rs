//! Token decimal counts and raw-to-human conversion.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use tokio::sync::RwLock;
use tracing::{debug, warn};

use crate::{
    consts::{BASE_USDC, DEFAULT_TOKEN_DECIMALS, MAX_DECIMAL_SCALE, STABLECOIN_DECIMALS},
    logging::targets,
    prelude::*,
    Error,
};

/// A token whose decimals are fixed by configuration.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq)]
pub struct KnownToken {
    pub address: Address,
    pub symbol: String,
    pub decimals: u8,
    /// Pegged one-to-one to USD; spot price is taken as 1.
    #[serde(default)]
    pub usd_pegged: bool,
}

impl KnownToken {
    pub fn base_usdc() -> Self {
        Self {
            address: BASE_USDC,
            symbol: "USDC".to_string(),
            decimals: STABLECOIN_DECIMALS,
            usd_pegged: true,
        }
    }
}

/// Reads `decimals()` for tokens that are not configured.
#[async_trait]
pub trait TokenMetadataSource: Send + Sync {
    async fn decimals(&self, token: Address) -> Result<u8>;
}

/// Resolves the decimal count of a token.
///
/// Configured tokens win. Otherwise the on-chain value is used and cached;
/// when it cannot be read the default of 18 is returned but not cached, so
/// the next lookup tries again.
pub struct DecimalsResolver {
    known: HashMap<Address, KnownToken>,
    source: Option<Arc<dyn TokenMetadataSource>>,
    timeout: Duration,
    cache: RwLock<HashMap<Address, u8>>,
}

impl DecimalsResolver {
    pub fn new(
        known: Vec<KnownToken>,
        source: Option<Arc<dyn TokenMetadataSource>>,
        timeout: Duration,
    ) -> Self {
        Self {
            known: known.into_iter().map(|t| (t.address, t)).collect(),
            source,
            timeout,
            cache: RwLock::new(HashMap::new()),
        }
    }

    /// Resolver with only the configured tokens; everything else is 18.
    pub fn offline(known: Vec<KnownToken>) -> Self {
        Self::new(known, None, Duration::from_secs(1))
    }

    pub fn known_token(&self, token: &Address) -> Option<&KnownToken> {
        self.known.get(token)
    }

    pub fn is_usd_pegged(&self, token: &Address) -> bool {
        self.known.get(token).is_some_and(|t| t.usd_pegged)
    }

    pub async fn decimals(&self, token: Address) -> u8 {
        if let Some(known) = self.known.get(&token) {
            return known.decimals;
        }
        if let Some(cached) = self.cache.read().await.get(&token) {
            return *cached;
        }
        let Some(source) = &self.source else {
            return DEFAULT_TOKEN_DECIMALS;
        };

        match tokio::time::timeout(self.timeout, source.decimals(token)).await {
            Ok(Ok(decimals)) => {
                debug!(target: targets::PRICING, token = %token, decimals, "Token decimals resolved");
                self.cache.write().await.insert(token, decimals);
                decimals
            }
            Ok(Err(e)) => {
                warn!(target: targets::PRICING, token = %token, error = %e, "decimals() failed, assuming 18");
                DEFAULT_TOKEN_DECIMALS
            }
            Err(_) => {
                warn!(target: targets::PRICING, token = %token, "decimals() timed out, assuming 18");
                DEFAULT_TOKEN_DECIMALS
            }
        }
    }
}

/// Largest mantissa a `Decimal` can hold (96 bits).
const MAX_MANTISSA: u128 = (1 << 96) - 1;

/// `raw / 10^decimals`.
///
/// Exact while the raw value fits a 96-bit mantissa with a scale of at most
/// 28. Beyond that the lowest digits are dropped, keeping 28 significant
/// digits. Fails with `AmountOutOfRange` only when the integer part alone does
/// not fit.
pub fn to_human_units(raw: U256, decimals: u8) -> Result<Decimal> {
    let out_of_range = || Error::AmountOutOfRange {
        raw: raw.to_string(),
        decimals,
    };
    let max_mantissa = U256::from(MAX_MANTISSA);
    let ten = U256::from(10u8);
    let mut mantissa = raw;
    let mut scale = u32::from(decimals);
    while mantissa > max_mantissa || scale > u32::from(MAX_DECIMAL_SCALE) {
        if scale == 0 {
            return Err(out_of_range());
        }
        mantissa /= ten;
        scale -= 1;
    }
    let mantissa = u128::try_from(mantissa)
        .ok()
        .and_then(|m| i128::try_from(m).ok())
        .ok_or_else(out_of_range)?;
    Decimal::try_from_i128_with_scale(mantissa, scale)
        .map(|d| d.normalize())
        .map_err(|_| out_of_range())
}
