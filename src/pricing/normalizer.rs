//! Decimal/price normalizer.
//!
//! Every USD figure is an `Option<Decimal>`: `None` means the price was not
//! available, never zero.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::{Address, U256};
use rust_decimal::Decimal;
use tracing::{debug, warn};

use super::{to_human_units, DecimalsResolver, PriceOracle};
use crate::{logging::targets, metrics::ServiceMetrics, prelude::*};

pub struct Normalizer {
    decimals: DecimalsResolver,
    oracle: Option<Arc<dyn PriceOracle>>,
    oracle_timeout: Duration,
    metrics: Arc<ServiceMetrics>,
}

impl Normalizer {
    pub fn new(
        decimals: DecimalsResolver,
        oracle: Option<Arc<dyn PriceOracle>>,
        oracle_timeout: Duration,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            decimals,
            oracle,
            oracle_timeout,
            metrics,
        }
    }

    pub fn decimals_resolver(&self) -> &DecimalsResolver {
        &self.decimals
    }

    pub async fn token_decimals(&self, token: Address) -> u8 {
        self.decimals.decimals(token).await
    }

    /// Raw integer amount to human units using the token's decimals.
    pub async fn to_human_units(&self, raw: U256, token: Address) -> Result<Decimal> {
        let decimals = self.decimals.decimals(token).await;
        to_human_units(raw, decimals)
    }

    /// `amount * spot price`, or `None` when no price could be obtained.
    pub async fn to_usd(&self, amount: Decimal, token: Address) -> Option<Decimal> {
        let price = self.spot_price(token).await?;
        value_in_usd(amount, price, token)
    }

    /// Start a pricing pass that looks each token up at most once.
    pub fn pass(&self) -> PricePass<'_> {
        PricePass {
            normalizer: self,
            prices: HashMap::new(),
        }
    }

    async fn spot_price(&self, token: Address) -> Option<Decimal> {
        if self.decimals.is_usd_pegged(&token) {
            return Some(Decimal::ONE);
        }
        let oracle = self.oracle.as_ref()?;
        match tokio::time::timeout(self.oracle_timeout, oracle.spot_price_usd(token)).await {
            Ok(Ok(price)) => {
                debug!(target: targets::PRICING, token = %token, price = %price, "Spot price fetched");
                Some(price)
            }
            Ok(Err(e)) => {
                self.metrics.record_oracle_failure();
                warn!(target: targets::PRICING, token = %token, error = %e, "Spot price unavailable");
                None
            }
            Err(_) => {
                self.metrics.record_oracle_failure();
                warn!(
                    target: targets::PRICING,
                    token = %token,
                    timeout_ms = self.oracle_timeout.as_millis() as u64,
                    "Spot price lookup timed out"
                );
                None
            }
        }
    }
}

fn value_in_usd(amount: Decimal, price: Decimal, token: Address) -> Option<Decimal> {
    let value = amount.checked_mul(price);
    if value.is_none() {
        warn!(target: targets::PRICING, token = %token, amount = %amount, price = %price, "USD value overflows");
    }
    value.map(|v| v.normalize())
}

/// Price cache scoped to one settlement pass.
///
/// The outcome of the first lookup per token, failure included, is reused for
/// the rest of the pass so every entry of a batch is priced consistently.
pub struct PricePass<'a> {
    normalizer: &'a Normalizer,
    prices: HashMap<Address, Option<Decimal>>,
}

impl PricePass<'_> {
    pub async fn to_usd(&mut self, amount: Decimal, token: Address) -> Option<Decimal> {
        let price = match self.prices.get(&token) {
            Some(cached) => *cached,
            None => {
                let fetched = self.normalizer.spot_price(token).await;
                self.prices.insert(token, fetched);
                fetched
            }
        };
        value_in_usd(amount, price?, token)
    }

    pub fn lookups(&self) -> usize {
        self.prices.len()
    }
}
