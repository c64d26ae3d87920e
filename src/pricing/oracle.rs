use std::str::FromStr;

use alloy::primitives::Address;
use async_trait::async_trait;
use rust_decimal::Decimal;
use serde::Deserialize;

use crate::{prelude::*, req::HttpClient, types::wallet_key, Error};

/// External USD spot price feed.
#[async_trait]
pub trait PriceOracle: Send + Sync {
    /// USD value of one whole token. Never returns zero or a negative price.
    async fn spot_price_usd(&self, token: Address) -> Result<Decimal>;
}

#[derive(Deserialize, Debug)]
#[serde(rename_all = "camelCase")]
struct DexPair {
    #[serde(default)]
    price_usd: Option<String>,
}

/// DexScreener token endpoint: `GET /tokens/v1/{chain}/{token}`, first pair.
#[derive(Debug, Clone)]
pub struct DexScreenerOracle {
    http: HttpClient,
    chain: String,
}

impl DexScreenerOracle {
    pub fn new(http: HttpClient, chain: impl Into<String>) -> Self {
        Self {
            http,
            chain: chain.into(),
        }
    }
}

pub(crate) fn parse_dex_price(body: &str) -> Result<Decimal> {
    let pairs: Vec<DexPair> = serde_json::from_str(body).map_err(|e| Error::json_parse(e.to_string()))?;
    let raw = pairs
        .into_iter()
        .next()
        .and_then(|pair| pair.price_usd)
        .ok_or_else(|| Error::OracleUnavailable("no price data available for this token".into()))?;
    let price = Decimal::from_str(raw.trim())
        .or_else(|_| Decimal::from_scientific(raw.trim()))
        .map_err(|_| Error::OracleUnavailable(format!("invalid price data '{raw}'")))?;
    if price <= Decimal::ZERO {
        return Err(Error::OracleUnavailable(format!("non-positive price {price}")));
    }
    Ok(price)
}

#[async_trait]
impl PriceOracle for DexScreenerOracle {
    async fn spot_price_usd(&self, token: Address) -> Result<Decimal> {
        let path = format!("/tokens/v1/{}/{}", self.chain, wallet_key(&token));
        let body = self.http.get(&path, &[]).await?;
        parse_dex_price(&body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn test_parse_first_pair_price() {
        let body = r#"[{"chainId":"base","priceUsd":"0.0001234"},{"priceUsd":"9"}]"#;
        assert_eq!(parse_dex_price(body).unwrap(), dec!(0.0001234));
    }

    #[test]
    fn test_parse_scientific_price() {
        let body = r#"[{"priceUsd":"1.5e-7"}]"#;
        assert_eq!(parse_dex_price(body).unwrap(), dec!(0.00000015));
    }

    #[test]
    fn test_parse_rejects_empty_and_zero() {
        assert!(matches!(
            parse_dex_price("[]"),
            Err(Error::OracleUnavailable(_))
        ));
        assert!(matches!(
            parse_dex_price(r#"[{"priceUsd":"0"}]"#),
            Err(Error::OracleUnavailable(_))
        ));
        assert!(matches!(
            parse_dex_price(r#"[{"pairAddress":"0x1"}]"#),
            Err(Error::OracleUnavailable(_))
        ));
        assert!(matches!(parse_dex_price("null"), Err(Error::JsonParse(_))));
    }
}
