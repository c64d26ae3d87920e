//! Shared serialization helpers.

use std::str::FromStr;

use alloy::primitives::U256;
use serde::{de, Deserialize, Deserializer, Serializer};

#[derive(Deserialize)]
#[serde(untagged)]
enum U256Repr {
    Text(String),
    Number(u64),
}

/// Deserialize a `U256` from a decimal string, a `0x` hex string, or a JSON
/// integer. Clients forward contract amounts in all three shapes.
pub fn deserialize_u256_lenient<'de, D>(deserializer: D) -> Result<U256, D::Error>
where
    D: Deserializer<'de>,
{
    match U256Repr::deserialize(deserializer)? {
        U256Repr::Number(n) => Ok(U256::from(n)),
        U256Repr::Text(s) => parse_u256(&s).map_err(de::Error::custom),
    }
}

/// Serialize a `U256` as a base-10 string.
pub fn serialize_u256_decimal<S>(val: &U256, s: S) -> Result<S::Ok, S::Error>
where
    S: Serializer,
{
    s.serialize_str(&val.to_string())
}

pub fn parse_u256(input: &str) -> Result<U256, String> {
    let trimmed = input.trim();
    let parsed = match trimmed
        .strip_prefix("0x")
        .or_else(|| trimmed.strip_prefix("0X"))
    {
        Some(hex) => U256::from_str_radix(hex, 16),
        None => U256::from_str(trimmed),
    };
    parsed.map_err(|e| format!("invalid uint256 '{input}': {e}"))
}
