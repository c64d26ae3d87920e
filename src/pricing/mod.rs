//! Token amounts in human units and USD.

mod decimals;
mod normalizer;
mod oracle;

pub use decimals::{to_human_units, DecimalsResolver, KnownToken, TokenMetadataSource};
pub use normalizer::{Normalizer, PricePass};
pub use oracle::{DexScreenerOracle, PriceOracle};
