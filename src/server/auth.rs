use alloy::primitives::Address;
use axum::async_trait;
use axum::extract::FromRequestParts;
use axum::http::request::Parts;

use super::ApiError;
use crate::{consts::AUTH_WALLET_HEADER, types::parse_wallet, Error};

/// Wallet authenticated by the session gateway in front of the service.
///
/// The gateway verifies the session and forwards the wallet in
/// `x-wallet-address`. A missing or malformed header is `Unauthenticated`.
#[derive(Debug, Clone, Copy)]
pub struct AuthenticatedWallet(pub Address);

#[async_trait]
impl<S> FromRequestParts<S> for AuthenticatedWallet
where
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, _state: &S) -> Result<Self, Self::Rejection> {
        let raw = parts
            .headers
            .get(AUTH_WALLET_HEADER)
            .and_then(|v| v.to_str().ok())
            .ok_or(Error::Unauthenticated)?;
        let wallet = parse_wallet(raw).map_err(|_| Error::Unauthenticated)?;
        Ok(AuthenticatedWallet(wallet))
    }
}
