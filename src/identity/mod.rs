//! Display identities for wallets.
//!
//! Lookups are best-effort. Anything that cannot be resolved gets a
//! deterministic placeholder derived from the wallet, so callers never wait on
//! or fail because of the identity provider.

mod neynar;

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use alloy::primitives::Address;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::warn;

pub use neynar::NeynarResolver;

use crate::{
    helpers::{identicon_url, truncate_address},
    logging::targets,
    metrics::ServiceMetrics,
    prelude::*,
    Error,
};

/// Interpret a raw social id as reported by the contract or a client.
///
/// Only numeric ids are real. Wallet addresses (`0x...`) and `none...`
/// markers mean the user has no social identity.
pub fn parse_social_id(raw: &str) -> Option<u64> {
    let trimmed = raw.trim();
    if trimmed.is_empty()
        || trimmed.starts_with("0x")
        || trimmed.to_ascii_lowercase().starts_with("none")
    {
        return None;
    }
    trimmed.parse().ok()
}

/// Strict form of [`parse_social_id`] for user input.
pub fn validate_social_id(raw: &str) -> Result<u64> {
    parse_social_id(raw).ok_or_else(|| Error::InvalidSocialId(raw.trim().to_string()))
}

/// Profile returned by an identity provider.
#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
pub struct SocialProfile {
    pub fid: u64,
    #[serde(default)]
    pub username: Option<String>,
    #[serde(default)]
    pub display_name: Option<String>,
    #[serde(default)]
    pub pfp_url: Option<String>,
}

#[async_trait]
pub trait IdentityResolver: Send + Sync {
    /// Profiles for the given ids. Unknown ids are simply absent.
    async fn profiles(&self, fids: &[u64]) -> Result<Vec<SocialProfile>>;
}

#[derive(Debug, Clone, Deserialize, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct DisplayIdentity {
    pub wallet: Address,
    pub display_name: String,
    pub avatar_url: String,
    pub social_id: Option<u64>,
    /// True when nothing was resolved and the wallet-derived fallback is shown.
    pub placeholder: bool,
}

impl DisplayIdentity {
    pub fn placeholder(wallet: Address) -> Self {
        Self {
            wallet,
            display_name: truncate_address(&wallet),
            avatar_url: identicon_url(&wallet),
            social_id: None,
            placeholder: true,
        }
    }

    fn from_profile(wallet: Address, fid: u64, profile: Option<&SocialProfile>) -> Self {
        let Some(profile) = profile else {
            return Self {
                social_id: Some(fid),
                display_name: format!("User {fid}"),
                ..Self::placeholder(wallet)
            };
        };
        let display_name = profile
            .display_name
            .clone()
            .filter(|n| !n.is_empty())
            .or_else(|| profile.username.clone().filter(|n| !n.is_empty()))
            .unwrap_or_else(|| format!("User {fid}"));
        Self {
            wallet,
            display_name,
            avatar_url: profile
                .pfp_url
                .clone()
                .filter(|u| !u.is_empty())
                .unwrap_or_else(|| identicon_url(&wallet)),
            social_id: Some(fid),
            placeholder: false,
        }
    }
}

/// Resolves display identities with a bounded wait.
pub struct IdentityService {
    resolver: Option<Arc<dyn IdentityResolver>>,
    timeout: Duration,
    metrics: Arc<ServiceMetrics>,
}

impl IdentityService {
    pub fn new(
        resolver: Option<Arc<dyn IdentityResolver>>,
        timeout: Duration,
        metrics: Arc<ServiceMetrics>,
    ) -> Self {
        Self {
            resolver,
            timeout,
            metrics,
        }
    }

    /// Service that only hands out placeholders.
    pub fn disabled(metrics: Arc<ServiceMetrics>) -> Self {
        Self::new(None, Duration::from_secs(1), metrics)
    }

    pub async fn resolve(&self, wallet: Address, social_id: Option<&str>) -> DisplayIdentity {
        let mut resolved = self.resolve_batch(&[(wallet, social_id.map(str::to_string))]).await;
        resolved.pop().unwrap_or_else(|| DisplayIdentity::placeholder(wallet))
    }

    /// Resolve many subjects with one provider round trip. Output order
    /// follows input order.
    pub async fn resolve_batch(&self, subjects: &[(Address, Option<String>)]) -> Vec<DisplayIdentity> {
        let fids: Vec<Option<u64>> = subjects
            .iter()
            .map(|(_, raw)| raw.as_deref().and_then(parse_social_id))
            .collect();
        let mut wanted: Vec<u64> = fids.iter().flatten().copied().collect();
        wanted.sort_unstable();
        wanted.dedup();

        let profiles = match self.fetch(&wanted).await {
            Some(found) => found,
            None => {
                return subjects
                    .iter()
                    .map(|(wallet, _)| DisplayIdentity::placeholder(*wallet))
                    .collect()
            }
        };

        subjects
            .iter()
            .zip(fids)
            .map(|((wallet, _), fid)| match fid {
                Some(fid) => DisplayIdentity::from_profile(*wallet, fid, profiles.get(&fid)),
                None => DisplayIdentity::placeholder(*wallet),
            })
            .collect()
    }

    /// `None` when the provider could not be asked or failed.
    async fn fetch(&self, fids: &[u64]) -> Option<HashMap<u64, SocialProfile>> {
        if fids.is_empty() {
            return Some(HashMap::new());
        }
        let resolver = self.resolver.as_ref()?;
        match tokio::time::timeout(self.timeout, resolver.profiles(fids)).await {
            Ok(Ok(found)) => Some(found.into_iter().map(|p| (p.fid, p)).collect()),
            Ok(Err(e)) => {
                self.metrics.record_identity_failure();
                warn!(target: targets::IDENTITY, error = %e, requested = fids.len(), "Identity lookup failed");
                None
            }
            Err(_) => {
                self.metrics.record_identity_failure();
                warn!(target: targets::IDENTITY, requested = fids.len(), "Identity lookup timed out");
                None
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Mutex;

    struct FakeResolver {
        profiles: Vec<SocialProfile>,
        fail: bool,
        requests: Mutex<Vec<Vec<u64>>>,
    }

    #[async_trait]
    impl IdentityResolver for FakeResolver {
        async fn profiles(&self, fids: &[u64]) -> Result<Vec<SocialProfile>> {
            self.requests.lock().unwrap().push(fids.to_vec());
            if self.fail {
                return Err(Error::IdentityUnavailable("down".into()));
            }
            Ok(self
                .profiles
                .iter()
                .filter(|p| fids.contains(&p.fid))
                .cloned()
                .collect())
        }
    }

    fn service(resolver: Arc<FakeResolver>) -> IdentityService {
        IdentityService::new(
            Some(resolver),
            Duration::from_secs(1),
            Arc::new(ServiceMetrics::new()),
        )
    }

    #[test]
    fn test_parse_social_id() {
        assert_eq!(parse_social_id("4021"), Some(4021));
        assert_eq!(parse_social_id(" 7 "), Some(7));
        assert_eq!(parse_social_id("0x00000000000000000000000000000000000000aa"), None);
        assert_eq!(parse_social_id("none"), None);
        assert_eq!(parse_social_id("None-123"), None);
        assert_eq!(parse_social_id(""), None);
        assert_eq!(parse_social_id("alice"), None);
        assert!(validate_social_id("alice").is_err());
    }

    #[tokio::test]
    async fn test_batch_resolves_profiles_in_order() {
        let resolver = Arc::new(FakeResolver {
            profiles: vec![SocialProfile {
                fid: 5,
                username: Some("dwr".into()),
                display_name: Some("Dan".into()),
                pfp_url: Some("https://img/5.png".into()),
            }],
            fail: false,
            requests: Mutex::new(Vec::new()),
        });
        let identity = service(resolver.clone());
        let a = Address::repeat_byte(0xaa);
        let b = Address::repeat_byte(0xbb);
        let c = Address::repeat_byte(0xcc);

        let resolved = identity
            .resolve_batch(&[
                (a, Some("5".into())),
                (b, Some("0xbbbb".into())),
                (c, Some("9".into())),
            ])
            .await;

        assert_eq!(resolved[0].display_name, "Dan");
        assert_eq!(resolved[0].avatar_url, "https://img/5.png");
        assert!(resolved[1].placeholder);
        assert_eq!(resolved[1].display_name, truncate_address(&b));
        assert_eq!(resolved[2].display_name, "User 9");
        assert_eq!(resolved[2].avatar_url, identicon_url(&c));
        assert_eq!(*resolver.requests.lock().unwrap(), vec![vec![5, 9]]);
    }

    #[tokio::test]
    async fn test_provider_failure_falls_back_to_placeholders() {
        let resolver = Arc::new(FakeResolver {
            profiles: vec![],
            fail: true,
            requests: Mutex::new(Vec::new()),
        });
        let identity = service(resolver);
        let wallet = Address::repeat_byte(0xaa);

        let resolved = identity.resolve(wallet, Some("5")).await;
        assert_eq!(resolved, DisplayIdentity::placeholder(wallet));
        assert_eq!(
            identity
                .metrics
                .identity_failures
                .load(std::sync::atomic::Ordering::Relaxed),
            1
        );
    }

    #[tokio::test]
    async fn test_no_social_id_skips_provider() {
        let resolver = Arc::new(FakeResolver {
            profiles: vec![],
            fail: true,
            requests: Mutex::new(Vec::new()),
        });
        let identity = service(resolver.clone());

        let resolved = identity.resolve(Address::repeat_byte(1), None).await;
        assert!(resolved.placeholder);
        assert!(resolver.requests.lock().unwrap().is_empty());
    }
}
