use async_trait::async_trait;
use serde::Deserialize;

use super::{IdentityResolver, SocialProfile};
use crate::{prelude::*, req::HttpClient, Error};

/// Ids per bulk request accepted by the API.
const MAX_FIDS_PER_REQUEST: usize = 100;

#[derive(Deserialize, Debug)]
struct BulkUsersResponse {
    #[serde(default)]
    users: Vec<SocialProfile>,
}

/// Farcaster profiles through Neynar's bulk user endpoint.
#[derive(Debug, Clone)]
pub struct NeynarResolver {
    http: HttpClient,
    api_key: String,
}

impl NeynarResolver {
    pub fn new(http: HttpClient, api_key: impl Into<String>) -> Self {
        Self {
            http,
            api_key: api_key.into(),
        }
    }
}

pub(crate) fn parse_bulk_users(body: &str) -> Result<Vec<SocialProfile>> {
    serde_json::from_str::<BulkUsersResponse>(body)
        .map(|r| r.users)
        .map_err(|e| Error::IdentityUnavailable(format!("unexpected response: {e}")))
}

#[async_trait]
impl IdentityResolver for NeynarResolver {
    async fn profiles(&self, fids: &[u64]) -> Result<Vec<SocialProfile>> {
        let mut profiles = Vec::with_capacity(fids.len());
        for chunk in fids.chunks(MAX_FIDS_PER_REQUEST) {
            let ids = chunk
                .iter()
                .map(u64::to_string)
                .collect::<Vec<_>>()
                .join(",");
            let body = self
                .http
                .get(
                    &format!("/v2/farcaster/user/bulk?fids={ids}"),
                    &[("x-api-key", self.api_key.as_str())],
                )
                .await?;
            profiles.extend(parse_bulk_users(&body)?);
        }
        Ok(profiles)
    }
}
