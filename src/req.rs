use std::time::Duration;

use reqwest::{Client, RequestBuilder, Response};
use serde::Deserialize;
use tracing::warn;

use crate::{prelude::*, Error};

/// HTTP status codes that indicate transient upstream errors (retryable)
const RETRYABLE_STATUS_CODES: &[u16] = &[429, 502, 503, 504];

/// Maximum number of retry attempts for transient errors
const MAX_RETRIES: u32 = 3;

/// Initial backoff delay in milliseconds (doubles with each retry)
const INITIAL_BACKOFF_MS: u64 = 100;

#[derive(Deserialize, Debug)]
struct ErrorBody {
    #[serde(default, alias = "msg", alias = "error")]
    message: Option<String>,
}

/// Thin JSON-over-HTTP client shared by the oracle, identity and RPC adapters.
#[derive(Debug, Clone)]
pub struct HttpClient {
    pub client: Client,
    pub base_url: String,
}

async fn parse_response(response: Response) -> Result<String> {
    let status_code = response.status().as_u16();
    let text = response
        .text()
        .await
        .map_err(|e| Error::GenericRequest(e.to_string()))?;

    if status_code < 400 {
        return Ok(text);
    }
    let message = serde_json::from_str::<ErrorBody>(&text)
        .ok()
        .and_then(|body| body.message)
        .unwrap_or(text);

    if status_code == 429 {
        return Err(Error::rate_limited(message));
    }
    if (400..500).contains(&status_code) {
        return Err(Error::client_error(status_code, message));
    }
    Err(Error::server_error(status_code, message))
}

impl HttpClient {
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(|e| Error::GenericRequest(e.to_string()))?;
        Ok(Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Send a GET request with automatic retry for transient errors (429, 502, 503, 504).
    pub async fn get(&self, url_path: &str, headers: &[(&str, &str)]) -> Result<String> {
        let full_url = format!("{}{url_path}", self.base_url);
        self.send_with_retry(url_path, || {
            let mut request = self.client.get(&full_url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            request
        })
        .await
    }

    /// Send a JSON POST request with the same retry policy as [`HttpClient::get`].
    pub async fn post(&self, url_path: &str, data: String) -> Result<String> {
        let full_url = format!("{}{url_path}", self.base_url);
        self.send_with_retry(url_path, || {
            self.client
                .post(&full_url)
                .header("Content-Type", "application/json")
                .body(data.clone())
        })
        .await
    }

    /// Uses exponential backoff: 100ms, 200ms, 400ms between retries.
    async fn send_with_retry<F>(&self, url_path: &str, build: F) -> Result<String>
    where
        F: Fn() -> RequestBuilder,
    {
        for attempt in 0..=MAX_RETRIES {
            let request = build()
                .build()
                .map_err(|e| Error::GenericRequest(e.to_string()))?;

            let result = self.client.execute(request).await.map_err(|e| {
                if e.is_timeout() {
                    Error::Timeout("upstream HTTP response")
                } else {
                    Error::GenericRequest(e.to_string())
                }
            })?;

            let status = result.status().as_u16();

            if RETRYABLE_STATUS_CODES.contains(&status) && attempt < MAX_RETRIES {
                let backoff = Duration::from_millis(INITIAL_BACKOFF_MS * 2u64.pow(attempt));
                warn!(
                    status = status,
                    attempt = attempt + 1,
                    max_attempts = MAX_RETRIES + 1,
                    backoff_ms = backoff.as_millis(),
                    url = %url_path,
                    "Retryable HTTP error, backing off"
                );
                tokio::time::sleep(backoff).await;
                continue;
            }

            return parse_response(result).await;
        }

        Err(Error::GenericRequest(format!(
            "Max retries ({MAX_RETRIES}) exceeded for {url_path}"
        )))
    }
}
