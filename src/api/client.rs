use std::future::Future;
use std::time::Duration;

use anyhow::{Context, Result};
use async_trait::async_trait;
use reqwest::Client;
use serde::de::DeserializeOwned;
use tokio::time::sleep;
use tracing::{debug, warn};

use super::{SearchApi, SearchQuery, SearchResponse};
use crate::config::Config;
use crate::constants::{MAX_RETRY_DELAY, USER_AGENT};
use crate::error::SyncError;
use crate::item::RawItem;

/// HTTP client for the HN Search (ThriftDB) API.
///
/// Every request carries a timeout, and transient failures (connection
/// errors, timeouts, 429 and 5xx responses) are retried with exponential
/// backoff up to `max_attempts` times.
#[derive(Debug, Clone)]
pub struct HnSearchClient {
    client: Client,
    base_url: String,
    max_attempts: u32,
    backoff: Duration,
}

impl HnSearchClient {
    /// Create a client from the application configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the underlying HTTP client cannot be built.
    pub fn new(config: &Config) -> Result<Self> {
        let client = Client::builder()
            .timeout(config.api_timeout)
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;

        Ok(Self {
            client,
            base_url: config.api_url.trim_end_matches('/').to_string(),
            max_attempts: config.api_max_attempts.max(1),
            backoff: config.api_retry_backoff,
        })
    }

    async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        params: &[(&'static str, String)],
    ) -> Result<T, SyncError> {
        let response = self
            .client
            .get(url)
            .query(params)
            .send()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SyncError::from_status(status, url));
        }

        let body = response
            .bytes()
            .await
            .map_err(|e| SyncError::from_reqwest(&e))?;

        serde_json::from_slice(&body).map_err(|e| SyncError::Transport {
            message: format!("{url} returned an unreadable body: {e}"),
            transient: false,
        })
    }

    /// Run `op` until it succeeds, fails permanently, or runs out of attempts.
    async fn with_retry<T, F, Fut>(&self, what: &str, mut op: F) -> Result<T, SyncError>
    where
        F: FnMut() -> Fut + Send,
        Fut: Future<Output = Result<T, SyncError>> + Send,
    {
        let mut attempt = 1;
        loop {
            match op().await {
                Ok(value) => return Ok(value),
                Err(e) if e.is_transient() && attempt < self.max_attempts => {
                    let delay = retry_delay(self.backoff, attempt);
                    warn!(
                        request = %what,
                        attempt,
                        max_attempts = self.max_attempts,
                        delay_ms = delay.as_millis() as u64,
                        "Search API request failed, retrying: {e}"
                    );
                    sleep(delay).await;
                    attempt += 1;
                }
                Err(e) => return Err(e),
            }
        }
    }
}

/// Backoff before retry number `attempt`: `base` doubled per attempt, capped
/// at [`MAX_RETRY_DELAY`].
fn retry_delay(base: Duration, attempt: u32) -> Duration {
    base.checked_mul(2u32.saturating_pow(attempt.saturating_sub(1)))
        .map_or(MAX_RETRY_DELAY, |delay| delay.min(MAX_RETRY_DELAY))
}

#[async_trait]
impl SearchApi for HnSearchClient {
    async fn search(&self, query: &SearchQuery) -> Result<SearchResponse, SyncError> {
        let url = format!("{}/items/_search", self.base_url);
        let params = query.params();
        debug!(?query, "Searching");
        self.with_retry("search", || self.get_json(&url, &params))
            .await
    }

    async fn get_item(&self, signature: &str) -> Result<RawItem, SyncError> {
        let url = format!(
            "{}/items/{}",
            self.base_url,
            urlencoding::encode(signature)
        );
        debug!(signature, "Fetching item");
        self.with_retry("get_item", || self.get_json(&url, &[]))
            .await
    }
}
