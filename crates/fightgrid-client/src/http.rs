//! HTTP fetch with retry, backoff, and rate-limit handling.
//!
//! A 429 response gets exponential backoff (doubling from a base, capped)
//! and is retried without consuming a failure attempt; other non-success
//! statuses and network errors consume attempts with linear backoff. The
//! courtesy pacing between calls is a separate concern ([`RequestPacer`]),
//! applied at the sync call sites regardless of retry outcome.

use std::time::Duration;

use reqwest::StatusCode;
use serde::de::DeserializeOwned;
use thiserror::Error;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tracing::{debug, warn};

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("request failed after retries: {0}")]
    Request(#[from] reqwest::Error),
    #[error("http status {status} for {url}")]
    HttpStatus { status: u16, url: String },
    #[error("decoding response body for {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: reqwest::Error,
    },
}

#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    /// Attempts that count toward failure; rate-limit retries do not.
    pub max_attempts: usize,
    pub rate_limit_base: Duration,
    pub rate_limit_cap: Duration,
    pub status_backoff: Duration,
    pub network_backoff: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            rate_limit_base: Duration::from_millis(2000),
            rate_limit_cap: Duration::from_millis(10_000),
            status_backoff: Duration::from_millis(1000),
            network_backoff: Duration::from_millis(2000),
        }
    }
}

impl RetryPolicy {
    /// Exponential: base doubling per consecutive rate-limit hit, capped.
    pub fn rate_limit_delay(&self, hit_index: usize) -> Duration {
        let factor = 1u32.checked_shl(hit_index as u32).unwrap_or(u32::MAX);
        self.rate_limit_base
            .saturating_mul(factor)
            .min(self.rate_limit_cap)
    }

    /// Linear: grows with the number of attempts already consumed.
    pub fn status_delay(&self, attempts_used: usize) -> Duration {
        self.status_backoff.saturating_mul(attempts_used as u32)
    }

    pub fn network_delay(&self, attempts_used: usize) -> Duration {
        self.network_backoff.saturating_mul(attempts_used as u32)
    }
}

#[derive(Debug, Clone)]
pub struct HttpFetcherConfig {
    pub timeout: Duration,
    pub user_agent: Option<String>,
    pub retry: RetryPolicy,
}

impl Default for HttpFetcherConfig {
    fn default() -> Self {
        Self {
            timeout: Duration::from_secs(20),
            user_agent: None,
            retry: RetryPolicy::default(),
        }
    }
}

#[derive(Debug)]
pub struct HttpFetcher {
    client: reqwest::Client,
    retry: RetryPolicy,
}

impl HttpFetcher {
    pub fn new(config: HttpFetcherConfig) -> Result<Self, FetchError> {
        let mut builder = reqwest::Client::builder()
            .gzip(true)
            .brotli(true)
            .timeout(config.timeout);
        if let Some(user_agent) = &config.user_agent {
            builder = builder.user_agent(user_agent.clone());
        }
        let client = builder.build()?;
        Ok(Self {
            client,
            retry: config.retry,
        })
    }

    /// GET `url`, retrying per the policy, and return the successful response.
    pub async fn fetch(&self, url: &str) -> Result<reqwest::Response, FetchError> {
        let mut attempts_used = 0usize;
        let mut rate_limit_hits = 0usize;

        loop {
            match self.client.get(url).send().await {
                Ok(resp) => {
                    let status = resp.status();
                    if status == StatusCode::TOO_MANY_REQUESTS {
                        let wait = self.retry.rate_limit_delay(rate_limit_hits);
                        rate_limit_hits += 1;
                        warn!(url, wait_ms = wait.as_millis() as u64, "rate limited, backing off");
                        tokio::time::sleep(wait).await;
                        continue;
                    }
                    if status.is_success() {
                        return Ok(resp);
                    }
                    attempts_used += 1;
                    if attempts_used >= self.retry.max_attempts {
                        return Err(FetchError::HttpStatus {
                            status: status.as_u16(),
                            url: resp.url().to_string(),
                        });
                    }
                    debug!(url, status = status.as_u16(), attempt = attempts_used, "retrying");
                    tokio::time::sleep(self.retry.status_delay(attempts_used)).await;
                }
                Err(err) => {
                    attempts_used += 1;
                    if attempts_used >= self.retry.max_attempts {
                        return Err(FetchError::Request(err));
                    }
                    debug!(url, attempt = attempts_used, error = %err, "network error, retrying");
                    tokio::time::sleep(self.retry.network_delay(attempts_used)).await;
                }
            }
        }
    }

    pub async fn fetch_json<T: DeserializeOwned>(&self, url: &str) -> Result<T, FetchError> {
        let resp = self.fetch(url).await?;
        resp.json::<T>().await.map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }

    pub async fn fetch_text(&self, url: &str) -> Result<String, FetchError> {
        let resp = self.fetch(url).await?;
        resp.text().await.map_err(|source| FetchError::Decode {
            url: url.to_string(),
            source,
        })
    }
}

/// Fixed inter-request courtesy delay, distinct from retry backoff. Keeps
/// consecutive upstream calls at least `interval` apart.
#[derive(Debug)]
pub struct RequestPacer {
    last: Mutex<Option<Instant>>,
}

impl Default for RequestPacer {
    fn default() -> Self {
        Self::new()
    }
}

impl RequestPacer {
    pub fn new() -> Self {
        Self {
            last: Mutex::new(None),
        }
    }

    pub async fn pace(&self, interval: Duration) {
        let mut last = self.last.lock().await;
        if let Some(prev) = *last {
            let due = prev + interval;
            let now = Instant::now();
            if due > now {
                tokio::time::sleep(due - now).await;
            }
        }
        *last = Some(Instant::now());
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn rate_limit_backoff_doubles_and_caps() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.rate_limit_delay(0), Duration::from_millis(2000));
        assert_eq!(policy.rate_limit_delay(1), Duration::from_millis(4000));
        assert_eq!(policy.rate_limit_delay(2), Duration::from_millis(8000));
        assert_eq!(policy.rate_limit_delay(3), Duration::from_millis(10_000));
        assert_eq!(policy.rate_limit_delay(20), Duration::from_millis(10_000));
    }

    #[test]
    fn status_and_network_backoff_grow_linearly() {
        let policy = RetryPolicy::default();
        assert_eq!(policy.status_delay(1), Duration::from_millis(1000));
        assert_eq!(policy.status_delay(2), Duration::from_millis(2000));
        assert_eq!(policy.network_delay(1), Duration::from_millis(2000));
        assert_eq!(policy.network_delay(2), Duration::from_millis(4000));
    }

    #[tokio::test(start_paused = true)]
    async fn pacer_spaces_consecutive_calls() {
        let pacer = RequestPacer::new();
        let started = Instant::now();
        pacer.pace(Duration::from_millis(500)).await;
        pacer.pace(Duration::from_millis(500)).await;
        assert!(started.elapsed() >= Duration::from_millis(500));
    }
}
