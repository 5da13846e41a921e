//! HTTP client for the crawlers.
//!
//! Wraps reqwest with:
//! - A fixed total timeout and user agent
//! - Optional bearer token pass-through (hub API key)
//! - Rate limit tracking from response headers, with throttling
//! - Status mapping onto [`TrackerError`] and transparent retries

use super::retry::{retry_async, RetryConfig};
use crate::config::NetworkConfig;
use crate::{Result, TrackerError};
use reqwest::{header, Client, Response, StatusCode};
use serde::de::DeserializeOwned;
use std::sync::atomic::{AtomicI64, AtomicU64, Ordering};
use std::time::Duration;
use tracing::{debug, warn};

/// Rate limit state extracted from response headers.
#[derive(Debug, Clone, Default)]
pub struct RateLimitState {
    pub remaining: Option<u64>,
    pub limit: Option<u64>,
}

impl RateLimitState {
    /// Throttle when below 10% of the advertised limit.
    pub fn should_throttle(&self) -> bool {
        match (self.remaining, self.limit) {
            (Some(remaining), Some(limit)) if limit > 0 => {
                let threshold = (limit as f64 * 0.1) as u64;
                remaining < threshold.max(1)
            }
            _ => false,
        }
    }
}

/// Rate-limit aware HTTP client with retries.
pub struct HttpClient {
    client: Client,
    bearer_token: Option<String>,
    retry: RetryConfig,
    rate_limit_remaining: AtomicI64,
    rate_limit_limit: AtomicU64,
    throttle_delay: Duration,
}

impl std::fmt::Debug for HttpClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HttpClient")
            .field("has_bearer_token", &self.bearer_token.is_some())
            .field("retry", &self.retry)
            .finish()
    }
}

impl HttpClient {
    /// Create a client with the default timeout and retry policy.
    pub fn new() -> Result<Self> {
        Self::with_timeout(NetworkConfig::REQUEST_TIMEOUT)
    }

    /// Create a client with a custom total request timeout.
    pub fn with_timeout(timeout: Duration) -> Result<Self> {
        let client = Client::builder()
            .timeout(timeout)
            .user_agent(NetworkConfig::USER_AGENT)
            .build()
            .map_err(|e| TrackerError::Network {
                message: format!("Failed to create HTTP client: {}", e),
                cause: None,
            })?;

        Ok(Self {
            client,
            bearer_token: None,
            retry: RetryConfig::default(),
            rate_limit_remaining: AtomicI64::new(-1),
            rate_limit_limit: AtomicU64::new(0),
            throttle_delay: Duration::from_millis(500),
        })
    }

    /// Send `Authorization: Bearer <token>` with every request.
    pub fn with_bearer_token(mut self, token: Option<String>) -> Self {
        self.bearer_token = token.filter(|t| !t.trim().is_empty());
        self
    }

    /// Replace the retry policy.
    pub fn with_retry(mut self, retry: RetryConfig) -> Self {
        self.retry = retry;
        self
    }

    /// Current rate limit state as last reported upstream.
    pub fn rate_limit_state(&self) -> RateLimitState {
        let remaining = self.rate_limit_remaining.load(Ordering::SeqCst);
        let limit = self.rate_limit_limit.load(Ordering::SeqCst);
        RateLimitState {
            remaining: (remaining >= 0).then_some(remaining as u64),
            limit: (limit > 0).then_some(limit),
        }
    }

    /// GET a URL with query parameters and decode the JSON body.
    pub async fn get_json<T: DeserializeOwned>(
        &self,
        url: &str,
        query: &[(&str, String)],
    ) -> Result<T> {
        let response = self.get_with_retry(url, query).await?;
        response.json::<T>().await.map_err(|e| TrackerError::Json {
            message: format!("Failed to decode response from {}: {}", url, e),
            source: None,
        })
    }

    /// GET a URL with query parameters and return the body as text.
    pub async fn get_text(&self, url: &str, query: &[(&str, String)]) -> Result<String> {
        let response = self.get_with_retry(url, query).await?;
        Ok(response.text().await?)
    }

    async fn get_with_retry(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        let (result, stats) = retry_async(
            &self.retry,
            || self.get_once(url, query),
            TrackerError::is_retryable,
        )
        .await;
        if stats.attempts > 1 {
            debug!("GET {} took {} attempts", url, stats.attempts);
        }
        result
    }

    async fn get_once(&self, url: &str, query: &[(&str, String)]) -> Result<Response> {
        self.maybe_throttle().await;

        let mut request = self.client.get(url).query(query);
        if let Some(token) = &self.bearer_token {
            request = request.bearer_auth(token);
        }

        let response = request.send().await.map_err(|e| {
            if e.is_timeout() {
                TrackerError::Timeout(NetworkConfig::REQUEST_TIMEOUT)
            } else {
                TrackerError::Network {
                    message: format!("GET {} failed: {}", url, e),
                    cause: Some(e.to_string()),
                }
            }
        })?;

        self.update_rate_limits(&response);
        check_response_status(response, url)
    }

    async fn maybe_throttle(&self) {
        let state = self.rate_limit_state();
        if state.should_throttle() {
            warn!(
                "Rate limit approaching (remaining: {:?}/{:?}), throttling for {:?}",
                state.remaining, state.limit, self.throttle_delay
            );
            tokio::time::sleep(self.throttle_delay).await;
        }
    }

    fn update_rate_limits(&self, response: &Response) {
        let headers = response.headers();
        let parse = |name: &str| {
            headers
                .get(name)
                .and_then(|v| v.to_str().ok())
                .and_then(|v| v.parse::<u64>().ok())
        };

        if let Some(remaining) = parse("X-RateLimit-Remaining") {
            self.rate_limit_remaining
                .store(remaining as i64, Ordering::SeqCst);
        }
        if let Some(limit) = parse("X-RateLimit-Limit") {
            self.rate_limit_limit.store(limit, Ordering::SeqCst);
        }
    }
}

/// Map non-success statuses onto tracker errors.
fn check_response_status(response: Response, url: &str) -> Result<Response> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }

    if status == StatusCode::TOO_MANY_REQUESTS {
        let retry_after = response
            .headers()
            .get(header::RETRY_AFTER)
            .and_then(|v| v.to_str().ok())
            .and_then(|s| s.parse::<u64>().ok());
        return Err(TrackerError::RateLimited {
            service: extract_domain(url),
            retry_after_secs: retry_after,
        });
    }

    Err(TrackerError::HttpStatus {
        url: url.to_string(),
        status: status.as_u16(),
    })
}

/// Extract the host from a URL for logging and rate-limit attribution.
pub fn extract_domain(url: &str) -> String {
    url::Url::parse(url)
        .map(|u| u.host_str().unwrap_or("unknown").to_string())
        .unwrap_or_else(|_| "unknown".to_string())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_domain() {
        assert_eq!(
            extract_domain("https://huggingface.co/api/models?limit=1"),
            "huggingface.co"
        );
        assert_eq!(extract_domain("not a url"), "unknown");
    }

    #[test]
    fn test_should_throttle() {
        let near = RateLimitState {
            remaining: Some(5),
            limit: Some(100),
        };
        assert!(near.should_throttle());

        let plenty = RateLimitState {
            remaining: Some(50),
            limit: Some(100),
        };
        assert!(!plenty.should_throttle());
        assert!(!RateLimitState::default().should_throttle());
    }

    #[test]
    fn test_blank_token_is_ignored() {
        let client = HttpClient::new()
            .unwrap()
            .with_bearer_token(Some("  ".to_string()));
        assert!(client.bearer_token.is_none());
        assert!(client.rate_limit_state().remaining.is_none());
    }
}
