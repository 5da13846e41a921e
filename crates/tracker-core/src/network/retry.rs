//! Retry logic with exponential backoff and jitter for upstream fetches.
//!
//! Only the crawlers retry. The query engine never does; a storage failure
//! there goes straight back to the caller.

use crate::config::NetworkConfig;
use rand::Rng;
use std::future::Future;
use std::time::Duration;
use tracing::{debug, warn};

/// Configuration for retry behavior.
#[derive(Debug, Clone)]
pub struct RetryConfig {
    /// Maximum number of attempts (including the first one).
    pub max_attempts: u32,
    /// Initial delay between retries.
    pub base_delay: Duration,
    /// Maximum delay cap.
    pub max_delay: Duration,
    /// Exponential base (typically 2.0 for doubling).
    pub exponential_base: f64,
    /// Whether to add random jitter to delays.
    pub jitter: bool,
}

impl Default for RetryConfig {
    fn default() -> Self {
        Self {
            max_attempts: NetworkConfig::MAX_RETRIES,
            base_delay: NetworkConfig::RETRY_BASE_DELAY,
            max_delay: Duration::from_secs(30),
            exponential_base: 2.0,
            jitter: true,
        }
    }
}

impl RetryConfig {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts.max(1);
        self
    }

    pub fn with_base_delay(mut self, delay: Duration) -> Self {
        self.base_delay = delay;
        self
    }

    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Delay before retrying after the given attempt (0-indexed).
    pub fn calculate_delay(&self, attempt: u32) -> Duration {
        let multiplier = self.exponential_base.powi(attempt as i32);
        let delay_secs = self.base_delay.as_secs_f64() * multiplier;
        let capped_secs = delay_secs.min(self.max_delay.as_secs_f64());

        let final_secs = if self.jitter {
            // Factor in [0.5, 1.5) keeps the mean delay and avoids near-zero waits.
            let jitter_factor = rand::rng().random_range(0.5..1.5);
            (capped_secs * jitter_factor).min(self.max_delay.as_secs_f64())
        } else {
            capped_secs
        };

        Duration::from_secs_f64(final_secs)
    }
}

/// Statistics about a retry operation.
#[derive(Debug, Clone, Default)]
pub struct RetryStats {
    pub attempts: u32,
    pub total_delay: Duration,
    pub success: bool,
    pub last_error: Option<String>,
}

/// Retry an async operation with exponential backoff.
///
/// `should_retry` decides whether a failure is transient. Returns the final
/// result together with attempt statistics.
pub async fn retry_async<F, Fut, T, E>(
    config: &RetryConfig,
    mut operation: F,
    should_retry: impl Fn(&E) -> bool,
) -> (Result<T, E>, RetryStats)
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: std::fmt::Display,
{
    let mut stats = RetryStats::default();
    let mut attempt = 0;

    loop {
        stats.attempts = attempt + 1;

        match operation().await {
            Ok(value) => {
                stats.success = true;
                if attempt > 0 {
                    debug!("Operation succeeded after {} attempts", attempt + 1);
                }
                return (Ok(value), stats);
            }
            Err(e) => {
                stats.last_error = Some(e.to_string());

                if !should_retry(&e) {
                    debug!("Error is not retryable: {}", e);
                    return (Err(e), stats);
                }

                if attempt + 1 >= config.max_attempts {
                    warn!(
                        "All {} retry attempts exhausted. Last error: {}",
                        config.max_attempts, e
                    );
                    return (Err(e), stats);
                }

                let delay = config.calculate_delay(attempt);
                stats.total_delay += delay;
                warn!(
                    "Attempt {}/{} failed: {}. Retrying in {:?}",
                    attempt + 1,
                    config.max_attempts,
                    e,
                    delay
                );
                tokio::time::sleep(delay).await;
                attempt += 1;
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::sync::Arc;

    #[test]
    fn test_delay_calculation_no_jitter() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(1))
            .with_jitter(false);

        assert_eq!(config.calculate_delay(0), Duration::from_secs(1));
        assert_eq!(config.calculate_delay(1), Duration::from_secs(2));
        assert_eq!(config.calculate_delay(2), Duration::from_secs(4));
    }

    #[test]
    fn test_delay_capped_at_max() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(10))
            .with_max_delay(Duration::from_secs(30))
            .with_jitter(false);

        assert_eq!(config.calculate_delay(3), Duration::from_secs(30));
    }

    #[test]
    fn test_delay_with_jitter_stays_in_range() {
        let config = RetryConfig::new()
            .with_base_delay(Duration::from_secs(2))
            .with_jitter(true);

        for _ in 0..20 {
            let delay = config.calculate_delay(0);
            assert!(delay >= Duration::from_secs(1) && delay <= Duration::from_secs(3));
        }
    }

    #[tokio::test]
    async fn test_retry_succeeds_after_failures() {
        let config = RetryConfig::new()
            .with_max_attempts(3)
            .with_base_delay(Duration::from_millis(5))
            .with_jitter(false);

        let counter = Arc::new(AtomicU32::new(0));
        let c = counter.clone();
        let (result, stats) = retry_async(
            &config,
            move || {
                let c = c.clone();
                async move {
                    if c.fetch_add(1, Ordering::SeqCst) < 2 {
                        Err("transient".to_string())
                    } else {
                        Ok(7)
                    }
                }
            },
            |_: &String| true,
        )
        .await;

        assert_eq!(result.unwrap(), 7);
        assert_eq!(stats.attempts, 3);
        assert!(stats.success);
    }

    #[tokio::test]
    async fn test_retry_stops_on_permanent_error() {
        let config = RetryConfig::new()
            .with_max_attempts(5)
            .with_base_delay(Duration::from_millis(5));

        let (result, stats) = retry_async(
            &config,
            || async { Err::<(), _>("bad request".to_string()) },
            |e: &String| !e.contains("bad"),
        )
        .await;

        assert!(result.is_err());
        assert_eq!(stats.attempts, 1);
        assert_eq!(stats.last_error.as_deref(), Some("bad request"));
    }
}
