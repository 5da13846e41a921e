//! Network utilities for the crawlers.
//!
//! This module provides:
//! - HTTP client with rate limiting awareness and token pass-through
//! - Retry logic with exponential backoff and jitter

mod client;
mod retry;

pub use client::{extract_domain, HttpClient, RateLimitState};
pub use retry::{retry_async, RetryConfig, RetryStats};
