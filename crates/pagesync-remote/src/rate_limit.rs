//! Rate limiting and throttling retry policy
//!
//! Provides proactive rate limiting so a publishing run does not flood the
//! remote API, plus the backoff schedule used when the server answers with
//! HTTP 429 (Too Many Requests) or 503 (Service Unavailable) anyway.
//!
//! ## Architecture
//!
//! - [`TokenBucket`]: Classic token bucket algorithm
//! - [`RateLimiter`]: Async wrapper blocking callers until a token is available;
//!   one instance is shared by every call of a client
//! - [`RetryPolicy`]: How many times and how long to wait before retrying
//!   a throttled request
//!
//! ## Usage
//!
//! ```rust,no_run
//! use pagesync_remote::rate_limit::RateLimiter;
//!
//! # async fn example() {
//! let limiter = RateLimiter::per_second(5.0);
//! limiter.acquire().await;
//! // ... make API call ...
//! # }
//! ```

use std::{
    sync::{Mutex, PoisonError},
    time::{Duration, Instant},
};

use reqwest::{header::HeaderMap, StatusCode};
use tracing::debug;

// ============================================================================
// TokenBucket
// ============================================================================

/// Internal mutable state for the token bucket, protected by a Mutex.
#[derive(Debug)]
struct TokenBucketInner {
    /// Current number of available tokens (fractional for smooth refill)
    tokens: f64,
    /// Timestamp of the last refill calculation
    last_refill: Instant,
}

/// Token bucket rate limiter.
///
/// Tokens are consumed on each request and refilled at a constant rate.
/// When no tokens are available, callers must wait for refill.
///
/// Thread safety is provided by an internal `Mutex<TokenBucketInner>`.
#[derive(Debug)]
pub struct TokenBucket {
    /// Maximum number of tokens in the bucket
    capacity: u32,
    /// Tokens added per second
    refill_rate: f64,
    inner: Mutex<TokenBucketInner>,
}

impl TokenBucket {
    /// Creates a new `TokenBucket`. The bucket starts full.
    ///
    /// # Arguments
    /// * `capacity` - Maximum number of tokens (burst size)
    /// * `refill_rate` - Tokens added per second
    pub fn new(capacity: u32, refill_rate: f64) -> Self {
        Self {
            capacity,
            refill_rate,
            inner: Mutex::new(TokenBucketInner {
                tokens: capacity as f64,
                last_refill: Instant::now(),
            }),
        }
    }

    /// Refills the bucket based on elapsed time since last refill, capped
    /// at capacity.
    fn refill(&self, inner: &mut TokenBucketInner) {
        let now = Instant::now();
        let elapsed_secs = now.duration_since(inner.last_refill).as_secs_f64();

        if elapsed_secs > 0.0 {
            let new_tokens = elapsed_secs * self.refill_rate;
            inner.tokens = (inner.tokens + new_tokens).min(self.capacity as f64);
            inner.last_refill = now;
        }
    }

    /// Attempts to acquire a single token from the bucket.
    ///
    /// Returns `false` without modifying the bucket when less than one
    /// token is available.
    pub fn try_acquire(&self) -> bool {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut inner);

        if inner.tokens >= 1.0 {
            inner.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    /// Returns the estimated wait until a token becomes available.
    pub fn time_until_available(&self) -> Duration {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut inner);

        if inner.tokens >= 1.0 {
            Duration::ZERO
        } else if self.refill_rate > 0.0 {
            Duration::from_secs_f64((1.0 - inner.tokens) / self.refill_rate)
        } else {
            Duration::MAX
        }
    }

    /// Returns the current number of available tokens (after refill).
    pub fn available_tokens(&self) -> f64 {
        let mut inner = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        self.refill(&mut inner);
        inner.tokens
    }

    pub fn capacity(&self) -> u32 {
        self.capacity
    }
}

// ============================================================================
// RateLimiter
// ============================================================================

/// Shared limiter for every outbound call of one client instance.
///
/// Designed to be shared via `Arc<RateLimiter>`.
#[derive(Debug)]
pub struct RateLimiter {
    bucket: TokenBucket,
}

impl RateLimiter {
    /// Limits to `requests_per_second`, allowing a burst of one second's worth
    /// of requests.
    pub fn per_second(requests_per_second: f64) -> Self {
        let capacity = requests_per_second.ceil().max(1.0) as u32;
        Self {
            bucket: TokenBucket::new(capacity, requests_per_second),
        }
    }

    /// Waits until a token is available and consumes it.
    ///
    /// Yields to the tokio runtime while waiting.
    pub async fn acquire(&self) {
        loop {
            if self.bucket.try_acquire() {
                return;
            }

            let wait = self
                .bucket
                .time_until_available()
                .max(Duration::from_millis(10));
            debug!(
                wait_ms = wait.as_millis(),
                "No tokens available, waiting for refill"
            );
            tokio::time::sleep(wait).await;
        }
    }

    pub fn bucket(&self) -> &TokenBucket {
        &self.bucket
    }
}

// ============================================================================
// RetryPolicy
// ============================================================================

/// Retry behavior for throttling responses
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    /// Retries after the first attempt
    pub max_retries: u32,
    /// Delay before the first retry
    pub base_delay: Duration,
    /// Upper bound for any single delay
    pub max_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 5,
            base_delay: Duration::from_millis(500),
            max_delay: Duration::from_secs(30),
        }
    }
}

impl RetryPolicy {
    /// Whether a response with `status` should be retried
    pub fn is_retryable(status: StatusCode) -> bool {
        status == StatusCode::TOO_MANY_REQUESTS || status == StatusCode::SERVICE_UNAVAILABLE
    }

    /// Exponential backoff: `base * 2^attempt`, capped at `max_delay`
    pub fn delay_for(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt);
        self.base_delay
            .checked_mul(factor)
            .unwrap_or(self.max_delay)
            .min(self.max_delay)
    }
}

/// Informational rate-limit headers worth logging
const RATE_LIMIT_HEADERS: &[&str] = &[
    "retry-after",
    "x-ratelimit-limit",
    "x-ratelimit-remaining",
    "x-ratelimit-interval-seconds",
    "x-ratelimit-fillrate",
];

/// Collects the informational rate-limit headers present on a response.
///
/// They are only logged; retry timing follows [`RetryPolicy`].
pub fn rate_limit_headers(headers: &HeaderMap) -> Vec<(&'static str, String)> {
    RATE_LIMIT_HEADERS
        .iter()
        .filter_map(|name| {
            headers
                .get(*name)
                .and_then(|v| v.to_str().ok())
                .map(|v| (*name, v.to_string()))
        })
        .collect()
}
