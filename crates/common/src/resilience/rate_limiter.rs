//! Keyed fixed-window rate limiting
//!
//! Each identifier owns a bucket of `max_requests` tokens that is fully
//! refilled at every window boundary. Buckets are created lazily on first use
//! and live in a concurrent map, so one limiter can be shared by every request
//! path that talks to the same upstream service.

use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use thiserror::Error;
use tracing::debug;

use crate::time::{Clock, SystemClock};

/// Rejection returned when an identifier has exhausted its window
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("rate limit exceeded for '{key}', retry after {retry_after:?}")]
pub struct RateLimitExceeded {
    pub key: String,
    pub retry_after: Duration,
}

/// Configuration for the keyed rate limiter
#[derive(Debug, Clone)]
pub struct RateLimiterConfig {
    /// Requests allowed per identifier per window
    pub max_requests: u32,
    /// Length of a window
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self { max_requests: 100, window: Duration::from_secs(60) }
    }
}

impl RateLimiterConfig {
    pub fn new(max_requests: u32, window: Duration) -> Self {
        Self { max_requests, window }
    }

    pub fn validate(&self) -> Result<(), String> {
        if self.max_requests == 0 {
            return Err("max_requests must be greater than 0".to_string());
        }
        if self.window.is_zero() {
            return Err("window must be greater than zero".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Copy)]
struct Window {
    started: Instant,
    used: u32,
}

/// Fixed-window limiter keyed by identifier
pub struct RateLimiter<C: Clock = SystemClock> {
    config: RateLimiterConfig,
    windows: Arc<DashMap<String, Window>>,
    clock: Arc<C>,
}

impl<C: Clock> RateLimiter<C> {
    pub fn with_clock(config: RateLimiterConfig, clock: C) -> Result<Self, String> {
        config.validate()?;
        Ok(Self { config, windows: Arc::new(DashMap::new()), clock: Arc::new(clock) })
    }

    pub fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Consume one token for `key`, or report how long until the window resets.
    pub fn try_acquire(&self, key: &str) -> Result<(), RateLimitExceeded> {
        let now = self.clock.now();
        let mut entry =
            self.windows.entry(key.to_string()).or_insert(Window { started: now, used: 0 });
        let window = entry.value_mut();

        if now.duration_since(window.started) >= self.config.window {
            window.started = now;
            window.used = 0;
        }

        if window.used >= self.config.max_requests {
            let retry_after =
                self.config.window.saturating_sub(now.duration_since(window.started));
            debug!(key, ?retry_after, "rate limit exceeded");
            return Err(RateLimitExceeded { key: key.to_string(), retry_after });
        }

        window.used += 1;
        Ok(())
    }

    /// Tokens left for `key` in the current window.
    pub fn remaining(&self, key: &str) -> u32 {
        let now = self.clock.now();
        match self.windows.get(key) {
            Some(window) if now.duration_since(window.started) < self.config.window => {
                self.config.max_requests.saturating_sub(window.used)
            }
            _ => self.config.max_requests,
        }
    }

    /// Forget the window for `key`, restoring its full allowance.
    pub fn reset(&self, key: &str) {
        self.windows.remove(key);
    }
}

impl RateLimiter<SystemClock> {
    pub fn new(config: RateLimiterConfig) -> Result<Self, String> {
        Self::with_clock(config, SystemClock)
    }
}

impl<C: Clock> Clone for RateLimiter<C> {
    fn clone(&self) -> Self {
        Self {
            config: self.config.clone(),
            windows: Arc::clone(&self.windows),
            clock: Arc::clone(&self.clock),
        }
    }
}
