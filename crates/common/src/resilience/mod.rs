//! Resilience patterns for calls to external services
//!
//! - **Rate Limiter**: keyed fixed-window limiter guarding upstream quotas

pub mod rate_limiter;

pub use rate_limiter::{RateLimitExceeded, RateLimiter, RateLimiterConfig};
