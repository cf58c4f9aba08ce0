//! Configuration management

use serde::{Deserialize, Serialize};

use crate::constants::{CALENDAR_LIST_MAX_CAPACITY, CALENDAR_LIST_TTL_SECS, DEFAULT_SYNC_LEASE_SECS};

/// Application configuration
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub database: DatabaseConfig,
    pub google: GoogleConfig,
    pub rate_limit: RateLimitConfig,
    pub cache: CacheConfig,
    pub server: ServerConfig,
    pub scheduler: SchedulerConfig,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    pub path: String,
    pub pool_size: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self { path: "calbridge.db".to_string(), pool_size: 8 }
    }
}

/// Google Calendar API configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GoogleConfig {
    pub client_id: String,
    #[serde(skip_serializing)]
    pub client_secret: String,
    pub token_endpoint: String,
    pub api_base: String,
}

impl Default for GoogleConfig {
    fn default() -> Self {
        Self {
            client_id: String::new(),
            client_secret: String::new(),
            token_endpoint: "https://oauth2.googleapis.com/token".to_string(),
            api_base: "https://www.googleapis.com/calendar/v3".to_string(),
        }
    }
}

/// Per-identifier request limiting for the upstream calendar API
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RateLimitConfig {
    pub max_requests: u32,
    pub window_seconds: u64,
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self { max_requests: 100, window_seconds: 60 }
    }
}

/// Calendar list cache configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheConfig {
    pub calendar_list_ttl_seconds: u64,
    pub max_capacity: u64,
}

impl Default for CacheConfig {
    fn default() -> Self {
        Self {
            calendar_list_ttl_seconds: CALENDAR_LIST_TTL_SECS,
            max_capacity: CALENDAR_LIST_MAX_CAPACITY,
        }
    }
}

/// HTTP server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub bind_addr: String,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self { bind_addr: "127.0.0.1:8080".to_string() }
    }
}

/// Periodic sync scheduler configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    pub enabled: bool,
    pub tick_seconds: u64,
    /// Age after which a `syncing` lease is considered orphaned.
    pub lease_seconds: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self { enabled: true, tick_seconds: 300, lease_seconds: DEFAULT_SYNC_LEASE_SECS }
    }
}
