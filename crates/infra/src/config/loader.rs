//! Configuration loader
//!
//! Loads application configuration from environment variables or files.
//!
//! ## Loading Strategy
//! 1. First, attempts to load from environment variables
//! 2. If incomplete, falls back to loading from file
//! 3. Probes multiple paths for config files
//! 4. Supports JSON and TOML formats
//!
//! ## Environment Variables
//! Required:
//! - `CALBRIDGE_DB_PATH`: Database file path
//! - `CALBRIDGE_GOOGLE_CLIENT_ID`, `CALBRIDGE_GOOGLE_CLIENT_SECRET`: OAuth client
//!
//! Optional (defaults from [`Config::default`]):
//! - `CALBRIDGE_DB_POOL_SIZE`
//! - `CALBRIDGE_GOOGLE_TOKEN_ENDPOINT`, `CALBRIDGE_GOOGLE_API_BASE`
//! - `CALBRIDGE_RATE_LIMIT_MAX_REQUESTS`, `CALBRIDGE_RATE_LIMIT_WINDOW_SECS`
//! - `CALBRIDGE_CACHE_TTL_SECS`
//! - `CALBRIDGE_BIND_ADDR`
//! - `CALBRIDGE_SCHEDULER_ENABLED`, `CALBRIDGE_SCHEDULER_TICK_SECS`,
//!   `CALBRIDGE_SCHEDULER_LEASE_SECS`
//!
//! ## File Locations
//! The loader probes `calbridge.toml`, `calbridge.json`, `config.toml` and
//! `config.json` in the working directory, its two parents, and next to the
//! executable.

use std::path::{Path, PathBuf};
use std::str::FromStr;

use calbridge_domain::{CalBridgeError, Config, Result};

const CONFIG_FILE_NAMES: [&str; 4] =
    ["calbridge.toml", "calbridge.json", "config.toml", "config.json"];

/// Load configuration with automatic fallback strategy
///
/// First attempts to load from environment variables. If any required
/// variables are missing, falls back to loading from a config file.
///
/// # Errors
/// Returns `CalBridgeError::Config` if configuration cannot be loaded from
/// either source or is malformed.
pub fn load() -> Result<Config> {
    match load_from_env() {
        Ok(config) => {
            tracing::info!("Configuration loaded from environment variables");
            Ok(config)
        }
        Err(e) => {
            tracing::debug!(error = %e, "Failed to load from environment, trying file");
            load_from_file(None)
        }
    }
}

/// Load configuration from environment variables
///
/// # Errors
/// Returns `CalBridgeError::Config` if required variables are missing or any
/// variable has an invalid value.
pub fn load_from_env() -> Result<Config> {
    let mut config = Config::default();

    config.database.path = env_var("CALBRIDGE_DB_PATH")?;
    config.database.pool_size = env_parse("CALBRIDGE_DB_POOL_SIZE", config.database.pool_size)?;

    config.google.client_id = env_var("CALBRIDGE_GOOGLE_CLIENT_ID")?;
    config.google.client_secret = env_var("CALBRIDGE_GOOGLE_CLIENT_SECRET")?;
    if let Ok(endpoint) = std::env::var("CALBRIDGE_GOOGLE_TOKEN_ENDPOINT") {
        config.google.token_endpoint = endpoint;
    }
    if let Ok(base) = std::env::var("CALBRIDGE_GOOGLE_API_BASE") {
        config.google.api_base = base;
    }

    config.rate_limit.max_requests =
        env_parse("CALBRIDGE_RATE_LIMIT_MAX_REQUESTS", config.rate_limit.max_requests)?;
    config.rate_limit.window_seconds =
        env_parse("CALBRIDGE_RATE_LIMIT_WINDOW_SECS", config.rate_limit.window_seconds)?;

    config.cache.calendar_list_ttl_seconds =
        env_parse("CALBRIDGE_CACHE_TTL_SECS", config.cache.calendar_list_ttl_seconds)?;

    if let Ok(bind_addr) = std::env::var("CALBRIDGE_BIND_ADDR") {
        config.server.bind_addr = bind_addr;
    }

    config.scheduler.enabled = env_bool("CALBRIDGE_SCHEDULER_ENABLED", config.scheduler.enabled);
    config.scheduler.tick_seconds =
        env_parse("CALBRIDGE_SCHEDULER_TICK_SECS", config.scheduler.tick_seconds)?;
    config.scheduler.lease_seconds =
        env_parse("CALBRIDGE_SCHEDULER_LEASE_SECS", config.scheduler.lease_seconds)?;

    Ok(config)
}

/// Load configuration from a file
///
/// If `path` is `None`, probes the standard locations via
/// [`probe_config_paths`]. The format is detected by file extension.
///
/// # Errors
/// Returns `CalBridgeError::Config` if the file is missing, unreadable, or
/// malformed.
pub fn load_from_file(path: Option<PathBuf>) -> Result<Config> {
    let config_path = match path {
        Some(p) => {
            if !p.exists() {
                return Err(CalBridgeError::Config(format!(
                    "Config file not found: {}",
                    p.display()
                )));
            }
            p
        }
        None => probe_config_paths().ok_or_else(|| {
            CalBridgeError::Config(
                "No config file found in any of the standard locations".to_string(),
            )
        })?,
    };

    tracing::info!(path = %config_path.display(), "Loading configuration from file");

    let contents = std::fs::read_to_string(&config_path)
        .map_err(|e| CalBridgeError::Config(format!("Failed to read config file: {}", e)))?;

    parse_config(&contents, &config_path)
}

fn parse_config(contents: &str, path: &Path) -> Result<Config> {
    let extension = path.extension().and_then(|e| e.to_str()).unwrap_or("json");

    match extension {
        "toml" => toml::from_str(contents)
            .map_err(|e| CalBridgeError::Config(format!("Invalid TOML format: {}", e))),
        "json" => serde_json::from_str(contents)
            .map_err(|e| CalBridgeError::Config(format!("Invalid JSON format: {}", e))),
        _ => Err(CalBridgeError::Config(format!("Unsupported config format: {}", extension))),
    }
}

/// Probe the standard locations for a configuration file
///
/// # Returns
/// The first config file found, or `None` if no file exists.
pub fn probe_config_paths() -> Option<PathBuf> {
    let mut roots = Vec::new();

    if let Ok(cwd) = std::env::current_dir() {
        roots.push(cwd.clone());
        roots.push(cwd.join(".."));
        roots.push(cwd.join("../.."));
    }

    if let Ok(exe_path) = std::env::current_exe() {
        if let Some(exe_dir) = exe_path.parent() {
            roots.push(exe_dir.to_path_buf());
        }
    }

    roots
        .iter()
        .flat_map(|root| CONFIG_FILE_NAMES.iter().map(move |name| root.join(name)))
        .find(|path| path.exists())
}

fn env_var(key: &str) -> Result<String> {
    std::env::var(key).map_err(|_| {
        CalBridgeError::Config(format!("Missing required environment variable: {}", key))
    })
}

fn env_parse<T>(key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match std::env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<T>()
            .map_err(|e| CalBridgeError::Config(format!("Invalid value for {}: {}", key, e))),
        Err(_) => Ok(default),
    }
}

/// Parse boolean from environment variable
///
/// Accepts: `1`/`0`, `true`/`false`, `yes`/`no`, `on`/`off` (case-insensitive)
fn env_bool(key: &str, default: bool) -> bool {
    std::env::var(key)
        .ok()
        .map(|s| matches!(s.to_ascii_lowercase().as_str(), "1" | "true" | "yes" | "on"))
        .unwrap_or(default)
}
