use std::time::Duration;

use calbridge_domain::CalBridgeError;
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

/// Environment variable switching log output to JSON lines.
pub const LOG_JSON_ENV: &str = "CALBRIDGE_LOG_JSON";

/// Install the global tracing subscriber.
///
/// The filter comes from `RUST_LOG` and defaults to `info`. JSON output is
/// enabled when `CALBRIDGE_LOG_JSON` is `1`/`true`.
///
/// # Errors
/// Fails if a global subscriber is already installed.
pub fn init_tracing() -> anyhow::Result<()> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let json = std::env::var(LOG_JSON_ENV)
        .map(|value| matches!(value.to_ascii_lowercase().as_str(), "1" | "true" | "yes"))
        .unwrap_or(false);

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    let installed =
        if json { builder.json().with_target(false).try_init() } else { builder.try_init() };
    installed.map_err(|e| anyhow::anyhow!("failed to install tracing subscriber: {e}"))?;

    info!(json, "logging initialized");
    Ok(())
}

/// Log the outcome of an HTTP handler with structured fields.
///
/// `route` must be a static route label; never pass request payloads.
#[inline]
pub fn log_request_outcome(route: &str, status: u16, elapsed: Duration) {
    let duration_ms = elapsed.as_millis() as u64;

    if status < 400 {
        info!(route, status, duration_ms, "request_completed");
    } else {
        warn!(route, status, duration_ms, "request_rejected");
    }
}

/// Convert a `CalBridgeError` into a stable label suitable for logging.
#[inline]
pub fn error_label(error: &CalBridgeError) -> &'static str {
    match error {
        CalBridgeError::Database(_) => "database",
        CalBridgeError::Config(_) => "config",
        CalBridgeError::Network(_) => "network",
        CalBridgeError::Auth(_) => "auth",
        CalBridgeError::RateLimited(_) => "rate_limited",
        CalBridgeError::NotFound(_) => "not_found",
        CalBridgeError::InvalidInput(_) => "invalid_input",
        CalBridgeError::Conflict(_) => "conflict",
        CalBridgeError::Internal(_) => "internal",
    }
}
