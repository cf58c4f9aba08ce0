//! Health reporting for the `/health` endpoint
//!
//! The service is healthy only when every component is.

use chrono::Utc;
use serde::{Deserialize, Serialize};

/// Overall health status of the application
///
/// # Example
/// ```
/// use calbridge_api::utils::health::{ComponentHealth, HealthStatus};
///
/// let status = HealthStatus::from_components(vec![
///     ComponentHealth::healthy("database"),
///     ComponentHealth::unhealthy("scheduler", "not running"),
/// ]);
///
/// assert_eq!(status.score, 0.5);
/// assert!(!status.is_healthy);
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthStatus {
    pub is_healthy: bool,

    /// Share of healthy components, from 0.0 to 1.0
    pub score: f64,

    pub components: Vec<ComponentHealth>,

    /// Unix timestamp (seconds) when the check ran
    pub timestamp: i64,
}

impl HealthStatus {
    pub fn from_components(components: Vec<ComponentHealth>) -> Self {
        let healthy = components.iter().filter(|c| c.is_healthy).count();
        let score =
            if components.is_empty() { 1.0 } else { healthy as f64 / components.len() as f64 };

        Self {
            is_healthy: healthy == components.len(),
            score,
            components,
            timestamp: Utc::now().timestamp(),
        }
    }
}

/// Health status of an individual component
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ComponentHealth {
    /// Component identifier (e.g., "database", "scheduler")
    pub name: String,

    pub is_healthy: bool,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

impl ComponentHealth {
    pub fn healthy(name: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: true, message: None }
    }

    pub fn unhealthy(name: impl Into<String>, message: impl Into<String>) -> Self {
        Self { name: name.into(), is_healthy: false, message: Some(message.into()) }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}
