//! Error types used throughout the application

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::types::SyncErrorKind;

/// Main error type for Calbridge
#[derive(Error, Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", content = "message")]
pub enum CalBridgeError {
    #[error("Database error: {0}")]
    Database(String),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Network error: {0}")]
    Network(String),

    #[error("Authentication error: {0}")]
    Auth(String),

    #[error("Rate limit exceeded: {0}")]
    RateLimited(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Conflict: {0}")]
    Conflict(String),

    #[error("Internal error: {0}")]
    Internal(String),
}

impl CalBridgeError {
    /// Classify the error into the sync error taxonomy.
    ///
    /// Credential problems are token errors, malformed data is a validation
    /// error, and every other failure is treated as an upstream/API failure.
    pub fn sync_error_kind(&self) -> SyncErrorKind {
        match self {
            Self::Auth(_) => SyncErrorKind::TokenError,
            Self::InvalidInput(_) => SyncErrorKind::ValidationError,
            _ => SyncErrorKind::ApiError,
        }
    }

    /// Stable label suitable for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Database(_) => "database",
            Self::Config(_) => "config",
            Self::Network(_) => "network",
            Self::Auth(_) => "auth",
            Self::RateLimited(_) => "rate_limited",
            Self::NotFound(_) => "not_found",
            Self::InvalidInput(_) => "invalid_input",
            Self::Conflict(_) => "conflict",
            Self::Internal(_) => "internal",
        }
    }
}

/// Result type alias for Calbridge operations
pub type Result<T> = std::result::Result<T, CalBridgeError>;
