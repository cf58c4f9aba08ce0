//! Reasons a sync run is refused before it starts

use calbridge_domain::CalBridgeError;
use thiserror::Error;

/// Rejection raised before a run acquires its lease
///
/// Once a run has started it always completes with a report; failures inside
/// the run are collected into its result instead.
#[derive(Debug, Error)]
pub enum RunRejection {
    #[error("missing user identity")]
    Unauthenticated,

    #[error("sync is not configured for this user")]
    NotConfigured,

    #[error("sync is disabled for this user")]
    Disabled,

    #[error("no access token stored for this user")]
    MissingToken,

    #[error("a sync run is already in progress")]
    InProgress,

    #[error("invalid sync request: {0}")]
    InvalidRequest(String),

    #[error(transparent)]
    Store(#[from] CalBridgeError),
}

impl RunRejection {
    /// Stable label suitable for logging.
    pub fn label(&self) -> &'static str {
        match self {
            Self::Unauthenticated => "unauthenticated",
            Self::NotConfigured => "not_configured",
            Self::Disabled => "disabled",
            Self::MissingToken => "missing_token",
            Self::InProgress => "in_progress",
            Self::InvalidRequest(_) => "invalid_request",
            Self::Store(_) => "store",
        }
    }
}
