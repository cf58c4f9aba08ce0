//! OAuth credentials for the external calendar service
//!
//! Credentials are owned exclusively by the user's sync configuration row.

use std::fmt;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};

/// Access/refresh token pair issued by the calendar provider.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Credentials {
    pub access_token: String,
    pub refresh_token: Option<String>,
    pub expires_at: Option<DateTime<Utc>>,
}

impl Credentials {
    pub fn new(access_token: impl Into<String>, refresh_token: Option<String>) -> Self {
        Self { access_token: access_token.into(), refresh_token, expires_at: None }
    }

    /// Set the absolute expiry from an `expires_in` value in seconds.
    pub fn with_expiry(mut self, now: DateTime<Utc>, expires_in_secs: i64) -> Self {
        self.expires_at = Some(now + Duration::seconds(expires_in_secs));
        self
    }

    pub fn has_access_token(&self) -> bool {
        !self.access_token.trim().is_empty()
    }

    /// A refresh token is only usable when it is present and non-blank.
    pub fn usable_refresh_token(&self) -> Option<&str> {
        self.refresh_token.as_deref().map(str::trim).filter(|token| !token.is_empty())
    }

    /// Whether the token is expired or expires within `threshold_secs`.
    ///
    /// Tokens without a known expiry are never considered expired here; the
    /// token manager verifies those upstream.
    pub fn is_expired(&self, now: DateTime<Utc>, threshold_secs: i64) -> bool {
        self.expires_at.is_some_and(|at| at - Duration::seconds(threshold_secs) <= now)
    }

    /// Merge a refreshed token set, keeping the old refresh token when the
    /// provider did not rotate it.
    pub fn merged_with(self, refreshed: Credentials) -> Credentials {
        Credentials {
            access_token: refreshed.access_token,
            refresh_token: refreshed.refresh_token.or(self.refresh_token),
            expires_at: refreshed.expires_at,
        }
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("access_token", &"<redacted>")
            .field("refresh_token", &self.refresh_token.as_ref().map(|_| "<redacted>"))
            .field("expires_at", &self.expires_at)
            .finish()
    }
}
