//! Token manager
//!
//! Keeps a user's calendar credentials usable for the duration of a run.
//! A token past its known expiry is refreshed straight away; otherwise the
//! access token is verified upstream and refreshed on rejection. A refresh
//! happens at most once and is persisted before anything else happens.

use std::sync::Arc;

use calbridge_common::time::Clock;
use calbridge_domain::{CalBridgeError, Credentials, Result};
use tracing::{debug, info, warn};

use super::ports::{CalendarAccess, CalendarService};
use crate::sync::ports::SyncConfigRepository;

/// Tokens this close to expiry are refreshed up front.
const EXPIRY_MARGIN_SECS: i64 = 60;

pub struct TokenManager {
    calendar: Arc<dyn CalendarService>,
    configs: Arc<dyn SyncConfigRepository>,
    clock: Arc<dyn Clock>,
}

impl TokenManager {
    pub fn new(
        calendar: Arc<dyn CalendarService>,
        configs: Arc<dyn SyncConfigRepository>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self { calendar, configs, clock }
    }

    /// Probe the access token against the calendar service.
    ///
    /// Transport failures count as a failed probe so the refresh path gets a
    /// chance to recover.
    pub async fn verify(&self, user_id: &str, credentials: &Credentials) -> bool {
        if !credentials.has_access_token() {
            return false;
        }
        match self.calendar.verify(&CalendarAccess::from_credentials(user_id, credentials)).await {
            Ok(valid) => valid,
            Err(e) => {
                warn!(user_id, error = %e, "Token probe failed");
                false
            }
        }
    }

    /// Exchange the refresh token and persist the merged credentials.
    ///
    /// # Errors
    /// `Auth` when no usable refresh token is stored or the exchange fails.
    pub async fn refresh(&self, user_id: &str, credentials: &Credentials) -> Result<Credentials> {
        let refresh_token = credentials
            .usable_refresh_token()
            .ok_or_else(|| CalBridgeError::Auth("no refresh token available".to_string()))?;

        let refreshed = self.calendar.refresh(user_id, refresh_token).await.map_err(|e| match e {
            CalBridgeError::Auth(msg) => CalBridgeError::Auth(msg),
            other => CalBridgeError::Auth(format!("token refresh failed: {other}")),
        })?;

        let merged = credentials.clone().merged_with(refreshed);
        self.configs.save_credentials(user_id, &merged, self.clock.utc_now()).await?;
        info!(user_id, "Refreshed calendar credentials");
        Ok(merged)
    }

    /// Credentials that passed the probe, refreshing at most once.
    pub async fn ensure_valid(&self, user_id: &str, credentials: &Credentials) -> Result<Credentials> {
        let expired = credentials.is_expired(self.clock.utc_now(), EXPIRY_MARGIN_SECS);
        if expired && credentials.usable_refresh_token().is_some() {
            debug!(user_id, "Access token expired, refreshing without verification");
            return self.refresh(user_id, credentials).await;
        }
        if self.verify(user_id, credentials).await {
            debug!(user_id, "Access token verified");
            return Ok(credentials.clone());
        }
        self.refresh(user_id, credentials).await
    }
}
