//! Sync settings service
//!
//! Mutations of a user's sync configuration outside of a run: connecting and
//! disconnecting the calendar account, and changing the calendar selection.
//! Every mutation invalidates the user's cached calendar list. None of them
//! touch the run lease, so a run in flight keeps it.

use std::collections::HashMap;
use std::sync::Arc;

use calbridge_common::time::Clock;
use calbridge_domain::{
    CalBridgeError, CalendarListEntry, Credentials, Result, SyncConfiguration, SyncDirection,
    SyncFrequency,
};
use tracing::{info, instrument};

use super::orchestrator::validate_calendar_ids;
use super::ports::SyncConfigRepository;
use crate::calendar::{CalendarAccess, CalendarCatalog, CalendarService, TokenManager};

/// Requested change to the calendar selection
#[derive(Debug, Clone, Default)]
pub struct SelectionUpdate {
    pub calendar_ids: Vec<String>,
    pub direction: Option<SyncDirection>,
    pub frequency: Option<SyncFrequency>,
}

pub struct SyncSettingsService {
    configs: Arc<dyn SyncConfigRepository>,
    catalog: Arc<dyn CalendarCatalog>,
    tokens: TokenManager,
    clock: Arc<dyn Clock>,
}

impl SyncSettingsService {
    pub fn new(
        configs: Arc<dyn SyncConfigRepository>,
        calendar: Arc<dyn CalendarService>,
        catalog: Arc<dyn CalendarCatalog>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tokens = TokenManager::new(calendar, configs.clone(), clock.clone());
        Self { configs, catalog, tokens, clock }
    }

    /// Store credentials and enable sync.
    #[instrument(skip(self, credentials))]
    pub async fn connect(
        &self,
        user_id: &str,
        credentials: Credentials,
    ) -> Result<SyncConfiguration> {
        if !credentials.has_access_token() {
            return Err(CalBridgeError::InvalidInput("access token must not be empty".into()));
        }
        let now = self.clock.utc_now();
        let mut config = self
            .configs
            .get_config(user_id)
            .await?
            .unwrap_or_else(|| SyncConfiguration::new(user_id, now));

        config.credentials = Some(credentials);
        config.enabled = true;
        config.updated_at = now;

        self.configs.save_settings(&config).await?;
        self.catalog.invalidate(user_id).await;
        info!("Calendar account connected");
        Ok(config)
    }

    /// Clear credentials and disable sync. The selection is kept.
    #[instrument(skip(self))]
    pub async fn disconnect(&self, user_id: &str) -> Result<SyncConfiguration> {
        let mut config = self.require_config(user_id).await?;
        config.credentials = None;
        config.enabled = false;
        config.updated_at = self.clock.utc_now();

        self.configs.save_settings(&config).await?;
        self.catalog.invalidate(user_id).await;
        info!("Calendar account disconnected");
        Ok(config)
    }

    /// Replace the calendar selection after checking it against the user's
    /// calendar list.
    #[instrument(skip(self, update), fields(count = update.calendar_ids.len()))]
    pub async fn update_selection(
        &self,
        user_id: &str,
        update: SelectionUpdate,
    ) -> Result<SyncConfiguration> {
        validate_calendar_ids(&update.calendar_ids).map_err(CalBridgeError::InvalidInput)?;
        let mut config = self.require_config(user_id).await?;

        if !update.calendar_ids.is_empty() {
            let known: HashMap<String, CalendarListEntry> = self
                .calendars_for(&config)
                .await?
                .into_iter()
                .map(|calendar| (calendar.id.clone(), calendar))
                .collect();
            for id in &update.calendar_ids {
                if !known.get(id).is_some_and(CalendarListEntry::is_selectable) {
                    return Err(CalBridgeError::InvalidInput(format!("unknown calendar '{id}'")));
                }
            }
        }

        config.selected_calendar_ids = update.calendar_ids;
        if let Some(direction) = update.direction {
            config.direction = direction;
        }
        if let Some(frequency) = update.frequency {
            config.frequency = frequency;
        }
        config.updated_at = self.clock.utc_now();

        self.configs.save_settings(&config).await?;
        self.catalog.invalidate(user_id).await;
        info!("Calendar selection updated");
        Ok(config)
    }

    /// The user's calendars, served through the cache.
    pub async fn list_calendars(&self, user_id: &str) -> Result<Vec<CalendarListEntry>> {
        let config = self.require_config(user_id).await?;
        self.calendars_for(&config).await
    }

    async fn calendars_for(&self, config: &SyncConfiguration) -> Result<Vec<CalendarListEntry>> {
        let credentials = config
            .credentials
            .as_ref()
            .filter(|credentials| credentials.has_access_token())
            .ok_or_else(|| CalBridgeError::Auth("calendar account is not connected".into()))?;
        let credentials = self.tokens.ensure_valid(&config.user_id, credentials).await?;
        self.catalog.calendars(&CalendarAccess::from_credentials(&config.user_id, &credentials)).await
    }

    async fn require_config(&self, user_id: &str) -> Result<SyncConfiguration> {
        self.configs
            .get_config(user_id)
            .await?
            .ok_or_else(|| CalBridgeError::NotFound(format!("sync configuration for {user_id}")))
    }
}
