//! Calendar list cache
//!
//! Read-through TTL cache over [`CalendarService::list_calendars`], keyed by
//! user id. Concurrent misses for the same user share one upstream call.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calbridge_core::calendar::{CalendarAccess, CalendarCatalog, CalendarService};
use calbridge_domain::{CacheConfig, CalendarListEntry, Result};
use moka::future::Cache;
use tracing::debug;

pub struct CalendarListCache {
    calendar: Arc<dyn CalendarService>,
    entries: Cache<String, Arc<Vec<CalendarListEntry>>>,
}

impl CalendarListCache {
    pub fn new(calendar: Arc<dyn CalendarService>, config: &CacheConfig) -> Self {
        Self::with_ttl(
            calendar,
            Duration::from_secs(config.calendar_list_ttl_seconds),
            config.max_capacity,
        )
    }

    pub fn with_ttl(calendar: Arc<dyn CalendarService>, ttl: Duration, max_capacity: u64) -> Self {
        let entries = Cache::builder().max_capacity(max_capacity).time_to_live(ttl).build();
        Self { calendar, entries }
    }
}

#[async_trait]
impl CalendarCatalog for CalendarListCache {
    async fn calendars(&self, access: &CalendarAccess) -> Result<Vec<CalendarListEntry>> {
        let calendar = Arc::clone(&self.calendar);
        let loader_access = access.clone();

        let entries = self
            .entries
            .try_get_with(access.user_id.clone(), async move {
                debug!(user_id = %loader_access.user_id, "Calendar list cache miss");
                calendar.list_calendars(&loader_access).await.map(Arc::new)
            })
            .await
            .map_err(|shared| (*shared).clone())?;

        Ok(entries.as_ref().clone())
    }

    async fn invalidate(&self, user_id: &str) {
        self.entries.invalidate(user_id).await;
        debug!(user_id, "Calendar list cache invalidated");
    }
}
