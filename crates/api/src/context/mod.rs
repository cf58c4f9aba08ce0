//! Application context - dependency injection container

use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use calbridge_common::resilience::{RateLimiter, RateLimiterConfig};
use calbridge_common::time::{Clock, SystemClock};
use calbridge_core::calendar::{CalendarCatalog, CalendarService};
use calbridge_core::sync::{SyncOrchestrator, SyncPorts, SyncSettingsService, SyncTrigger};
use calbridge_domain::{CalBridgeError, Config, Result};
use calbridge_infra::{
    CalendarListCache, DbManager, GoogleCalendarClient, HttpClient, SqliteSyncConfigRepository,
    SqliteSyncLogRepository, SqliteSyncRecordRepository, SqliteTaskRepository, SyncScheduler,
    SyncSchedulerConfig,
};
use tokio::sync::Mutex;
use tracing::{info, warn};

use crate::utils::health::{ComponentHealth, HealthStatus};

/// Application context - holds all services and dependencies
pub struct AppContext {
    pub config: Config,
    pub db: Arc<DbManager>,
    pub trigger: Arc<SyncTrigger>,
    pub settings: Arc<SyncSettingsService>,
    scheduler: Mutex<SyncScheduler>,
}

impl AppContext {
    /// Open the database, wire the Google adapter and start the scheduler
    /// when enabled.
    ///
    /// # Errors
    /// Fails when the database cannot be opened or migrated, or when the
    /// Google or rate-limit configuration is invalid.
    pub async fn new_with_config(config: Config) -> Result<Self> {
        if let Some(parent) = Path::new(&config.database.path).parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent).map_err(|e| {
                    CalBridgeError::Config(format!("cannot create database directory: {e}"))
                })?;
            }
        }

        let db = Arc::new(DbManager::new(&config.database.path, config.database.pool_size)?);
        db.run_migrations()?;

        let clock: Arc<dyn Clock> = Arc::new(SystemClock);
        let limiter = RateLimiter::new(RateLimiterConfig::new(
            config.rate_limit.max_requests,
            Duration::from_secs(config.rate_limit.window_seconds),
        ))
        .map_err(|e| CalBridgeError::Config(format!("rate_limit: {e}")))?;
        let calendar: Arc<dyn CalendarService> = Arc::new(GoogleCalendarClient::new(
            &config.google,
            HttpClient::new()?,
            limiter,
            Arc::clone(&clock),
        )?);

        let ctx = Self::with_calendar(config, db, calendar, clock);
        if ctx.config.scheduler.enabled {
            ctx.start_scheduler().await?;
        } else {
            info!("Periodic sync scheduler disabled");
        }
        Ok(ctx)
    }

    /// Wire services around an existing database and calendar adapter.
    pub fn with_calendar(
        config: Config,
        db: Arc<DbManager>,
        calendar: Arc<dyn CalendarService>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        let tasks = Arc::new(SqliteTaskRepository::new(Arc::clone(&db)));
        let records = Arc::new(SqliteSyncRecordRepository::new(Arc::clone(&db)));
        let configs = Arc::new(SqliteSyncConfigRepository::new(Arc::clone(&db)));
        let logs = Arc::new(SqliteSyncLogRepository::new(Arc::clone(&db)));
        let catalog: Arc<dyn CalendarCatalog> =
            Arc::new(CalendarListCache::new(Arc::clone(&calendar), &config.cache));

        let ports = SyncPorts {
            tasks,
            records,
            configs: configs.clone(),
            logs: logs.clone(),
            calendar: Arc::clone(&calendar),
            catalog: Arc::clone(&catalog),
        };
        let orchestrator = Arc::new(
            SyncOrchestrator::new(ports, Arc::clone(&clock))
                .with_lease_ttl(Duration::from_secs(config.scheduler.lease_seconds)),
        );

        let trigger =
            Arc::new(SyncTrigger::new(configs.clone(), logs, Arc::clone(&orchestrator)));
        let settings = Arc::new(SyncSettingsService::new(
            configs.clone(),
            calendar,
            catalog,
            Arc::clone(&clock),
        ));
        let scheduler = SyncScheduler::new(
            configs,
            orchestrator,
            clock,
            SyncSchedulerConfig::from(&config.scheduler),
        );

        Self { config, db, trigger, settings, scheduler: Mutex::new(scheduler) }
    }

    pub async fn start_scheduler(&self) -> Result<()> {
        self.scheduler.lock().await.start().await?;
        Ok(())
    }

    pub async fn scheduler_running(&self) -> bool {
        self.scheduler.lock().await.is_running()
    }

    /// Stop background work. Safe to call when the scheduler never started.
    pub async fn shutdown(&self) -> Result<()> {
        let mut scheduler = self.scheduler.lock().await;
        if scheduler.is_running() {
            scheduler.stop().await?;
        }
        info!("Application context shut down");
        Ok(())
    }

    /// Component health for the `/health` endpoint.
    pub async fn health(&self) -> HealthStatus {
        let database = match self.db.health_check() {
            Ok(()) => ComponentHealth::healthy("database"),
            Err(e) => {
                warn!(error = %e, "Database health check failed");
                ComponentHealth::unhealthy("database", "database unavailable")
            }
        };

        let scheduler = if !self.config.scheduler.enabled {
            ComponentHealth::healthy("scheduler").with_message("disabled")
        } else if self.scheduler_running().await {
            ComponentHealth::healthy("scheduler")
        } else {
            ComponentHealth::unhealthy("scheduler", "not running")
        };

        HealthStatus::from_components(vec![database, scheduler])
    }
}
