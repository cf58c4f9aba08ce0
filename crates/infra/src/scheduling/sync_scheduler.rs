//! Periodic sync scheduler.
//!
//! Wakes every `interval`, loads the enabled configurations and starts a run
//! in the configured direction for each one whose frequency is due. Runs are
//! sequential within a tick. The lease taken by the orchestrator keeps a
//! scheduled run from overlapping a manual one; such collisions are logged
//! and skipped.
//!
//! ```no_run
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! use calbridge_infra::scheduling::{SyncScheduler, SyncSchedulerConfig};
//!
//! # async fn example(
//! #     configs: Arc<dyn calbridge_core::SyncConfigRepository>,
//! #     orchestrator: Arc<calbridge_core::SyncOrchestrator>,
//! #     clock: Arc<dyn calbridge_common::time::Clock>,
//! # ) -> Result<(), calbridge_infra::scheduling::SchedulerError> {
//! let config = SyncSchedulerConfig { interval: Duration::from_secs(300), ..Default::default() };
//! let mut scheduler = SyncScheduler::new(configs, orchestrator, clock, config);
//! scheduler.start().await?;
//! // ... application runs ...
//! scheduler.stop().await?;
//! # Ok(())
//! # }
//! ```

use std::sync::Arc;
use std::time::{Duration, Instant};

use calbridge_common::time::Clock;
use calbridge_core::sync::{RunRejection, SyncConfigRepository, SyncOrchestrator};
use calbridge_domain::{SchedulerConfig, SyncRequest};
use tokio::sync::Mutex;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, error, info, instrument, warn};

use crate::scheduling::error::{SchedulerError, SchedulerResult};

/// Type alias for task handle to avoid complexity warnings
type TaskHandle = Arc<Mutex<Option<JoinHandle<()>>>>;

/// Configuration for sync scheduler
#[derive(Debug, Clone)]
pub struct SyncSchedulerConfig {
    /// Time between ticks
    pub interval: Duration,
    /// Timeout for loading the enabled configurations
    pub repo_timeout: Duration,
    /// How long `stop` waits for an in-flight tick
    pub shutdown_timeout: Duration,
}

impl Default for SyncSchedulerConfig {
    fn default() -> Self {
        Self {
            interval: Duration::from_secs(300),
            repo_timeout: Duration::from_secs(30),
            shutdown_timeout: Duration::from_secs(30),
        }
    }
}

impl From<&SchedulerConfig> for SyncSchedulerConfig {
    fn from(config: &SchedulerConfig) -> Self {
        Self { interval: Duration::from_secs(config.tick_seconds), ..Self::default() }
    }
}

/// Outcome of a single tick
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickSummary {
    /// Configurations whose frequency was due
    pub due: usize,
    /// Runs that started and produced a report
    pub completed: usize,
    /// Runs refused before starting (lease held, missing token, ...)
    pub rejected: usize,
}

/// State shared between the handle and the background loop
struct SyncLoopContext {
    configs: Arc<dyn SyncConfigRepository>,
    orchestrator: Arc<SyncOrchestrator>,
    clock: Arc<dyn Clock>,
    config: SyncSchedulerConfig,
}

/// Sync scheduler for periodic runs
pub struct SyncScheduler {
    context: Arc<SyncLoopContext>,
    cancellation_token: CancellationToken,
    task_handle: TaskHandle,
}

impl SyncScheduler {
    pub fn new(
        configs: Arc<dyn SyncConfigRepository>,
        orchestrator: Arc<SyncOrchestrator>,
        clock: Arc<dyn Clock>,
        config: SyncSchedulerConfig,
    ) -> Self {
        Self {
            context: Arc::new(SyncLoopContext { configs, orchestrator, clock, config }),
            cancellation_token: CancellationToken::new(),
            task_handle: Arc::new(Mutex::new(None)),
        }
    }

    /// Start the scheduler
    ///
    /// Spawns a background task that ticks every `interval`.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler is already running or the interval is
    /// zero
    #[instrument(skip(self))]
    pub async fn start(&mut self) -> SchedulerResult<()> {
        if self.is_running() {
            return Err(SchedulerError::AlreadyRunning);
        }
        if self.context.config.interval.is_zero() {
            return Err(SchedulerError::InvalidConfig("interval must be positive".into()));
        }

        info!(interval_secs = self.context.config.interval.as_secs(), "Starting sync scheduler");

        // Fresh token so the scheduler can be restarted after stop
        self.cancellation_token = CancellationToken::new();

        let context = Arc::clone(&self.context);
        let cancel = self.cancellation_token.clone();
        let handle = tokio::spawn(async move {
            Self::sync_loop(context, cancel).await;
        });

        *self.task_handle.lock().await = Some(handle);

        info!("Sync scheduler started");
        Ok(())
    }

    /// Stop the scheduler gracefully
    ///
    /// Cancels the background task and waits for an in-flight tick.
    ///
    /// # Errors
    ///
    /// Returns error if the scheduler is not running or the task does not
    /// finish within `shutdown_timeout`
    #[instrument(skip(self))]
    pub async fn stop(&mut self) -> SchedulerResult<()> {
        if !self.is_running() {
            return Err(SchedulerError::NotRunning);
        }

        info!("Stopping sync scheduler");
        self.cancellation_token.cancel();

        if let Some(handle) = self.task_handle.lock().await.take() {
            let join_timeout = self.context.config.shutdown_timeout;
            tokio::time::timeout(join_timeout, handle)
                .await
                .map_err(|source| SchedulerError::Timeout { duration: join_timeout, source })??;
        }

        info!("Sync scheduler stopped");
        Ok(())
    }

    /// Check if scheduler is running
    pub fn is_running(&self) -> bool {
        self.task_handle
            .try_lock()
            .ok()
            .and_then(|guard| guard.as_ref().map(|h| !h.is_finished()))
            .unwrap_or(false)
    }

    /// Run one tick immediately, outside the background loop.
    pub async fn run_once(&self) -> SchedulerResult<TickSummary> {
        Self::tick(&self.context).await
    }

    async fn sync_loop(context: Arc<SyncLoopContext>, cancel: CancellationToken) {
        loop {
            tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("Sync loop cancelled");
                    break;
                }
                _ = tokio::time::sleep(context.config.interval) => {
                    let started = Instant::now();
                    match Self::tick(&context).await {
                        Ok(summary) => debug!(
                            due = summary.due,
                            completed = summary.completed,
                            rejected = summary.rejected,
                            elapsed_ms = started.elapsed().as_millis() as u64,
                            "Scheduler tick finished"
                        ),
                        Err(e) => error!(error = %e, "Scheduler tick failed"),
                    }
                }
            }
        }
    }

    async fn tick(context: &SyncLoopContext) -> SchedulerResult<TickSummary> {
        let repo_timeout = context.config.repo_timeout;
        let enabled = tokio::time::timeout(repo_timeout, context.configs.list_enabled())
            .await
            .map_err(|source| SchedulerError::Timeout { duration: repo_timeout, source })?;

        let enabled = match enabled {
            Ok(configs) => configs,
            Err(e) => {
                error!(error = %e, "Failed to load enabled sync configurations");
                return Ok(TickSummary::default());
            }
        };

        let now = context.clock.utc_now();
        let lease_ttl = context.orchestrator.lease_ttl();
        let mut summary = TickSummary::default();

        for config in enabled.iter().filter(|config| config.is_due(now, lease_ttl)) {
            summary.due += 1;
            let request = SyncRequest { direction: config.direction, ..SyncRequest::default() };

            match context.orchestrator.run(config, &request).await {
                Ok(report) => {
                    summary.completed += 1;
                    info!(
                        user_id = %config.user_id,
                        sync_id = %report.sync_id,
                        status = report.status.as_str(),
                        "Scheduled sync finished"
                    );
                }
                Err(RunRejection::Store(e)) => {
                    summary.rejected += 1;
                    error!(user_id = %config.user_id, error = %e, "Scheduled sync failed to start");
                }
                Err(rejection) => {
                    summary.rejected += 1;
                    warn!(
                        user_id = %config.user_id,
                        reason = rejection.label(),
                        "Scheduled sync skipped"
                    );
                }
            }
        }

        Ok(summary)
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        self.cancellation_token.cancel();
    }
}
