//! Sync trigger - the guarded entry point callers use to start a run

use std::sync::Arc;

use calbridge_domain::{SyncLogEntry, SyncRequest, TriggerResponse};
use tracing::{info, instrument};

use super::errors::RunRejection;
use super::orchestrator::SyncOrchestrator;
use super::ports::{SyncConfigRepository, SyncLogRepository};

/// Maximum number of log entries returned to a caller
pub const MAX_LOG_PAGE: usize = 100;

pub struct SyncTrigger {
    configs: Arc<dyn SyncConfigRepository>,
    logs: Arc<dyn SyncLogRepository>,
    orchestrator: Arc<SyncOrchestrator>,
}

impl SyncTrigger {
    pub fn new(
        configs: Arc<dyn SyncConfigRepository>,
        logs: Arc<dyn SyncLogRepository>,
        orchestrator: Arc<SyncOrchestrator>,
    ) -> Self {
        Self { configs, logs, orchestrator }
    }

    /// Start a run for an authenticated caller.
    ///
    /// `user_id` is whatever identity the upstream auth layer attached; a
    /// missing or blank identity is rejected before anything is read.
    #[instrument(skip(self, request))]
    pub async fn trigger(
        &self,
        user_id: Option<&str>,
        request: SyncRequest,
    ) -> std::result::Result<TriggerResponse, RunRejection> {
        let user_id = authenticated(user_id)?;
        let config =
            self.configs.get_config(user_id).await?.ok_or(RunRejection::NotConfigured)?;

        let report = self.orchestrator.run(&config, &request).await.inspect_err(|rejection| {
            info!(user_id, reason = rejection.label(), "Sync trigger rejected");
        })?;
        Ok(TriggerResponse::from(report))
    }

    /// Most recent run log entries for the caller, newest first.
    pub async fn recent_logs(
        &self,
        user_id: Option<&str>,
        limit: usize,
    ) -> std::result::Result<Vec<SyncLogEntry>, RunRejection> {
        let user_id = authenticated(user_id)?;
        Ok(self.logs.recent_logs(user_id, limit.clamp(1, MAX_LOG_PAGE)).await?)
    }
}

fn authenticated(user_id: Option<&str>) -> std::result::Result<&str, RunRejection> {
    user_id.map(str::trim).filter(|id| !id.is_empty()).ok_or(RunRejection::Unauthenticated)
}
