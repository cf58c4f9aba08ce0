//! Sync orchestrator - drives a single sync run
//!
//! A run takes the per-user lease, opens a log entry, makes sure the
//! credentials are usable, resolves the calendar scope, and then runs the
//! import pass and/or the export pass. Item failures are collected into the
//! result; setup failures end the run with status `error`. Either way the log
//! entry is finalized and the lease released.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use calbridge_common::time::Clock;
use calbridge_domain::constants::{
    DEFAULT_SYNC_LEASE_SECS, MAX_SELECTED_CALENDARS, PRIMARY_CALENDAR_ALIAS,
};
use calbridge_domain::{
    CalBridgeError, ConfigStatus, Credentials, ExternalEvent, Result, RunStatus,
    SyncConfiguration, SyncError, SyncLogEntry, SyncRecord, SyncReport, SyncRequest, SyncResult,
    Task, TaskStatus, TimeWindow,
};
use chrono::{DateTime, Utc};
use tracing::{debug, error, info, instrument, warn};
use uuid::Uuid;

use super::errors::RunRejection;
use super::mapper;
use super::SyncPorts;
use crate::calendar::{CalendarAccess, TokenManager};

/// What an item ended up doing (or would do, in a dry run)
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Applied {
    Created,
    Updated,
}

impl Applied {
    fn count(self, result: &mut SyncResult) {
        match self {
            Self::Created => result.created += 1,
            Self::Updated => result.updated += 1,
        }
    }
}

/// Per-run state shared by both passes
struct RunContext {
    user_id: String,
    access: CalendarAccess,
    dry_run: bool,
    now: DateTime<Utc>,
}

pub struct SyncOrchestrator {
    ports: SyncPorts,
    tokens: TokenManager,
    clock: Arc<dyn Clock>,
    lease_ttl: Duration,
}

impl SyncOrchestrator {
    pub fn new(ports: SyncPorts, clock: Arc<dyn Clock>) -> Self {
        let tokens =
            TokenManager::new(ports.calendar.clone(), ports.configs.clone(), clock.clone());
        Self { ports, tokens, clock, lease_ttl: Duration::from_secs(DEFAULT_SYNC_LEASE_SECS) }
    }

    /// Age after which a held lease is treated as orphaned
    pub fn with_lease_ttl(mut self, lease_ttl: Duration) -> Self {
        self.lease_ttl = lease_ttl;
        self
    }

    pub fn lease_ttl(&self) -> Duration {
        self.lease_ttl
    }

    /// Run one sync for the configuration's user.
    ///
    /// # Errors
    /// Returns a [`RunRejection`] only when the run never started: disabled
    /// configuration, missing token, malformed request, or a lease held by
    /// another run. A started run always yields a report.
    #[instrument(
        skip(self, config, request),
        fields(user_id = %config.user_id, direction = %request.direction, dry_run = request.dry_run)
    )]
    pub async fn run(
        &self,
        config: &SyncConfiguration,
        request: &SyncRequest,
    ) -> std::result::Result<SyncReport, RunRejection> {
        let user_id = config.user_id.as_str();
        if !config.enabled {
            return Err(RunRejection::Disabled);
        }
        let credentials = config
            .credentials
            .clone()
            .filter(Credentials::has_access_token)
            .ok_or(RunRejection::MissingToken)?;
        validate_calendar_ids(&request.calendar_ids).map_err(RunRejection::InvalidRequest)?;

        let started_at = self.clock.utc_now();
        if !self.ports.configs.try_begin_run(user_id, started_at, self.lease_ttl).await? {
            warn!("Sync already in progress");
            return Err(RunRejection::InProgress);
        }

        let mut entry = SyncLogEntry::start(user_id, request.direction, request.dry_run, started_at);
        if let Err(e) = self.ports.logs.start_log(&entry).await {
            error!(error = %e, "Failed to open sync log entry");
            self.release(user_id, ConfigStatus::Error).await;
            return Err(e.into());
        }
        info!(sync_id = %entry.id, "Sync run started");

        let (status, result) = self.execute(config, request, credentials, started_at).await;

        let completed_at = self.clock.utc_now();
        entry.finalize(status, result.clone(), completed_at);
        if let Err(e) = self.ports.logs.finalize_log(&entry).await {
            error!(sync_id = %entry.id, error = %e, "Failed to finalize sync log entry");
        }
        self.release(user_id, status.config_status()).await;

        info!(
            sync_id = %entry.id,
            status = status.as_str(),
            processed = result.processed,
            created = result.created,
            updated = result.updated,
            errors = result.errors.len(),
            "Sync run finished"
        );

        Ok(SyncReport { sync_id: entry.id, status, result, dry_run: request.dry_run })
    }

    async fn execute(
        &self,
        config: &SyncConfiguration,
        request: &SyncRequest,
        credentials: Credentials,
        now: DateTime<Utc>,
    ) -> (RunStatus, SyncResult) {
        let user_id = config.user_id.as_str();
        let mut result = SyncResult::default();

        let credentials = match self.tokens.ensure_valid(user_id, &credentials).await {
            Ok(credentials) => credentials,
            Err(e) => {
                error!(error = %e, "Could not obtain a valid access token");
                result.errors.push(SyncError::token(e.to_string()));
                return (RunStatus::Error, result);
            }
        };

        let ctx = RunContext {
            user_id: user_id.to_string(),
            access: CalendarAccess::from_credentials(user_id, &credentials),
            dry_run: request.dry_run,
            now,
        };

        let scope = match self.resolve_scope(&ctx, config, request).await {
            Ok(scope) => scope,
            Err(e) => {
                error!(error = %e, "Could not resolve calendar scope");
                result.errors.push(SyncError::from_error(&e, None));
                return (RunStatus::Error, result);
            }
        };
        debug!(calendars = ?scope, "Resolved calendar scope");

        if request.direction.runs_import() {
            if let Err(e) = self.import_pass(&ctx, &scope, &mut result).await {
                error!(error = %e, "Import pass aborted");
                result.errors.push(SyncError::from_error(&e, None));
                return (RunStatus::Error, result);
            }
        }

        if request.direction.runs_export() {
            if let Err(e) = self.export_pass(&ctx, &scope, &mut result).await {
                error!(error = %e, "Export pass aborted");
                result.errors.push(SyncError::from_error(&e, None));
                return (RunStatus::Error, result);
            }
        }

        (result.completed_status(), result)
    }

    /// Request scope, then the configured selection, then the primary calendar.
    async fn resolve_scope(
        &self,
        ctx: &RunContext,
        config: &SyncConfiguration,
        request: &SyncRequest,
    ) -> Result<Vec<String>> {
        if !request.calendar_ids.is_empty() {
            return Ok(request.calendar_ids.clone());
        }
        if !config.selected_calendar_ids.is_empty() {
            return Ok(config.selected_calendar_ids.clone());
        }

        let calendars = self.ports.catalog.calendars(&ctx.access).await?;
        let primary = calendars
            .into_iter()
            .find(|calendar| calendar.primary && calendar.is_selectable())
            .map(|calendar| calendar.id)
            .unwrap_or_else(|| PRIMARY_CALENDAR_ALIAS.to_string());
        Ok(vec![primary])
    }

    // =========================================================================
    // Import
    // =========================================================================

    async fn import_pass(
        &self,
        ctx: &RunContext,
        scope: &[String],
        result: &mut SyncResult,
    ) -> Result<()> {
        let window = TimeWindow::import_window(ctx.now);

        for calendar_id in scope {
            let events = self.ports.calendar.list_events(&ctx.access, calendar_id, &window).await?;
            debug!(calendar_id = %calendar_id, count = events.len(), "Fetched events for import");

            for event in events.iter().filter(|event| is_import_candidate(event, &window)) {
                result.processed += 1;
                match self.import_event(ctx, calendar_id, event).await {
                    Ok(applied) => applied.count(result),
                    Err(e) => {
                        warn!(
                            calendar_id = %calendar_id,
                            event_id = event.id.as_deref().unwrap_or_default(),
                            error = %e,
                            "Failed to import event"
                        );
                        result.errors.push(SyncError::from_error(&e, event.id.as_deref()));
                    }
                }
            }
        }
        Ok(())
    }

    async fn import_event(
        &self,
        ctx: &RunContext,
        calendar_id: &str,
        event: &ExternalEvent,
    ) -> Result<Applied> {
        let event_id = event
            .id
            .as_deref()
            .ok_or_else(|| CalBridgeError::InvalidInput("event has no id".to_string()))?;
        let fields = mapper::event_to_task(event, &ctx.user_id)?;

        match self.ports.records.find_by_external_id(&ctx.user_id, event_id).await? {
            Some(record) => {
                let mut task = self
                    .ports
                    .tasks
                    .get_task(&ctx.user_id, &record.task_id)
                    .await?
                    .ok_or_else(|| {
                        CalBridgeError::NotFound(format!(
                            "task {} bound to event {event_id}",
                            record.task_id
                        ))
                    })?;
                if !ctx.dry_run {
                    task.apply_fields(&fields, ctx.now);
                    self.ports.tasks.update_task(&task).await?;
                    self.ports.records.touch_record(&record.id, ctx.now).await?;
                }
                Ok(Applied::Updated)
            }
            None => {
                if !ctx.dry_run {
                    let task = Task::from_fields(Uuid::now_v7().to_string(), fields, ctx.now);
                    self.ports.tasks.insert_task(&task).await?;
                    let record =
                        SyncRecord::new(&ctx.user_id, event_id, &task.id, calendar_id, ctx.now);
                    self.ports.records.insert_record(&record).await?;
                    debug!(event_id, task_id = %task.id, "Imported new task");
                }
                Ok(Applied::Created)
            }
        }
    }

    // =========================================================================
    // Export
    // =========================================================================

    async fn export_pass(
        &self,
        ctx: &RunContext,
        scope: &[String],
        result: &mut SyncResult,
    ) -> Result<()> {
        let window = TimeWindow::export_window(ctx.now);
        let target = scope
            .first()
            .ok_or_else(|| CalBridgeError::InvalidInput("no calendar to export to".to_string()))?;

        let tasks = self.ports.tasks.list_tasks_in_window(&ctx.user_id, &window).await?;
        debug!(count = tasks.len(), "Loaded tasks for export");

        for task in tasks.iter().filter(|task| is_export_candidate(task, &window)) {
            result.processed += 1;
            match self.export_task(ctx, target, task).await {
                Ok(applied) => applied.count(result),
                Err(e) => {
                    warn!(task_id = %task.id, error = %e, "Failed to export task");
                    result.errors.push(SyncError::from_error(&e, Some(&task.id)));
                }
            }
        }
        Ok(())
    }

    async fn export_task(&self, ctx: &RunContext, target: &str, task: &Task) -> Result<Applied> {
        let Some(record) = self.ports.records.find_by_task_id(&ctx.user_id, &task.id).await? else {
            let event = mapper::task_to_event(task, target)?;
            if ctx.dry_run {
                return Ok(Applied::Created);
            }
            let created = self.ports.calendar.create_event(&ctx.access, target, &event).await?;
            let event_id = upstream_id(&created)?;
            let record = SyncRecord::new(&ctx.user_id, event_id, &task.id, target, ctx.now);
            self.ports.records.insert_record(&record).await?;
            debug!(task_id = %task.id, event_id, "Exported new event");
            return Ok(Applied::Created);
        };

        let event = mapper::task_to_event(task, &record.calendar_id)?;
        if ctx.dry_run {
            return Ok(Applied::Updated);
        }

        let outcome = self.update_bound_event(ctx, task, &record, &event).await;
        if outcome.is_err() {
            if let Err(e) = self.ports.records.mark_record_error(&record.id).await {
                warn!(record_id = %record.id, error = %e, "Failed to flag ledger record");
            }
        }
        outcome
    }

    /// Update the bound event, recreating it when the update is refused.
    async fn update_bound_event(
        &self,
        ctx: &RunContext,
        task: &Task,
        record: &SyncRecord,
        event: &ExternalEvent,
    ) -> Result<Applied> {
        match self
            .ports
            .calendar
            .update_event(&ctx.access, &record.calendar_id, &record.external_event_id, event)
            .await
        {
            Ok(_) => {
                self.ports.records.touch_record(&record.id, ctx.now).await?;
                Ok(Applied::Updated)
            }
            Err(e @ (CalBridgeError::Auth(_) | CalBridgeError::RateLimited(_))) => Err(e),
            Err(e) => {
                warn!(
                    task_id = %task.id,
                    event_id = %record.external_event_id,
                    error = %e,
                    "Update failed, recreating event"
                );
                let created =
                    self.ports.calendar.create_event(&ctx.access, &record.calendar_id, event).await?;
                let event_id = upstream_id(&created)?;
                self.ports.records.repoint_record(&record.id, event_id, ctx.now).await?;
                info!(task_id = %task.id, event_id, "Ledger repointed to replacement event");
                Ok(Applied::Created)
            }
        }
    }

    async fn release(&self, user_id: &str, status: ConfigStatus) {
        if let Err(e) = self.ports.configs.finish_run(user_id, status, self.clock.utc_now()).await
        {
            error!(user_id, error = %e, "Failed to release sync lease");
        }
    }
}

/// Reject oversized, blank, or duplicated calendar scopes.
pub fn validate_calendar_ids(ids: &[String]) -> std::result::Result<(), String> {
    if ids.len() > MAX_SELECTED_CALENDARS {
        return Err(format!("at most {MAX_SELECTED_CALENDARS} calendars may be selected"));
    }
    let mut seen = HashSet::new();
    for id in ids {
        if id.trim().is_empty() {
            return Err("calendar ids must not be blank".to_string());
        }
        if !seen.insert(id.as_str()) {
            return Err(format!("calendar id '{id}' is listed twice"));
        }
    }
    Ok(())
}

fn is_import_candidate(event: &ExternalEvent, window: &TimeWindow) -> bool {
    if mapper::should_exclude(event) {
        return false;
    }
    match event.provenance() {
        Ok(Some(marker)) if marker.is_ours() => return false,
        Err(reason) => warn!(
            event_id = event.id.as_deref().unwrap_or_default(),
            reason = %reason,
            "Malformed provenance marker, treating event as external"
        ),
        Ok(_) => {}
    }
    event.resolved_span().is_some_and(|(start, end)| window.overlaps(start, end))
}

fn is_export_candidate(task: &Task, window: &TimeWindow) -> bool {
    task.status != TaskStatus::Cancelled
        && task.anchor_date().is_some_and(|anchor| window.contains(anchor))
}

fn upstream_id(event: &ExternalEvent) -> Result<&str> {
    event
        .id
        .as_deref()
        .ok_or_else(|| CalBridgeError::Network("created event came back without an id".to_string()))
}
