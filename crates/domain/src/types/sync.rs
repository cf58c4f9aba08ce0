//! Sync bookkeeping types
//!
//! Configuration, run log, ledger records, and the request/response shapes of
//! the sync trigger.

use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::credentials::Credentials;
use crate::errors::CalBridgeError;

/// Which passes a run performs
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncDirection {
    Import,
    Export,
    #[default]
    Bidirectional,
}

impl SyncDirection {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Import => "import",
            Self::Export => "export",
            Self::Bidirectional => "bidirectional",
        }
    }

    pub fn runs_import(&self) -> bool {
        matches!(self, Self::Import | Self::Bidirectional)
    }

    pub fn runs_export(&self) -> bool {
        matches!(self, Self::Export | Self::Bidirectional)
    }
}

impl fmt::Display for SyncDirection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for SyncDirection {
    type Err = CalBridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "import" => Ok(Self::Import),
            "export" => Ok(Self::Export),
            "bidirectional" => Ok(Self::Bidirectional),
            other => Err(CalBridgeError::InvalidInput(format!("unknown sync direction: {other}"))),
        }
    }
}

/// How often the scheduler should run a user's sync
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncFrequency {
    #[default]
    Manual,
    Hourly,
    Daily,
}

impl SyncFrequency {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Manual => "manual",
            Self::Hourly => "hourly",
            Self::Daily => "daily",
        }
    }

    /// Scheduling interval; `None` for manual-only configurations.
    pub fn interval(&self) -> Option<Duration> {
        match self {
            Self::Manual => None,
            Self::Hourly => Some(Duration::hours(1)),
            Self::Daily => Some(Duration::days(1)),
        }
    }
}

impl FromStr for SyncFrequency {
    type Err = CalBridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "manual" => Ok(Self::Manual),
            "hourly" => Ok(Self::Hourly),
            "daily" => Ok(Self::Daily),
            other => Err(CalBridgeError::InvalidInput(format!("unknown sync frequency: {other}"))),
        }
    }
}

/// Persisted status of a user's sync configuration
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ConfigStatus {
    #[default]
    Idle,
    Syncing,
    Error,
    Success,
}

impl ConfigStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Syncing => "syncing",
            Self::Error => "error",
            Self::Success => "success",
        }
    }
}

impl FromStr for ConfigStatus {
    type Err = CalBridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "idle" => Ok(Self::Idle),
            "syncing" => Ok(Self::Syncing),
            "error" => Ok(Self::Error),
            "success" => Ok(Self::Success),
            other => Err(CalBridgeError::InvalidInput(format!("unknown config status: {other}"))),
        }
    }
}

/// Per-user sync configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncConfiguration {
    pub user_id: String,
    pub enabled: bool,
    pub selected_calendar_ids: Vec<String>,
    pub direction: SyncDirection,
    pub frequency: SyncFrequency,
    pub status: ConfigStatus,
    pub last_sync_at: Option<DateTime<Utc>>,
    /// Start of the currently held run lease, if any.
    pub sync_started_at: Option<DateTime<Utc>>,
    #[serde(skip_serializing)]
    pub credentials: Option<Credentials>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SyncConfiguration {
    /// Fresh, disabled configuration for a user.
    pub fn new(user_id: impl Into<String>, now: DateTime<Utc>) -> Self {
        Self {
            user_id: user_id.into(),
            enabled: false,
            selected_calendar_ids: Vec::new(),
            direction: SyncDirection::default(),
            frequency: SyncFrequency::default(),
            status: ConfigStatus::Idle,
            last_sync_at: None,
            sync_started_at: None,
            credentials: None,
            created_at: now,
            updated_at: now,
        }
    }

    pub fn has_access_token(&self) -> bool {
        self.credentials.as_ref().is_some_and(Credentials::has_access_token)
    }

    /// Whether the scheduler should start a run at `now`. A `syncing` row
    /// whose lease is older than `lease_ttl` is orphaned and counts as due.
    pub fn is_due(&self, now: DateTime<Utc>, lease_ttl: std::time::Duration) -> bool {
        if !self.enabled {
            return false;
        }
        if self.status == ConfigStatus::Syncing {
            let ttl = Duration::from_std(lease_ttl).unwrap_or(Duration::MAX);
            let orphaned = self.sync_started_at.map_or(true, |started| {
                started.checked_add_signed(ttl).is_some_and(|expiry| expiry <= now)
            });
            return orphaned && self.frequency.interval().is_some();
        }
        match (self.frequency.interval(), self.last_sync_at) {
            (None, _) => false,
            (Some(_), None) => true,
            (Some(interval), Some(last)) => last + interval <= now,
        }
    }
}

/// Final status of a single run
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunStatus {
    Success,
    Partial,
    Error,
}

impl RunStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Success => "success",
            Self::Partial => "partial",
            Self::Error => "error",
        }
    }

    /// Configuration status recorded after a run with this outcome.
    pub fn config_status(&self) -> ConfigStatus {
        match self {
            Self::Success => ConfigStatus::Success,
            Self::Partial | Self::Error => ConfigStatus::Error,
        }
    }
}

impl FromStr for RunStatus {
    type Err = CalBridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "success" => Ok(Self::Success),
            "partial" => Ok(Self::Partial),
            "error" => Ok(Self::Error),
            other => Err(CalBridgeError::InvalidInput(format!("unknown run status: {other}"))),
        }
    }
}

/// Error taxonomy surfaced to callers
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncErrorKind {
    TokenError,
    ApiError,
    ValidationError,
}

/// Error collected during a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SyncError {
    pub kind: SyncErrorKind,
    pub message: String,
    /// Task id or external event id the error relates to.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub item_id: Option<String>,
}

impl SyncError {
    pub fn new(kind: SyncErrorKind, message: impl Into<String>, item_id: Option<String>) -> Self {
        Self { kind, message: message.into(), item_id }
    }

    pub fn token(message: impl Into<String>) -> Self {
        Self::new(SyncErrorKind::TokenError, message, None)
    }

    /// Classify a domain error, correlating it with the item being processed.
    pub fn from_error(err: &CalBridgeError, item_id: Option<&str>) -> Self {
        Self::new(err.sync_error_kind(), err.to_string(), item_id.map(str::to_string))
    }
}

/// Aggregated counters of a run
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncResult {
    #[serde(rename = "eventsProcessed")]
    pub processed: u32,
    #[serde(rename = "eventsCreated")]
    pub created: u32,
    #[serde(rename = "eventsUpdated")]
    pub updated: u32,
    #[serde(rename = "eventsDeleted")]
    pub deleted: u32,
    pub errors: Vec<SyncError>,
}

impl SyncResult {
    /// Status of a run that completed without aborting.
    pub fn completed_status(&self) -> RunStatus {
        if self.errors.is_empty() {
            RunStatus::Success
        } else {
            RunStatus::Partial
        }
    }
}

/// Append-only audit entry for one run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncLogEntry {
    pub id: String,
    pub user_id: String,
    pub direction: SyncDirection,
    pub dry_run: bool,
    pub started_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
    /// `None` until the entry is finalized.
    pub status: Option<RunStatus>,
    pub result: SyncResult,
}

impl SyncLogEntry {
    pub fn start(
        user_id: impl Into<String>,
        direction: SyncDirection,
        dry_run: bool,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            direction,
            dry_run,
            started_at: now,
            completed_at: None,
            status: None,
            result: SyncResult::default(),
        }
    }

    pub fn is_finalized(&self) -> bool {
        self.completed_at.is_some()
    }

    pub fn finalize(&mut self, status: RunStatus, result: SyncResult, now: DateTime<Utc>) {
        self.status = Some(status);
        self.result = result;
        self.completed_at = Some(now);
    }
}

/// Ledger binding state
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SyncRecordStatus {
    #[default]
    Synced,
    Error,
}

impl SyncRecordStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Synced => "synced",
            Self::Error => "error",
        }
    }
}

impl FromStr for SyncRecordStatus {
    type Err = CalBridgeError;

    fn from_str(value: &str) -> Result<Self, Self::Err> {
        match value {
            "synced" => Ok(Self::Synced),
            "error" => Ok(Self::Error),
            other => {
                Err(CalBridgeError::InvalidInput(format!("unknown sync record status: {other}")))
            }
        }
    }
}

/// Ledger entry binding an external event to an internal task
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SyncRecord {
    pub id: String,
    pub user_id: String,
    pub external_event_id: String,
    pub task_id: String,
    pub calendar_id: String,
    pub sync_status: SyncRecordStatus,
    pub last_sync_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

impl SyncRecord {
    pub fn new(
        user_id: impl Into<String>,
        external_event_id: impl Into<String>,
        task_id: impl Into<String>,
        calendar_id: impl Into<String>,
        now: DateTime<Utc>,
    ) -> Self {
        Self {
            id: Uuid::now_v7().to_string(),
            user_id: user_id.into(),
            external_event_id: external_event_id.into(),
            task_id: task_id.into(),
            calendar_id: calendar_id.into(),
            sync_status: SyncRecordStatus::Synced,
            last_sync_at: now,
            created_at: now,
        }
    }
}

/// Trigger request contract
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncRequest {
    pub direction: SyncDirection,
    #[serde(alias = "calendarIds")]
    pub calendar_ids: Vec<String>,
    #[serde(alias = "dryRun")]
    pub dry_run: bool,
}

/// Outcome of a run as produced by the orchestrator
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    pub sync_id: String,
    pub status: RunStatus,
    pub result: SyncResult,
    pub dry_run: bool,
}

/// Trigger response contract
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerResponse {
    pub success: bool,
    pub sync_id: String,
    pub result: SyncResult,
    pub dry_run: bool,
}

impl From<SyncReport> for TriggerResponse {
    fn from(report: SyncReport) -> Self {
        Self {
            success: report.status != RunStatus::Error,
            sync_id: report.sync_id,
            result: report.result,
            dry_run: report.dry_run,
        }
    }
}
