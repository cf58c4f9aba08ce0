//! Application constants
//!
//! Centralized location for all domain-level constants used throughout the
//! application.

// Sync windows (relative to "now" at the start of a pass)
pub const IMPORT_WINDOW_BACK_MONTHS: u32 = 1;
pub const IMPORT_WINDOW_AHEAD_MONTHS: u32 = 3;
pub const EXPORT_WINDOW_BACK_DAYS: i64 = 7;
pub const EXPORT_WINDOW_AHEAD_MONTHS: u32 = 1;

// Configuration limits
pub const MAX_SELECTED_CALENDARS: usize = 10;
pub const DEFAULT_SYNC_LEASE_SECS: u64 = 30 * 60;

// Calendar list cache
pub const CALENDAR_LIST_TTL_SECS: u64 = 600;
pub const CALENDAR_LIST_MAX_CAPACITY: u64 = 10_000;

// Provenance marker (private extended properties)
pub const ORIGIN_SYSTEM: &str = "calbridge";
pub const PROVENANCE_ORIGIN_KEY: &str = "calbridge_origin";
pub const PROVENANCE_INTERNAL_KEY: &str = "calbridge_internal";
pub const PROVENANCE_TASK_ID_KEY: &str = "calbridge_task_id";

// Task → event mapping defaults
pub const DEFAULT_TASK_DURATION_MINUTES: i64 = 30;
pub const UNTITLED_EVENT_TITLE: &str = "(No title)";
pub const PRIMARY_CALENDAR_ALIAS: &str = "primary";
