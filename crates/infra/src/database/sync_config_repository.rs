//! Sync configuration repository implementation
//!
//! One row per user. The row also carries the run lease (`status = 'syncing'`
//! plus `sync_started_at`), which is acquired with a single conditional
//! UPDATE so concurrent triggers cannot both win. Settings writes never
//! touch those columns on an existing row.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use calbridge_core::sync::ports::SyncConfigRepository as SyncConfigRepositoryPort;
use calbridge_domain::{
    CalBridgeError, ConfigStatus, Credentials, Result as DomainResult, SyncConfiguration,
    SyncDirection, SyncFrequency,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use super::columns::{
    from_millis, from_opt_millis, opt_millis, parse_json, parse_text, to_millis,
};
use super::manager::{map_join_error, map_sql_error, DbManager};
use crate::errors::InfraError;

const CONFIG_COLUMNS: &str = "user_id, enabled, selected_calendar_ids, direction, frequency, \
     status, last_sync_at, sync_started_at, access_token, refresh_token, token_expires_at, \
     created_at, updated_at";

/// SQLite-backed sync configuration repository
pub struct SqliteSyncConfigRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncConfigRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncConfigRepositoryPort for SqliteSyncConfigRepository {
    async fn get_config(&self, user_id: &str) -> DomainResult<Option<SyncConfiguration>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<SyncConfiguration>> {
            let conn = db.get_connection()?;
            query_config(&conn, &user_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save_settings(&self, config: &SyncConfiguration) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let config = config.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let selected = serde_json::to_string(&config.selected_calendar_ids)
                .map_err(|err| CalBridgeError::from(InfraError::from(err)))?;
            upsert_settings(&conn, &config, &selected).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn save_credentials(
        &self,
        user_id: &str,
        credentials: &Credentials,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let credentials = credentials.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed =
                update_credentials(&conn, &user_id, &credentials, now).map_err(map_sql_error)?;
            if changed == 0 {
                return Err(CalBridgeError::NotFound(format!("sync configuration for {user_id}")));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn try_begin_run(
        &self,
        user_id: &str,
        now: DateTime<Utc>,
        lease_ttl: Duration,
    ) -> DomainResult<bool> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let lease_millis = i64::try_from(lease_ttl.as_millis()).unwrap_or(i64::MAX);

        task::spawn_blocking(move || -> DomainResult<bool> {
            let conn = db.get_connection()?;
            acquire_lease(&conn, &user_id, now, lease_millis).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn finish_run(
        &self,
        user_id: &str,
        status: ConfigStatus,
        completed_at: DateTime<Utc>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            release_lease(&conn, &user_id, status, completed_at).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_enabled(&self) -> DomainResult<Vec<SyncConfiguration>> {
        let db = Arc::clone(&self.db);

        task::spawn_blocking(move || -> DomainResult<Vec<SyncConfiguration>> {
            let conn = db.get_connection()?;
            query_enabled(&conn).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL helpers
// ============================================================================

fn query_config(conn: &Connection, user_id: &str) -> rusqlite::Result<Option<SyncConfiguration>> {
    let sql = format!("SELECT {CONFIG_COLUMNS} FROM sync_configurations WHERE user_id = ?1");
    conn.query_row(&sql, params![user_id], map_config_row).optional()
}

fn query_enabled(conn: &Connection) -> rusqlite::Result<Vec<SyncConfiguration>> {
    let sql = format!(
        "SELECT {CONFIG_COLUMNS} FROM sync_configurations WHERE enabled = 1 ORDER BY user_id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map([], map_config_row)?;
    let configs = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(configs)
}

/// Run state columns are written on insert only.
fn upsert_settings(
    conn: &Connection,
    config: &SyncConfiguration,
    selected_calendar_ids: &str,
) -> rusqlite::Result<()> {
    let credentials = config.credentials.as_ref();
    conn.execute(
        "INSERT INTO sync_configurations (
            user_id, enabled, selected_calendar_ids, direction, frequency, status,
            last_sync_at, sync_started_at, access_token, refresh_token, token_expires_at,
            created_at, updated_at
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12, ?13)
         ON CONFLICT(user_id) DO UPDATE SET
            enabled = excluded.enabled,
            selected_calendar_ids = excluded.selected_calendar_ids,
            direction = excluded.direction,
            frequency = excluded.frequency,
            access_token = excluded.access_token,
            refresh_token = excluded.refresh_token,
            token_expires_at = excluded.token_expires_at,
            updated_at = excluded.updated_at",
        params![
            config.user_id,
            config.enabled,
            selected_calendar_ids,
            config.direction.as_str(),
            config.frequency.as_str(),
            config.status.as_str(),
            opt_millis(config.last_sync_at),
            opt_millis(config.sync_started_at),
            credentials.map(|c| c.access_token.as_str()),
            credentials.and_then(|c| c.refresh_token.as_deref()),
            credentials.and_then(|c| opt_millis(c.expires_at)),
            to_millis(config.created_at),
            to_millis(config.updated_at),
        ],
    )?;
    Ok(())
}

fn update_credentials(
    conn: &Connection,
    user_id: &str,
    credentials: &Credentials,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sync_configurations
         SET access_token = ?2, refresh_token = ?3, token_expires_at = ?4, updated_at = ?5
         WHERE user_id = ?1",
        params![
            user_id,
            credentials.access_token,
            credentials.refresh_token,
            opt_millis(credentials.expires_at),
            to_millis(now),
        ],
    )
}

fn acquire_lease(
    conn: &Connection,
    user_id: &str,
    now: DateTime<Utc>,
    lease_millis: i64,
) -> rusqlite::Result<bool> {
    let now_millis = to_millis(now);
    let changed = conn.execute(
        "UPDATE sync_configurations
         SET status = 'syncing', sync_started_at = ?2, updated_at = ?2
         WHERE user_id = ?1
           AND enabled = 1
           AND (status <> 'syncing'
                OR sync_started_at IS NULL
                OR sync_started_at <= ?2 - ?3)",
        params![user_id, now_millis, lease_millis],
    )?;
    Ok(changed == 1)
}

fn release_lease(
    conn: &Connection,
    user_id: &str,
    status: ConfigStatus,
    completed_at: DateTime<Utc>,
) -> rusqlite::Result<()> {
    let completed = to_millis(completed_at);
    conn.execute(
        "UPDATE sync_configurations
         SET status = ?2, sync_started_at = NULL, last_sync_at = ?3, updated_at = ?3
         WHERE user_id = ?1",
        params![user_id, status.as_str(), completed],
    )?;
    Ok(())
}

fn map_config_row(row: &Row<'_>) -> rusqlite::Result<SyncConfiguration> {
    let selected: String = row.get(2)?;
    let direction: String = row.get(3)?;
    let frequency: String = row.get(4)?;
    let status: String = row.get(5)?;
    let access_token: Option<String> = row.get(8)?;

    let credentials = match access_token {
        Some(access_token) => Some(Credentials {
            access_token,
            refresh_token: row.get(9)?,
            expires_at: from_opt_millis(10, row.get(10)?)?,
        }),
        None => None,
    };

    Ok(SyncConfiguration {
        user_id: row.get(0)?,
        enabled: row.get(1)?,
        selected_calendar_ids: parse_json(2, &selected)?,
        direction: parse_text::<SyncDirection>(3, &direction)?,
        frequency: parse_text::<SyncFrequency>(4, &frequency)?,
        status: parse_text::<ConfigStatus>(5, &status)?,
        last_sync_at: from_opt_millis(6, row.get(6)?)?,
        sync_started_at: from_opt_millis(7, row.get(7)?)?,
        credentials,
        created_at: from_millis(11, row.get(11)?)?,
        updated_at: from_millis(12, row.get(12)?)?,
    })
}
