//! Sync record (ledger) repository implementation
//!
//! Binds external event ids to task ids. Uniqueness of both sides of the
//! binding is enforced by the table constraints; violations surface as
//! `CalBridgeError::Conflict`.

use std::sync::Arc;

use async_trait::async_trait;
use calbridge_core::sync::ports::SyncRecordRepository as SyncRecordRepositoryPort;
use calbridge_domain::{CalBridgeError, Result as DomainResult, SyncRecord, SyncRecordStatus};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use super::columns::{from_millis, parse_text, to_millis};
use super::manager::{map_join_error, map_sql_error, DbManager};

const RECORD_COLUMNS: &str =
    "id, user_id, external_event_id, task_id, calendar_id, sync_status, last_sync_at, created_at";

/// SQLite-backed sync record repository
pub struct SqliteSyncRecordRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncRecordRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncRecordRepositoryPort for SqliteSyncRecordRepository {
    async fn find_by_external_id(
        &self,
        user_id: &str,
        external_event_id: &str,
    ) -> DomainResult<Option<SyncRecord>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let external_event_id = external_event_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<SyncRecord>> {
            let conn = db.get_connection()?;
            query_by_external_id(&conn, &user_id, &external_event_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn find_by_task_id(
        &self,
        user_id: &str,
        task_id: &str,
    ) -> DomainResult<Option<SyncRecord>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let task_id = task_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<SyncRecord>> {
            let conn = db.get_connection()?;
            query_by_task_id(&conn, &user_id, &task_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn insert_record(&self, record: &SyncRecord) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let record = record.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_record(&conn, &record).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn touch_record(&self, record_id: &str, now: DateTime<Utc>) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let record_id = record_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = touch_record(&conn, &record_id, now).map_err(map_sql_error)?;
            ensure_changed(changed, &record_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn mark_record_error(&self, record_id: &str) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let record_id = record_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = conn
                .execute(
                    "UPDATE sync_records SET sync_status = ?2 WHERE id = ?1",
                    params![record_id, SyncRecordStatus::Error.as_str()],
                )
                .map_err(map_sql_error)?;
            ensure_changed(changed, &record_id)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn repoint_record(
        &self,
        record_id: &str,
        external_event_id: &str,
        now: DateTime<Utc>,
    ) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let record_id = record_id.to_string();
        let external_event_id = external_event_id.to_string();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = repoint_record(&conn, &record_id, &external_event_id, now)
                .map_err(map_sql_error)?;
            ensure_changed(changed, &record_id)
        })
        .await
        .map_err(map_join_error)?
    }
}

fn ensure_changed(changed: usize, record_id: &str) -> DomainResult<()> {
    if changed == 0 {
        return Err(CalBridgeError::NotFound(format!("sync record {record_id}")));
    }
    Ok(())
}

// ============================================================================
// SQL helpers
// ============================================================================

fn query_by_external_id(
    conn: &Connection,
    user_id: &str,
    external_event_id: &str,
) -> rusqlite::Result<Option<SyncRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM sync_records WHERE user_id = ?1 AND external_event_id = ?2"
    );
    conn.query_row(&sql, params![user_id, external_event_id], map_record_row).optional()
}

fn query_by_task_id(
    conn: &Connection,
    user_id: &str,
    task_id: &str,
) -> rusqlite::Result<Option<SyncRecord>> {
    let sql = format!(
        "SELECT {RECORD_COLUMNS} FROM sync_records
         WHERE user_id = ?1 AND task_id = ?2
         ORDER BY last_sync_at DESC, id DESC
         LIMIT 1"
    );
    conn.query_row(&sql, params![user_id, task_id], map_record_row).optional()
}

fn insert_record(conn: &Connection, record: &SyncRecord) -> rusqlite::Result<()> {
    let sql = format!("INSERT INTO sync_records ({RECORD_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)");
    conn.execute(
        &sql,
        params![
            record.id,
            record.user_id,
            record.external_event_id,
            record.task_id,
            record.calendar_id,
            record.sync_status.as_str(),
            to_millis(record.last_sync_at),
            to_millis(record.created_at),
        ],
    )?;
    Ok(())
}

fn touch_record(conn: &Connection, record_id: &str, now: DateTime<Utc>) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sync_records SET last_sync_at = ?2, sync_status = 'synced' WHERE id = ?1",
        params![record_id, to_millis(now)],
    )
}

fn repoint_record(
    conn: &Connection,
    record_id: &str,
    external_event_id: &str,
    now: DateTime<Utc>,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sync_records
         SET external_event_id = ?2, last_sync_at = ?3, sync_status = 'synced'
         WHERE id = ?1",
        params![record_id, external_event_id, to_millis(now)],
    )
}

fn map_record_row(row: &Row<'_>) -> rusqlite::Result<SyncRecord> {
    let status: String = row.get(5)?;
    Ok(SyncRecord {
        id: row.get(0)?,
        user_id: row.get(1)?,
        external_event_id: row.get(2)?,
        task_id: row.get(3)?,
        calendar_id: row.get(4)?,
        sync_status: parse_text::<SyncRecordStatus>(5, &status)?,
        last_sync_at: from_millis(6, row.get(6)?)?,
        created_at: from_millis(7, row.get(7)?)?,
    })
}
