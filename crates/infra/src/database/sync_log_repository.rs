//! Sync log repository implementation
//!
//! Append-only: a row is inserted when a run starts and updated exactly once
//! when it is finalized.

use std::sync::Arc;

use async_trait::async_trait;
use calbridge_core::sync::ports::SyncLogRepository as SyncLogRepositoryPort;
use calbridge_domain::{
    CalBridgeError, Result as DomainResult, RunStatus, SyncDirection, SyncError, SyncLogEntry,
    SyncResult,
};
use chrono::{DateTime, Utc};
use rusqlite::{params, Connection, Row};
use tokio::task;

use super::columns::{from_millis, from_opt_millis, parse_json, parse_text, to_millis};
use super::manager::{map_join_error, map_sql_error, DbManager};
use crate::errors::InfraError;

const LOG_COLUMNS: &str = "id, user_id, direction, dry_run, started_at, completed_at, status, \
     events_processed, events_created, events_updated, events_deleted, errors";

/// SQLite-backed sync log repository
pub struct SqliteSyncLogRepository {
    db: Arc<DbManager>,
}

impl SqliteSyncLogRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl SyncLogRepositoryPort for SqliteSyncLogRepository {
    async fn start_log(&self, entry: &SyncLogEntry) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let entry = entry.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_log(&conn, &entry).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn finalize_log(&self, entry: &SyncLogEntry) -> DomainResult<()> {
        let (Some(status), Some(completed_at)) = (entry.status, entry.completed_at) else {
            return Err(CalBridgeError::InvalidInput(format!(
                "sync log {} has no completion to record",
                entry.id
            )));
        };

        let db = Arc::clone(&self.db);
        let entry = entry.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let errors = serde_json::to_string(&entry.result.errors)
                .map_err(|err| CalBridgeError::from(InfraError::from(err)))?;
            let changed = finalize_log(&conn, &entry, status, completed_at, &errors)
                .map_err(map_sql_error)?;
            if changed == 0 {
                return Err(CalBridgeError::Conflict(format!(
                    "sync log {} is missing or already finalized",
                    entry.id
                )));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn recent_logs(&self, user_id: &str, limit: usize) -> DomainResult<Vec<SyncLogEntry>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        task::spawn_blocking(move || -> DomainResult<Vec<SyncLogEntry>> {
            let conn = db.get_connection()?;
            query_recent(&conn, &user_id, limit).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL helpers
// ============================================================================

fn insert_log(conn: &Connection, entry: &SyncLogEntry) -> rusqlite::Result<()> {
    conn.execute(
        "INSERT INTO sync_logs (id, user_id, direction, dry_run, started_at)
         VALUES (?1, ?2, ?3, ?4, ?5)",
        params![
            entry.id,
            entry.user_id,
            entry.direction.as_str(),
            entry.dry_run,
            to_millis(entry.started_at),
        ],
    )?;
    Ok(())
}

fn finalize_log(
    conn: &Connection,
    entry: &SyncLogEntry,
    status: RunStatus,
    completed_at: DateTime<Utc>,
    errors: &str,
) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE sync_logs
         SET completed_at = ?2, status = ?3, events_processed = ?4, events_created = ?5,
             events_updated = ?6, events_deleted = ?7, errors = ?8
         WHERE id = ?1 AND completed_at IS NULL",
        params![
            entry.id,
            to_millis(completed_at),
            status.as_str(),
            entry.result.processed,
            entry.result.created,
            entry.result.updated,
            entry.result.deleted,
            errors,
        ],
    )
}

fn query_recent(
    conn: &Connection,
    user_id: &str,
    limit: i64,
) -> rusqlite::Result<Vec<SyncLogEntry>> {
    let sql = format!(
        "SELECT {LOG_COLUMNS} FROM sync_logs
         WHERE user_id = ?1
         ORDER BY started_at DESC, id DESC
         LIMIT ?2"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(params![user_id, limit], map_log_row)?;
    let entries = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(entries)
}

fn map_log_row(row: &Row<'_>) -> rusqlite::Result<SyncLogEntry> {
    let direction: String = row.get(2)?;
    let status: Option<String> = row.get(6)?;
    let errors: String = row.get(11)?;

    Ok(SyncLogEntry {
        id: row.get(0)?,
        user_id: row.get(1)?,
        direction: parse_text::<SyncDirection>(2, &direction)?,
        dry_run: row.get(3)?,
        started_at: from_millis(4, row.get(4)?)?,
        completed_at: from_opt_millis(5, row.get(5)?)?,
        status: status.as_deref().map(|value| parse_text::<RunStatus>(6, value)).transpose()?,
        result: SyncResult {
            processed: row.get(7)?,
            created: row.get(8)?,
            updated: row.get(9)?,
            deleted: row.get(10)?,
            errors: parse_json::<Vec<SyncError>>(11, &errors)?,
        },
    })
}

#[cfg(test)]
mod tests {
    use chrono::{Duration, TimeZone};
    use tempfile::TempDir;

    use super::*;

    fn setup_repository() -> (SqliteSyncLogRepository, TempDir) {
        let temp_dir = TempDir::new().expect("temp dir");
        let db = Arc::new(DbManager::new(temp_dir.path().join("logs.db"), 2).expect("db"));
        db.run_migrations().expect("migrations");
        (SqliteSyncLogRepository::new(db), temp_dir)
    }

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 5, 14, 9, 0, 0).unwrap()
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn started_entry_is_listed_unfinalized() {
        let (repo, _dir) = setup_repository();
        let entry = SyncLogEntry::start("user-1", SyncDirection::Import, true, now());

        repo.start_log(&entry).await.unwrap();

        let logs = repo.recent_logs("user-1", 10).await.unwrap();
        assert_eq!(logs, vec![entry]);
        assert!(!logs[0].is_finalized());
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn finalize_records_result_once() {
        let (repo, _dir) = setup_repository();
        let mut entry = SyncLogEntry::start("user-1", SyncDirection::Bidirectional, false, now());
        repo.start_log(&entry).await.unwrap();

        let result = SyncResult {
            processed: 5,
            created: 4,
            updated: 0,
            deleted: 0,
            errors: vec![SyncError::from_error(
                &CalBridgeError::Network("HTTP 503".into()),
                Some("evt-2"),
            )],
        };
        entry.finalize(RunStatus::Partial, result.clone(), now() + Duration::seconds(3));
        repo.finalize_log(&entry).await.unwrap();

        let stored = repo.recent_logs("user-1", 1).await.unwrap().remove(0);
        assert_eq!(stored.status, Some(RunStatus::Partial));
        assert_eq!(stored.result, result);

        let mut again = entry.clone();
        again.finalize(RunStatus::Success, SyncResult::default(), now() + Duration::seconds(9));
        let err = repo.finalize_log(&again).await.unwrap_err();
        assert!(matches!(err, CalBridgeError::Conflict(_)));

        let unchanged = repo.recent_logs("user-1", 1).await.unwrap().remove(0);
        assert_eq!(unchanged.status, Some(RunStatus::Partial));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn finalize_without_completion_is_rejected() {
        let (repo, _dir) = setup_repository();
        let entry = SyncLogEntry::start("user-1", SyncDirection::Export, false, now());
        repo.start_log(&entry).await.unwrap();

        let err = repo.finalize_log(&entry).await.unwrap_err();
        assert!(matches!(err, CalBridgeError::InvalidInput(_)));
    }

    #[tokio::test(flavor = "multi_thread")]
    async fn recent_logs_are_newest_first_and_scoped_to_user() {
        let (repo, _dir) = setup_repository();
        for offset in 0..3 {
            let entry = SyncLogEntry::start(
                "user-1",
                SyncDirection::Import,
                false,
                now() + Duration::minutes(offset),
            );
            repo.start_log(&entry).await.unwrap();
        }
        repo.start_log(&SyncLogEntry::start("user-2", SyncDirection::Import, false, now()))
            .await
            .unwrap();

        let logs = repo.recent_logs("user-1", 2).await.unwrap();
        assert_eq!(logs.len(), 2);
        assert_eq!(logs[0].started_at, now() + Duration::minutes(2));
        assert_eq!(logs[1].started_at, now() + Duration::minutes(1));
    }
}
