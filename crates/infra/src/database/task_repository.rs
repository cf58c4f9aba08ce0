//! Task repository implementation
//!
//! The minimal task store the sync engine reads and writes.

use std::sync::Arc;

use async_trait::async_trait;
use calbridge_core::sync::ports::TaskRepository as TaskRepositoryPort;
use calbridge_domain::{CalBridgeError, Result as DomainResult, Task, TaskStatus, TimeWindow};
use rusqlite::{params, Connection, OptionalExtension, Row};
use tokio::task;

use super::columns::{from_millis, from_opt_millis, opt_millis, parse_text, to_millis};
use super::manager::{map_join_error, map_sql_error, DbManager};

const TASK_COLUMNS: &str = "id, user_id, title, description, start_date, due_date, \
     estimated_minutes, all_day, status, category_id, created_at, updated_at";

/// SQLite-backed task repository
pub struct SqliteTaskRepository {
    db: Arc<DbManager>,
}

impl SqliteTaskRepository {
    pub fn new(db: Arc<DbManager>) -> Self {
        Self { db }
    }
}

#[async_trait]
impl TaskRepositoryPort for SqliteTaskRepository {
    async fn get_task(&self, user_id: &str, task_id: &str) -> DomainResult<Option<Task>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let task_id = task_id.to_string();

        task::spawn_blocking(move || -> DomainResult<Option<Task>> {
            let conn = db.get_connection()?;
            query_task(&conn, &user_id, &task_id).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn insert_task(&self, task: &Task) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let task = task.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            insert_task(&conn, &task).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }

    async fn update_task(&self, task: &Task) -> DomainResult<()> {
        let db = Arc::clone(&self.db);
        let task = task.clone();

        task::spawn_blocking(move || -> DomainResult<()> {
            let conn = db.get_connection()?;
            let changed = update_task(&conn, &task).map_err(map_sql_error)?;
            if changed == 0 {
                return Err(CalBridgeError::NotFound(format!("task {}", task.id)));
            }
            Ok(())
        })
        .await
        .map_err(map_join_error)?
    }

    async fn list_tasks_in_window(
        &self,
        user_id: &str,
        window: &TimeWindow,
    ) -> DomainResult<Vec<Task>> {
        let db = Arc::clone(&self.db);
        let user_id = user_id.to_string();
        let window = *window;

        task::spawn_blocking(move || -> DomainResult<Vec<Task>> {
            let conn = db.get_connection()?;
            query_tasks_in_window(&conn, &user_id, &window).map_err(map_sql_error)
        })
        .await
        .map_err(map_join_error)?
    }
}

// ============================================================================
// SQL helpers
// ============================================================================

fn query_task(conn: &Connection, user_id: &str, task_id: &str) -> rusqlite::Result<Option<Task>> {
    let sql = format!("SELECT {TASK_COLUMNS} FROM tasks WHERE user_id = ?1 AND id = ?2");
    conn.query_row(&sql, params![user_id, task_id], map_task_row).optional()
}

fn insert_task(conn: &Connection, task: &Task) -> rusqlite::Result<()> {
    let sql = format!(
        "INSERT INTO tasks ({TASK_COLUMNS}) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)"
    );
    conn.execute(
        &sql,
        params![
            task.id,
            task.user_id,
            task.title,
            task.description,
            opt_millis(task.start_date),
            opt_millis(task.due_date),
            task.estimated_minutes,
            task.all_day,
            task.status.as_str(),
            task.category_id,
            to_millis(task.created_at),
            to_millis(task.updated_at),
        ],
    )?;
    Ok(())
}

fn update_task(conn: &Connection, task: &Task) -> rusqlite::Result<usize> {
    conn.execute(
        "UPDATE tasks SET title = ?3, description = ?4, start_date = ?5, due_date = ?6,
                estimated_minutes = ?7, all_day = ?8, status = ?9, category_id = ?10,
                updated_at = ?11
         WHERE id = ?1 AND user_id = ?2",
        params![
            task.id,
            task.user_id,
            task.title,
            task.description,
            opt_millis(task.start_date),
            opt_millis(task.due_date),
            task.estimated_minutes,
            task.all_day,
            task.status.as_str(),
            task.category_id,
            to_millis(task.updated_at),
        ],
    )
}

fn query_tasks_in_window(
    conn: &Connection,
    user_id: &str,
    window: &TimeWindow,
) -> rusqlite::Result<Vec<Task>> {
    let sql = format!(
        "SELECT {TASK_COLUMNS} FROM tasks
         WHERE user_id = ?1
           AND COALESCE(due_date, start_date) BETWEEN ?2 AND ?3
         ORDER BY COALESCE(due_date, start_date), id"
    );
    let mut stmt = conn.prepare(&sql)?;
    let rows = stmt.query_map(
        params![user_id, to_millis(window.start), to_millis(window.end)],
        map_task_row,
    )?;
    let tasks = rows.collect::<rusqlite::Result<Vec<_>>>()?;
    Ok(tasks)
}

fn map_task_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    let status: String = row.get(8)?;
    Ok(Task {
        id: row.get(0)?,
        user_id: row.get(1)?,
        title: row.get(2)?,
        description: row.get(3)?,
        start_date: from_opt_millis(4, row.get(4)?)?,
        due_date: from_opt_millis(5, row.get(5)?)?,
        estimated_minutes: row.get(6)?,
        all_day: row.get(7)?,
        status: parse_text::<TaskStatus>(8, &status)?,
        category_id: row.get(9)?,
        created_at: from_millis(10, row.get(10)?)?,
        updated_at: from_millis(11, row.get(11)?)?,
    })
}
