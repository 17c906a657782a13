//! SQLite task store.

use std::path::Path;

use async_trait::async_trait;
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension, Row};
use tracing::info;

use super::{
    ConnectionPool, NewTask, PoolOptions, PoolStats, PoolStatsSource, StoreError, Task,
    TaskCounter, TaskFilter, TaskStore,
};

const SCHEMA: &str = "
CREATE TABLE IF NOT EXISTS tasks (
    id          INTEGER PRIMARY KEY AUTOINCREMENT,
    title       TEXT    NOT NULL,
    completed   INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT    NOT NULL,
    updated_at  TEXT    NOT NULL
);
CREATE INDEX IF NOT EXISTS idx_tasks_completed ON tasks (completed);
";

const SELECT_COLUMNS: &str = "SELECT id, title, completed, created_at, updated_at FROM tasks";

/// Task store over a pooled SQLite database.
#[derive(Clone)]
pub struct SqliteTaskStore {
    pool: ConnectionPool,
}

impl SqliteTaskStore {
    /// Opens the database at `path` and applies the schema.
    pub async fn open(path: impl AsRef<Path>, options: PoolOptions) -> Result<Self, StoreError> {
        let pool = ConnectionPool::open(path.as_ref(), options)?;
        pool.with_connection(|conn| Ok(conn.execute_batch(SCHEMA)?))
            .await?;
        info!(
            path = %path.as_ref().display(),
            max_open = options.max_open,
            max_idle = options.max_idle,
            "Task store ready"
        );
        Ok(Self { pool })
    }

    /// The underlying connection pool.
    #[must_use]
    pub fn pool(&self) -> &ConnectionPool {
        &self.pool
    }
}

fn task_from_row(row: &Row<'_>) -> rusqlite::Result<Task> {
    Ok(Task {
        id: row.get(0)?,
        title: row.get(1)?,
        completed: row.get(2)?,
        created_at: row.get(3)?,
        updated_at: row.get(4)?,
    })
}

fn find_by_id(conn: &Connection, id: i64) -> Result<Task, StoreError> {
    conn.query_row(
        &format!("{SELECT_COLUMNS} WHERE id = ?1"),
        params![id],
        task_from_row,
    )
    .optional()?
    .ok_or(StoreError::NotFound(id))
}

#[async_trait]
impl TaskCounter for SqliteTaskStore {
    async fn count(&self, filter: TaskFilter) -> Result<u64, StoreError> {
        self.pool
            .with_connection(move |conn| {
                let sql = match filter {
                    TaskFilter::All => "SELECT COUNT(*) FROM tasks",
                    TaskFilter::Completed => "SELECT COUNT(*) FROM tasks WHERE completed = 1",
                };
                let count: i64 = conn.query_row(sql, [], |row| row.get(0))?;
                Ok(u64::try_from(count).unwrap_or(0))
            })
            .await
    }
}

impl PoolStatsSource for SqliteTaskStore {
    fn pool_stats(&self) -> PoolStats {
        self.pool.stats()
    }
}

#[async_trait]
impl TaskStore for SqliteTaskStore {
    async fn list(&self) -> Result<Vec<Task>, StoreError> {
        self.pool
            .with_connection(|conn| {
                let mut stmt =
                    conn.prepare(&format!("{SELECT_COLUMNS} ORDER BY created_at DESC, id DESC"))?;
                let tasks = stmt
                    .query_map([], task_from_row)?
                    .collect::<rusqlite::Result<Vec<_>>>()?;
                Ok(tasks)
            })
            .await
    }

    async fn create(&self, task: NewTask) -> Result<Task, StoreError> {
        self.pool
            .with_connection(move |conn| {
                let now = Utc::now();
                conn.execute(
                    "INSERT INTO tasks (title, completed, created_at, updated_at) \
                     VALUES (?1, ?2, ?3, ?3)",
                    params![task.title, task.completed, now],
                )?;
                Ok(Task {
                    id: conn.last_insert_rowid(),
                    title: task.title,
                    completed: task.completed,
                    created_at: now,
                    updated_at: now,
                })
            })
            .await
    }

    async fn find(&self, id: i64) -> Result<Task, StoreError> {
        self.pool
            .with_connection(move |conn| find_by_id(conn, id))
            .await
    }

    async fn save(&self, mut task: Task) -> Result<Task, StoreError> {
        self.pool
            .with_connection(move |conn| {
                task.updated_at = Utc::now();
                let changed = conn.execute(
                    "UPDATE tasks SET title = ?1, completed = ?2, updated_at = ?3 WHERE id = ?4",
                    params![task.title, task.completed, task.updated_at, task.id],
                )?;
                if changed == 0 {
                    return Err(StoreError::NotFound(task.id));
                }
                Ok(task)
            })
            .await
    }

    async fn delete(&self, id: i64) -> Result<(), StoreError> {
        self.pool
            .with_connection(move |conn| {
                conn.execute("DELETE FROM tasks WHERE id = ?1", params![id])?;
                Ok(())
            })
            .await
    }

    async fn delete_all(&self) -> Result<u64, StoreError> {
        self.pool
            .with_connection(|conn| {
                let removed = conn.execute("DELETE FROM tasks", [])?;
                Ok(removed as u64)
            })
            .await
    }
}
