//! Task Persistence
//!
//! The task record model, the storage traits consumed by the HTTP handlers
//! and samplers, and the SQLite implementation behind a bounded connection
//! pool.

mod pool;
mod sqlite;

use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

pub use pool::{ConnectionPool, PoolStats};
pub use sqlite::SqliteTaskStore;

/// Storage errors.
#[non_exhaustive]
#[derive(Error, Debug)]
pub enum StoreError {
    /// No task with the requested id
    #[error("Task not found: {0}")]
    NotFound(i64),

    /// SQLite reported an error
    #[error("Database error: {0}")]
    Database(#[from] rusqlite::Error),

    /// The connection pool is closed or misconfigured
    #[error("Connection pool error: {0}")]
    Pool(String),

    /// The blocking worker running the query failed
    #[error("Blocking task failed: {0}")]
    Join(String),
}

/// A task record.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    /// Row id
    pub id: i64,
    /// Title, 1 to 200 characters
    pub title: String,
    /// Completion flag
    pub completed: bool,
    /// Creation time
    pub created_at: DateTime<Utc>,
    /// Last modification time
    pub updated_at: DateTime<Utc>,
}

/// Fields of a task that does not exist yet.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewTask {
    /// Title
    pub title: String,
    /// Completion flag
    pub completed: bool,
}

impl NewTask {
    /// An open task with the given title.
    #[must_use]
    pub fn open(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            completed: false,
        }
    }
}

/// Predicate for task counts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskFilter {
    /// Every task
    All,
    /// Tasks with `completed = true`
    Completed,
}

/// Connection pool limits.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PoolOptions {
    /// Maximum simultaneously open connections
    pub max_open: usize,
    /// Maximum idle connections retained
    pub max_idle: usize,
    /// Connections older than this are closed instead of reused
    pub max_lifetime: Duration,
}

impl Default for PoolOptions {
    fn default() -> Self {
        Self {
            max_open: 20,
            max_idle: 5,
            max_lifetime: Duration::from_secs(3600),
        }
    }
}

/// Counting queries used by the domain sampler.
#[async_trait]
pub trait TaskCounter: Send + Sync {
    /// Number of tasks matching `filter`.
    async fn count(&self, filter: TaskFilter) -> Result<u64, StoreError>;
}

/// Source of connection pool statistics.
pub trait PoolStatsSource: Send + Sync {
    /// Current pool snapshot.
    fn pool_stats(&self) -> PoolStats;
}

/// Task persistence.
#[async_trait]
pub trait TaskStore: TaskCounter + PoolStatsSource {
    /// All tasks, newest first.
    async fn list(&self) -> Result<Vec<Task>, StoreError>;

    /// Inserts a task and returns the stored record.
    async fn create(&self, task: NewTask) -> Result<Task, StoreError>;

    /// Loads one task.
    async fn find(&self, id: i64) -> Result<Task, StoreError>;

    /// Persists title and completion of an existing task.
    async fn save(&self, task: Task) -> Result<Task, StoreError>;

    /// Deletes one task. Deleting a missing id is not an error.
    async fn delete(&self, id: i64) -> Result<(), StoreError>;

    /// Deletes every task and returns how many were removed.
    async fn delete_all(&self) -> Result<u64, StoreError>;
}
