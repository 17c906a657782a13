//! Bounded SQLite connection pool.
//!
//! Check-outs are limited by a semaphore sized to `max_open`. Returned
//! connections are kept for reuse up to `max_idle`, and connections older
//! than `max_lifetime` are closed rather than handed out again. Queries run on
//! Tokio's blocking pool.

use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Instant;

use parking_lot::Mutex;
use rusqlite::Connection;
use serde::Serialize;
use tokio::sync::Semaphore;
use tracing::debug;

use super::{PoolOptions, StoreError};

/// Point-in-time pool snapshot.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct PoolStats {
    /// Open connections (idle plus in use)
    pub open: usize,
    /// Connections waiting for reuse
    pub idle: usize,
    /// Connections currently checked out
    pub in_use: usize,
    /// Configured capacity
    pub max_open: usize,
}

struct PooledConnection {
    conn: Connection,
    opened_at: Instant,
}

struct PoolInner {
    path: PathBuf,
    options: PoolOptions,
    permits: Arc<Semaphore>,
    idle: Mutex<Vec<PooledConnection>>,
    in_use: AtomicUsize,
}

/// A bounded pool of SQLite connections to one database file.
#[derive(Clone)]
pub struct ConnectionPool {
    inner: Arc<PoolInner>,
}

impl ConnectionPool {
    /// Opens the pool and verifies the database can be opened.
    pub fn open(path: impl AsRef<Path>, options: PoolOptions) -> Result<Self, StoreError> {
        if options.max_open == 0 {
            return Err(StoreError::Pool("max_open must be greater than 0".to_string()));
        }

        let inner = PoolInner {
            path: path.as_ref().to_path_buf(),
            options,
            permits: Arc::new(Semaphore::new(options.max_open)),
            idle: Mutex::new(Vec::with_capacity(options.max_idle)),
            in_use: AtomicUsize::new(0),
        };

        let first = inner.connect()?;
        if options.max_idle > 0 {
            inner.idle.lock().push(first);
        }

        Ok(Self {
            inner: Arc::new(inner),
        })
    }

    /// Runs `work` with a checked-out connection on the blocking pool.
    pub async fn with_connection<T, F>(&self, work: F) -> Result<T, StoreError>
    where
        F: FnOnce(&mut Connection) -> Result<T, StoreError> + Send + 'static,
        T: Send + 'static,
    {
        let permit = self
            .inner
            .permits
            .clone()
            .acquire_owned()
            .await
            .map_err(|_| StoreError::Pool("pool is closed".to_string()))?;
        let inner = Arc::clone(&self.inner);

        tokio::task::spawn_blocking(move || {
            let _permit = permit;
            let mut lease = Lease::checkout(inner)?;
            work(lease.connection()?)
        })
        .await
        .map_err(|e| StoreError::Join(e.to_string()))?
    }

    /// Current pool statistics.
    #[must_use]
    pub fn stats(&self) -> PoolStats {
        // Checkout and release move counts under the idle lock.
        let idle_list = self.inner.idle.lock();
        let idle = idle_list.len();
        let in_use = self.inner.in_use.load(Ordering::Acquire);
        drop(idle_list);
        PoolStats {
            open: idle + in_use,
            idle,
            in_use,
            max_open: self.inner.options.max_open,
        }
    }
}

impl PoolInner {
    fn connect(&self) -> Result<PooledConnection, StoreError> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        conn.pragma_update(None, "foreign_keys", "ON")?;
        debug!(path = %self.path.display(), "Opened database connection");
        Ok(PooledConnection {
            conn,
            opened_at: Instant::now(),
        })
    }

    fn is_expired(&self, pooled: &PooledConnection) -> bool {
        pooled.opened_at.elapsed() >= self.options.max_lifetime
    }
}

/// A checked-out connection; returned to the idle list on drop.
struct Lease {
    inner: Arc<PoolInner>,
    pooled: Option<PooledConnection>,
}

impl Lease {
    fn checkout(inner: Arc<PoolInner>) -> Result<Self, StoreError> {
        let reused = {
            let mut idle = inner.idle.lock();
            let mut found = None;
            while let Some(candidate) = idle.pop() {
                if !inner.is_expired(&candidate) {
                    found = Some(candidate);
                    break;
                }
            }
            if found.is_some() {
                inner.in_use.fetch_add(1, Ordering::AcqRel);
            }
            found
        };

        let pooled = match reused {
            Some(pooled) => pooled,
            None => {
                let pooled = inner.connect()?;
                inner.in_use.fetch_add(1, Ordering::AcqRel);
                pooled
            }
        };

        Ok(Self {
            inner,
            pooled: Some(pooled),
        })
    }

    fn connection(&mut self) -> Result<&mut Connection, StoreError> {
        self.pooled
            .as_mut()
            .map(|pooled| &mut pooled.conn)
            .ok_or_else(|| StoreError::Pool("connection already released".to_string()))
    }
}

impl Drop for Lease {
    fn drop(&mut self) {
        let Some(pooled) = self.pooled.take() else {
            return;
        };

        let mut idle = self.inner.idle.lock();
        self.inner.in_use.fetch_sub(1, Ordering::AcqRel);
        if idle.len() < self.inner.options.max_idle && !self.inner.is_expired(&pooled) {
            idle.push(pooled);
        }
    }
}
