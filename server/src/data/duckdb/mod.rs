//! DuckDB span store
//!
//! One shared connection behind a mutex. Queries run on the blocking pool with a
//! timeout; schema and migrations are managed here.

pub mod error;
mod migrations;
pub mod render;
mod repository_impl;
pub mod schema;
#[cfg(test)]
pub(crate) mod seed;
pub mod sql_types;

pub use error::DuckdbError;

use std::sync::Arc;
use std::time::Duration;

use duckdb::Connection;
use parking_lot::{MappedMutexGuard, Mutex, MutexGuard};
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::core::constants::{
    DUCKDB_CHECKPOINT_INTERVAL_SECS, DUCKDB_DB_FILENAME, DUCKDB_QUERY_TIMEOUT_SECS,
};
use crate::core::storage::{AppStorage, DataSubdir};
use crate::data::traits::SpanIndexRepository;

/// Session settings applied to every connection. Extensions are never fetched at runtime;
/// `json` ships with the bundled build.
const SESSION_SETUP: &str = "SET autoinstall_known_extensions = false;
     SET autoload_known_extensions = false;
     SET extension_directory = '';
     PRAGMA enable_checkpoint_on_shutdown;
     LOAD json;";

pub struct DuckdbService {
    /// `None` once closed
    conn: Mutex<Option<Connection>>,
}

impl Drop for DuckdbService {
    fn drop(&mut self) {
        if let Some(conn) = self.conn.get_mut().take()
            && let Err((_, e)) = conn.close()
        {
            tracing::warn!(error = %e, "DuckDB close failed during drop");
        }
    }
}

impl DuckdbService {
    /// Open (or create) the span database and bring its schema up to date
    pub async fn init(storage: &AppStorage) -> Result<Self, DuckdbError> {
        let db_path = storage.subdir(DataSubdir::Duckdb).join(DUCKDB_DB_FILENAME);
        tracing::debug!(path = %db_path.display(), "Opening DuckDB");

        let conn = blocking(move || {
            let conn = Connection::open(&db_path)?;
            conn.execute_batch(SESSION_SETUP)?;
            migrations::run_migrations(&conn)?;
            Ok(conn)
        })
        .await?;

        Ok(Self {
            conn: Mutex::new(Some(conn)),
        })
    }

    /// Exclusive access to the connection.
    ///
    /// # Panics
    /// After `close()`.
    pub fn conn(&self) -> MappedMutexGuard<'_, Connection> {
        MutexGuard::map(self.conn.lock(), |opt| {
            opt.as_mut().expect("DuckDB connection used after close()")
        })
    }

    #[cfg(test)]
    pub fn is_open(&self) -> bool {
        self.conn.lock().is_some()
    }

    /// Run blocking work on the blocking pool, bounded by the query timeout
    pub async fn run_query<T, F>(f: F) -> Result<T, DuckdbError>
    where
        T: Send + 'static,
        F: FnOnce() -> T + Send + 'static,
    {
        let timeout = Duration::from_secs(DUCKDB_QUERY_TIMEOUT_SECS);
        match tokio::time::timeout(timeout, tokio::task::spawn_blocking(f)).await {
            Ok(Ok(value)) => Ok(value),
            Ok(Err(e)) => {
                tracing::error!(error = %e, "DuckDB query task failed");
                Err(DuckdbError::Io(std::io::Error::other(e)))
            }
            Err(_) => {
                tracing::warn!(
                    timeout_secs = DUCKDB_QUERY_TIMEOUT_SECS,
                    "DuckDB query timed out"
                );
                Err(DuckdbError::Timeout {
                    timeout_secs: DUCKDB_QUERY_TIMEOUT_SECS,
                })
            }
        }
    }

    /// Flush the WAL into the database file. No-op once closed.
    pub async fn checkpoint(self: &Arc<Self>) -> Result<(), DuckdbError> {
        let db = Arc::clone(self);
        blocking(move || {
            if let Some(conn) = db.conn.lock().as_ref() {
                conn.execute_batch("CHECKPOINT")?;
                tracing::trace!("DuckDB checkpoint completed");
            }
            Ok(())
        })
        .await
    }

    /// Checkpoint (best effort) and close. Later calls are no-ops.
    pub async fn close(self: Arc<Self>) -> Result<(), DuckdbError> {
        blocking(move || {
            let Some(conn) = self.conn.lock().take() else {
                return Ok(());
            };
            if let Err(e) = conn.execute_batch("CHECKPOINT") {
                tracing::warn!(error = %e, "CHECKPOINT failed during close");
            }
            conn.close().map_err(|(_, e)| DuckdbError::Database(e))?;
            tracing::debug!("DuckDB connection closed");
            Ok(())
        })
        .await
    }

    pub fn start_checkpoint_task(
        self: &Arc<Self>,
        shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let db = Arc::clone(self);
        spawn_periodic(
            "checkpoint",
            Duration::from_secs(DUCKDB_CHECKPOINT_INTERVAL_SECS),
            shutdown_rx,
            move || {
                let db = Arc::clone(&db);
                async move {
                    if let Err(e) = db.checkpoint().await {
                        tracing::warn!(error = %e, "DuckDB checkpoint failed");
                    }
                }
            },
        )
    }

    /// Periodically rebuild the per-minute rollup.
    ///
    /// The fast group path is at most `interval_secs` behind the raw index.
    pub fn start_rollup_task(
        self: &Arc<Self>,
        interval_secs: u64,
        shutdown_rx: watch::Receiver<bool>,
    ) -> JoinHandle<()> {
        let db = Arc::clone(self);
        spawn_periodic(
            "rollup",
            Duration::from_secs(interval_secs),
            shutdown_rx,
            move || {
                let db = Arc::clone(&db);
                async move {
                    match db.refresh_rollup().await {
                        Ok(rows) => tracing::debug!(rows, "Rollup refreshed"),
                        Err(e) => tracing::warn!(error = %e, "Rollup refresh failed"),
                    }
                }
            },
        )
    }
}

/// Blocking-pool work without a timeout (open, checkpoint, close)
async fn blocking<T, F>(f: F) -> Result<T, DuckdbError>
where
    T: Send + 'static,
    F: FnOnce() -> Result<T, DuckdbError> + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| DuckdbError::Io(std::io::Error::other(e)))?
}

/// Run `job` on a fixed period (first run immediately) until shutdown is signalled
/// or the shutdown sender goes away
fn spawn_periodic<F, Fut>(
    name: &'static str,
    period: Duration,
    mut shutdown_rx: watch::Receiver<bool>,
    mut job: F,
) -> JoinHandle<()>
where
    F: FnMut() -> Fut + Send + 'static,
    Fut: Future<Output = ()> + Send + 'static,
{
    tracing::debug!(task = name, period_secs = period.as_secs(), "Starting background task");
    tokio::spawn(async move {
        let mut interval = tokio::time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                biased;
                changed = shutdown_rx.changed() => {
                    if changed.is_err() || *shutdown_rx.borrow() {
                        tracing::debug!(task = name, "Background task stopping");
                        break;
                    }
                }
                _ = interval.tick() => job().await,
            }
        }
    })
}

/// Run `f` inside BEGIN/COMMIT; roll back and return its error on failure
pub(crate) fn in_transaction<F, T>(conn: &Connection, f: F) -> Result<T, DuckdbError>
where
    F: FnOnce(&Connection) -> Result<T, DuckdbError>,
{
    conn.execute_batch("BEGIN TRANSACTION")?;
    let result = f(conn);
    match &result {
        Ok(_) => conn.execute_batch("COMMIT")?,
        Err(_) => {
            if let Err(e) = conn.execute_batch("ROLLBACK") {
                tracing::warn!(error = %e, "ROLLBACK failed after transaction error");
            }
        }
    }
    result
}
