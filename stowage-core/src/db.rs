//! Shared SQLite database for blob content and blob metadata

use crate::error::{Result, StowageError};
use rusqlite::{Connection, InterruptHandle};
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

/// Handle to the SQLite file backing the `database` content backend and the
/// metadata store.
///
/// Connections are opened per call; SQLite serializes concurrent writers.
#[derive(Debug, Clone)]
pub struct BlobDb {
    path: PathBuf,
}

impl BlobDb {
    /// Open (creating if needed) the database file and its schema.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref().to_path_buf();
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let db = Self { path };
        db.init_schema()?;
        Ok(db)
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub(crate) fn get_conn(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.busy_timeout(std::time::Duration::from_secs(5))?;
        Ok(conn)
    }

    /// Run `f` against a fresh connection on the blocking pool.
    ///
    /// Dropping the returned future interrupts the statement in flight, and a
    /// call that has not started yet never runs.
    pub(crate) async fn call<T, F>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let conn = self.get_conn()?;
        let cancelled = Arc::new(AtomicBool::new(false));
        let guard = InterruptOnDrop {
            handle: Some(conn.get_interrupt_handle()),
            cancelled: cancelled.clone(),
        };

        let result = tokio::task::spawn_blocking(move || {
            if cancelled.load(Ordering::SeqCst) {
                return Err(StowageError::Internal(
                    "database call cancelled before start".to_string(),
                ));
            }
            f(&conn)
        })
        .await
        .map_err(|e| StowageError::Internal(format!("database task failed: {}", e)))?;

        guard.disarm();
        result
    }

    fn init_schema(&self) -> Result<()> {
        let conn = self.get_conn()?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blob_metadata (
                id TEXT PRIMARY KEY NOT NULL,
                size INTEGER NOT NULL,
                created_at TEXT NOT NULL
            )",
            [],
        )?;

        conn.execute(
            "CREATE TABLE IF NOT EXISTS blob_content (
                id TEXT PRIMARY KEY NOT NULL,
                data BLOB
            )",
            [],
        )?;

        tracing::debug!("Blob database schema ready at {:?}", self.path);
        Ok(())
    }
}

struct InterruptOnDrop {
    handle: Option<InterruptHandle>,
    cancelled: Arc<AtomicBool>,
}

impl InterruptOnDrop {
    fn disarm(mut self) {
        self.handle = None;
    }
}

impl Drop for InterruptOnDrop {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            self.cancelled.store(true, Ordering::SeqCst);
            handle.interrupt();
            tracing::debug!("Interrupted abandoned database call");
        }
    }
}
