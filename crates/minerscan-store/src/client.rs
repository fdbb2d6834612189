//! SQLite connection management and the shared outcome store handle.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use rusqlite::Connection;

use crate::schema;

/// Errors from store operations.
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    #[error("Failed to open database at {path}: {source}")]
    Open {
        path: String,
        #[source]
        source: rusqlite::Error,
    },

    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Database connection lock poisoned")]
    Poisoned,

    #[error("Table `{0}` not found; it must be populated before a bulk scan")]
    MissingTable(String),

    #[error("Corrupt row for {key}: {reason}")]
    Corrupt { key: String, reason: String },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Configuration for opening the store.
#[derive(Debug, Clone)]
pub struct StoreConfig {
    pub path: PathBuf,
    pub busy_timeout: Duration,
}

impl StoreConfig {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self {
            path: path.into(),
            ..Default::default()
        }
    }
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("antpool_workers.db"),
            busy_timeout: Duration::from_secs(5),
        }
    }
}

/// Thread-safe handle to the outcome database.
///
/// Clone is cheap (inner Arc). Each statement runs under the connection lock,
/// so single-row writes from concurrent callers never interleave.
#[derive(Clone)]
pub struct OutcomeStore {
    conn: Arc<Mutex<Connection>>,
}

impl OutcomeStore {
    /// Open (or create) the database described by `config`.
    pub fn open(config: &StoreConfig) -> Result<Self, StoreError> {
        if let Some(parent) = config.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(&config.path).map_err(|source| StoreError::Open {
            path: display_path(&config.path),
            source,
        })?;
        conn.busy_timeout(config.busy_timeout)?;
        schema::initialize(&conn)?;

        tracing::debug!(path = %config.path.display(), "Outcome store opened");
        Ok(Self::from_connection(conn))
    }

    /// Open an in-memory database (for testing).
    pub fn open_in_memory() -> Result<Self, StoreError> {
        let conn = Connection::open_in_memory()?;
        schema::initialize(&conn)?;
        Ok(Self::from_connection(conn))
    }

    fn from_connection(conn: Connection) -> Self {
        Self {
            conn: Arc::new(Mutex::new(conn)),
        }
    }

    /// Run `f` with exclusive access to the connection.
    pub fn with_conn<T>(
        &self,
        f: impl FnOnce(&Connection) -> Result<T, StoreError>,
    ) -> Result<T, StoreError> {
        let guard = self.conn.lock().map_err(|_| StoreError::Poisoned)?;
        f(&guard)
    }
}

fn display_path(path: &Path) -> String {
    path.display().to_string()
}
