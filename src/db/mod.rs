use rusqlite::Connection;
use std::path::{Path, PathBuf};
use tokio::task;
use crate::error::{DiscoveryError, Result};

pub mod migrate;

/// Pragmas applied to every connection. WAL lets concurrent discovery tasks
/// write their own rows while readers poll progress; busy_timeout absorbs
/// short writer contention between those tasks.
const CONNECTION_PRAGMAS: &str = "PRAGMA journal_mode = WAL; \
     PRAGMA synchronous = NORMAL; \
     PRAGMA foreign_keys = ON; \
     PRAGMA busy_timeout = 5000; \
     PRAGMA temp_store = MEMORY;";

/// Database connection manager for the task store and audit trail
#[derive(Debug, Clone)]
pub struct Db {
    path: PathBuf,
}

impl Db {
    pub fn new<P: AsRef<Path>>(db_path: P) -> Self {
        Self {
            path: db_path.as_ref().to_path_buf(),
        }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Open a new connection with the standard pragmas
    pub fn open_connection(&self) -> Result<Connection> {
        let conn = Connection::open(&self.path)?;
        conn.execute_batch(CONNECTION_PRAGMAS)?;
        Ok(conn)
    }

    /// Execute a closure with a fresh connection on the blocking pool
    pub async fn with_connection<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T> + Send + 'static,
        T: Send + 'static,
    {
        let db = self.clone();
        task::spawn_blocking(move || {
            let mut conn = db.open_connection()?;
            f(&mut conn)
        })
        .await
        .map_err(|e| DiscoveryError::Io(std::io::Error::other(format!("database task join: {}", e))))?
    }

    /// Open the database and apply any pending migrations
    pub async fn initialize(&self) -> Result<()> {
        self.with_connection(migrate::run_migrations).await
    }
}
