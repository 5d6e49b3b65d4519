//! # cadence-store
//!
//! SQLite persistence for the Cadence scheduler: the per-user schedule
//! settings record (including the reserved next slot), the scheduled-post
//! backlog, and the transaction coordinator that applies a schedule edit to
//! both atomically.
//!
//! All slot computation lives in `cadence-engine`; this crate only reads
//! state, hands it to the pure functions, and persists the result inside a
//! single transaction.

pub mod coordinator;
pub mod error;
pub mod migrations;
pub mod models;
pub mod queries;

use std::collections::HashMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use rusqlite::Connection;
use tracing::info;

pub use error::StoreError;
pub use models::{PostStatus, ScheduledPost, StoredSettings};

use error::Result;

/// Handle to the scheduler database.
///
/// The connection sits behind a mutex (SQLite is the single writer anyway);
/// a second registry of per-user mutexes serializes reconciliations for the
/// same user while leaving different users fully independent.
pub struct Database {
    conn: Mutex<Connection>,
    user_locks: Mutex<HashMap<String, Arc<Mutex<()>>>>,
}

impl Database {
    pub fn open(path: &Path) -> Result<Database> {
        let db = Database::init(Connection::open(path)?)?;
        info!("database opened at {}", path.display());
        Ok(db)
    }

    /// In-memory database, used by tests.
    pub fn open_in_memory() -> Result<Database> {
        Database::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Database> {
        // WAL mode for concurrent reads
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "foreign_keys", "ON")?;

        migrations::run(&conn)?;

        Ok(Database {
            conn: Mutex::new(conn),
            user_locks: Mutex::new(HashMap::new()),
        })
    }

    pub(crate) fn with_conn<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&Connection) -> Result<T>,
    {
        let conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&conn)
    }

    pub(crate) fn with_conn_mut<F, T>(&self, f: F) -> Result<T>
    where
        F: FnOnce(&mut Connection) -> Result<T>,
    {
        let mut conn = self.conn.lock().map_err(|_| StoreError::LockPoisoned)?;
        f(&mut conn)
    }

    /// The advisory lock for one user's schedule.
    ///
    /// Held for the duration of a reconciliation or post creation so two
    /// concurrent edits for the same user cannot interleave.
    pub(crate) fn user_lock(&self, user_id: &str) -> Result<Arc<Mutex<()>>> {
        let mut locks = self.user_locks.lock().map_err(|_| StoreError::LockPoisoned)?;
        Ok(locks.entry(user_id.to_string()).or_default().clone())
    }
}
