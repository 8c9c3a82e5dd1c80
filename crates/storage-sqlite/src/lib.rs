//! SQLite-backed durable slot store.
//!
//! The sync core persists each collection as two string slots (mirror and
//! outbox) plus a couple of app-level slots, so a single key/value table is
//! the whole schema. All access is synchronous; the connection sits behind a
//! mutex.

use std::path::Path;
use std::sync::{Mutex, MutexGuard};

use log::debug;
use rusqlite::{Connection, OptionalExtension};

use saldo_core::store::LocalSlotStore;
use saldo_core::{Error, Result};

/// Durable slot store over a single SQLite table.
pub struct SqliteSlotStore {
    conn: Mutex<Connection>,
}

impl SqliteSlotStore {
    /// Open (or create) the store at `path`.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let conn = Connection::open(path.as_ref()).map_err(to_store_error)?;
        debug!("opened slot store at {}", path.as_ref().display());
        Self::init(conn)
    }

    /// Open an in-memory store; used by tests and ephemeral sessions.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory().map_err(to_store_error)?;
        Self::init(conn)
    }

    fn init(conn: Connection) -> Result<Self> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS slots (
                key   TEXT PRIMARY KEY,
                value TEXT NOT NULL
            );",
        )
        .map_err(to_store_error)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| Error::store("slot store lock poisoned"))
    }
}

fn to_store_error(err: rusqlite::Error) -> Error {
    Error::store(err.to_string())
}

impl LocalSlotStore for SqliteSlotStore {
    fn get(&self, key: &str) -> Result<Option<String>> {
        let conn = self.lock()?;
        conn.query_row("SELECT value FROM slots WHERE key = ?1", [key], |row| {
            row.get(0)
        })
        .optional()
        .map_err(to_store_error)
    }

    fn set(&self, key: &str, value: &str) -> Result<()> {
        let conn = self.lock()?;
        conn.execute(
            "INSERT INTO slots (key, value) VALUES (?1, ?2)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value",
            [key, value],
        )
        .map_err(to_store_error)?;
        Ok(())
    }
}
