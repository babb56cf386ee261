//! SQLite-backed durable store

use super::store::{expiry_from_now, DurableKeyValueStore, StoreResult};
use chrono::Utc;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

const SCHEMA: &str = r"
CREATE TABLE IF NOT EXISTS durable_entries (
    key TEXT PRIMARY KEY,
    value TEXT NOT NULL,
    path TEXT NOT NULL DEFAULT '/',
    expires_at INTEGER NOT NULL
);
";

/// Durable slots scoped to one SQLite file, all under path `/`.
///
/// Expiries are stored as Unix epoch milliseconds.
#[derive(Clone)]
pub struct SqliteStore {
    conn: Arc<Mutex<Connection>>,
}

impl SqliteStore {
    /// Open or create the store at the given path
    pub fn open<P: AsRef<Path>>(path: P) -> StoreResult<Self> {
        Self::init(Connection::open(path)?)
    }

    /// Store that lives only as long as this value (and its clones)
    pub fn open_in_memory() -> StoreResult<Self> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> StoreResult<Self> {
        conn.execute_batch(SCHEMA)?;
        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
        })
    }

    fn conn(&self) -> MutexGuard<'_, Connection> {
        self.conn
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
    }
}

impl DurableKeyValueStore for SqliteStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let conn = self.conn();
        let now = Utc::now().timestamp_millis();
        let value = conn
            .query_row(
                "SELECT value FROM durable_entries WHERE key = ?1 AND path = '/' AND expires_at > ?2",
                params![key, now],
                |row| row.get(0),
            )
            .optional()?;
        Ok(value)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = expiry_from_now(ttl)?.timestamp_millis();
        let now = Utc::now().timestamp_millis();
        let conn = self.conn();
        conn.execute(
            "DELETE FROM durable_entries WHERE expires_at <= ?1",
            params![now],
        )?;
        conn.execute(
            "INSERT INTO durable_entries (key, value, path, expires_at) VALUES (?1, ?2, '/', ?3)
             ON CONFLICT(key) DO UPDATE SET value = excluded.value, expires_at = excluded.expires_at",
            params![key, value, expires_at],
        )?;
        Ok(())
    }
}
