//! Durable key/value slots

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::Duration;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StoreError {
    #[error("Store database error: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("Store directory error: {0}")]
    Io(#[from] std::io::Error),
    #[error("Expiry out of range: {0:?}")]
    InvalidTtl(Duration),
}

pub type StoreResult<T> = Result<T, StoreError>;

/// A named, long-lived slot store (the native counterpart of a cookie jar).
///
/// Entries past their expiry must read as absent.
pub trait DurableKeyValueStore: Send + Sync {
    fn get(&self, key: &str) -> StoreResult<Option<String>>;

    fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;
}

impl<T: DurableKeyValueStore + ?Sized> DurableKeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        (**self).set(key, value, ttl)
    }
}

/// Compute the absolute expiry for an entry written now
pub(crate) fn expiry_from_now(ttl: Duration) -> StoreResult<DateTime<Utc>> {
    chrono::Duration::from_std(ttl)
        .ok()
        .and_then(|ttl| Utc::now().checked_add_signed(ttl))
        .ok_or(StoreError::InvalidTtl(ttl))
}

/// In-process store, lost when the process exits
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, (String, DateTime<Utc>)>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Insert an entry with an explicit expiry (used to simulate aging)
    pub fn set_with_expiry(&self, key: &str, value: &str, expires_at: DateTime<Utc>) {
        self.entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner)
            .insert(key.to_string(), (value.to_string(), expires_at));
    }
}

impl DurableKeyValueStore for MemoryStore {
    fn get(&self, key: &str) -> StoreResult<Option<String>> {
        let entries = self
            .entries
            .lock()
            .unwrap_or_else(std::sync::PoisonError::into_inner);
        Ok(entries
            .get(key)
            .filter(|(_, expires_at)| *expires_at > Utc::now())
            .map(|(value, _)| value.clone()))
    }

    fn set(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = expiry_from_now(ttl)?;
        self.set_with_expiry(key, value, expires_at);
        Ok(())
    }
}
