//! Visitor identity
//!
//! A session identifier is minted once per visitor and kept in a durable
//! slot; the tenant is derived from the hosting domain on every start.

mod address;
mod sqlite;
mod store;
mod tenant;

pub use address::{AddressLookup, FixedAddress, HttpAddressLookup, UNKNOWN_ADDRESS};
pub use sqlite::SqliteStore;
pub use store::{DurableKeyValueStore, MemoryStore, StoreError, StoreResult};
pub use tenant::TenantId;

use base64::engine::general_purpose::STANDARD;
use base64::Engine;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::time::Duration;
use thiserror::Error;

/// Name of the durable slot holding the session identifier
pub const SESSION_KEY: &str = "chatid";

/// How long a minted identifier is kept
pub const SESSION_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

#[derive(Debug, Error)]
pub enum IdentityError {
    #[error("Identity store unavailable: {0}")]
    Store(#[from] StoreError),
}

/// Opaque per-visitor token
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct SessionId(String);

impl SessionId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for SessionId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Coarse description of the visitor's device, like a user agent string
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DeviceFingerprint(String);

impl DeviceFingerprint {
    /// Build from a raw descriptor; all whitespace is stripped.
    pub fn new(raw: &str) -> Self {
        Self(raw.chars().filter(|c| !c.is_whitespace()).collect())
    }

    /// Fingerprint of the current process and platform
    pub fn current() -> Self {
        Self::new(&format!(
            "{}/{} ({}; {})",
            env!("CARGO_PKG_NAME"),
            env!("CARGO_PKG_VERSION"),
            std::env::consts::OS,
            std::env::consts::ARCH
        ))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

/// Hands out the visitor's session identifier, minting it on first use
pub struct IdentityStore<S, A> {
    store: S,
    lookup: A,
    fingerprint: DeviceFingerprint,
}

impl<S, A> IdentityStore<S, A>
where
    S: DurableKeyValueStore,
    A: AddressLookup,
{
    pub fn new(store: S, lookup: A, fingerprint: DeviceFingerprint) -> Self {
        Self {
            store,
            lookup,
            fingerprint,
        }
    }

    /// Return the stored identifier, or mint, persist, and return a new one.
    pub async fn get_or_create_session_id(&self) -> Result<SessionId, IdentityError> {
        if let Some(existing) = self.store.get(SESSION_KEY)? {
            tracing::debug!("Reusing stored session id");
            return Ok(SessionId(existing));
        }

        let address = self.lookup.public_address().await;

        // Another initializer may have finished while we were waiting on the
        // lookup; prefer its value.
        if let Some(existing) = self.store.get(SESSION_KEY)? {
            return Ok(SessionId(existing));
        }

        let minted = mint_session_id(&self.fingerprint, &address);
        self.store.set(SESSION_KEY, minted.as_str(), SESSION_TTL)?;
        tracing::info!(address_known = address != UNKNOWN_ADDRESS, "Minted new session id");

        Ok(self.store.get(SESSION_KEY)?.map_or(minted, SessionId))
    }
}

/// Compose `fingerprint-address-timestamp-random` and encode it as base64
fn mint_session_id(fingerprint: &DeviceFingerprint, address: &str) -> SessionId {
    let raw = format!(
        "{}-{}-{}-{}",
        fingerprint.as_str(),
        address,
        Utc::now().timestamp_millis(),
        rand::random::<f64>()
    );
    SessionId(STANDARD.encode(raw))
}
