//! Best-effort public address lookup

use async_trait::async_trait;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;

/// Value used when the address cannot be determined
pub const UNKNOWN_ADDRESS: &str = "unknown";

const LOOKUP_TIMEOUT: Duration = Duration::from_secs(5);

/// Resolves the visitor's public network address.
///
/// Implementations never fail: any problem yields [`UNKNOWN_ADDRESS`].
#[async_trait]
pub trait AddressLookup: Send + Sync {
    async fn public_address(&self) -> String;
}

#[derive(Debug, Deserialize)]
struct IpResponse {
    ip: String,
}

/// Queries a "what is my address" service answering `{ "ip": "..." }`
pub struct HttpAddressLookup {
    client: Client,
    url: String,
}

impl HttpAddressLookup {
    pub fn new(client: Client, url: impl Into<String>) -> Self {
        Self {
            client,
            url: url.into(),
        }
    }

    async fn fetch(&self) -> Result<String, reqwest::Error> {
        let response = self
            .client
            .get(&self.url)
            .timeout(LOOKUP_TIMEOUT)
            .send()
            .await?
            .error_for_status()?;
        Ok(response.json::<IpResponse>().await?.ip)
    }
}

#[async_trait]
impl AddressLookup for HttpAddressLookup {
    async fn public_address(&self) -> String {
        match self.fetch().await {
            Ok(ip) if !ip.trim().is_empty() => ip.trim().to_string(),
            Ok(_) => {
                tracing::warn!(url = %self.url, "Address lookup returned an empty address");
                UNKNOWN_ADDRESS.to_string()
            }
            Err(e) => {
                tracing::warn!(url = %self.url, error = %e, "Address lookup failed");
                UNKNOWN_ADDRESS.to_string()
            }
        }
    }
}

/// Lookup that always answers with a fixed value
#[derive(Debug, Clone)]
pub struct FixedAddress(pub String);

impl FixedAddress {
    /// A lookup that behaves like one without network access
    pub fn unknown() -> Self {
        Self(UNKNOWN_ADDRESS.to_string())
    }
}

#[async_trait]
impl AddressLookup for FixedAddress {
    async fn public_address(&self) -> String {
        self.0.clone()
    }
}
