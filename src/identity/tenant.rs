//! Tenant derivation from the hosting domain

use serde::{Deserialize, Serialize};
use std::fmt;

/// Identifier of the site the widget is embedded in
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct TenantId(String);

impl TenantId {
    /// Derive the tenant from a host name.
    ///
    /// The leftmost label wins, except that a leading `www` defers to the
    /// next label. Ports and a trailing root dot are ignored.
    pub fn from_host(host: &str) -> Self {
        let host = host.trim().trim_end_matches('.');
        let host = strip_port(host).to_ascii_lowercase();

        let mut labels = host.split('.').filter(|label| !label.is_empty());
        let first = labels.next().unwrap_or_default();
        let tenant = match labels.next() {
            Some(next) if first == "www" => next,
            _ => first,
        };
        Self(tenant.to_string())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for TenantId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

fn strip_port(host: &str) -> &str {
    match host.rsplit_once(':') {
        Some((name, port)) if !name.contains(':') && port.bytes().all(|b| b.is_ascii_digit()) => {
            name
        }
        _ => host,
    }
}
