//! Widget configuration
//!
//! Everything is read from the environment with sensible defaults, so a host
//! only needs to set `CHAT_WIDGET_API_URL` in the common case.
//!
//! The visitor's identity lives in `$HOME/.chat-widget/identity.db` unless
//! `CHAT_WIDGET_STORE_PATH` says otherwise.

use crate::stream::CoalescePolicy;
use std::path::PathBuf;
use std::time::Duration;
use thiserror::Error;

pub const DEFAULT_IP_LOOKUP_URL: &str = "https://api.ipify.org?format=json";
pub const DEFAULT_ANIMATION: Duration = Duration::from_millis(400);
pub const DEFAULT_HOST: &str = "localhost";
pub const API_URL_VAR: &str = "CHAT_WIDGET_API_URL";

#[derive(Debug, Error)]
#[error("invalid value for {var}: {value:?} ({reason})")]
pub struct ConfigError {
    pub var: &'static str,
    pub value: String,
    pub reason: String,
}

/// Runtime configuration for a widget instance
#[derive(Debug, Clone)]
pub struct WidgetConfig {
    /// Base URL of the assistant service (scheme and host required)
    pub api_base_url: String,
    /// Public address lookup endpoint (`{ "ip": ... }`)
    pub ip_lookup_url: String,
    /// Hosting domain the tenant is derived from
    pub host: String,
    /// Location of the durable identity store
    pub store_path: PathBuf,
    /// Whether to read response bodies incrementally
    pub streaming: bool,
    pub coalesce: CoalescePolicy,
    /// Duration of the opening and closing animations
    pub animation: Duration,
    /// Abort a stream that produces no chunk for this long
    pub stream_idle_timeout: Option<Duration>,
}

impl Default for WidgetConfig {
    fn default() -> Self {
        Self {
            api_base_url: String::new(),
            ip_lookup_url: DEFAULT_IP_LOOKUP_URL.to_string(),
            host: DEFAULT_HOST.to_string(),
            store_path: default_store_path(std::env::var("HOME").ok()),
            streaming: true,
            coalesce: CoalescePolicy::default(),
            animation: DEFAULT_ANIMATION,
            stream_idle_timeout: None,
        }
    }
}

impl WidgetConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|name| std::env::var(name).ok())
    }

    /// Build the configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();
        let coalesce = CoalescePolicy {
            min_interval: parse_var(&lookup, "CHAT_WIDGET_FLUSH_INTERVAL_MS", parse_millis)?
                .unwrap_or(defaults.coalesce.min_interval),
            min_chars: parse_var(&lookup, "CHAT_WIDGET_FLUSH_CHARS", parse_usize)?
                .unwrap_or(defaults.coalesce.min_chars),
        };

        let config = Self {
            api_base_url: lookup(API_URL_VAR).unwrap_or(defaults.api_base_url),
            ip_lookup_url: lookup("CHAT_WIDGET_IP_LOOKUP_URL").unwrap_or(defaults.ip_lookup_url),
            host: lookup("CHAT_WIDGET_HOST").unwrap_or(defaults.host),
            store_path: lookup("CHAT_WIDGET_STORE_PATH")
                .map_or_else(|| default_store_path(lookup("HOME")), PathBuf::from),
            streaming: parse_var(&lookup, "CHAT_WIDGET_STREAMING", parse_bool)?
                .unwrap_or(defaults.streaming),
            coalesce,
            animation: parse_var(&lookup, "CHAT_WIDGET_ANIMATION_MS", parse_millis)?
                .unwrap_or(defaults.animation),
            stream_idle_timeout: parse_var(
                &lookup,
                "CHAT_WIDGET_STREAM_IDLE_TIMEOUT_SECS",
                parse_secs,
            )?,
        };
        config.validate()?;
        Ok(config)
    }

    /// Reject settings that would make every request fail.
    ///
    /// The chat endpoint must be absolute; there is no page origin to
    /// resolve a relative URL against.
    pub fn validate(&self) -> Result<(), ConfigError> {
        let base = self.api_base_url.trim();
        let invalid = |reason: &str| ConfigError {
            var: API_URL_VAR,
            value: self.api_base_url.clone(),
            reason: reason.to_string(),
        };
        if base.is_empty() {
            return Err(invalid("the assistant service URL is required"));
        }
        if !(base.starts_with("http://") || base.starts_with("https://")) {
            return Err(invalid("expected an absolute http(s) URL"));
        }
        Ok(())
    }

    /// Full URL of the chat endpoint
    pub fn chat_url(&self) -> String {
        format!("{}/api/v1/genai/search", self.api_base_url.trim_end_matches('/'))
    }
}

fn default_store_path(home: Option<String>) -> PathBuf {
    let home = home.unwrap_or_else(|| "/tmp".to_string());
    PathBuf::from(home).join(".chat-widget").join("identity.db")
}

fn parse_var<F, T>(
    lookup: &F,
    var: &'static str,
    parse: fn(&str) -> Result<T, String>,
) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
{
    match lookup(var) {
        None => Ok(None),
        Some(value) => parse(value.trim())
            .map(Some)
            .map_err(|reason| ConfigError { var, value, reason }),
    }
}

fn parse_usize(s: &str) -> Result<usize, String> {
    s.parse().map_err(|e: std::num::ParseIntError| e.to_string())
}

fn parse_millis(s: &str) -> Result<Duration, String> {
    s.parse()
        .map(Duration::from_millis)
        .map_err(|e: std::num::ParseIntError| e.to_string())
}

fn parse_secs(s: &str) -> Result<Duration, String> {
    s.parse()
        .map(Duration::from_secs)
        .map_err(|e: std::num::ParseIntError| e.to_string())
}

fn parse_bool(s: &str) -> Result<bool, String> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Ok(true),
        "0" | "false" | "no" | "off" => Ok(false),
        other => Err(format!("expected a boolean, got {other}")),
    }
}
