//! Relay configuration, read once at startup from environment variables.
//!
//! Required:
//! - `RELAY_SOURCE_URL` - base URL of the record store
//! - `RELAY_SINK_URL` - URL receiving one POST per relayed booking
//!
//! Optional (defaults in parentheses):
//! - `RELAY_PRODUCTION` - enable source deletion after delivery (false)
//! - `RELAY_FORCE_DELETE` - delete even outside production mode (false)
//! - `RELAY_MAX_RETRIES` - retries after the initial delivery attempt (3)
//! - `RELAY_SINK_TIMEOUT_SECS` - per-request sink timeout, floor 30 (30)
//! - `RELAY_CACHE_CAPACITY` - dedup cache size ceiling (10000)
//! - `RELAY_PORT` - health server port (8080)

use std::time::Duration;

use thiserror::Error;

/// Default per-request sink timeout. Configurable upward, never below this.
const DEFAULT_SINK_TIMEOUT_SECS: u64 = 30;

/// Default number of retries after the initial delivery attempt.
const DEFAULT_MAX_RETRIES: u32 = 3;

/// Default dedup cache size ceiling.
const DEFAULT_CACHE_CAPACITY: usize = 10_000;

/// Default health server port.
const DEFAULT_PORT: u16 = 8080;

/// Errors raised while reading configuration.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// A required variable is unset or empty.
    #[error("missing required environment variable: {0}")]
    Missing(&'static str),

    /// A variable is set but cannot be parsed.
    #[error("invalid value for {name}: {value:?}")]
    Invalid { name: &'static str, value: String },
}

/// Result type for configuration loading.
pub type Result<T> = std::result::Result<T, ConfigError>;

/// Runtime configuration for the relay.
#[derive(Debug, Clone)]
pub struct RelayConfig {
    /// Base URL of the record store (no trailing slash).
    pub source_url: String,

    /// Downstream sink URL; receives one POST per relayed booking.
    pub sink_url: String,

    /// Production mode: deletion after confirmed delivery is enabled.
    pub production: bool,

    /// Explicit override: delete after delivery even outside production.
    /// Exists so a staging environment can exercise the full round-trip.
    pub force_delete: bool,

    /// Retries after the initial delivery attempt.
    pub max_retries: u32,

    /// Per-request sink timeout.
    pub sink_timeout: Duration,

    /// Dedup cache size ceiling.
    pub cache_capacity: usize,

    /// Health server port.
    pub port: u16,
}

impl RelayConfig {
    /// Loads configuration from the environment.
    ///
    /// Fails fast on a missing required URL or an unparseable value;
    /// unset optional variables take their defaults.
    pub fn from_env() -> Result<Self> {
        Ok(RelayConfig {
            source_url: require("RELAY_SOURCE_URL")?,
            sink_url: require("RELAY_SINK_URL")?,
            production: parse_or("RELAY_PRODUCTION", false, parse_bool)?,
            force_delete: parse_or("RELAY_FORCE_DELETE", false, parse_bool)?,
            max_retries: parse_or("RELAY_MAX_RETRIES", DEFAULT_MAX_RETRIES, |s| {
                s.parse().ok()
            })?,
            sink_timeout: Duration::from_secs(
                parse_or("RELAY_SINK_TIMEOUT_SECS", DEFAULT_SINK_TIMEOUT_SECS, |s| {
                    s.parse().ok()
                })?
                .max(DEFAULT_SINK_TIMEOUT_SECS),
            ),
            cache_capacity: parse_or("RELAY_CACHE_CAPACITY", DEFAULT_CACHE_CAPACITY, |s| {
                s.parse().ok()
            })?,
            port: parse_or("RELAY_PORT", DEFAULT_PORT, |s| s.parse().ok())?,
        })
    }

    /// True if a successfully delivered booking should be deleted from the
    /// source. Non-production mode retains records for inspection unless the
    /// explicit override is set.
    pub fn delete_after_delivery(&self) -> bool {
        self.production || self.force_delete
    }
}

fn require(name: &'static str) -> Result<String> {
    match std::env::var(name) {
        Ok(v) if !v.trim().is_empty() => Ok(v.trim().trim_end_matches('/').to_string()),
        _ => Err(ConfigError::Missing(name)),
    }
}

fn parse_or<T>(name: &'static str, default: T, parse: impl Fn(&str) -> Option<T>) -> Result<T> {
    match std::env::var(name) {
        Ok(raw) => parse(raw.trim()).ok_or(ConfigError::Invalid {
            name,
            value: raw,
        }),
        Err(_) => Ok(default),
    }
}

/// Parses the boolean spellings operators actually use.
fn parse_bool(s: &str) -> Option<bool> {
    match s.to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => None,
    }
}
