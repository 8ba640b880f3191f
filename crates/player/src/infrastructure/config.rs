//! Session configuration loaded from environment variables.
//!
//! Every knob has a default; a missing variable uses it silently, an
//! unparseable one uses it with a warning.
//!
//! # Environment Variables
//!
//! - `HOLDEM_SERVER_URL` - Table server base URL (default: `http://localhost:8080`)
//! - `HOLDEM_CONNECT_TIMEOUT_MS` - Per-attempt connect window (default: 10000)
//! - `HOLDEM_HEARTBEAT_INTERVAL_MS` - Heartbeat period, must be non-zero (default: 30000)
//! - `HOLDEM_HEARTBEAT_ACK_TIMEOUT_MS` - Close the link after this long without
//!   inbound traffic (default: unset, never)
//! - `HOLDEM_RECONNECT_BASE_MS` - Delay before the first reconnect (default: 1000)
//! - `HOLDEM_RECONNECT_MAX_ATTEMPTS` - Reconnect ceiling (default: 5)
//! - `HOLDEM_QUEUE_CAPACITY` - Outbound queue bound (default: unbounded)

use std::str::FromStr;
use std::time::Duration;

use url::Url;

use crate::infrastructure::websocket::shared::{
    CONNECT_TIMEOUT, HEARTBEAT_INTERVAL, INITIAL_RETRY_DELAY_MS, MAX_RETRY_ATTEMPTS,
    MAX_RETRY_DELAY_MS,
};

pub const DEFAULT_SERVER_URL: &str = "http://localhost:8080";

/// What a full bounded outbound queue gives up.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum OverflowPolicy {
    /// Evict the head to make room
    #[default]
    DropOldest,
    /// Refuse the new frame
    DropNewest,
}

/// Backoff parameters for automatic reconnection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct ReconnectConfig {
    pub base_delay: Duration,
    pub max_delay: Duration,
    pub max_attempts: u32,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            base_delay: Duration::from_millis(INITIAL_RETRY_DELAY_MS),
            max_delay: Duration::from_millis(MAX_RETRY_DELAY_MS),
            max_attempts: MAX_RETRY_ATTEMPTS,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionConfig {
    pub server_url: Url,
    pub connect_timeout: Duration,
    pub heartbeat_interval: Duration,
    pub heartbeat_ack_timeout: Option<Duration>,
    pub reconnect: ReconnectConfig,
    pub queue_capacity: Option<usize>,
    pub overflow: OverflowPolicy,
}

impl SessionConfig {
    pub fn new(server_url: Url) -> Self {
        Self {
            server_url,
            connect_timeout: CONNECT_TIMEOUT,
            heartbeat_interval: HEARTBEAT_INTERVAL,
            heartbeat_ack_timeout: None,
            reconnect: ReconnectConfig::default(),
            queue_capacity: None,
            overflow: OverflowPolicy::default(),
        }
    }

    /// Load from `HOLDEM_*` environment variables over the defaults.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load from an arbitrary variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let defaults = Self::default();

        let server_url = match lookup("HOLDEM_SERVER_URL") {
            Some(raw) => Url::parse(&raw).unwrap_or_else(|e| {
                tracing::warn!(value = %raw, error = %e, "Invalid HOLDEM_SERVER_URL, using default");
                defaults.server_url.clone()
            }),
            None => defaults.server_url.clone(),
        };

        let millis = |key: &str, default: Duration| {
            Duration::from_millis(parse_or(&lookup, key, default.as_millis() as u64))
        };

        Self {
            server_url,
            connect_timeout: millis("HOLDEM_CONNECT_TIMEOUT_MS", defaults.connect_timeout),
            heartbeat_interval: non_zero(
                "HOLDEM_HEARTBEAT_INTERVAL_MS",
                millis("HOLDEM_HEARTBEAT_INTERVAL_MS", defaults.heartbeat_interval),
                defaults.heartbeat_interval,
            ),
            heartbeat_ack_timeout: parse_opt::<u64>(&lookup, "HOLDEM_HEARTBEAT_ACK_TIMEOUT_MS")
                .map(Duration::from_millis),
            reconnect: ReconnectConfig {
                base_delay: millis("HOLDEM_RECONNECT_BASE_MS", defaults.reconnect.base_delay),
                max_attempts: parse_or(
                    &lookup,
                    "HOLDEM_RECONNECT_MAX_ATTEMPTS",
                    defaults.reconnect.max_attempts,
                ),
                ..defaults.reconnect
            },
            queue_capacity: parse_opt(&lookup, "HOLDEM_QUEUE_CAPACITY"),
            overflow: defaults.overflow,
        }
    }
}

impl Default for SessionConfig {
    fn default() -> Self {
        let server_url = Url::parse(DEFAULT_SERVER_URL).expect("DEFAULT_SERVER_URL is invalid");
        Self::new(server_url)
    }
}

fn parse_opt<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str) -> Option<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    let raw = lookup(key)?;
    match raw.trim().parse() {
        Ok(value) => Some(value),
        Err(e) => {
            tracing::warn!(key, value = %raw, error = %e, "Ignoring unparseable setting");
            None
        }
    }
}

fn non_zero(key: &str, value: Duration, default: Duration) -> Duration {
    if value.is_zero() {
        tracing::warn!(
            key,
            default_ms = default.as_millis() as u64,
            "Zero period not allowed, using default"
        );
        default
    } else {
        value
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> T
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    parse_opt(lookup, key).unwrap_or(default)
}
