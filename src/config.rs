//! Application configuration loaded from environment variables, plus the
//! instrument/depth arguments taken from the command line.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

use crate::engine::DEFAULT_BUFFER_CAPACITY;
use crate::error::MirrorError;

/// Symbol used when none is given on the command line.
pub const DEFAULT_SYMBOL: &str = "ETHUSDT";
/// Number of levels per side reported when none is given.
pub const DEFAULT_DEPTH: usize = 10;
/// Largest `limit` the depth snapshot endpoint accepts.
pub const MAX_SNAPSHOT_LIMIT: usize = 5000;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Exchange Endpoints ===
    /// REST base URL used for depth snapshots.
    #[serde(default = "default_rest_url")]
    pub binance_rest_url: String,

    /// WebSocket base URL used for the diff depth stream.
    #[serde(default = "default_ws_url")]
    pub binance_ws_url: String,

    // === Synchronization ===
    /// Minimum milliseconds between two reported book states.
    #[serde(default = "default_throttle_interval")]
    pub throttle_interval_ms: u64,

    /// Snapshot depth floor; requests use `max(depth, snapshot_limit)`.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: usize,

    /// Stream push interval, 1000 or 100 milliseconds.
    #[serde(default = "default_update_speed")]
    pub ws_update_speed_ms: u64,

    /// Updates held while a snapshot is in flight.
    #[serde(default = "default_buffer_size")]
    pub update_buffer_size: usize,

    /// Capacity of the feed event channel.
    #[serde(default = "default_channel_capacity")]
    pub event_channel_capacity: usize,

    // === Transport ===
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,

    /// Maximum reconnect backoff in seconds.
    #[serde(default = "default_reconnect_max_delay")]
    pub ws_reconnect_max_delay_s: u64,

    /// Silence after which the stream is considered dead is twice this value.
    #[serde(default = "default_heartbeat_interval")]
    pub ws_heartbeat_interval_s: u64,

    // === Server Configuration ===
    /// HTTP port for health/status/metrics endpoints; unset disables the server.
    #[serde(default)]
    pub status_port: Option<u16>,

    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub rust_log: String,
}

fn default_rest_url() -> String {
    "https://api.binance.com".to_string()
}

fn default_ws_url() -> String {
    "wss://stream.binance.com:9443".to_string()
}

fn default_throttle_interval() -> u64 {
    10_000
}

fn default_snapshot_limit() -> usize {
    1000
}

fn default_update_speed() -> u64 {
    1000
}

fn default_buffer_size() -> usize {
    DEFAULT_BUFFER_CAPACITY
}

fn default_channel_capacity() -> usize {
    10_000
}

fn default_http_timeout() -> u64 {
    5000
}

fn default_reconnect_max_delay() -> u64 {
    30
}

fn default_heartbeat_interval() -> u64 {
    30
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for Config {
    fn default() -> Self {
        Self {
            binance_rest_url: default_rest_url(),
            binance_ws_url: default_ws_url(),
            throttle_interval_ms: default_throttle_interval(),
            snapshot_limit: default_snapshot_limit(),
            ws_update_speed_ms: default_update_speed(),
            update_buffer_size: default_buffer_size(),
            event_channel_capacity: default_channel_capacity(),
            http_timeout_ms: default_http_timeout(),
            ws_reconnect_max_delay_s: default_reconnect_max_delay(),
            ws_heartbeat_interval_s: default_heartbeat_interval(),
            status_port: None,
            rust_log: default_log_level(),
        }
    }
}

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        if self.throttle_interval_ms == 0 {
            return Err("THROTTLE_INTERVAL_MS must be positive".to_string());
        }

        if self.snapshot_limit == 0 || self.snapshot_limit > MAX_SNAPSHOT_LIMIT {
            return Err(format!(
                "SNAPSHOT_LIMIT must be between 1 and {MAX_SNAPSHOT_LIMIT}"
            ));
        }

        if !matches!(self.ws_update_speed_ms, 100 | 1000) {
            return Err("WS_UPDATE_SPEED_MS must be 100 or 1000".to_string());
        }

        if self.update_buffer_size == 0 {
            return Err("UPDATE_BUFFER_SIZE must be positive".to_string());
        }

        if self.event_channel_capacity == 0 {
            return Err("EVENT_CHANNEL_CAPACITY must be positive".to_string());
        }

        if self.http_timeout_ms == 0 {
            return Err("HTTP_TIMEOUT_MS must be positive".to_string());
        }

        Url::parse(&self.binance_rest_url)
            .map_err(|e| format!("BINANCE_REST_URL is not a valid URL: {e}"))?;
        Url::parse(&self.binance_ws_url)
            .map_err(|e| format!("BINANCE_WS_URL is not a valid URL: {e}"))?;

        Ok(())
    }

    /// Minimum spacing between reported book states.
    pub fn throttle_interval(&self) -> Duration {
        Duration::from_millis(self.throttle_interval_ms)
    }

    pub fn http_timeout(&self) -> Duration {
        Duration::from_millis(self.http_timeout_ms)
    }

    /// Levels to request in a snapshot for a reporting depth.
    pub fn snapshot_depth(&self, depth: usize) -> usize {
        depth.max(self.snapshot_limit).min(MAX_SNAPSHOT_LIMIT)
    }
}

/// A normalized trading symbol.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct Instrument(String);

impl Instrument {
    /// Trims and uppercases `raw`, rejecting empty input.
    pub fn new(raw: &str) -> Result<Self, MirrorError> {
        let symbol = raw.trim();
        if symbol.is_empty() {
            return Err(MirrorError::InvalidArgument(
                "symbol must not be empty".to_string(),
            ));
        }
        if !symbol.chars().all(|c| c.is_ascii_alphanumeric()) {
            return Err(MirrorError::InvalidArgument(format!(
                "symbol {symbol:?} must be alphanumeric"
            )));
        }
        Ok(Self(symbol.to_ascii_uppercase()))
    }

    /// Uppercase symbol as used by the REST API.
    pub fn symbol(&self) -> &str {
        &self.0
    }

    /// Lowercase symbol as used in stream names.
    pub fn stream_symbol(&self) -> String {
        self.0.to_ascii_lowercase()
    }
}

impl std::fmt::Display for Instrument {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(&self.0)
    }
}

impl std::str::FromStr for Instrument {
    type Err = MirrorError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

/// Parses a reporting depth: a positive integer.
pub fn parse_depth(raw: &str) -> Result<usize, MirrorError> {
    let depth: usize = raw.trim().parse().map_err(|_| {
        MirrorError::InvalidArgument(format!("depth {raw:?} is not a positive integer"))
    })?;
    if depth == 0 {
        return Err(MirrorError::InvalidArgument(
            "depth must be at least 1".to_string(),
        ));
    }
    Ok(depth)
}
