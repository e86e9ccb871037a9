//! Application configuration loaded from environment variables.

use std::time::Duration;

use serde::Deserialize;
use url::Url;

/// Application configuration loaded from environment variables.
#[derive(Debug, Clone, Deserialize)]
pub struct Config {
    // === Endpoints ===
    /// WebSocket stream URL.
    #[serde(default = "default_ws_url")]
    pub mexc_ws_url: String,

    /// REST API base URL.
    #[serde(default = "default_rest_url")]
    pub mexc_rest_url: String,

    // === Depth Topic ===
    /// Market segment of the depth topic (e.g. "spot").
    #[serde(default = "default_depth_market")]
    pub depth_market: String,

    /// Version segment of the depth topic.
    #[serde(default = "default_depth_version")]
    pub depth_version: String,

    /// Aggregation interval of the depth topic.
    #[serde(default = "default_depth_interval")]
    pub depth_interval: String,

    // === Replica ===
    /// Number of levels requested for the REST snapshot.
    #[serde(default = "default_snapshot_limit")]
    pub snapshot_limit: u32,

    /// Levels per side kept in published projections.
    #[serde(default = "default_projection_depth")]
    pub projection_depth: usize,

    /// Re-fetch the snapshot before every reconnect.
    #[serde(default)]
    pub refresh_snapshot_on_reconnect: bool,

    // === Connection ===
    /// Seconds of stream silence before reconnecting.
    #[serde(default = "default_receive_timeout")]
    pub receive_timeout_s: u64,

    /// Fixed delay between reconnect attempts.
    #[serde(default = "default_reconnect_delay")]
    pub reconnect_delay_s: u64,

    /// Transport ping cadence.
    #[serde(default = "default_ping_interval")]
    pub ping_interval_s: u64,

    /// Upper bound on connect plus handshake.
    #[serde(default = "default_connect_timeout")]
    pub connect_timeout_s: u64,

    /// REST request timeout in milliseconds.
    #[serde(default = "default_http_timeout")]
    pub http_timeout_ms: u64,

    // === Display ===
    /// Rows per side when rendering a book.
    #[serde(default = "default_display_depth")]
    pub display_depth: usize,

    /// Seconds between rendered refreshes.
    #[serde(default = "default_refresh_interval")]
    pub refresh_interval_s: u64,

    // === Server Configuration ===
    /// Symbols started by `serve`.
    #[serde(default)]
    pub watch_symbols: Vec<String>,

    /// HTTP server port.
    #[serde(default = "default_port")]
    pub port: u16,
}

fn default_ws_url() -> String {
    "wss://wbs-api.mexc.com/ws".to_string()
}

fn default_rest_url() -> String {
    "https://api.mexc.com".to_string()
}

fn default_depth_market() -> String {
    "spot".to_string()
}

fn default_depth_version() -> String {
    "v3.api.pb".to_string()
}

fn default_depth_interval() -> String {
    "100ms".to_string()
}

fn default_snapshot_limit() -> u32 {
    1000
}

fn default_projection_depth() -> usize {
    50
}

fn default_receive_timeout() -> u64 {
    35
}

fn default_reconnect_delay() -> u64 {
    5
}

fn default_ping_interval() -> u64 {
    25
}

fn default_connect_timeout() -> u64 {
    10
}

fn default_http_timeout() -> u64 {
    10_000
}

fn default_display_depth() -> usize {
    5
}

fn default_refresh_interval() -> u64 {
    3
}

fn default_port() -> u16 {
    8080
}

/// Largest number of rows a rendered book may show per side.
pub const MAX_DISPLAY_DEPTH: usize = 20;

impl Config {
    /// Load configuration from environment, reading .env file first.
    pub fn load() -> Result<Self, envy::Error> {
        dotenvy::dotenv().ok();
        envy::from_env()
    }

    /// Check if the configuration is valid.
    pub fn validate(&self) -> Result<(), String> {
        check_scheme("MEXC_WS_URL", &self.mexc_ws_url, &["ws", "wss"])?;
        check_scheme("MEXC_REST_URL", &self.mexc_rest_url, &["http", "https"])?;

        if self.snapshot_limit == 0 {
            return Err("SNAPSHOT_LIMIT must be greater than 0".to_string());
        }

        if self.projection_depth == 0 {
            return Err("PROJECTION_DEPTH must be greater than 0".to_string());
        }

        if self.receive_timeout_s == 0
            || self.reconnect_delay_s == 0
            || self.ping_interval_s == 0
            || self.connect_timeout_s == 0
        {
            return Err(
                "RECEIVE_TIMEOUT_S, RECONNECT_DELAY_S, PING_INTERVAL_S and CONNECT_TIMEOUT_S must be greater than 0"
                    .to_string(),
            );
        }

        if self.http_timeout_ms == 0 {
            return Err("HTTP_TIMEOUT_MS must be greater than 0".to_string());
        }

        if !(1..=MAX_DISPLAY_DEPTH).contains(&self.display_depth) {
            return Err(format!("DISPLAY_DEPTH must be between 1 and {MAX_DISPLAY_DEPTH}"));
        }

        if self.refresh_interval_s == 0 {
            return Err("REFRESH_INTERVAL_S must be at least 1".to_string());
        }

        Ok(())
    }

    /// Build the per-session feed configuration.
    pub fn feed(&self) -> FeedConfig {
        FeedConfig {
            ws_url: self.mexc_ws_url.clone(),
            rest_url: self.mexc_rest_url.clone(),
            depth_market: self.depth_market.clone(),
            depth_version: self.depth_version.clone(),
            depth_interval: self.depth_interval.clone(),
            snapshot_limit: self.snapshot_limit,
            projection_depth: self.projection_depth,
            refresh_snapshot_on_reconnect: self.refresh_snapshot_on_reconnect,
            receive_timeout: Duration::from_secs(self.receive_timeout_s),
            reconnect_delay: Duration::from_secs(self.reconnect_delay_s),
            ping_interval: Duration::from_secs(self.ping_interval_s),
            connect_timeout: Duration::from_secs(self.connect_timeout_s),
            http_timeout: Duration::from_millis(self.http_timeout_ms),
        }
    }
}

fn check_scheme(name: &str, value: &str, allowed: &[&str]) -> Result<(), String> {
    let url = Url::parse(value).map_err(|e| format!("{name} is not a valid URL: {e}"))?;
    if allowed.contains(&url.scheme()) {
        Ok(())
    } else {
        Err(format!("{name} must use one of {allowed:?}, got {}", url.scheme()))
    }
}

/// Settings for one feed session, passed explicitly into every session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FeedConfig {
    /// WebSocket stream URL.
    pub ws_url: String,
    /// REST API base URL.
    pub rest_url: String,
    /// Topic market segment.
    pub depth_market: String,
    /// Topic version segment.
    pub depth_version: String,
    /// Topic aggregation interval.
    pub depth_interval: String,
    /// Snapshot depth requested from REST.
    pub snapshot_limit: u32,
    /// Levels per side in published projections.
    pub projection_depth: usize,
    /// Re-fetch the snapshot before every reconnect.
    pub refresh_snapshot_on_reconnect: bool,
    /// Silence allowed before the connection is considered dead.
    pub receive_timeout: Duration,
    /// Fixed delay between reconnect attempts.
    pub reconnect_delay: Duration,
    /// Transport ping cadence.
    pub ping_interval: Duration,
    /// Upper bound on connect plus handshake.
    pub connect_timeout: Duration,
    /// REST request timeout.
    pub http_timeout: Duration,
}

impl Default for FeedConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            rest_url: default_rest_url(),
            depth_market: default_depth_market(),
            depth_version: default_depth_version(),
            depth_interval: default_depth_interval(),
            snapshot_limit: default_snapshot_limit(),
            projection_depth: default_projection_depth(),
            refresh_snapshot_on_reconnect: false,
            receive_timeout: Duration::from_secs(default_receive_timeout()),
            reconnect_delay: Duration::from_secs(default_reconnect_delay()),
            ping_interval: Duration::from_secs(default_ping_interval()),
            connect_timeout: Duration::from_secs(default_connect_timeout()),
            http_timeout: Duration::from_millis(default_http_timeout()),
        }
    }
}

impl FeedConfig {
    /// Check the values a session depends on.
    ///
    /// Timers and depths must be non-zero.
    pub fn validate(&self) -> Result<(), String> {
        let timers = [
            ("receive_timeout", self.receive_timeout),
            ("reconnect_delay", self.reconnect_delay),
            ("ping_interval", self.ping_interval),
            ("connect_timeout", self.connect_timeout),
            ("http_timeout", self.http_timeout),
        ];
        if let Some((name, _)) = timers.iter().find(|(_, d)| d.is_zero()) {
            return Err(format!("{name} must be greater than 0"));
        }
        if self.snapshot_limit == 0 || self.projection_depth == 0 {
            return Err("snapshot_limit and projection_depth must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Aggregated depth topic for a normalized symbol.
    pub fn depth_topic(&self, symbol: &str) -> String {
        format!(
            "{}@public.aggre.depth.{}@{}@{}",
            self.depth_market, self.depth_version, self.depth_interval, symbol
        )
    }
}
