//! REST client setup and the symbol directory.

use std::time::{Duration, Instant};

use serde::Deserialize;
use serde_json::Value;
use tracing::{debug, instrument};

use crate::config::FeedConfig;
use crate::error::MarketError;

const DEFAULT_SYMBOLS_PATH: &str = "/api/v3/defaultSymbols";

/// Build the shared HTTP client for REST calls.
pub fn build_http_client(config: &FeedConfig) -> reqwest::Result<reqwest::Client> {
    reqwest::Client::builder()
        .timeout(config.http_timeout)
        .connect_timeout(config.connect_timeout)
        // TCP_NODELAY for low-latency (disable Nagle's algorithm)
        .tcp_nodelay(true)
        .tcp_keepalive(Duration::from_secs(30))
        .pool_idle_timeout(Duration::from_secs(90))
        .user_agent(concat!("mexc-depth/", env!("CARGO_PKG_VERSION")))
        .build()
}

/// Default symbols response.
#[derive(Debug, Clone, Deserialize)]
struct DefaultSymbolsResponse {
    #[serde(default)]
    data: Vec<Value>,
}

/// Read access to the exchange's recommended symbol list.
#[derive(Debug, Clone)]
pub struct SymbolDirectory {
    http: reqwest::Client,
    url: String,
}

impl SymbolDirectory {
    /// Create a directory for the given REST base URL.
    pub fn new(http: reqwest::Client, rest_url: &str) -> Self {
        Self {
            http,
            url: format!("{}{}", rest_url.trim_end_matches('/'), DEFAULT_SYMBOLS_PATH),
        }
    }

    /// Fetch every tradable default symbol.
    #[instrument(skip(self), fields(url = %self.url))]
    pub async fn default_symbols(&self) -> Result<Vec<String>, MarketError> {
        let start = Instant::now();
        let response = self.http.get(&self.url).send().await?;

        if !response.status().is_success() {
            return Err(MarketError::Status {
                endpoint: DEFAULT_SYMBOLS_PATH,
                status: response.status().as_u16(),
            });
        }

        let body: DefaultSymbolsResponse = response
            .json()
            .await
            .map_err(|e| MarketError::Parse(format!("Failed to parse default symbols: {e}")))?;

        let symbols = symbols_from(body);
        debug!(count = symbols.len(), elapsed_ms = start.elapsed().as_millis() as u64, "Default symbols fetched");
        Ok(symbols)
    }
}

fn symbols_from(body: DefaultSymbolsResponse) -> Vec<String> {
    body.data
        .into_iter()
        .filter_map(|v| v.as_str().map(str::to_string))
        .collect()
}
