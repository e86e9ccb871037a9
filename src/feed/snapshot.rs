//! One-shot REST depth snapshot.

use std::time::Instant;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{info, instrument, warn};

use crate::error::SnapshotError;
use crate::metrics;
use crate::orderbook::PriceLevel;

/// Full depth listing for one symbol.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DepthSnapshot {
    /// Exchange update id the listing corresponds to.
    pub last_update_id: Option<u64>,
    /// Ask levels as listed by the exchange.
    pub asks: Vec<PriceLevel>,
    /// Bid levels as listed by the exchange.
    pub bids: Vec<PriceLevel>,
}

/// Depth response from the REST API. Levels are `[price, quantity]` pairs.
#[derive(Debug, Clone, Deserialize)]
struct DepthResponse {
    #[serde(rename = "lastUpdateId")]
    last_update_id: Option<u64>,
    #[serde(default)]
    asks: Vec<(Decimal, Decimal)>,
    #[serde(default)]
    bids: Vec<(Decimal, Decimal)>,
}

impl From<DepthResponse> for DepthSnapshot {
    fn from(response: DepthResponse) -> Self {
        let to_levels = |levels: Vec<(Decimal, Decimal)>| {
            levels
                .into_iter()
                .map(|(price, quantity)| PriceLevel::new(price, quantity))
                .collect()
        };
        Self {
            last_update_id: response.last_update_id,
            asks: to_levels(response.asks),
            bids: to_levels(response.bids),
        }
    }
}

/// Parse a depth response body.
pub fn parse_depth_snapshot(body: &str) -> Result<DepthSnapshot, SnapshotError> {
    serde_json::from_str::<DepthResponse>(body)
        .map(DepthSnapshot::from)
        .map_err(|e| SnapshotError::Parse(e.to_string()))
}

/// Fetches depth snapshots. Makes exactly one request per call, no retries.
#[derive(Debug, Clone)]
pub struct SnapshotLoader {
    http: reqwest::Client,
    depth_url: String,
}

impl SnapshotLoader {
    /// Create a loader for the given REST base URL.
    pub fn new(http: reqwest::Client, rest_url: &str) -> Self {
        Self {
            http,
            depth_url: format!("{}/api/v3/depth", rest_url.trim_end_matches('/')),
        }
    }

    /// Fetch a snapshot of at most `limit` levels per side.
    #[instrument(skip(self), fields(url = %self.depth_url))]
    pub async fn fetch(&self, symbol: &str, limit: u32) -> Result<DepthSnapshot, SnapshotError> {
        let start = Instant::now();
        let result = self.request(symbol, limit).await;
        metrics::record_snapshot_latency(start, symbol);

        match &result {
            Ok(snapshot) => info!(
                symbol = %symbol,
                asks = snapshot.asks.len(),
                bids = snapshot.bids.len(),
                "Snapshot fetched"
            ),
            Err(e) => {
                metrics::inc_snapshot_failures();
                warn!(symbol = %symbol, error = %e, "Failed to fetch snapshot");
            }
        }
        result
    }

    async fn request(&self, symbol: &str, limit: u32) -> Result<DepthSnapshot, SnapshotError> {
        let response = self
            .http
            .get(&self.depth_url)
            .query(&[("symbol", symbol.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        if !response.status().is_success() {
            return Err(SnapshotError::Status {
                symbol: symbol.to_string(),
                status: response.status().as_u16(),
            });
        }

        let body = response.text().await?;
        parse_depth_snapshot(&body)
    }
}
