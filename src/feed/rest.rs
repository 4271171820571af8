//! Binance spot REST client for depth snapshots.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::Deserialize;
use tracing::{debug, instrument, warn};

use super::{to_levels, SnapshotSource};
use crate::config::Config;
use crate::error::FeedError;
use crate::orderbook::types::Snapshot;

/// Characters of response body kept in a status error.
const MAX_ERROR_BODY: usize = 512;

/// Depth snapshot response from `GET /api/v3/depth`.
#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DepthSnapshotResponse {
    /// Sequence id the snapshot is consistent with.
    pub last_update_id: u64,
    /// `[price, quantity]` pairs, best first.
    pub bids: Vec<(Decimal, Decimal)>,
    /// `[price, quantity]` pairs, best first.
    pub asks: Vec<(Decimal, Decimal)>,
}

impl TryFrom<DepthSnapshotResponse> for Snapshot {
    type Error = FeedError;

    fn try_from(raw: DepthSnapshotResponse) -> Result<Self, Self::Error> {
        Ok(Snapshot {
            last_update_id: raw.last_update_id,
            bids: to_levels(raw.bids).map_err(FeedError::Malformed)?,
            asks: to_levels(raw.asks).map_err(FeedError::Malformed)?,
        })
    }
}

/// Decodes a snapshot response body.
pub fn parse_snapshot(body: &str) -> Result<Snapshot, FeedError> {
    let raw: DepthSnapshotResponse = serde_json::from_str(body)?;
    raw.try_into()
}

/// Binance REST API client.
#[derive(Debug, Clone)]
pub struct BinanceRestClient {
    /// HTTP client for API requests.
    http: reqwest::Client,
    /// Base URL, without trailing slash.
    base_url: String,
}

impl BinanceRestClient {
    /// Create a client with the given request timeout.
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Result<Self, FeedError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .connect_timeout(Duration::from_millis(timeout.as_millis().min(2000) as u64))
            .tcp_nodelay(true)
            .tcp_keepalive(Duration::from_secs(30))
            .build()?;

        Ok(Self {
            http,
            base_url: base_url.into().trim_end_matches('/').to_string(),
        })
    }

    /// Create a client from application config.
    pub fn from_config(config: &Config) -> Result<Self, FeedError> {
        Self::new(config.binance_rest_url.clone(), config.http_timeout())
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Get a depth snapshot for a symbol.
    #[instrument(skip(self))]
    pub async fn get_depth(&self, symbol: &str, limit: usize) -> Result<Snapshot, FeedError> {
        let url = format!("{}/api/v3/depth", self.base_url);

        let response = self
            .http
            .get(&url)
            .query(&[("symbol", symbol.to_string()), ("limit", limit.to_string())])
            .send()
            .await?;

        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            warn!(status = %status, "Depth snapshot request failed");
            return Err(FeedError::Status {
                status: status.as_u16(),
                body: body.chars().take(MAX_ERROR_BODY).collect(),
            });
        }

        let snapshot = parse_snapshot(&body)?;
        debug!(
            last_update_id = snapshot.last_update_id,
            bid_levels = snapshot.bids.len(),
            ask_levels = snapshot.asks.len(),
            "Depth snapshot received"
        );

        Ok(snapshot)
    }
}

impl SnapshotSource for BinanceRestClient {
    async fn get_snapshot(&self, symbol: &str, limit: usize) -> Result<Snapshot, FeedError> {
        self.get_depth(symbol, limit).await
    }
}
