//! WebSocket client for the Binance diff depth stream.
//!
//! Features:
//! - Automatic reconnection with exponential backoff
//! - Heartbeat watchdog and ping/pong handling
//! - Connect/disconnect surfaced as events so the engine can resynchronize

use std::time::{Duration, Instant};

use futures::{SinkExt, StreamExt};
use rust_decimal::Decimal;
use serde::Deserialize;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio_tungstenite::{connect_async, tungstenite::Message};
use tracing::{debug, error, info, warn};
use url::Url;

use super::{to_levels, FeedEvent};
use crate::config::Config;
use crate::error::WsError;
use crate::metrics;
use crate::orderbook::types::UpdateBatch;

/// Raw `depthUpdate` event.
#[derive(Debug, Deserialize)]
pub struct DepthUpdateEvent {
    #[serde(rename = "e")]
    pub event_type: String,
    #[serde(rename = "E")]
    pub event_time: i64,
    #[serde(rename = "s")]
    pub symbol: String,
    #[serde(rename = "U")]
    pub first_update_id: u64,
    #[serde(rename = "u")]
    pub final_update_id: u64,
    #[serde(rename = "b")]
    pub bids: Vec<(Decimal, Decimal)>,
    #[serde(rename = "a")]
    pub asks: Vec<(Decimal, Decimal)>,
}

impl TryFrom<DepthUpdateEvent> for UpdateBatch {
    type Error = WsError;

    fn try_from(raw: DepthUpdateEvent) -> Result<Self, Self::Error> {
        if raw.first_update_id > raw.final_update_id {
            return Err(WsError::ParseError(format!(
                "update range {}..{} is reversed",
                raw.first_update_id, raw.final_update_id
            )));
        }

        let mut batch = UpdateBatch::new(
            raw.first_update_id,
            raw.final_update_id,
            to_levels(raw.bids).map_err(WsError::ParseError)?,
            to_levels(raw.asks).map_err(WsError::ParseError)?,
        );
        batch.event_time_ms = Some(raw.event_time);
        Ok(batch)
    }
}

/// Parses one text frame. Events other than `depthUpdate` yield `None`.
pub fn parse_message(text: &str) -> Result<Option<UpdateBatch>, WsError> {
    let value: serde_json::Value =
        serde_json::from_str(text).map_err(|e| WsError::ParseError(e.to_string()))?;

    if value.get("e").and_then(|v| v.as_str()) != Some("depthUpdate") {
        return Ok(None);
    }

    let raw: DepthUpdateEvent =
        serde_json::from_value(value).map_err(|e| WsError::ParseError(e.to_string()))?;
    raw.try_into().map(Some)
}

/// Reconnection configuration for WebSocket.
#[derive(Debug, Clone)]
pub struct ReconnectConfig {
    /// Initial backoff delay in milliseconds.
    pub initial_delay_ms: u64,
    /// Maximum backoff delay in seconds.
    pub max_delay_s: u64,
    /// Backoff multiplier (e.g., 2.0 for exponential).
    pub backoff_multiplier: f64,
    /// Heartbeat interval in seconds.
    pub heartbeat_interval_s: u64,
}

impl Default for ReconnectConfig {
    fn default() -> Self {
        Self {
            initial_delay_ms: 1000,
            max_delay_s: 30,
            backoff_multiplier: 2.0,
            heartbeat_interval_s: 30,
        }
    }
}

impl ReconnectConfig {
    /// Create from config values.
    pub fn from_config(max_delay_s: u64, heartbeat_interval_s: u64) -> Self {
        Self {
            max_delay_s,
            heartbeat_interval_s,
            ..Default::default()
        }
    }

    /// Calculate next delay with exponential backoff.
    pub fn next_delay(&self, attempt: u32) -> Duration {
        let delay_ms = self.initial_delay_ms as f64 * self.backoff_multiplier.powi(attempt as i32);
        let max_delay_ms = self.max_delay_s * 1000;
        let clamped_ms = delay_ms.min(max_delay_ms as f64) as u64;
        Duration::from_millis(clamped_ms)
    }

    /// Silence on the socket after which the connection is treated as dead.
    pub fn stale_after(&self) -> Duration {
        Duration::from_secs(self.heartbeat_interval_s.max(1) * 2)
    }
}

/// Live subscription to one symbol's depth stream.
///
/// Dropping it stops the connection task.
#[derive(Debug)]
pub struct Subscription {
    events: mpsc::Receiver<FeedEvent>,
    task: JoinHandle<()>,
}

impl Subscription {
    /// Receiver the engine consumes.
    pub fn events_mut(&mut self) -> &mut mpsc::Receiver<FeedEvent> {
        &mut self.events
    }
}

impl Drop for Subscription {
    fn drop(&mut self) {
        self.task.abort();
    }
}

/// Connects to the diff depth stream.
#[derive(Debug, Clone)]
pub struct DepthStream {
    /// WebSocket base URL.
    ws_url: String,
    /// Push interval, 1000 or 100 milliseconds.
    update_speed_ms: u64,
    /// Reconnection configuration.
    reconnect_config: ReconnectConfig,
    channel_capacity: usize,
}

impl DepthStream {
    /// Create a stream client with default reconnection settings.
    pub fn new(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            update_speed_ms: 1000,
            reconnect_config: ReconnectConfig::default(),
            channel_capacity: 10_000,
        }
    }

    /// Create a stream client from application config.
    pub fn from_config(config: &Config) -> Self {
        Self {
            ws_url: config.binance_ws_url.clone(),
            update_speed_ms: config.ws_update_speed_ms,
            reconnect_config: ReconnectConfig::from_config(
                config.ws_reconnect_max_delay_s,
                config.ws_heartbeat_interval_s,
            ),
            channel_capacity: config.event_channel_capacity,
        }
    }

    pub fn reconnect_config(&self) -> &ReconnectConfig {
        &self.reconnect_config
    }

    /// Stream URL for a lowercase symbol.
    pub fn stream_url(&self, stream_symbol: &str) -> Result<Url, WsError> {
        let suffix = if self.update_speed_ms == 100 {
            "@depth@100ms"
        } else {
            "@depth"
        };
        let raw = format!(
            "{}/ws/{}{}",
            self.ws_url.trim_end_matches('/'),
            stream_symbol.to_ascii_lowercase(),
            suffix
        );
        Ok(Url::parse(&raw)?)
    }

    /// Starts the connection task and returns the event receiver.
    ///
    /// The task reconnects forever; it stops when the subscription is dropped.
    pub fn subscribe(&self, stream_symbol: &str) -> Result<Subscription, WsError> {
        let url = self.stream_url(stream_symbol)?;
        let (tx, rx) = mpsc::channel(self.channel_capacity.max(1));
        let reconnect = self.reconnect_config.clone();

        let task = tokio::spawn(async move {
            let mut attempt = 0u32;

            loop {
                info!(url = %url, attempt = attempt, "Attempting WebSocket connection");

                match run_connection(&url, &reconnect, &tx).await {
                    Ok(ConnectionEnd::ReceiverGone) => {
                        info!("Channel closed, stopping WebSocket");
                        return;
                    }
                    Ok(ConnectionEnd::Dropped(reason)) => {
                        attempt = 0;
                        warn!(reason = %reason, "WebSocket stream ended, will reconnect");
                        if tx.send(FeedEvent::Disconnected { reason }).await.is_err() {
                            return;
                        }
                    }
                    Err(e) => {
                        error!(error = %e, attempt = attempt, "WebSocket connection failed");
                    }
                }

                let delay = reconnect.next_delay(attempt);
                metrics::inc_ws_reconnects();

                info!(delay_ms = delay.as_millis() as u64, "Reconnecting after delay");
                tokio::time::sleep(delay).await;

                attempt = attempt.saturating_add(1);
            }
        });

        Ok(Subscription { events: rx, task })
    }
}

enum ConnectionEnd {
    /// The connection was lost after it had been established.
    Dropped(String),
    /// Nobody is listening any more.
    ReceiverGone,
}

/// Runs one connection until it drops. Connect failures are returned as errors.
async fn run_connection(
    url: &Url,
    reconnect: &ReconnectConfig,
    tx: &mpsc::Sender<FeedEvent>,
) -> Result<ConnectionEnd, WsError> {
    let (ws_stream, _) = connect_async(url.as_str())
        .await
        .map_err(|e| WsError::ConnectionFailed(e.to_string()))?;

    info!(url = %url, "WebSocket connected");
    if tx.send(FeedEvent::Connected).await.is_err() {
        return Ok(ConnectionEnd::ReceiverGone);
    }

    let (mut write, mut read) = ws_stream.split();
    let stale_after = reconnect.stale_after();

    loop {
        let msg = match tokio::time::timeout(stale_after, read.next()).await {
            Ok(Some(msg)) => msg,
            Ok(None) => return Ok(ConnectionEnd::Dropped("stream ended".to_string())),
            Err(_) => {
                warn!(silence_s = stale_after.as_secs(), "No WebSocket traffic, dropping connection");
                return Ok(ConnectionEnd::Dropped("heartbeat timeout".to_string()));
            }
        };

        match msg {
            Ok(Message::Text(text)) => {
                let start = Instant::now();
                metrics::inc_ws_messages_received();
                let parsed = parse_message(&text);
                metrics::record_ws_message_latency(start);

                match parsed {
                    Ok(Some(update)) => {
                        if tx.send(FeedEvent::Update(update)).await.is_err() {
                            return Ok(ConnectionEnd::ReceiverGone);
                        }
                    }
                    Ok(None) => debug!("Ignoring non-depth message"),
                    Err(e) => warn!(error = %e, "Dropping unparseable message"),
                }
            }
            Ok(Message::Ping(data)) => {
                debug!("Received ping");
                if let Err(e) = write.send(Message::Pong(data)).await {
                    warn!(error = %e, "Failed to send pong");
                }
            }
            Ok(Message::Pong(_)) => debug!("Received pong"),
            Ok(Message::Close(frame)) => {
                let err = WsError::ConnectionClosed {
                    code: frame.as_ref().map(|f| u16::from(f.code)),
                    reason: frame
                        .map(|f| f.reason.to_string())
                        .unwrap_or_default(),
                };
                warn!(error = %err, "WebSocket closed");
                return Ok(ConnectionEnd::Dropped(err.to_string()));
            }
            Ok(_) => {}
            Err(e) => {
                let err = WsError::from(e);
                error!(error = %err, "WebSocket error");
                return Ok(ConnectionEnd::Dropped(err.to_string()));
            }
        }
    }
}
