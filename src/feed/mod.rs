//! Market data feed: REST depth snapshots and the diff depth stream.
//!
//! This module handles:
//! - The snapshot source seam the engine fetches through
//! - The Binance REST client and a mock for tests
//! - The WebSocket subscription with reconnect and heartbeat handling

pub mod mock;
pub mod rest;
pub mod websocket;

use std::future::Future;

use rust_decimal::Decimal;

use crate::error::FeedError;
use crate::orderbook::types::{PriceLevel, Snapshot, UpdateBatch};

pub use mock::{MockConfig, MockFeed, SnapshotBuilder};
pub use rest::BinanceRestClient;
pub use websocket::{DepthStream, ReconnectConfig, Subscription};

/// Source of full depth snapshots.
pub trait SnapshotSource: Send + Sync {
    /// Fetches up to `limit` levels per side for `symbol`.
    fn get_snapshot(
        &self,
        symbol: &str,
        limit: usize,
    ) -> impl Future<Output = Result<Snapshot, FeedError>> + Send;
}

/// Event delivered by a stream subscription.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum FeedEvent {
    /// The stream (re)connected; updates follow.
    Connected,
    /// One diff depth event.
    Update(UpdateBatch),
    /// The connection dropped; updates may have been missed.
    Disconnected {
        /// Why the connection ended.
        reason: String,
    },
}

/// Converts wire `[price, quantity]` pairs into levels, rejecting negatives.
pub(crate) fn to_levels(raw: Vec<(Decimal, Decimal)>) -> Result<Vec<PriceLevel>, String> {
    raw.into_iter()
        .map(|(price, quantity)| {
            if price < Decimal::ZERO || quantity < Decimal::ZERO {
                Err(format!("negative level [{price}, {quantity}]"))
            } else {
                Ok(PriceLevel::new(price, quantity))
            }
        })
        .collect()
}
