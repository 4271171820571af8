//! Mock snapshot source for unit and integration testing.
//!
//! This module provides a feed that serves queued snapshots without making
//! real network requests.

use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;

use parking_lot::Mutex;
use rust_decimal::Decimal;

use super::SnapshotSource;
use crate::error::FeedError;
use crate::orderbook::types::{PriceLevel, Snapshot};

/// Configuration for mock feed behavior.
#[derive(Debug, Clone, Default)]
pub struct MockConfig {
    /// Whether to fail every snapshot request.
    pub fail_snapshot: bool,
    /// Simulated latency in milliseconds.
    pub latency_ms: u64,
}

enum Queued {
    Snapshot(Snapshot),
    Failure(String),
}

/// Mock feed for testing.
///
/// Requests pop queued responses in order. The last queued snapshot keeps
/// being served once the queue is down to it.
#[derive(Clone, Default)]
pub struct MockFeed {
    config: MockConfig,
    queue: Arc<Mutex<VecDeque<Queued>>>,
    requests: Arc<Mutex<Vec<(String, usize)>>>,
}

impl std::fmt::Debug for MockFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MockFeed")
            .field("config", &self.config)
            .field("queued", &self.queue.lock().len())
            .field("requests", &self.requests.lock().len())
            .finish()
    }
}

impl MockFeed {
    /// Create a new mock feed with default configuration.
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock feed with custom configuration.
    pub fn with_config(config: MockConfig) -> Self {
        Self {
            config,
            ..Self::default()
        }
    }

    /// Queue a snapshot response.
    pub fn push_snapshot(&self, snapshot: Snapshot) {
        self.queue.lock().push_back(Queued::Snapshot(snapshot));
    }

    /// Queue a failed response.
    pub fn push_failure(&self, reason: impl Into<String>) {
        self.queue.lock().push_back(Queued::Failure(reason.into()));
    }

    /// `(symbol, limit)` of every request served so far.
    pub fn requests(&self) -> Vec<(String, usize)> {
        self.requests.lock().clone()
    }

    fn next_response(&self) -> Result<Snapshot, FeedError> {
        let mut queue = self.queue.lock();
        let next = if queue.len() > 1 {
            queue.pop_front()
        } else {
            match queue.front() {
                Some(Queued::Snapshot(snapshot)) => Some(Queued::Snapshot(snapshot.clone())),
                _ => queue.pop_front(),
            }
        };

        match next {
            Some(Queued::Snapshot(snapshot)) => Ok(snapshot),
            Some(Queued::Failure(reason)) => Err(FeedError::Rejected(reason)),
            None => Err(FeedError::Rejected("no snapshot queued".to_string())),
        }
    }
}

impl SnapshotSource for MockFeed {
    async fn get_snapshot(&self, symbol: &str, limit: usize) -> Result<Snapshot, FeedError> {
        if self.config.latency_ms > 0 {
            tokio::time::sleep(Duration::from_millis(self.config.latency_ms)).await;
        }

        self.requests.lock().push((symbol.to_string(), limit));

        if self.config.fail_snapshot {
            return Err(FeedError::Rejected("mock snapshot failure".to_string()));
        }

        self.next_response()
    }
}

/// Builder for snapshots with common shapes.
pub struct SnapshotBuilder {
    last_update_id: u64,
    bids: Vec<PriceLevel>,
    asks: Vec<PriceLevel>,
}

impl SnapshotBuilder {
    /// Create a builder for a snapshot at `last_update_id`.
    pub fn new(last_update_id: u64) -> Self {
        Self {
            last_update_id,
            bids: Vec::new(),
            asks: Vec::new(),
        }
    }

    /// Add a bid level.
    pub fn bid(mut self, price: Decimal, quantity: Decimal) -> Self {
        self.bids.push(PriceLevel::new(price, quantity));
        self
    }

    /// Add an ask level.
    pub fn ask(mut self, price: Decimal, quantity: Decimal) -> Self {
        self.asks.push(PriceLevel::new(price, quantity));
        self
    }

    /// `levels` evenly spaced levels per side around a spread, one tick apart.
    pub fn ladder(mut self, best_bid: Decimal, best_ask: Decimal, tick: Decimal, levels: u32) -> Self {
        for i in 0..levels {
            let offset = tick * Decimal::from(i);
            let quantity = Decimal::from(i + 1);
            self.bids.push(PriceLevel::new(best_bid - offset, quantity));
            self.asks.push(PriceLevel::new(best_ask + offset, quantity));
        }
        self
    }

    /// Build the snapshot, best levels first.
    pub fn build(mut self) -> Snapshot {
        self.bids.sort_by(|a, b| b.price.cmp(&a.price));
        self.asks.sort_by(|a, b| a.price.cmp(&b.price));

        Snapshot {
            last_update_id: self.last_update_id,
            bids: self.bids,
            asks: self.asks,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[tokio::test]
    async fn serves_queued_snapshots_in_order_and_repeats_last() {
        let feed = MockFeed::new();
        feed.push_snapshot(SnapshotBuilder::new(1).build());
        feed.push_snapshot(SnapshotBuilder::new(2).build());

        assert_eq!(feed.get_snapshot("ETHUSDT", 10).await.unwrap().last_update_id, 1);
        assert_eq!(feed.get_snapshot("ETHUSDT", 10).await.unwrap().last_update_id, 2);
        assert_eq!(feed.get_snapshot("ETHUSDT", 10).await.unwrap().last_update_id, 2);
        assert_eq!(feed.requests().len(), 3);
    }

    #[tokio::test]
    async fn queued_failure_is_returned_once() {
        let feed = MockFeed::new();
        feed.push_failure("boom");
        feed.push_snapshot(SnapshotBuilder::new(7).build());

        assert!(feed.get_snapshot("ETHUSDT", 10).await.is_err());
        assert_eq!(feed.get_snapshot("ETHUSDT", 10).await.unwrap().last_update_id, 7);
    }

    #[tokio::test]
    async fn empty_queue_and_fail_flag_error() {
        let feed = MockFeed::new();
        assert!(feed.get_snapshot("ETHUSDT", 10).await.is_err());

        let failing = MockFeed::with_config(MockConfig {
            fail_snapshot: true,
            ..Default::default()
        });
        failing.push_snapshot(SnapshotBuilder::new(1).build());
        assert!(failing.get_snapshot("ETHUSDT", 10).await.is_err());
        assert_eq!(failing.requests(), vec![("ETHUSDT".to_string(), 10)]);
    }

    #[test]
    fn builder_sorts_levels_best_first() {
        let snapshot = SnapshotBuilder::new(5)
            .bid(dec!(99), dec!(1))
            .bid(dec!(100), dec!(2))
            .ask(dec!(102), dec!(1))
            .ask(dec!(101), dec!(2))
            .build();

        assert_eq!(snapshot.bids[0].price, dec!(100));
        assert_eq!(snapshot.asks[0].price, dec!(101));
    }

    #[test]
    fn ladder_builds_symmetric_levels() {
        let snapshot = SnapshotBuilder::new(1)
            .ladder(dec!(100), dec!(101), dec!(0.5), 3)
            .build();

        assert_eq!(snapshot.bids.len(), 3);
        assert_eq!(snapshot.bids[2], PriceLevel::new(dec!(99), dec!(3)));
        assert_eq!(snapshot.asks[2], PriceLevel::new(dec!(102), dec!(3)));
    }
}
