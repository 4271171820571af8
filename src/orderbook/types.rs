//! Order book types and data structures.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

/// Single price level in an order book.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PriceLevel {
    /// Price at this level.
    pub price: Decimal,
    /// Total quantity resting at this price.
    pub quantity: Decimal,
}

impl PriceLevel {
    /// Create a new price level.
    pub fn new(price: Decimal, quantity: Decimal) -> Self {
        Self { price, quantity }
    }
}

impl From<(Decimal, Decimal)> for PriceLevel {
    fn from((price, quantity): (Decimal, Decimal)) -> Self {
        Self { price, quantity }
    }
}

/// Book side.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Side {
    /// Best price is the highest.
    Bid,
    /// Best price is the lowest.
    Ask,
}

/// Full point-in-time book used to bootstrap the mirror.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Snapshot {
    /// Sequence id the snapshot is consistent with.
    pub last_update_id: u64,
    /// Bid levels as delivered by the feed.
    pub bids: Vec<PriceLevel>,
    /// Ask levels as delivered by the feed.
    pub asks: Vec<PriceLevel>,
}

/// Incremental depth delta covering `first_update_id..=final_update_id`.
///
/// A level with zero quantity removes that price from its side.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UpdateBatch {
    /// First sequence id contained in this batch.
    pub first_update_id: u64,
    /// Last sequence id contained in this batch.
    pub final_update_id: u64,
    /// Bid level changes.
    pub bids: Vec<PriceLevel>,
    /// Ask level changes.
    pub asks: Vec<PriceLevel>,
    /// Exchange event time in milliseconds, when known.
    pub event_time_ms: Option<i64>,
}

impl UpdateBatch {
    /// Create a batch without an event time.
    pub fn new(
        first_update_id: u64,
        final_update_id: u64,
        bids: Vec<PriceLevel>,
        asks: Vec<PriceLevel>,
    ) -> Self {
        Self {
            first_update_id,
            final_update_id,
            bids,
            asks,
            event_time_ms: None,
        }
    }
}

/// Consistent copy of the top of both sides, taken under a single lock.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct DepthView {
    /// Instrument symbol.
    pub symbol: String,
    /// Sequence id of the last merged update.
    pub last_update_id: u64,
    /// Bids, best (highest) first.
    pub bids: Vec<PriceLevel>,
    /// Asks, best (lowest) first.
    pub asks: Vec<PriceLevel>,
    /// Whether the book was synchronized when the view was taken.
    pub synchronized: bool,
    /// Last mutation time, unix milliseconds.
    pub updated_at_ms: i64,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn price_level_creation() {
        let level = PriceLevel::new(dec!(2450.17), dec!(3.5));
        assert_eq!(level.price, dec!(2450.17));
        assert_eq!(level.quantity, dec!(3.5));
    }

    #[test]
    fn new_update_batch_has_no_event_time() {
        let batch = UpdateBatch::new(6, 7, vec![PriceLevel::new(dec!(10), dec!(1))], vec![]);
        assert_eq!(batch.event_time_ms, None);
        assert_eq!(batch.bids.len(), 1);
    }

    #[test]
    fn depth_view_serializes_decimals_as_strings() {
        let view = DepthView {
            symbol: "ETHUSDT".to_string(),
            last_update_id: 9,
            bids: vec![PriceLevel::new(dec!(100.5), dec!(2))],
            asks: vec![],
            synchronized: true,
            updated_at_ms: 0,
        };

        let json = serde_json::to_value(&view).unwrap();
        assert_eq!(json["bids"][0]["price"], "100.5");
        assert_eq!(json["last_update_id"], 9);
    }
}
