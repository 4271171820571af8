//! Sorted dual-sided price level storage.

use std::cmp::Reverse;
use std::collections::BTreeMap;

use rust_decimal::Decimal;
use time::OffsetDateTime;

use super::types::{DepthView, PriceLevel, Side, Snapshot, UpdateBatch};

/// Local order book for one symbol.
///
/// Bids are keyed by `Reverse<Decimal>` so iteration yields the highest price
/// first; asks use natural ordering so the lowest price comes first. Prices
/// compare by value, so `100.0` and `100.00` address the same level.
#[derive(Debug, Clone)]
pub struct OrderBook {
    symbol: String,
    bids: BTreeMap<Reverse<Decimal>, Decimal>,
    asks: BTreeMap<Decimal, Decimal>,
    /// Sequence id of the snapshot or last merged update.
    last_update_id: u64,
    updated_at: OffsetDateTime,
}

impl OrderBook {
    /// Creates an empty book positioned at `last_update_id`.
    pub fn new(symbol: impl Into<String>, last_update_id: u64) -> Self {
        Self {
            symbol: symbol.into(),
            bids: BTreeMap::new(),
            asks: BTreeMap::new(),
            last_update_id,
            updated_at: OffsetDateTime::now_utc(),
        }
    }

    /// Builds a book from a full snapshot. Zero-quantity levels are skipped and
    /// a repeated price keeps the last quantity seen.
    pub fn from_snapshot(symbol: impl Into<String>, snapshot: &Snapshot) -> Self {
        let mut book = Self::new(symbol, snapshot.last_update_id);
        for level in &snapshot.bids {
            book.set_level(Side::Bid, level.price, level.quantity);
        }
        for level in &snapshot.asks {
            book.set_level(Side::Ask, level.price, level.quantity);
        }
        book
    }

    /// Returns the symbol this book tracks.
    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    /// Returns the sequence id the book is consistent with.
    pub fn last_update_id(&self) -> u64 {
        self.last_update_id
    }

    /// Merges one accepted update batch into both sides.
    ///
    /// The caller is responsible for sequencing; this only upserts and removes
    /// levels and then moves `last_update_id` to the batch's final id.
    pub fn apply_update(&mut self, update: &UpdateBatch) {
        for level in &update.bids {
            self.set_level(Side::Bid, level.price, level.quantity);
        }
        for level in &update.asks {
            self.set_level(Side::Ask, level.price, level.quantity);
        }

        self.last_update_id = update.final_update_id;
        self.updated_at = OffsetDateTime::now_utc();
    }

    /// Sets the quantity resting at `price`, removing the level when the
    /// quantity is not positive.
    fn set_level(&mut self, side: Side, price: Decimal, quantity: Decimal) {
        let remove = quantity <= Decimal::ZERO;
        match side {
            Side::Bid if remove => {
                self.bids.remove(&Reverse(price));
            }
            Side::Bid => {
                self.bids.insert(Reverse(price), quantity);
            }
            Side::Ask if remove => {
                self.asks.remove(&price);
            }
            Side::Ask => {
                self.asks.insert(price, quantity);
            }
        }
    }

    /// Returns the best (highest) bid level.
    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.bids
            .iter()
            .next()
            .map(|(Reverse(price), qty)| PriceLevel::new(*price, *qty))
    }

    /// Returns the best (lowest) ask level.
    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.asks
            .iter()
            .next()
            .map(|(price, qty)| PriceLevel::new(*price, *qty))
    }

    /// Returns up to `n` levels of `side`, best price first.
    pub fn top_n(&self, side: Side, n: usize) -> Vec<PriceLevel> {
        match side {
            Side::Bid => self
                .bids
                .iter()
                .take(n)
                .map(|(Reverse(price), qty)| PriceLevel::new(*price, *qty))
                .collect(),
            Side::Ask => self
                .asks
                .iter()
                .take(n)
                .map(|(price, qty)| PriceLevel::new(*price, *qty))
                .collect(),
        }
    }

    /// Returns the spread (best ask - best bid).
    pub fn spread(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some(ask.price - bid.price)
    }

    /// Returns the mid price (average of best bid and best ask).
    pub fn mid_price(&self) -> Option<Decimal> {
        let bid = self.best_bid()?;
        let ask = self.best_ask()?;
        Some((bid.price + ask.price) / Decimal::TWO)
    }

    /// Returns the number of bid levels.
    pub fn bid_levels(&self) -> usize {
        self.bids.len()
    }

    /// Returns the number of ask levels.
    pub fn ask_levels(&self) -> usize {
        self.asks.len()
    }

    /// Copies the top `depth` levels of both sides.
    pub fn depth_view(&self, depth: usize, synchronized: bool) -> DepthView {
        DepthView {
            symbol: self.symbol.clone(),
            last_update_id: self.last_update_id,
            bids: self.top_n(Side::Bid, depth),
            asks: self.top_n(Side::Ask, depth),
            synchronized,
            updated_at_ms: (self.updated_at.unix_timestamp_nanos() / 1_000_000) as i64,
        }
    }
}
