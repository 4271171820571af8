//! Shared, lock-guarded handle to the mirrored book.
//!
//! The synchronizer is the only writer; the reporter, status API and metrics
//! gauges read through clones of the same handle. Every read or write holds
//! the lock for exactly one operation, so a reader never observes half of an
//! update batch.

use std::sync::Arc;

use parking_lot::RwLock;
use rust_decimal::Decimal;
use serde::Serialize;

use super::book::OrderBook;
use super::types::{DepthView, PriceLevel, Side};

#[derive(Debug)]
struct BookState {
    book: OrderBook,
    synchronized: bool,
}

/// Point-in-time summary of the book used by the status endpoint.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct BookSummary {
    pub symbol: String,
    pub synchronized: bool,
    pub last_update_id: u64,
    pub bid_levels: usize,
    pub ask_levels: usize,
    pub best_bid: Option<PriceLevel>,
    pub best_ask: Option<PriceLevel>,
    pub spread: Option<Decimal>,
    pub mid_price: Option<Decimal>,
}

/// Cloneable handle to one symbol's book.
#[derive(Debug, Clone)]
pub struct SharedBook {
    inner: Arc<RwLock<BookState>>,
}

impl SharedBook {
    /// Creates an empty, unsynchronized book.
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            inner: Arc::new(RwLock::new(BookState {
                book: OrderBook::new(symbol, 0),
                synchronized: false,
            })),
        }
    }

    pub fn symbol(&self) -> String {
        self.inner.read().book.symbol().to_string()
    }

    /// Whether the book currently mirrors the exchange.
    pub fn is_synchronized(&self) -> bool {
        self.inner.read().synchronized
    }

    pub fn last_update_id(&self) -> u64 {
        self.inner.read().book.last_update_id()
    }

    pub fn best_bid(&self) -> Option<PriceLevel> {
        self.inner.read().book.best_bid()
    }

    pub fn best_ask(&self) -> Option<PriceLevel> {
        self.inner.read().book.best_ask()
    }

    pub fn top_n(&self, side: Side, n: usize) -> Vec<PriceLevel> {
        self.inner.read().book.top_n(side, n)
    }

    /// Returns `(bid_levels, ask_levels)`.
    pub fn level_counts(&self) -> (usize, usize) {
        let state = self.inner.read();
        (state.book.bid_levels(), state.book.ask_levels())
    }

    /// Copies the top `depth` levels of both sides under one read lock.
    pub fn view(&self, depth: usize) -> DepthView {
        let state = self.inner.read();
        state.book.depth_view(depth, state.synchronized)
    }

    /// Builds a status summary under one read lock.
    pub fn summary(&self) -> BookSummary {
        let state = self.inner.read();
        let book = &state.book;
        BookSummary {
            symbol: book.symbol().to_string(),
            synchronized: state.synchronized,
            last_update_id: book.last_update_id(),
            bid_levels: book.bid_levels(),
            ask_levels: book.ask_levels(),
            best_bid: book.best_bid(),
            best_ask: book.best_ask(),
            spread: book.spread(),
            mid_price: book.mid_price(),
        }
    }

    /// Runs `f` against the book while holding the write lock.
    pub(crate) fn write<R>(&self, f: impl FnOnce(&mut OrderBook) -> R) -> R {
        f(&mut self.inner.write().book)
    }

    /// Swaps in a freshly bootstrapped book. It stays unsynchronized until
    /// the caller has replayed pending updates on top of it.
    pub(crate) fn replace(&self, book: OrderBook) {
        let mut state = self.inner.write();
        state.book = book;
        state.synchronized = false;
    }

    pub(crate) fn set_synchronized(&self, synchronized: bool) {
        self.inner.write().synchronized = synchronized;
    }
}
