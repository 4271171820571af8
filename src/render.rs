//! Console table for the reported book.

use rust_decimal::{Decimal, RoundingStrategy};

use crate::engine::DepthReporter;
use crate::orderbook::types::{DepthView, PriceLevel};

/// First line of every table.
pub const TABLE_HEADER: &str = "BID_SIZE  BID_PRICE ASK_PRICE   ASK_SIZE";

/// Formats a value with exactly two decimals, rounding half up.
pub fn format_decimal(value: Decimal) -> String {
    let mut rounded = value.round_dp_with_strategy(2, RoundingStrategy::MidpointAwayFromZero);
    rounded.rescale(2);
    rounded.to_string()
}

fn cells(level: Option<&PriceLevel>) -> (String, String) {
    match level {
        Some(level) => (format_decimal(level.quantity), format_decimal(level.price)),
        None => (String::new(), String::new()),
    }
}

/// Renders up to `depth` rows pairing the i-th best bid with the i-th best ask.
pub fn depth_table(bids: &[PriceLevel], asks: &[PriceLevel], depth: usize) -> String {
    let rows = depth.min(bids.len().max(asks.len()));
    let mut out = String::with_capacity((rows + 1) * 42);
    out.push_str(TABLE_HEADER);

    for i in 0..rows {
        let (bid_size, bid_price) = cells(bids.get(i));
        let (ask_size, ask_price) = cells(asks.get(i));
        out.push('\n');
        out.push_str(&format!(
            "{:<10}{:>10} {:<10}{:>10}",
            bid_size, bid_price, ask_price, ask_size
        ));
    }

    out
}

/// Prints each reported book to stdout.
#[derive(Debug, Clone)]
pub struct ConsoleReporter {
    depth: usize,
}

impl ConsoleReporter {
    pub fn new(depth: usize) -> Self {
        Self { depth }
    }
}

impl DepthReporter for ConsoleReporter {
    fn report(&mut self, view: &DepthView) {
        println!("{}\n", depth_table(&view.bids, &view.asks, self.depth));
    }
}
