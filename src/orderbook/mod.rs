//! Order book module for the mirrored market.
//!
//! This module handles:
//! - Price level, snapshot and update batch types
//! - Sorted bid/ask storage and the delta merge
//! - The shared handle readers use while the engine writes

pub mod book;
pub mod store;
pub mod types;

pub use book::OrderBook;
pub use store::{BookSummary, SharedBook};
pub use types::{DepthView, PriceLevel, Side, Snapshot, UpdateBatch};
