//! Local order book mirror for a single Binance spot symbol.
//!
//! A REST depth snapshot seeds the book; the diff depth WebSocket stream keeps
//! it current. Every update is sequence-checked before it is merged, missed
//! updates force a fresh snapshot, and the book is reported on a throttle.

pub mod api;
pub mod config;
pub mod engine;
pub mod error;
pub mod feed;
pub mod metrics;
pub mod orderbook;
pub mod render;
pub mod utils;

pub use config::{Config, Instrument};
pub use error::{FeedError, MirrorError, Result, WsError};
pub use orderbook::{DepthView, OrderBook, PriceLevel, SharedBook, Side, Snapshot, UpdateBatch};
