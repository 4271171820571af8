//! Prometheus metrics for the depth mirror.
//!
//! This module provides metrics for:
//! - Update sequencing outcomes (applied, stale, gaps, rebootstraps)
//! - Snapshot fetch and merge latency
//! - WebSocket traffic and reconnects
//! - Book size gauges

use std::time::Instant;

use metrics::{
    counter, describe_counter, describe_gauge, describe_histogram, gauge, histogram,
};
use tracing::debug;

// === Metric Name Constants ===

/// Depth updates received from the stream.
pub const METRIC_UPDATES_RECEIVED: &str = "depth_updates_received_total";
/// Depth updates merged into the book.
pub const METRIC_UPDATES_APPLIED: &str = "depth_updates_applied_total";
/// Depth updates discarded as already covered.
pub const METRIC_UPDATES_STALE: &str = "depth_updates_stale_total";
/// Sequence gaps detected.
pub const METRIC_SEQUENCE_GAPS: &str = "depth_sequence_gaps_total";
/// Snapshot bootstraps after the first one.
pub const METRIC_REBOOTSTRAPS: &str = "depth_rebootstraps_total";
/// Book states handed to the reporter.
pub const METRIC_EMISSIONS: &str = "book_emissions_total";
/// WebSocket messages received counter metric name.
pub const METRIC_WS_MESSAGES_RECEIVED: &str = "ws_messages_received_total";
/// WebSocket reconnects counter metric name.
pub const METRIC_WS_RECONNECTS: &str = "ws_reconnects_total";
/// Snapshot fetch latency metric name.
pub const METRIC_SNAPSHOT_FETCH_LATENCY: &str = "snapshot_fetch_latency_ms";
/// Update merge latency metric name.
pub const METRIC_MERGE_LATENCY: &str = "update_merge_latency_ms";
/// WebSocket message latency metric name.
pub const METRIC_WS_MESSAGE_LATENCY: &str = "ws_message_latency_ms";
/// Bid level count gauge.
pub const METRIC_BID_LEVELS: &str = "book_bid_levels";
/// Ask level count gauge.
pub const METRIC_ASK_LEVELS: &str = "book_ask_levels";

/// Initialize all metric descriptions.
/// Call this once at startup to register metrics with descriptions.
pub fn init_metrics() {
    // Latency histograms
    describe_histogram!(
        METRIC_SNAPSHOT_FETCH_LATENCY,
        "Depth snapshot fetch latency in milliseconds"
    );
    describe_histogram!(
        METRIC_MERGE_LATENCY,
        "Time to sequence-check and merge one update batch in milliseconds"
    );
    describe_histogram!(
        METRIC_WS_MESSAGE_LATENCY,
        "WebSocket message processing latency in milliseconds"
    );

    // Counters
    describe_counter!(
        METRIC_UPDATES_RECEIVED,
        "Total number of depth updates received"
    );
    describe_counter!(
        METRIC_UPDATES_APPLIED,
        "Total number of depth updates merged into the book"
    );
    describe_counter!(
        METRIC_UPDATES_STALE,
        "Total number of depth updates discarded as stale"
    );
    describe_counter!(METRIC_SEQUENCE_GAPS, "Total number of sequence gaps detected");
    describe_counter!(
        METRIC_REBOOTSTRAPS,
        "Total number of snapshot rebootstraps after a gap or disconnect"
    );
    describe_counter!(METRIC_EMISSIONS, "Total number of book states reported");
    describe_counter!(
        METRIC_WS_MESSAGES_RECEIVED,
        "Total number of WebSocket messages received"
    );
    describe_counter!(
        METRIC_WS_RECONNECTS,
        "Total number of WebSocket reconnections"
    );

    // Gauges
    describe_gauge!(METRIC_BID_LEVELS, "Bid price levels currently held");
    describe_gauge!(METRIC_ASK_LEVELS, "Ask price levels currently held");

    debug!("Metrics initialized");
}

fn elapsed_ms(start: Instant) -> f64 {
    start.elapsed().as_secs_f64() * 1000.0
}

/// Record snapshot fetch latency.
pub fn record_snapshot_fetch_latency(start: Instant, symbol: &str) {
    histogram!(METRIC_SNAPSHOT_FETCH_LATENCY, "symbol" => symbol.to_string())
        .record(elapsed_ms(start));
}

/// Record update merge latency.
pub fn record_merge_latency(start: Instant) {
    histogram!(METRIC_MERGE_LATENCY).record(elapsed_ms(start));
}

/// Record WebSocket message processing latency.
pub fn record_ws_message_latency(start: Instant) {
    histogram!(METRIC_WS_MESSAGE_LATENCY).record(elapsed_ms(start));
}

/// Increment depth updates received counter.
pub fn inc_updates_received() {
    counter!(METRIC_UPDATES_RECEIVED).increment(1);
}

/// Increment depth updates applied counter.
pub fn inc_updates_applied() {
    counter!(METRIC_UPDATES_APPLIED).increment(1);
}

/// Increment stale depth updates counter.
pub fn inc_updates_stale() {
    counter!(METRIC_UPDATES_STALE).increment(1);
}

/// Increment sequence gaps counter.
pub fn inc_sequence_gaps() {
    counter!(METRIC_SEQUENCE_GAPS).increment(1);
}

/// Increment rebootstraps counter.
pub fn inc_rebootstraps() {
    counter!(METRIC_REBOOTSTRAPS).increment(1);
}

/// Increment book emissions counter.
pub fn inc_emissions() {
    counter!(METRIC_EMISSIONS).increment(1);
}

/// Increment WebSocket messages received counter.
pub fn inc_ws_messages_received() {
    counter!(METRIC_WS_MESSAGES_RECEIVED).increment(1);
}

/// Increment WebSocket reconnects counter.
pub fn inc_ws_reconnects() {
    counter!(METRIC_WS_RECONNECTS).increment(1);
}

/// Publish the current level counts of both sides.
pub fn set_book_levels(bids: usize, asks: usize) {
    gauge!(METRIC_BID_LEVELS).set(bids as f64);
    gauge!(METRIC_ASK_LEVELS).set(asks as f64);
}
