//! Snapshot bootstrap.

use std::sync::Arc;
use std::time::Instant;

use tracing::{error, info};

use crate::error::{MirrorError, Result};
use crate::feed::SnapshotSource;
use crate::metrics;
use crate::orderbook::types::Snapshot;

/// Fetches full snapshots through a [`SnapshotSource`]. No retries here.
#[derive(Debug)]
pub struct SnapshotLoader<S> {
    source: Arc<S>,
}

impl<S> Clone for SnapshotLoader<S> {
    fn clone(&self) -> Self {
        Self {
            source: Arc::clone(&self.source),
        }
    }
}

impl<S: SnapshotSource> SnapshotLoader<S> {
    pub fn new(source: Arc<S>) -> Self {
        Self { source }
    }

    /// Loads up to `depth` levels per side for `symbol`.
    pub async fn load_snapshot(&self, symbol: &str, depth: usize) -> Result<Snapshot> {
        if symbol.trim().is_empty() {
            return Err(MirrorError::InvalidArgument(
                "symbol must not be empty".to_string(),
            ));
        }
        if depth == 0 {
            return Err(MirrorError::InvalidArgument(
                "snapshot depth must be positive".to_string(),
            ));
        }

        let start = Instant::now();
        let result = self.source.get_snapshot(symbol, depth).await;
        metrics::record_snapshot_fetch_latency(start, symbol);

        match result {
            Ok(snapshot) => {
                info!(
                    symbol = %symbol,
                    last_update_id = snapshot.last_update_id,
                    bid_levels = snapshot.bids.len(),
                    ask_levels = snapshot.asks.len(),
                    "Snapshot loaded"
                );
                Ok(snapshot)
            }
            Err(source) => {
                error!(symbol = %symbol, error = %source, "Snapshot fetch failed");
                Err(MirrorError::FeedUnavailable {
                    symbol: symbol.to_string(),
                    source,
                })
            }
        }
    }
}
