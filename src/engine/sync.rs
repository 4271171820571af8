//! Depth synchronization state machine.
//!
//! Implements the Binance local book protocol:
//! 1. Buffer stream updates while a REST snapshot is in flight
//! 2. Install the snapshot, then replay the buffer through the sequence check,
//!    dropping updates the snapshot already covers
//! 3. Merge live updates one by one
//! 4. On a sequence gap or a disconnect, go back to step 1

use std::collections::VecDeque;
use std::mem;
use std::time::Instant;

use tracing::{debug, info, warn};

use super::guard::{evaluate, SyncDecision};
use super::throttle::Throttle;
use crate::metrics;
use crate::orderbook::book::OrderBook;
use crate::orderbook::store::SharedBook;
use crate::orderbook::types::{Snapshot, UpdateBatch};

/// Updates held while waiting for a snapshot, unless configured otherwise.
pub const DEFAULT_BUFFER_CAPACITY: usize = 1000;

#[derive(Debug)]
enum Phase {
    /// Waiting for a snapshot; stream updates are held here.
    Bootstrapping { buffer: VecDeque<UpdateBatch> },
    /// Book mirrors the exchange; updates are merged as they arrive.
    Live,
}

/// Result of feeding one update to the synchronizer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpdateOutcome {
    /// Held until the next snapshot is installed.
    Buffered,
    /// Merged; `emit` tells whether the book should be reported now.
    Applied { emit: bool },
    /// Already covered by the book and dropped.
    Stale,
    /// Updates were missed; the book needs a new snapshot.
    Gap { expected: u64, first: u64 },
}

/// Result of installing a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BootstrapReport {
    /// Sequence id of the installed snapshot.
    pub last_update_id: u64,
    /// Buffered updates merged on top of the snapshot.
    pub replayed: usize,
    /// Buffered updates the snapshot already covered.
    pub dropped: usize,
    /// Whether the book should be reported now.
    pub emit: bool,
    /// A gap was found during replay and another snapshot is needed.
    pub gap: bool,
}

/// Single writer for one symbol's [`SharedBook`].
#[derive(Debug)]
pub struct DepthSynchronizer {
    book: SharedBook,
    phase: Phase,
    throttle: Throttle,
    buffer_capacity: usize,
}

impl DepthSynchronizer {
    /// Starts in the bootstrapping phase with an empty buffer.
    pub fn new(book: SharedBook, throttle: Throttle, buffer_capacity: usize) -> Self {
        let buffer_capacity = buffer_capacity.max(1);
        Self {
            book,
            phase: Phase::Bootstrapping {
                buffer: VecDeque::with_capacity(buffer_capacity),
            },
            throttle,
            buffer_capacity,
        }
    }

    pub fn book(&self) -> &SharedBook {
        &self.book
    }

    /// Whether a snapshot must be installed before updates can be merged.
    pub fn needs_snapshot(&self) -> bool {
        matches!(self.phase, Phase::Bootstrapping { .. })
    }

    /// Number of updates waiting for a snapshot.
    pub fn buffered(&self) -> usize {
        match &self.phase {
            Phase::Bootstrapping { buffer } => buffer.len(),
            Phase::Live => 0,
        }
    }

    /// Feeds one stream update.
    pub fn on_update(&mut self, update: UpdateBatch, now: Instant) -> UpdateOutcome {
        metrics::inc_updates_received();

        match self.sequence(update) {
            SyncStep::Held => UpdateOutcome::Buffered,
            SyncStep::Merged => UpdateOutcome::Applied {
                emit: self.throttle.should_emit(now),
            },
            SyncStep::Stale => UpdateOutcome::Stale,
            SyncStep::Gap { expected, first } => UpdateOutcome::Gap { expected, first },
        }
    }

    /// Replaces the whole book with `snapshot` and replays buffered updates.
    pub fn install_snapshot(&mut self, snapshot: Snapshot, now: Instant) -> BootstrapReport {
        let pending = match mem::replace(&mut self.phase, Phase::Live) {
            Phase::Bootstrapping { buffer } => buffer,
            Phase::Live => VecDeque::new(),
        };

        let symbol = self.book.symbol();
        self.book
            .replace(OrderBook::from_snapshot(symbol.as_str(), &snapshot));
        let (bids, asks) = self.book.level_counts();
        metrics::set_book_levels(bids, asks);

        let mut report = BootstrapReport {
            last_update_id: snapshot.last_update_id,
            replayed: 0,
            dropped: 0,
            emit: false,
            gap: false,
        };

        for update in pending {
            match self.sequence(update) {
                SyncStep::Merged => report.replayed += 1,
                SyncStep::Stale => report.dropped += 1,
                SyncStep::Gap { .. } => report.gap = true,
                SyncStep::Held => {}
            }
        }

        if !report.gap {
            self.book.set_synchronized(true);
            if report.replayed > 0 {
                report.emit = self.throttle.should_emit(now);
            }
        }

        info!(
            symbol = %symbol,
            last_update_id = report.last_update_id,
            replayed = report.replayed,
            dropped = report.dropped,
            gap = report.gap,
            "Snapshot installed"
        );

        report
    }

    /// The stream dropped: anything may have been missed.
    pub fn on_disconnect(&mut self) {
        warn!(
            last_update_id = self.book.last_update_id(),
            "Feed disconnected, book desynchronized"
        );
        self.book.set_synchronized(false);
        self.phase = Phase::Bootstrapping {
            buffer: VecDeque::with_capacity(self.buffer_capacity),
        };
    }

    /// Buffers, merges or rejects one update. Gaps switch back to bootstrapping.
    fn sequence(&mut self, update: UpdateBatch) -> SyncStep {
        if let Phase::Bootstrapping { buffer } = &mut self.phase {
            if buffer.len() >= self.buffer_capacity {
                if let Some(oldest) = buffer.pop_front() {
                    debug!(
                        first_update_id = oldest.first_update_id,
                        final_update_id = oldest.final_update_id,
                        "Update buffer full, dropping oldest"
                    );
                }
            }
            buffer.push_back(update);
            return SyncStep::Held;
        }

        let start = Instant::now();
        let (decision, last_update_id, levels) = self.book.write(|book| {
            let last = book.last_update_id();
            let decision = evaluate(&update, last);
            if decision == SyncDecision::Accept {
                book.apply_update(&update);
            }
            (decision, last, (book.bid_levels(), book.ask_levels()))
        });

        match decision {
            SyncDecision::Accept => {
                metrics::record_merge_latency(start);
                metrics::inc_updates_applied();
                metrics::set_book_levels(levels.0, levels.1);
                SyncStep::Merged
            }
            SyncDecision::Stale => {
                debug!(
                    first_update_id = update.first_update_id,
                    final_update_id = update.final_update_id,
                    last_update_id,
                    event_time_ms = ?update.event_time_ms,
                    decision = %decision,
                    "Dropping stale depth update"
                );
                metrics::inc_updates_stale();
                SyncStep::Stale
            }
            SyncDecision::Gap => {
                let expected = last_update_id.saturating_add(1);
                let first = update.first_update_id;
                warn!(
                    symbol = %self.book.symbol(),
                    expected,
                    got_first = first,
                    got_final = update.final_update_id,
                    event_time_ms = ?update.event_time_ms,
                    "Depth sequence gap detected, re-syncing"
                );
                metrics::inc_sequence_gaps();

                self.book.set_synchronized(false);
                let mut buffer = VecDeque::with_capacity(self.buffer_capacity);
                buffer.push_back(update);
                self.phase = Phase::Bootstrapping { buffer };

                SyncStep::Gap { expected, first }
            }
        }
    }
}

enum SyncStep {
    Held,
    Merged,
    Stale,
    Gap { expected: u64, first: u64 },
}
