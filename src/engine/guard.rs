//! Sequence checks for incoming update batches.

use strum::Display;

use crate::orderbook::types::UpdateBatch;

/// What to do with an update given the book's current sequence id.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display)]
#[strum(serialize_all = "lowercase")]
pub enum SyncDecision {
    /// Merge it.
    Accept,
    /// Everything in it is already reflected; drop it.
    Stale,
    /// At least one update between the book and this batch was missed.
    Gap,
}

/// Classifies `update` against `last_update_id`.
///
/// Stale takes precedence: a batch ending at or before the book is dropped
/// even when its range is malformed. A batch that starts at or before
/// `last_update_id + 1` and ends after it overlaps the book and is accepted.
pub fn evaluate(update: &UpdateBatch, last_update_id: u64) -> SyncDecision {
    if update.final_update_id <= last_update_id {
        SyncDecision::Stale
    } else if update.first_update_id > last_update_id.saturating_add(1) {
        SyncDecision::Gap
    } else {
        SyncDecision::Accept
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn batch(first: u64, last: u64) -> UpdateBatch {
        UpdateBatch::new(first, last, vec![], vec![])
    }

    #[test]
    fn contiguous_update_is_accepted() {
        assert_eq!(evaluate(&batch(6, 6), 5), SyncDecision::Accept);
        assert_eq!(evaluate(&batch(6, 9), 5), SyncDecision::Accept);
    }

    #[test]
    fn overlapping_update_is_accepted() {
        assert_eq!(evaluate(&batch(3, 8), 5), SyncDecision::Accept);
        assert_eq!(evaluate(&batch(5, 6), 5), SyncDecision::Accept);
    }

    #[test]
    fn covered_update_is_stale() {
        assert_eq!(evaluate(&batch(4, 4), 5), SyncDecision::Stale);
        assert_eq!(evaluate(&batch(1, 5), 5), SyncDecision::Stale);
    }

    #[test]
    fn skipped_sequence_is_a_gap() {
        assert_eq!(evaluate(&batch(8, 8), 6), SyncDecision::Gap);
        assert_eq!(evaluate(&batch(7, 7), 5), SyncDecision::Gap);
    }

    #[test]
    fn decision_displays_lowercase() {
        assert_eq!(SyncDecision::Gap.to_string(), "gap");
    }
}
