//! Wall-clock gate for reporting the book.

use std::time::{Duration, Instant};

/// Lets at most one emission through per interval.
///
/// The first call always passes. Only emissions are gated; merging is not.
#[derive(Debug, Clone)]
pub struct Throttle {
    interval: Duration,
    last_emit: Option<Instant>,
}

impl Throttle {
    pub fn new(interval: Duration) -> Self {
        Self {
            interval,
            last_emit: None,
        }
    }

    /// Returns true and records `now` when an emission is due.
    pub fn should_emit(&mut self, now: Instant) -> bool {
        let due = match self.last_emit {
            None => true,
            Some(last) => now.saturating_duration_since(last) >= self.interval,
        };
        if due {
            self.last_emit = Some(now);
        }
        due
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_call_emits() {
        let mut throttle = Throttle::new(Duration::from_secs(10));
        assert!(throttle.should_emit(Instant::now()));
    }

    #[test]
    fn suppresses_within_interval() {
        let mut throttle = Throttle::new(Duration::from_millis(10_000));
        let t0 = Instant::now();

        assert!(throttle.should_emit(t0));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(3000)));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(9999)));
        assert!(throttle.should_emit(t0 + Duration::from_millis(10_000)));
        assert!(!throttle.should_emit(t0 + Duration::from_millis(15_000)));
        assert!(throttle.should_emit(t0 + Duration::from_millis(20_000)));
    }

    #[test]
    fn earlier_instant_does_not_emit() {
        let mut throttle = Throttle::new(Duration::from_secs(1));
        let t0 = Instant::now() + Duration::from_secs(5);
        assert!(throttle.should_emit(t0));
        assert!(!throttle.should_emit(t0 - Duration::from_secs(2)));
    }
}
