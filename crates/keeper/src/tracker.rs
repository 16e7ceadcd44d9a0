//! Out-of-range delay tracking.
//!
//! Per-position state machine `{ absent, counting(since) }` arming the
//! rebalance trigger only after a position has stayed out of range for the
//! configured delay. The map is process-local and lost on restart; a
//! restart conservatively re-arms all timers rather than trusting persisted
//! timestamps.

use std::collections::HashMap;

use cycler_types::ObjectId;

/// Verdict for one out-of-range observation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DelayGate {
    /// Delay elapsed (or configured as zero); rebalance may proceed
    Authorized,
    /// Still counting; reported for observability
    Waiting { remaining_secs: i64 },
}

/// Tracks how long each position has been observed outside its range
#[derive(Debug, Default)]
pub struct OutOfRangeTracker {
    since: HashMap<ObjectId, i64>,
}

impl OutOfRangeTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record an out-of-range observation at `now` and report whether the
    /// configured delay has elapsed.
    ///
    /// A zero delay authorizes immediately and bypasses the map entirely.
    /// An authorized entry is retained until [`clear`](Self::clear) so that
    /// re-evaluating an unchanged snapshot yields the same verdict.
    pub fn check(&mut self, id: ObjectId, now: i64, delay_secs: i64) -> DelayGate {
        if delay_secs <= 0 {
            return DelayGate::Authorized;
        }

        let since = *self.since.entry(id).or_insert(now);
        let elapsed = now - since;
        if elapsed >= delay_secs {
            DelayGate::Authorized
        } else {
            DelayGate::Waiting {
                remaining_secs: delay_secs - elapsed,
            }
        }
    }

    /// Position observed back in range; cancels any pending rebalance
    /// without side effects.
    pub fn reset(&mut self, id: ObjectId) {
        self.since.remove(&id);
    }

    /// Rebalance executed; forget the excursion
    pub fn clear(&mut self, id: ObjectId) {
        self.since.remove(&id);
    }

    pub fn len(&self) -> usize {
        self.since.len()
    }

    pub fn is_empty(&self) -> bool {
        self.since.is_empty()
    }
}
