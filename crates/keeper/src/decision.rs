//! Per-position decision engine.
//!
//! Runs once per position per poll tick and evaluates triggers in strict
//! priority order, stopping at the first match. When several triggers fire
//! at once the earliest rule's label is reported alone. Evaluating an
//! unchanged snapshot twice yields the same decision.

use cycler_math::divergence_loss_for_range;
use cycler_types::{Action, Decision, ManagedPosition, PoolSnapshot, PositionRange, Trigger};

use crate::tracker::{DelayGate, OutOfRangeTracker};

/// Select at most one action for this position this poll.
///
/// Priority: first open, out-of-range (delay-gated), timer expiry,
/// divergence breach, recurring compound, recurring claim.
pub fn decide(
    entry: &ManagedPosition,
    pool: &PoolSnapshot,
    range: Option<&PositionRange>,
    tracker: &mut OutOfRangeTracker,
    divergence_limit_bps: u32,
    now: i64,
) -> Option<Decision> {
    if entry.status.is_paused {
        return None;
    }

    // Rule 1: first deployment of a custody balance
    if entry.status.is_active && !entry.status.has_position && entry.custody_total() > 0 {
        return Some(Decision {
            action: Action::Open,
            trigger: Trigger::FirstOpen,
        });
    }

    // Everything below needs an open position with a known range
    if !entry.status.has_position || entry.cycles_exhausted() {
        return None;
    }
    let range = range?;

    let closing_action = if entry.next_cycle_is_final() {
        Action::CloseOnly
    } else {
        Action::Rebalance
    };

    let in_range = range.contains(pool.current_tick);

    // Rule 2: out of range, once the delay gate opens
    if in_range {
        tracker.reset(entry.entry);
    } else if entry.config.auto_rebalance {
        match tracker.check(entry.entry, now, entry.config.rebalance_delay_secs) {
            DelayGate::Authorized => {
                return Some(Decision {
                    action: closing_action,
                    trigger: Trigger::OutOfRange,
                });
            }
            DelayGate::Waiting { remaining_secs } => {
                log::debug!(
                    "entry {}: out of range, {}s until rebalance is authorized",
                    entry.entry,
                    remaining_secs
                );
            }
        }
    }

    let scheduled = entry.status.next_run_at > 0 && now >= entry.status.next_run_at;

    // Rule 3: backup timer
    if entry.config.auto_rebalance && scheduled {
        return Some(Decision {
            action: closing_action,
            trigger: Trigger::TimerExpired,
        });
    }

    // Rule 4: divergence-loss safety valve, overrides the timer
    if entry.config.auto_rebalance
        && divergence_loss_for_range(pool.current_tick, range) > divergence_limit_bps
    {
        return Some(Decision {
            action: closing_action,
            trigger: Trigger::DivergenceBreach,
        });
    }

    // Rules 5/6: recurring maintenance, in-range only
    if in_range && entry.config.recurring && scheduled {
        if entry.config.auto_compound {
            return Some(Decision {
                action: Action::Compound,
                trigger: Trigger::RecurringCompound,
            });
        }
        if entry.config.auto_claim {
            return Some(Decision {
                action: Action::ClaimFees,
                trigger: Trigger::RecurringClaim,
            });
        }
    }

    None
}

#[cfg(test)]
mod tests {
    use super::*;
    use cycler_types::{CycleConfig, CycleStatus, ObjectId, DEFAULT_DIVERGENCE_LIMIT_BPS};

    fn id(n: u8) -> ObjectId {
        let mut bytes = [0u8; 32];
        bytes[31] = n;
        ObjectId::new(bytes)
    }

    fn entry() -> ManagedPosition {
        ManagedPosition {
            entry: id(1),
            owner: id(2),
            operator: id(3),
            pool: id(4),
            coin_a: "0x2::sys::SYS".to_string(),
            coin_b: "0xusd::usd::USD".to_string(),
            config: CycleConfig {
                range_width_bps: 500,
                auto_rebalance: true,
                auto_compound: false,
                auto_claim: false,
                recurring: false,
                rebalance_delay_secs: 0,
                recur_interval_secs: 3600,
                max_cycles: 0,
            },
            status: CycleStatus {
                is_active: true,
                is_paused: false,
                has_position: true,
                cycles_completed: 0,
                next_run_at: 0,
                balance_a: 0,
                balance_b: 0,
                position_id: Some(id(9)),
            },
        }
    }

    fn pool(current_tick: i32) -> PoolSnapshot {
        PoolSnapshot {
            pool: id(4),
            current_tick,
            tick_spacing: 60,
            rewards: vec![],
        }
    }

    fn range(lower: i32, upper: i32) -> PositionRange {
        PositionRange {
            tick_lower: lower,
            tick_upper: upper,
            liquidity: 1_000_000,
        }
    }

    fn run(
        entry: &ManagedPosition,
        pool: &PoolSnapshot,
        range: Option<&PositionRange>,
        tracker: &mut OutOfRangeTracker,
        now: i64,
    ) -> Option<Decision> {
        decide(entry, pool, range, tracker, DEFAULT_DIVERGENCE_LIMIT_BPS, now)
    }

    #[test]
    fn test_first_open_regardless_of_other_fields() {
        let mut e = entry();
        e.status.has_position = false;
        e.status.position_id = None;
        e.status.balance_a = 5_000;
        // Fields that would otherwise trigger or exclude
        e.status.next_run_at = 1;
        e.status.cycles_completed = 99;
        e.config.max_cycles = 1;

        let mut tracker = OutOfRangeTracker::new();
        let decision = run(&e, &pool(0), None, &mut tracker, 1_000).unwrap();
        assert_eq!(decision.action, Action::Open);
        assert_eq!(decision.trigger, Trigger::FirstOpen);
    }

    #[test]
    fn test_paused_excluded_before_evaluation() {
        let mut e = entry();
        e.status.is_paused = true;
        e.status.has_position = false;
        e.status.balance_a = 5_000;

        let mut tracker = OutOfRangeTracker::new();
        assert!(run(&e, &pool(0), None, &mut tracker, 1_000).is_none());
    }

    #[test]
    fn test_out_of_range_beats_divergence_label() {
        // Far outside a narrow range: both rule 2 and rule 4 fire; the
        // earlier rule's reason is reported.
        let e = entry();
        let r = range(-100, 100);
        let mut tracker = OutOfRangeTracker::new();

        let decision = run(&e, &pool(8_000), Some(&r), &mut tracker, 1_000).unwrap();
        assert_eq!(decision.action, Action::Rebalance);
        assert_eq!(decision.trigger, Trigger::OutOfRange);
    }

    #[test]
    fn test_delay_gates_out_of_range() {
        let mut e = entry();
        e.config.rebalance_delay_secs = 600;
        let r = range(-100, 100);
        let mut tracker = OutOfRangeTracker::new();

        // In range near the edge of a narrow band, so no other trigger fires
        assert!(run(&e, &pool(200), Some(&r), &mut tracker, 1_000).is_none());

        let decision = run(&e, &pool(200), Some(&r), &mut tracker, 1_600).unwrap();
        assert_eq!(decision.trigger, Trigger::OutOfRange);
    }

    #[test]
    fn test_back_in_range_cancels_pending_rebalance() {
        let mut e = entry();
        e.config.rebalance_delay_secs = 600;
        let r = range(-100, 100);
        let mut tracker = OutOfRangeTracker::new();

        run(&e, &pool(200), Some(&r), &mut tracker, 1_000);
        assert_eq!(tracker.len(), 1);

        // Price returns; the pending excursion is forgotten
        run(&e, &pool(0), Some(&r), &mut tracker, 1_100);
        assert!(tracker.is_empty());

        // A later excursion restarts the timer from its own timestamp
        assert!(run(&e, &pool(200), Some(&r), &mut tracker, 1_550).is_none());
        assert!(run(&e, &pool(200), Some(&r), &mut tracker, 2_100).is_none());
        assert!(run(&e, &pool(200), Some(&r), &mut tracker, 2_150).is_some());
    }

    #[test]
    fn test_final_cycle_resolves_to_close_only() {
        let mut e = entry();
        e.config.max_cycles = 3;
        e.status.cycles_completed = 2;
        let r = range(-100, 100);
        let mut tracker = OutOfRangeTracker::new();

        let decision = run(&e, &pool(500), Some(&r), &mut tracker, 1_000).unwrap();
        assert_eq!(decision.action, Action::CloseOnly);
        assert_eq!(decision.trigger, Trigger::OutOfRange);
    }

    #[test]
    fn test_exhausted_cycles_excluded() {
        let mut e = entry();
        e.config.max_cycles = 3;
        e.status.cycles_completed = 3;
        let r = range(-100, 100);
        let mut tracker = OutOfRangeTracker::new();

        assert!(run(&e, &pool(500), Some(&r), &mut tracker, 1_000).is_none());
    }

    #[test]
    fn test_timer_expiry_backup_trigger() {
        let mut e = entry();
        e.status.next_run_at = 900;
        let r = range(-1_000, 1_000);
        let mut tracker = OutOfRangeTracker::new();

        let decision = run(&e, &pool(0), Some(&r), &mut tracker, 1_000).unwrap();
        assert_eq!(decision.action, Action::Rebalance);
        assert_eq!(decision.trigger, Trigger::TimerExpired);

        // Not yet due
        let mut tracker = OutOfRangeTracker::new();
        assert!(run(&e, &pool(0), Some(&r), &mut tracker, 800).is_none());
    }

    #[test]
    fn test_divergence_breach_overrides_unexpired_timer() {
        let mut e = entry();
        e.status.next_run_at = 99_999; // far in the future
        // Wide range: tick 8000 is still inside, but far from center
        let r = range(-10_000, 10_000);
        let mut tracker = OutOfRangeTracker::new();

        let decision = run(&e, &pool(8_000), Some(&r), &mut tracker, 1_000).unwrap();
        assert_eq!(decision.action, Action::Rebalance);
        assert_eq!(decision.trigger, Trigger::DivergenceBreach);
    }

    #[test]
    fn test_recurring_compound_and_claim() {
        let mut e = entry();
        e.config.auto_rebalance = false;
        e.config.recurring = true;
        e.config.auto_compound = true;
        e.status.next_run_at = 900;
        let r = range(-1_000, 1_000);
        let mut tracker = OutOfRangeTracker::new();

        let decision = run(&e, &pool(0), Some(&r), &mut tracker, 1_000).unwrap();
        assert_eq!(decision.action, Action::Compound);
        assert_eq!(decision.trigger, Trigger::RecurringCompound);

        // Claim only runs with compounding disabled
        e.config.auto_compound = false;
        e.config.auto_claim = true;
        let decision = run(&e, &pool(0), Some(&r), &mut tracker, 1_000).unwrap();
        assert_eq!(decision.action, Action::ClaimFees);
        assert_eq!(decision.trigger, Trigger::RecurringClaim);
    }

    #[test]
    fn test_recurring_requires_in_range() {
        let mut e = entry();
        e.config.auto_rebalance = false;
        e.config.recurring = true;
        e.config.auto_compound = true;
        e.status.next_run_at = 900;
        let r = range(-100, 100);
        let mut tracker = OutOfRangeTracker::new();

        assert!(run(&e, &pool(200), Some(&r), &mut tracker, 1_000).is_none());
    }

    #[test]
    fn test_idempotent_on_unchanged_snapshot() {
        let e = entry();
        let r = range(-100, 100);
        let mut tracker = OutOfRangeTracker::new();

        let first = run(&e, &pool(8_000), Some(&r), &mut tracker, 1_000);
        let second = run(&e, &pool(8_000), Some(&r), &mut tracker, 1_000);
        assert_eq!(first, second);

        // Also stable while the delay gate is still counting
        let mut e = entry();
        e.config.rebalance_delay_secs = 600;
        let first = run(&e, &pool(8_000), Some(&r), &mut tracker, 1_000);
        let second = run(&e, &pool(8_000), Some(&r), &mut tracker, 1_000);
        assert_eq!(first, second);
    }

    #[test]
    fn test_missing_range_yields_no_action() {
        let e = entry();
        let mut tracker = OutOfRangeTracker::new();
        assert!(run(&e, &pool(0), None, &mut tracker, 1_000).is_none());
    }
}
