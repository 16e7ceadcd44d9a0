use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;

/// A managed position entry: the unit of work for the keeper.
///
/// Configuration is immutable per cycle (reconfigured externally, if at
/// all); status is re-read from the ledger on every poll and never cached
/// across polls. The entry holds at most one open underlying position at
/// any ledger-observable instant.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ManagedPosition {
    /// Entry object identifier
    pub entry: ObjectId,

    /// Account that owns the underlying assets
    pub owner: ObjectId,

    /// Account authorized to drive the cycle
    pub operator: ObjectId,

    /// Pool the position trades in
    pub pool: ObjectId,

    /// Asset type tags of the pair
    pub coin_a: String,
    pub coin_b: String,

    pub config: CycleConfig,
    pub status: CycleStatus,
}

/// Per-entry cycling configuration
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleConfig {
    /// Target range width in basis points (full width, centered on price)
    pub range_width_bps: u32,

    /// Feature toggles
    pub auto_rebalance: bool,
    pub auto_compound: bool,
    pub auto_claim: bool,
    pub recurring: bool,

    /// Seconds a position must stay out of range before a rebalance
    pub rebalance_delay_secs: i64,

    /// Recurring compound/claim interval in seconds
    pub recur_interval_secs: i64,

    /// Maximum close-and-reopen cycles (0 = unbounded)
    pub max_cycles: u32,
}

/// Per-entry mutable status, sourced fresh from the ledger every poll
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CycleStatus {
    pub is_active: bool,
    pub is_paused: bool,
    pub has_position: bool,

    /// Close-and-reopen cycles completed so far
    pub cycles_completed: u32,

    /// Next scheduled run (unix seconds, 0 = never scheduled)
    pub next_run_at: i64,

    /// Custody balances held by the entry wrapper, pending deployment
    pub balance_a: u128,
    pub balance_b: u128,

    /// Underlying position handle, present while a position is open
    pub position_id: Option<ObjectId>,
}

impl ManagedPosition {
    /// Total custody balance pending deployment
    pub fn custody_total(&self) -> u128 {
        self.status.balance_a.saturating_add(self.status.balance_b)
    }

    /// All permitted cycles consumed; the entry drops out of evaluation
    pub fn cycles_exhausted(&self) -> bool {
        self.config.max_cycles > 0 && self.status.cycles_completed >= self.config.max_cycles
    }

    /// The next close would be the final permitted cycle
    pub fn next_cycle_is_final(&self) -> bool {
        self.config.max_cycles > 0
            && self.status.cycles_completed.saturating_add(1) >= self.config.max_cycles
    }
}

/// Realized range of the currently open underlying position.
///
/// Read from ledger dynamic state, never derived from configuration:
/// the config stores only the target width, not the realized bounds.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
pub struct PositionRange {
    pub tick_lower: i32,
    pub tick_upper: i32,
    pub liquidity: u128,
}

impl PositionRange {
    pub fn contains(&self, tick: i32) -> bool {
        tick >= self.tick_lower && tick <= self.tick_upper
    }

    /// Geometric-center tick of the range
    pub fn center_tick(&self) -> i32 {
        (self.tick_lower + self.tick_upper) / 2
    }
}
