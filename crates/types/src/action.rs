use std::fmt;

use serde::{Deserialize, Serialize};

/// Action selected for a managed position on one poll tick.
///
/// At most one action is emitted per position per poll.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Action {
    /// First deployment of custody balance into a new position
    Open,
    /// Close the current position and reopen centered on the current price
    Rebalance,
    /// Close without reopening (final permitted cycle)
    CloseOnly,
    /// Reinvest collected fees into the same position
    Compound,
    /// Collect fees and rewards and forward them to the owner
    ClaimFees,
}

impl fmt::Display for Action {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Action::Open => "open",
            Action::Rebalance => "rebalance",
            Action::CloseOnly => "close",
            Action::Compound => "compound",
            Action::ClaimFees => "claim",
        };
        write!(f, "{s}")
    }
}

/// Why the decision engine selected an action.
///
/// When several triggers fire at once the earliest rule wins and its label
/// alone is reported.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Trigger {
    FirstOpen,
    OutOfRange,
    TimerExpired,
    DivergenceBreach,
    RecurringCompound,
    RecurringClaim,
}

impl fmt::Display for Trigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Trigger::FirstOpen => "first-open",
            Trigger::OutOfRange => "out-of-range",
            Trigger::TimerExpired => "timer-expired",
            Trigger::DivergenceBreach => "divergence-breach",
            Trigger::RecurringCompound => "recurring-compound",
            Trigger::RecurringClaim => "recurring-claim",
        };
        write!(f, "{s}")
    }
}

/// Decision emitted by the engine for one position on one poll
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Decision {
    pub action: Action,
    pub trigger: Trigger,
}
