use serde::{Deserialize, Serialize};

use crate::ids::ObjectId;

/// Read-only pool state fetched once per poll per distinct pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct PoolSnapshot {
    /// Pool identifier
    pub pool: ObjectId,

    /// Current pool tick (signed)
    pub current_tick: i32,

    /// Minimum distance between usable position boundaries
    pub tick_spacing: i32,

    /// Reward emissions configured on this pool
    pub rewards: Vec<RewardInfo>,
}

impl PoolSnapshot {
    /// Reward types whose emission has not ended as of `now`
    pub fn live_rewards(&self, now: i64) -> impl Iterator<Item = &RewardInfo> {
        self.rewards.iter().filter(move |r| r.is_live(now))
    }
}

/// A single reward emission on a pool
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct RewardInfo {
    /// Coin type tag of the reward asset
    pub coin_type: String,

    /// Unix second at which emission stops (0 = open-ended)
    pub ends_at: i64,
}

impl RewardInfo {
    pub fn is_live(&self, now: i64) -> bool {
        self.ends_at == 0 || now < self.ends_at
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_live_rewards_filters_expired() {
        let snapshot = PoolSnapshot {
            pool: ObjectId::ZERO,
            current_tick: 0,
            tick_spacing: 60,
            rewards: vec![
                RewardInfo {
                    coin_type: "0x2::sys::SYS".to_string(),
                    ends_at: 1_000,
                },
                RewardInfo {
                    coin_type: "0xabc::gov::GOV".to_string(),
                    ends_at: 0,
                },
            ],
        };

        let live: Vec<_> = snapshot.live_rewards(2_000).collect();
        assert_eq!(live.len(), 1);
        assert_eq!(live[0].coin_type, "0xabc::gov::GOV");

        let live: Vec<_> = snapshot.live_rewards(500).collect();
        assert_eq!(live.len(), 2);
    }
}
