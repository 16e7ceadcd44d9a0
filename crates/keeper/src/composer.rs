//! Atomic transaction composition.
//!
//! One decision becomes exactly one `TxBlock`. Close-and-reopen is a single
//! block: the close steps and the full open sequence execute together or not
//! at all, so an observer never sees custody without a position mid-cycle.
//! Freed liquidity flows into the new position through result references,
//! never through intermediate ledger state.

use serde_json::json;

use cycler_math::{range_for_width_bps, sqrt_price_from_tick};
use cycler_types::{Action, ManagedPosition, ObjectId, PoolSnapshot, PositionRange};

use crate::error::{KeeperError, KeeperResult};
use crate::flavor::CallTable;
use crate::ledger::{Arg, Call, TxBlock};

pub struct Composer {
    package: ObjectId,
    calls: CallTable,
    gas_budget: u64,
}

impl Composer {
    pub fn new(package: ObjectId, calls: CallTable, gas_budget: u64) -> Self {
        Composer {
            package,
            calls,
            gas_budget,
        }
    }

    /// Build the block for one decided action.
    ///
    /// Actions that manipulate an existing position need its realized range;
    /// composing one without a range is a caller bug, reported as a
    /// precondition failure rather than a panic.
    pub fn compose(
        &self,
        entry: &ManagedPosition,
        pool: &PoolSnapshot,
        range: Option<&PositionRange>,
        action: Action,
        now: i64,
    ) -> KeeperResult<TxBlock> {
        let mut block = TxBlock::new(self.gas_budget);

        match action {
            Action::Open => {
                self.push_open(&mut block, entry, pool);
            }
            Action::Rebalance => {
                let range = require_range(range, entry)?;
                self.push_close(&mut block, entry, pool, range, now);
                self.push_open(&mut block, entry, pool);
            }
            Action::CloseOnly => {
                let range = require_range(range, entry)?;
                self.push_close(&mut block, entry, pool, range, now);
            }
            Action::Compound => {
                self.push_compound(&mut block, entry, pool, now);
            }
            Action::ClaimFees => {
                self.push_claim(&mut block, entry, pool, now);
            }
        }

        block.push(self.call(
            self.calls.record_action,
            vec![],
            vec![
                Arg::Object(entry.entry),
                Arg::Pure(json!(action.to_string())),
                Arg::Pure(json!(now)),
            ],
        ));

        Ok(block)
    }

    fn call(&self, function: &str, type_args: Vec<String>, args: Vec<Arg>) -> Call {
        Call {
            package: self.package,
            module: self.calls.module.to_string(),
            function: function.to_string(),
            type_args,
            args,
        }
    }

    fn pair_types(entry: &ManagedPosition) -> Vec<String> {
        vec![entry.coin_a.clone(), entry.coin_b.clone()]
    }

    /// Deploy the entry's custody into a fresh position centered on the
    /// current price. The store step re-attaches the handle to the entry and
    /// is built unconditionally; a block without it would strand the handle.
    fn push_open(&self, block: &mut TxBlock, entry: &ManagedPosition, pool: &PoolSnapshot) {
        let pair = Self::pair_types(entry);
        let (tick_lower, tick_upper) =
            range_for_width_bps(pool.current_tick, entry.config.range_width_bps, pool.tick_spacing);
        let sqrt_lower = sqrt_price_from_tick(tick_lower);
        let sqrt_upper = sqrt_price_from_tick(tick_upper);

        block.push(self.call(
            self.calls.compound_pending,
            pair.clone(),
            vec![Arg::Object(entry.entry)],
        ));

        let funds = block.push(self.call(
            self.calls.withdraw_custody,
            pair.clone(),
            vec![Arg::Object(entry.entry)],
        ));

        let position = block.push(self.call(
            self.calls.open_position,
            pair.clone(),
            vec![
                Arg::Object(entry.pool),
                Arg::Pure(json!(tick_lower)),
                Arg::Pure(json!(tick_upper)),
                Arg::Pure(json!(sqrt_lower.to_string())),
                Arg::Pure(json!(sqrt_upper.to_string())),
            ],
        ));

        let leftover = block.push(self.call(
            self.calls.add_liquidity,
            pair.clone(),
            vec![Arg::Result(position), Arg::Result(funds)],
        ));

        block.push(self.call(
            self.calls.deposit_leftover,
            pair.clone(),
            vec![Arg::Object(entry.entry), Arg::Result(leftover)],
        ));

        block.push(self.call(
            self.calls.store_position,
            pair,
            vec![Arg::Object(entry.entry), Arg::Result(position)],
        ));
    }

    /// Unwind the open position: drain liquidity, collect fees and every
    /// live reward, redeposit proceeds into custody, and hand the emptied
    /// handle back to the owner.
    fn push_close(
        &self,
        block: &mut TxBlock,
        entry: &ManagedPosition,
        pool: &PoolSnapshot,
        range: &PositionRange,
        now: i64,
    ) {
        let pair = Self::pair_types(entry);

        let position = block.push(self.call(
            self.calls.retrieve_position,
            pair.clone(),
            vec![Arg::Object(entry.entry)],
        ));

        let removed = block.push(self.call(
            self.calls.remove_liquidity,
            pair.clone(),
            vec![
                Arg::Result(position),
                Arg::Pure(json!(range.liquidity.to_string())),
            ],
        ));

        let fees = block.push(self.call(
            self.calls.collect_fee,
            pair.clone(),
            vec![Arg::Result(position)],
        ));

        self.push_reward_collection(block, entry, pool, position, now);

        block.push(self.call(
            self.calls.deposit_proceeds,
            pair.clone(),
            vec![
                Arg::Object(entry.entry),
                Arg::Result(removed),
                Arg::Result(fees),
            ],
        ));

        block.push(self.call(
            self.calls.return_handle,
            pair,
            vec![Arg::Result(position), Arg::Pure(json!(entry.owner.to_hex()))],
        ));
    }

    /// Reinvest accrued fees into the same position, leaving its range as is
    fn push_compound(
        &self,
        block: &mut TxBlock,
        entry: &ManagedPosition,
        pool: &PoolSnapshot,
        now: i64,
    ) {
        let pair = Self::pair_types(entry);

        let position = block.push(self.call(
            self.calls.retrieve_position,
            pair.clone(),
            vec![Arg::Object(entry.entry)],
        ));

        let fees = block.push(self.call(
            self.calls.collect_fee,
            pair.clone(),
            vec![Arg::Result(position)],
        ));

        let leftover = block.push(self.call(
            self.calls.add_liquidity,
            pair.clone(),
            vec![Arg::Result(position), Arg::Result(fees)],
        ));

        block.push(self.call(
            self.calls.deposit_leftover,
            pair.clone(),
            vec![Arg::Object(entry.entry), Arg::Result(leftover)],
        ));

        self.push_reward_collection(block, entry, pool, position, now);

        block.push(self.call(
            self.calls.store_position,
            pair,
            vec![Arg::Object(entry.entry), Arg::Result(position)],
        ));
    }

    /// Collect fees and rewards and forward them to the owner unchanged
    fn push_claim(
        &self,
        block: &mut TxBlock,
        entry: &ManagedPosition,
        pool: &PoolSnapshot,
        now: i64,
    ) {
        let pair = Self::pair_types(entry);

        let position = block.push(self.call(
            self.calls.retrieve_position,
            pair.clone(),
            vec![Arg::Object(entry.entry)],
        ));

        let fees = block.push(self.call(
            self.calls.collect_fee,
            pair.clone(),
            vec![Arg::Result(position)],
        ));

        block.push(self.call(
            self.calls.forward_fees,
            pair.clone(),
            vec![Arg::Object(entry.entry), Arg::Result(fees)],
        ));

        self.push_reward_collection(block, entry, pool, position, now);

        block.push(self.call(
            self.calls.store_position,
            pair,
            vec![Arg::Object(entry.entry), Arg::Result(position)],
        ));
    }

    /// One collect/deposit pair per live reward emission. Expired emissions
    /// are skipped; their residue is claimable manually.
    fn push_reward_collection(
        &self,
        block: &mut TxBlock,
        entry: &ManagedPosition,
        pool: &PoolSnapshot,
        position: u16,
        now: i64,
    ) {
        for reward in pool.live_rewards(now) {
            let mut type_args = Self::pair_types(entry);
            type_args.push(reward.coin_type.clone());

            let collected = block.push(self.call(
                self.calls.collect_reward,
                type_args.clone(),
                vec![Arg::Result(position)],
            ));

            block.push(self.call(
                self.calls.deposit_reward,
                type_args,
                vec![Arg::Object(entry.entry), Arg::Result(collected)],
            ));
        }
    }
}

fn require_range<'a>(
    range: Option<&'a PositionRange>,
    entry: &ManagedPosition,
) -> KeeperResult<&'a PositionRange> {
    range.ok_or_else(|| {
        KeeperError::Precondition(format!("entry {} has no readable position range", entry.entry))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::flavor::VAULT_CALLS;
    use cycler_types::{CycleConfig, CycleStatus, RewardInfo};

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
                balance_a: 10_000,
                balance_b: 10_000,
                position_id: Some(id(9)),
            },
        }
    }

    fn pool() -> PoolSnapshot {
        PoolSnapshot {
            pool: id(4),
            current_tick: 1_000,
            tick_spacing: 60,
            rewards: vec![],
        }
    }

    fn range() -> PositionRange {
        PositionRange {
            tick_lower: 720,
            tick_upper: 1_200,
            liquidity: 5_000_000,
        }
    }

    fn composer() -> Composer {
        Composer::new(id(100), VAULT_CALLS, 50_000_000)
    }

    fn functions(block: &TxBlock) -> Vec<&str> {
        block.calls.iter().map(|c| c.function.as_str()).collect()
    }

    #[test]
    fn test_open_block_order() {
        let block = composer()
            .compose(&entry(), &pool(), None, Action::Open, 1_000)
            .unwrap();
        assert_eq!(
            functions(&block),
            vec![
                "compound_pending_fees",
                "withdraw_for_deploy",
                "open_position",
                "add_liquidity",
                "deposit_leftover",
                "store_position",
                "record_action",
            ]
        );
        assert_eq!(block.gas_budget, 50_000_000);
    }

    #[test]
    fn test_open_funds_flow_through_results() {
        let block = composer()
            .compose(&entry(), &pool(), None, Action::Open, 1_000)
            .unwrap();
        // add_liquidity consumes the open result and the withdraw result
        let add = &block.calls[3];
        assert_eq!(add.function, "add_liquidity");
        assert_eq!(add.args, vec![Arg::Result(2), Arg::Result(1)]);
        // store re-attaches the handle produced by open_position
        let store = &block.calls[5];
        assert_eq!(store.function, "store_position");
        assert_eq!(store.args[1], Arg::Result(2));
    }

    #[test]
    fn test_open_range_centered_and_aligned() {
        let block = composer()
            .compose(&entry(), &pool(), None, Action::Open, 1_000)
            .unwrap();
        let open = &block.calls[2];
        let lower = match &open.args[1] {
            Arg::Pure(v) => v.as_i64().unwrap() as i32,
            other => panic!("unexpected arg {other:?}"),
        };
        let upper = match &open.args[2] {
            Arg::Pure(v) => v.as_i64().unwrap() as i32,
            other => panic!("unexpected arg {other:?}"),
        };
        assert!(lower < 1_000 && 1_000 < upper);
        assert_eq!(lower % 60, 0);
        assert_eq!(upper % 60, 0);
        // sqrt bounds are stringified u128s matching the tick bounds
        let sqrt_lower = match &open.args[3] {
            Arg::Pure(v) => v.as_str().unwrap().parse::<u128>().unwrap(),
            other => panic!("unexpected arg {other:?}"),
        };
        assert_eq!(sqrt_lower, sqrt_price_from_tick(lower));
    }

    #[test]
    fn test_rebalance_is_one_block_close_then_open() {
        let block = composer()
            .compose(&entry(), &pool(), Some(&range()), Action::Rebalance, 1_000)
            .unwrap();
        let fns = functions(&block);

        assert_eq!(fns[0], "retrieve_position");
        assert_eq!(*fns.last().unwrap(), "record_action");

        let close_pos = fns.iter().position(|f| *f == "remove_liquidity").unwrap();
        let open_pos = fns.iter().position(|f| *f == "open_position").unwrap();
        assert!(close_pos < open_pos);

        // The handle is returned once and a new one is stored once
        assert_eq!(fns.iter().filter(|f| **f == "return_handle").count(), 1);
        assert_eq!(fns.iter().filter(|f| **f == "store_position").count(), 1);
    }

    #[test]
    fn test_rebalance_open_half_consumes_redeposited_custody() {
        let block = composer()
            .compose(&entry(), &pool(), Some(&range()), Action::Rebalance, 1_000)
            .unwrap();
        let fns = functions(&block);
        let deposit = fns.iter().position(|f| *f == "deposit_proceeds").unwrap();
        let withdraw = fns.iter().position(|f| *f == "withdraw_for_deploy").unwrap();
        assert!(deposit < withdraw);
    }

    #[test]
    fn test_close_only_never_reopens() {
        let block = composer()
            .compose(&entry(), &pool(), Some(&range()), Action::CloseOnly, 1_000)
            .unwrap();
        let fns = functions(&block);
        assert!(!fns.contains(&"open_position"));
        assert!(!fns.contains(&"store_position"));
        assert!(fns.contains(&"return_handle"));
        assert_eq!(*fns.last().unwrap(), "record_action");
    }

    #[test]
    fn test_close_removes_exact_liquidity() {
        let block = composer()
            .compose(&entry(), &pool(), Some(&range()), Action::CloseOnly, 1_000)
            .unwrap();
        let remove = block
            .calls
            .iter()
            .find(|c| c.function == "remove_liquidity")
            .unwrap();
        assert_eq!(remove.args[1], Arg::Pure(json!("5000000")));
    }

    #[test]
    fn test_compound_block_ends_with_store() {
        let block = composer()
            .compose(&entry(), &pool(), Some(&range()), Action::Compound, 1_000)
            .unwrap();
        let fns = functions(&block);
        assert!(!fns.contains(&"remove_liquidity"));
        assert!(!fns.contains(&"withdraw_for_deploy"));
        let store = fns.iter().position(|f| *f == "store_position").unwrap();
        assert_eq!(store, fns.len() - 2);
        assert_eq!(*fns.last().unwrap(), "record_action");
    }

    #[test]
    fn test_claim_forwards_without_reinvesting() {
        let block = composer()
            .compose(&entry(), &pool(), Some(&range()), Action::ClaimFees, 1_000)
            .unwrap();
        let fns = functions(&block);
        assert!(fns.contains(&"forward_fees"));
        assert!(!fns.contains(&"add_liquidity"));
        assert!(fns.contains(&"store_position"));
    }

    #[test]
    fn test_only_live_rewards_collected() {
        let mut p = pool();
        p.rewards = vec![
            RewardInfo {
                coin_type: "0xabc::gov::GOV".to_string(),
                ends_at: 0, // open-ended
            },
            RewardInfo {
                coin_type: "0xdef::old::OLD".to_string(),
                ends_at: 1, // long expired
            },
        ];

        let block = composer()
            .compose(&entry(), &p, Some(&range()), Action::CloseOnly, 1_000)
            .unwrap();
        let rewards: Vec<_> = block
            .calls
            .iter()
            .filter(|c| c.function == "collect_reward")
            .collect();
        assert_eq!(rewards.len(), 1);
        assert_eq!(rewards[0].type_args[2], "0xabc::gov::GOV");
    }

    #[test]
    fn test_record_action_carries_label_and_time() {
        let block = composer()
            .compose(&entry(), &pool(), None, Action::Open, 1_234)
            .unwrap();
        let record = block.calls.last().unwrap();
        assert_eq!(record.function, "record_action");
        assert_eq!(record.args[1], Arg::Pure(json!("open")));
        assert_eq!(record.args[2], Arg::Pure(json!(1_234)));
    }

    #[test]
    fn test_close_without_range_is_precondition_error() {
        let err = composer()
            .compose(&entry(), &pool(), None, Action::Rebalance, 1_000)
            .unwrap_err();
        assert!(matches!(err, KeeperError::Precondition(_)));
    }
}
