//! Poll-driven sweep orchestration.
//!
//! Each sweep enumerates managed entries, re-reads their state, decides at
//! most one action per entry, and submits one atomic block per decision.
//! A failure on one entry is logged and isolated; the sweep always reaches
//! the remaining entries. Only enumeration failures abort a sweep, and even
//! those only skip to the next poll.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;
use tokio::time;

use cycler_types::{Action, ObjectId, PoolSnapshot};

use crate::composer::Composer;
use crate::config::{KeeperConfig, Mode};
use crate::decision::decide;
use crate::error::{KeeperError, KeeperResult};
use crate::flavor::{DirectFlavor, Flavor, VaultFlavor};
use crate::ledger::Ledger;
use crate::reader::{fetch_entry, fetch_pool, fetch_position_range};
use crate::tracker::OutOfRangeTracker;

/// Outcome counters for one sweep
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct SweepStats {
    /// Entries enumerated
    pub scanned: usize,
    /// Blocks submitted (or logged, in dry-run)
    pub acted: usize,
    /// Entries with nothing to do or filtered out
    pub skipped: usize,
    /// Entries whose processing failed this poll
    pub failed: usize,
}

pub struct Keeper {
    ledger: Arc<dyn Ledger>,
    flavor: Box<dyn Flavor>,
    composer: Composer,
    tracker: OutOfRangeTracker,
    operator: ObjectId,
    divergence_limit_bps: u32,
    min_gas_balance: u128,
    dry_run: bool,
}

impl Keeper {
    pub fn new(
        ledger: Arc<dyn Ledger>,
        config: &KeeperConfig,
        operator: ObjectId,
        dry_run: bool,
    ) -> Self {
        let flavor: Box<dyn Flavor> = match config.mode {
            Mode::Vault => Box::new(VaultFlavor::new(config.registry_id)),
            Mode::Direct => Box::new(DirectFlavor::new(config.package_id)),
        };
        let composer = Composer::new(config.package_id, *flavor.calls(), config.gas_budget);

        Keeper {
            ledger,
            flavor,
            composer,
            tracker: OutOfRangeTracker::new(),
            operator,
            divergence_limit_bps: config.divergence_limit_bps,
            min_gas_balance: config.min_gas_balance,
            dry_run,
        }
    }

    pub fn flavor_name(&self) -> &'static str {
        self.flavor.name()
    }

    /// Poll until `stop` flips. The signal is honored at sweep boundaries
    /// only: a stop that lands mid-sweep lets the sweep finish, then halts
    /// before the next one. Dropping the sender also stops the loop.
    pub async fn run_loop(
        &mut self,
        poll_interval_secs: u64,
        mut stop: watch::Receiver<bool>,
    ) -> KeeperResult<()> {
        let mut interval = time::interval(Duration::from_secs(poll_interval_secs));
        let mut iteration = 0u64;

        loop {
            tokio::select! {
                _ = interval.tick() => {}
                _ = stop.changed() => {
                    log::info!("Stop signal received, halting");
                    return Ok(());
                }
            }
            iteration += 1;

            log::debug!("Starting sweep {iteration}");

            let now = chrono::Utc::now().timestamp();
            match self.run_sweep(now).await {
                Ok(stats) => {
                    if stats.acted > 0 || stats.failed > 0 {
                        log::info!(
                            "Sweep {iteration}: {} acted, {} failed of {} scanned",
                            stats.acted,
                            stats.failed,
                            stats.scanned
                        );
                    } else {
                        log::debug!("Sweep {iteration}: nothing to do");
                    }
                }
                Err(e) => {
                    log::error!("Sweep {iteration} failed to enumerate entries: {e}");
                    // Keep running; the next poll retries from scratch
                }
            }

            if *stop.borrow() {
                log::info!("Stop signal received during sweep {iteration}, halting");
                return Ok(());
            }

            if iteration % 100 == 0 {
                log::info!("Health check - iteration {iteration}");
                if let Err(e) = self.health_check().await {
                    log::warn!("Health check warning: {e}");
                }
            }
        }
    }

    /// One full pass over every managed entry
    pub async fn run_sweep(&mut self, now: i64) -> KeeperResult<SweepStats> {
        let entries = self.flavor.list_entries(self.ledger.as_ref()).await?;
        let mut stats = SweepStats {
            scanned: entries.len(),
            ..SweepStats::default()
        };

        // Pools are read once per sweep even when many entries share one
        let mut pools: HashMap<ObjectId, PoolSnapshot> = HashMap::new();

        for id in entries {
            match self.process_entry(id, &mut pools, now).await {
                Ok(true) => stats.acted += 1,
                Ok(false) => stats.skipped += 1,
                Err(err) => {
                    stats.failed += 1;
                    match &err {
                        KeeperError::NotFound(_) => log::debug!("entry {id}: {err}"),
                        KeeperError::Rejected(_) => log::error!("entry {id}: {err}"),
                        _ => log::warn!("entry {id}: {err}"),
                    }
                }
            }
        }

        log::info!(
            "sweep done: {} scanned, {} acted, {} skipped, {} failed",
            stats.scanned,
            stats.acted,
            stats.skipped,
            stats.failed
        );
        Ok(stats)
    }

    /// Returns `Ok(true)` when a block was submitted for this entry
    async fn process_entry(
        &mut self,
        id: ObjectId,
        pools: &mut HashMap<ObjectId, PoolSnapshot>,
        now: i64,
    ) -> KeeperResult<bool> {
        let ledger = self.ledger.as_ref();

        let Some(entry) = fetch_entry(ledger, id).await? else {
            log::debug!("entry {id} no longer exists, skipping");
            return Ok(false);
        };

        if entry.operator != self.operator {
            log::debug!("entry {id} is operated by {}, not us", entry.operator);
            return Ok(false);
        }

        let pool = match pools.get(&entry.pool) {
            Some(snapshot) => snapshot.clone(),
            None => {
                let snapshot = fetch_pool(ledger, entry.pool).await?;
                pools.insert(entry.pool, snapshot.clone());
                snapshot
            }
        };

        let range = match entry.status.position_id {
            Some(position_id) if entry.status.has_position => {
                let range = fetch_position_range(ledger, position_id).await?;
                if range.is_none() {
                    // Status says open but the handle is gone; a racing
                    // external close. Re-read next poll rather than guess.
                    log::warn!("entry {id}: position {position_id} not readable, skipping");
                    return Ok(false);
                }
                range
            }
            _ => None,
        };

        let Some(decision) = decide(
            &entry,
            &pool,
            range.as_ref(),
            &mut self.tracker,
            self.divergence_limit_bps,
            now,
        ) else {
            return Ok(false);
        };

        let block = self
            .composer
            .compose(&entry, &pool, range.as_ref(), decision.action, now)?;

        if self.dry_run {
            log::info!(
                "entry {id}: would {} ({}, {} calls), dry run",
                decision.action,
                decision.trigger,
                block.calls.len()
            );
            return Ok(true);
        }

        let receipt = self.ledger.submit(&block).await?;
        log::info!(
            "entry {id}: {} ({}) submitted, digest {}",
            decision.action,
            decision.trigger,
            receipt.digest
        );

        // The excursion is resolved only once a close actually lands
        if matches!(decision.action, Action::Rebalance | Action::CloseOnly) {
            self.tracker.clear(id);
        }

        Ok(true)
    }

    /// Operator gas balance check, run periodically between sweeps
    pub async fn health_check(&self) -> KeeperResult<u128> {
        let balance = self.ledger.get_balance(self.operator).await?;
        if balance < self.min_gas_balance {
            log::warn!(
                "operator gas balance {balance} is below the configured minimum {}",
                self.min_gas_balance
            );
        } else {
            log::debug!("operator gas balance {balance} ok");
        }
        Ok(balance)
    }
}
