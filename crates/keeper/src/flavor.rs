//! Deployment flavors.
//!
//! The contract ships two registration schemes with identical position
//! mechanics: custody-vault entries live as dynamic fields of a registry
//! object, directly-registered entries are announced through events. One
//! engine serves both, parameterized by the call-name table and the
//! enumeration strategy below.

use std::collections::HashSet;

use async_trait::async_trait;
use serde_json::Value;

use cycler_types::ObjectId;

use crate::error::{KeeperError, KeeperResult};
use crate::ledger::Ledger;

/// Contract call names for each composed step
#[derive(Debug, Clone, Copy)]
pub struct CallTable {
    pub module: &'static str,
    pub retrieve_position: &'static str,
    pub store_position: &'static str,
    pub open_position: &'static str,
    pub add_liquidity: &'static str,
    pub remove_liquidity: &'static str,
    pub collect_fee: &'static str,
    pub collect_reward: &'static str,
    pub compound_pending: &'static str,
    pub withdraw_custody: &'static str,
    pub deposit_proceeds: &'static str,
    pub deposit_reward: &'static str,
    pub deposit_leftover: &'static str,
    pub forward_fees: &'static str,
    pub return_handle: &'static str,
    pub record_action: &'static str,
}

const COMMON_CALLS: CallTable = CallTable {
    module: "vault",
    retrieve_position: "retrieve_position",
    store_position: "store_position",
    open_position: "open_position",
    add_liquidity: "add_liquidity",
    remove_liquidity: "remove_liquidity",
    collect_fee: "collect_fee",
    collect_reward: "collect_reward",
    compound_pending: "compound_pending_fees",
    withdraw_custody: "withdraw_for_deploy",
    deposit_proceeds: "deposit_proceeds",
    deposit_reward: "deposit_reward",
    deposit_leftover: "deposit_leftover",
    forward_fees: "forward_fees",
    return_handle: "return_handle",
    record_action: "record_action",
};

pub const VAULT_CALLS: CallTable = CallTable {
    module: "vault",
    ..COMMON_CALLS
};

pub const DIRECT_CALLS: CallTable = CallTable {
    module: "manager",
    ..COMMON_CALLS
};

/// Pages to walk per enumeration before assuming a misbehaving node
const MAX_PAGES: usize = 64;

/// How a deployment enumerates managed entries and names its calls
#[async_trait]
pub trait Flavor: Send + Sync {
    fn name(&self) -> &'static str;

    fn calls(&self) -> &CallTable;

    /// All entry ids this operator may currently be managing. Entries that
    /// turn out paused, deleted, or operated by someone else are filtered
    /// later, when their fresh state is read.
    async fn list_entries(&self, ledger: &dyn Ledger) -> KeeperResult<Vec<ObjectId>>;
}

// ============================================================================
// Custody-vault flavor
// ============================================================================

/// Entries stored as dynamic fields of the vault registry object
pub struct VaultFlavor {
    registry: ObjectId,
}

impl VaultFlavor {
    pub fn new(registry: ObjectId) -> Self {
        VaultFlavor { registry }
    }
}

#[async_trait]
impl Flavor for VaultFlavor {
    fn name(&self) -> &'static str {
        "vault"
    }

    fn calls(&self) -> &CallTable {
        &VAULT_CALLS
    }

    async fn list_entries(&self, ledger: &dyn Ledger) -> KeeperResult<Vec<ObjectId>> {
        let mut entries = Vec::new();
        let mut cursor = None;

        for _ in 0..MAX_PAGES {
            let page = ledger.get_dynamic_fields(self.registry, cursor).await?;
            entries.extend(page.items);
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(entries),
            }
        }

        log::warn!(
            "registry {} enumeration truncated after {} pages",
            self.registry,
            MAX_PAGES
        );
        Ok(entries)
    }
}

// ============================================================================
// Direct-registration flavor
// ============================================================================

/// Entries announced through registration events
pub struct DirectFlavor {
    event_type: String,
}

impl DirectFlavor {
    pub fn new(package: ObjectId) -> Self {
        DirectFlavor {
            event_type: format!("{}::manager::EntryRegistered", package.to_hex()),
        }
    }

    fn entry_id_of(event: &Value) -> Option<ObjectId> {
        let raw = event.get("entry_id").and_then(Value::as_str)?;
        ObjectId::from_hex(raw).ok()
    }
}

#[async_trait]
impl Flavor for DirectFlavor {
    fn name(&self) -> &'static str {
        "direct"
    }

    fn calls(&self) -> &CallTable {
        &DIRECT_CALLS
    }

    async fn list_entries(&self, ledger: &dyn Ledger) -> KeeperResult<Vec<ObjectId>> {
        let mut seen = HashSet::new();
        let mut entries = Vec::new();
        let mut cursor = None;

        for _ in 0..MAX_PAGES {
            let page = ledger.query_events(&self.event_type, cursor).await?;
            for event in &page.items {
                match Self::entry_id_of(event) {
                    Some(id) => {
                        if seen.insert(id) {
                            entries.push(id);
                        }
                    }
                    None => {
                        return Err(KeeperError::Parse(format!(
                            "registration event without entry_id: {event}"
                        )))
                    }
                }
            }
            match page.next_cursor {
                Some(next) => cursor = Some(next),
                None => return Ok(entries),
            }
        }

        log::warn!("event enumeration truncated after {MAX_PAGES} pages");
        Ok(entries)
    }
}
