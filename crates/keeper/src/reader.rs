//! Position/pool state reader.
//!
//! Stateless per call; the ledger is the source of truth. Missing objects
//! are reported as `None` (closed/unknown, skip) while transport failures
//! surface as `Rpc` errors and only skip the current poll. Numeric fields
//! arrive in loosely typed shapes and are normalized here before anything
//! reaches the decision engine.

use serde::Deserialize;
use serde_json::Value;

use cycler_types::{
    CycleConfig, CycleStatus, ManagedPosition, ObjectId, PoolSnapshot, PositionRange, RewardInfo,
};

use crate::error::{KeeperError, KeeperResult};
use crate::ledger::Ledger;

// ============================================================================
// Defensive numeric decoding
// ============================================================================

/// Balance/amount field as it appears on the ledger: a bare integer, a
/// decimal string, or the same wrapped one level deeper. Absence decodes
/// to zero, never an error.
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum RawAmount {
    Int(u64),
    Text(String),
    Wrapped { value: Box<RawAmount> },
}

impl RawAmount {
    pub fn normalize(&self) -> u128 {
        match self {
            RawAmount::Int(v) => u128::from(*v),
            RawAmount::Text(s) => s.parse::<u128>().unwrap_or(0),
            RawAmount::Wrapped { value } => value.normalize(),
        }
    }
}

/// Normalized amount field; absent or malformed defaults to zero
pub fn amount_field(fields: &Value, name: &str) -> u128 {
    fields
        .get(name)
        .and_then(|v| serde_json::from_value::<RawAmount>(v.clone()).ok())
        .map(|a| a.normalize())
        .unwrap_or(0)
}

fn bool_field(fields: &Value, name: &str) -> bool {
    fields.get(name).and_then(Value::as_bool).unwrap_or(false)
}

/// Signed integer field, accepting a JSON number or a decimal string
fn i64_field(fields: &Value, name: &str) -> Option<i64> {
    match fields.get(name)? {
        Value::Number(n) => n.as_i64(),
        Value::String(s) => s.parse::<i64>().ok(),
        _ => None,
    }
}

/// Unsigned counter field narrowed to u32. Absence still decodes to zero,
/// but a value that would wrap is rejected instead.
fn u32_field(fields: &Value, name: &str) -> KeeperResult<u32> {
    u32::try_from(amount_field(fields, name))
        .map_err(|_| KeeperError::Precondition(format!("field '{name}' does not fit in u32")))
}

/// Required tick field; rejects values outside the i32 tick grid
fn tick_field(fields: &Value, name: &str) -> KeeperResult<i32> {
    let raw = i64_field(fields, name)
        .ok_or_else(|| KeeperError::Precondition(format!("missing field '{name}'")))?;
    i32::try_from(raw)
        .map_err(|_| KeeperError::Precondition(format!("field '{name}' is not a valid tick")))
}

fn str_field<'a>(fields: &'a Value, name: &str) -> Option<&'a str> {
    fields.get(name).and_then(Value::as_str)
}

fn id_field(fields: &Value, name: &str) -> KeeperResult<ObjectId> {
    let raw = str_field(fields, name)
        .ok_or_else(|| KeeperError::Precondition(format!("missing field '{name}'")))?;
    ObjectId::from_hex(raw)
        .map_err(|_| KeeperError::Precondition(format!("malformed id in field '{name}'")))
}

/// Object content, tolerating both a flat shape and a `fields` wrapper
fn content(object: &Value) -> &Value {
    object.get("fields").unwrap_or(object)
}

// ============================================================================
// Parsers (pure, testable without a ledger)
// ============================================================================

pub fn parse_entry(id: ObjectId, object: &Value) -> KeeperResult<ManagedPosition> {
    let fields = content(object);

    let pool = id_field(fields, "pool")?;
    let owner = id_field(fields, "owner")?;
    let operator = id_field(fields, "operator")?;

    let coin_a = str_field(fields, "coin_a")
        .ok_or_else(|| KeeperError::Precondition("missing field 'coin_a'".to_string()))?
        .to_string();
    let coin_b = str_field(fields, "coin_b")
        .ok_or_else(|| KeeperError::Precondition("missing field 'coin_b'".to_string()))?
        .to_string();

    let position_id = match str_field(fields, "position_id") {
        Some(raw) => Some(
            ObjectId::from_hex(raw)
                .map_err(|_| KeeperError::Precondition("malformed position_id".to_string()))?,
        ),
        None => None,
    };

    Ok(ManagedPosition {
        entry: id,
        owner,
        operator,
        pool,
        coin_a,
        coin_b,
        config: CycleConfig {
            range_width_bps: u32_field(fields, "range_width_bps")?,
            auto_rebalance: bool_field(fields, "auto_rebalance"),
            auto_compound: bool_field(fields, "auto_compound"),
            auto_claim: bool_field(fields, "auto_claim"),
            recurring: bool_field(fields, "recurring"),
            rebalance_delay_secs: i64_field(fields, "rebalance_delay_secs").unwrap_or(0),
            recur_interval_secs: i64_field(fields, "recur_interval_secs").unwrap_or(0),
            max_cycles: u32_field(fields, "max_cycles")?,
        },
        status: CycleStatus {
            is_active: bool_field(fields, "is_active"),
            is_paused: bool_field(fields, "is_paused"),
            has_position: bool_field(fields, "has_position"),
            cycles_completed: u32_field(fields, "cycles_completed")?,
            next_run_at: i64_field(fields, "next_run_at").unwrap_or(0),
            balance_a: amount_field(fields, "balance_a"),
            balance_b: amount_field(fields, "balance_b"),
            position_id,
        },
    })
}

pub fn parse_pool(id: ObjectId, object: &Value) -> KeeperResult<PoolSnapshot> {
    let fields = content(object);

    let current_tick = tick_field(fields, "current_tick")?;
    let tick_spacing = tick_field(fields, "tick_spacing")?;

    let mut rewards = Vec::new();
    if let Some(raw_rewards) = fields.get("rewards").and_then(Value::as_array) {
        for reward in raw_rewards {
            let Some(coin_type) = str_field(reward, "coin_type") else {
                continue; // malformed emission slot, not this keeper's problem
            };
            rewards.push(RewardInfo {
                coin_type: coin_type.to_string(),
                ends_at: i64_field(reward, "ends_at").unwrap_or(0),
            });
        }
    }

    Ok(PoolSnapshot {
        pool: id,
        current_tick,
        tick_spacing,
        rewards,
    })
}

pub fn parse_range(object: &Value) -> KeeperResult<PositionRange> {
    let fields = content(object);

    let tick_lower = tick_field(fields, "tick_lower")?;
    let tick_upper = tick_field(fields, "tick_upper")?;

    Ok(PositionRange {
        tick_lower,
        tick_upper,
        liquidity: amount_field(fields, "liquidity"),
    })
}

// ============================================================================
// Ledger-backed fetches
// ============================================================================

/// Managed entry by id; `None` when the object no longer exists
pub async fn fetch_entry(
    ledger: &dyn Ledger,
    id: ObjectId,
) -> KeeperResult<Option<ManagedPosition>> {
    match ledger.get_object(id).await? {
        Some(object) => parse_entry(id, &object).map(Some),
        None => Ok(None),
    }
}

/// Pool snapshot; a missing pool is an error because an entry referenced it
pub async fn fetch_pool(ledger: &dyn Ledger, id: ObjectId) -> KeeperResult<PoolSnapshot> {
    match ledger.get_object(id).await? {
        Some(object) => parse_pool(id, &object),
        None => Err(KeeperError::NotFound(format!("pool {id}"))),
    }
}

/// Realized range of an open position; `None` when the handle is gone
pub async fn fetch_position_range(
    ledger: &dyn Ledger,
    position_id: ObjectId,
) -> KeeperResult<Option<PositionRange>> {
    match ledger.get_object(position_id).await? {
        Some(object) => parse_range(&object).map(Some),
        None => Ok(None),
    }
}
