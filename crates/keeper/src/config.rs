use std::fs;

use serde::{Deserialize, Serialize};

use cycler_types::{ObjectId, BPS_SCALE, DEFAULT_DIVERGENCE_LIMIT_BPS};

use crate::error::{KeeperError, KeeperResult};

/// Which registration scheme the contract deployment uses.
///
/// Vault deployments keep entries as dynamic fields of a custody registry
/// object; direct deployments announce entries through registration events.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Mode {
    Vault,
    Direct,
}

/// Keeper configuration loaded from a TOML file
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct KeeperConfig {
    /// Ledger node JSON-RPC endpoint
    pub rpc_url: String,

    /// Published contract package
    pub package_id: ObjectId,

    /// Registry object holding (or announcing) managed entries
    pub registry_id: ObjectId,

    /// Registration scheme of this deployment
    pub mode: Mode,

    /// Path to the operator signing key file (hex-encoded 32 bytes)
    pub keypair_path: Option<String>,

    /// Seconds to sleep between sweeps
    #[serde(default = "default_poll_interval")]
    pub poll_interval_secs: u64,

    /// Gas budget per submitted transaction block
    #[serde(default = "default_gas_budget")]
    pub gas_budget: u64,

    /// Minimum operator gas balance before health checks start warning
    #[serde(default = "default_min_gas_balance")]
    pub min_gas_balance: u128,

    /// Divergence-loss ceiling in basis points
    #[serde(default = "default_divergence_limit")]
    pub divergence_limit_bps: u32,

    /// Decide and compose without submitting; the CLI flag can force this
    /// on but never off
    #[serde(default)]
    pub dry_run: bool,
}

fn default_poll_interval() -> u64 {
    30
}

fn default_gas_budget() -> u64 {
    50_000_000
}

fn default_min_gas_balance() -> u128 {
    1_000_000_000
}

fn default_divergence_limit() -> u32 {
    DEFAULT_DIVERGENCE_LIMIT_BPS
}

impl KeeperConfig {
    /// Load configuration from a TOML file
    pub fn load(path: &str) -> KeeperResult<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| KeeperError::Config(format!("failed to read config file {path}: {e}")))?;

        let config: KeeperConfig = toml::from_str(&content)
            .map_err(|e| KeeperError::Config(format!("failed to parse config file {path}: {e}")))?;

        config.validate()?;

        Ok(config)
    }

    /// Validate configuration
    pub fn validate(&self) -> KeeperResult<()> {
        if self.rpc_url.is_empty() {
            return Err(KeeperError::Config("rpc_url must not be empty".to_string()));
        }

        if self.package_id == ObjectId::ZERO {
            return Err(KeeperError::Config("package_id must be set".to_string()));
        }

        if self.registry_id == ObjectId::ZERO {
            return Err(KeeperError::Config("registry_id must be set".to_string()));
        }

        if self.poll_interval_secs == 0 {
            return Err(KeeperError::Config(
                "poll_interval_secs must be greater than 0".to_string(),
            ));
        }

        if self.gas_budget == 0 {
            return Err(KeeperError::Config("gas_budget must be greater than 0".to_string()));
        }

        if self.divergence_limit_bps == 0 || self.divergence_limit_bps > BPS_SCALE {
            return Err(KeeperError::Config(format!(
                "divergence_limit_bps must be in (0, {BPS_SCALE}], got {}",
                self.divergence_limit_bps
            )));
        }

        Ok(())
    }
}

impl Default for KeeperConfig {
    fn default() -> Self {
        Self {
            rpc_url: "http://127.0.0.1:9000".to_string(),
            package_id: ObjectId::ZERO,
            registry_id: ObjectId::ZERO,
            mode: Mode::Vault,
            keypair_path: None,
            poll_interval_secs: default_poll_interval(),
            gas_budget: default_gas_budget(),
            min_gas_balance: default_min_gas_balance(),
            divergence_limit_bps: default_divergence_limit(),
            dry_run: false,
        }
    }
}
