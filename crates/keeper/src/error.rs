//! Error taxonomy for the keeper service.
//!
//! Per-position failures never escape the sweep; only `Config` errors are
//! fatal, and only at startup.

use thiserror::Error;

#[derive(Error, Debug)]
pub enum KeeperError {
    /// Fatal startup misconfiguration (missing credential, bad TOML, ...)
    #[error("invalid configuration: {0}")]
    Config(String),

    /// Transient network/RPC failure; skip this position this poll
    #[error("rpc error: {0}")]
    Rpc(String),

    /// Object missing or deleted; the position no longer needs management
    #[error("object not found: {0}")]
    NotFound(String),

    /// Decision precondition unmet (malformed pool type, missing range, ...)
    #[error("precondition not met: {0}")]
    Precondition(String),

    /// Ledger rejected the submitted transaction block
    #[error("transaction rejected: {0}")]
    Rejected(String),

    /// A ledger response did not decode
    #[error("parse error: {0}")]
    Parse(String),
}

impl From<reqwest::Error> for KeeperError {
    fn from(err: reqwest::Error) -> Self {
        KeeperError::Rpc(err.to_string())
    }
}

impl From<serde_json::Error> for KeeperError {
    fn from(err: serde_json::Error) -> Self {
        KeeperError::Parse(err.to_string())
    }
}

impl From<cycler_types::CyclerError> for KeeperError {
    fn from(err: cycler_types::CyclerError) -> Self {
        KeeperError::Parse(err.to_string())
    }
}

pub type KeeperResult<T> = std::result::Result<T, KeeperError>;
