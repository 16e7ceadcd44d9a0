//! Ledger read/write interface.
//!
//! Reads are object/event queries against the node's JSON-RPC endpoint;
//! writes submit one signed atomic multi-call block. All calls in a block
//! succeed or the ledger rejects the whole unit, so no partial state is
//! ever observable.

use std::sync::atomic::{AtomicU64, Ordering};

use async_trait::async_trait;
use base64::engine::general_purpose::STANDARD as BASE64;
use base64::Engine as _;
use ed25519_dalek::{Signer, SigningKey};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use cycler_types::ObjectId;

use crate::error::{KeeperError, KeeperResult};

// ============================================================================
// Transaction block model
// ============================================================================

/// Argument to a contract call within a block.
///
/// `Result(i)` consumes the output of the i-th earlier call in the same
/// block; this is how close-and-reopen routes freed liquidity into the new
/// position without touching intermediate ledger state.
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Arg {
    Object(ObjectId),
    Pure(Value),
    Result(u16),
}

/// One contract call inside an atomic block
#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct Call {
    pub package: ObjectId,
    pub module: String,
    pub function: String,
    pub type_args: Vec<String>,
    pub args: Vec<Arg>,
}

/// Ordered multi-call unit, executed atomically by the ledger
#[derive(Debug, Clone, Serialize)]
pub struct TxBlock {
    pub calls: Vec<Call>,
    pub gas_budget: u64,
}

impl TxBlock {
    pub fn new(gas_budget: u64) -> Self {
        TxBlock {
            calls: Vec::new(),
            gas_budget,
        }
    }

    /// Append a call and return its result index for later arguments
    pub fn push(&mut self, call: Call) -> u16 {
        self.calls.push(call);
        (self.calls.len() - 1) as u16
    }

    pub fn is_empty(&self) -> bool {
        self.calls.is_empty()
    }
}

/// Outcome of a successfully executed block
#[derive(Debug, Clone)]
pub struct TxReceipt {
    /// Unique transaction reference for audit/logging
    pub digest: String,
}

/// One page of a cursored query
#[derive(Debug, Clone)]
pub struct Page<T> {
    pub items: Vec<T>,
    pub next_cursor: Option<String>,
}

// ============================================================================
// Ledger trait
// ============================================================================

#[async_trait]
pub trait Ledger: Send + Sync {
    /// Typed object state, or `None` when the object does not exist
    async fn get_object(&self, id: ObjectId) -> KeeperResult<Option<Value>>;

    /// One page of the dynamic field ids attached to `parent`
    async fn get_dynamic_fields(
        &self,
        parent: ObjectId,
        cursor: Option<String>,
    ) -> KeeperResult<Page<ObjectId>>;

    /// One page of events of `event_type`, oldest first
    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<String>,
    ) -> KeeperResult<Page<Value>>;

    /// Gas balance of an account
    async fn get_balance(&self, owner: ObjectId) -> KeeperResult<u128>;

    /// Sign and submit a block; `Err(Rejected)` carries the ledger's
    /// structured failure, reads are retried naturally on the next poll
    async fn submit(&self, block: &TxBlock) -> KeeperResult<TxReceipt>;
}

// ============================================================================
// JSON-RPC implementation
// ============================================================================

#[derive(Deserialize)]
struct RpcResponse {
    result: Option<Value>,
    error: Option<RpcError>,
}

#[derive(Deserialize)]
struct RpcError {
    code: i64,
    message: String,
}

#[derive(Deserialize)]
struct PageResponse {
    items: Vec<Value>,
    next_cursor: Option<String>,
}

#[derive(Deserialize)]
struct SubmitResponse {
    digest: String,
    success: bool,
    error: Option<String>,
}

/// JSON-RPC 2.0 client over HTTP.
///
/// The signing key is read-only after construction and safe to use from
/// concurrent signing requests.
pub struct JsonRpcLedger {
    http: reqwest::Client,
    url: String,
    signer: SigningKey,
    next_id: AtomicU64,
}

impl JsonRpcLedger {
    pub fn new(url: String, signer: SigningKey) -> Self {
        JsonRpcLedger {
            http: reqwest::Client::new(),
            url,
            signer,
            next_id: AtomicU64::new(1),
        }
    }

    /// Account address of the operator credential
    pub fn operator(&self) -> ObjectId {
        ObjectId::new(self.signer.verifying_key().to_bytes())
    }

    async fn call(&self, method: &str, params: Value) -> KeeperResult<Value> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let request = json!({
            "jsonrpc": "2.0",
            "id": id,
            "method": method,
            "params": params,
        });

        let response: RpcResponse = self
            .http
            .post(&self.url)
            .json(&request)
            .send()
            .await?
            .error_for_status()?
            .json()
            .await?;

        if let Some(err) = response.error {
            return Err(KeeperError::Rpc(format!(
                "{method} failed: {} (code {})",
                err.message, err.code
            )));
        }

        Ok(response.result.unwrap_or(Value::Null))
    }
}

#[async_trait]
impl Ledger for JsonRpcLedger {
    async fn get_object(&self, id: ObjectId) -> KeeperResult<Option<Value>> {
        let result = self.call("ledger_getObject", json!([id])).await?;
        if result.is_null() {
            return Ok(None);
        }
        Ok(Some(result))
    }

    async fn get_dynamic_fields(
        &self,
        parent: ObjectId,
        cursor: Option<String>,
    ) -> KeeperResult<Page<ObjectId>> {
        let result = self
            .call("ledger_getDynamicFields", json!([parent, cursor]))
            .await?;
        let page: PageResponse = serde_json::from_value(result)?;

        let mut items = Vec::with_capacity(page.items.len());
        for item in page.items {
            let raw = item
                .as_str()
                .ok_or_else(|| KeeperError::Parse("dynamic field id is not a string".to_string()))?;
            items.push(ObjectId::from_hex(raw)?);
        }

        Ok(Page {
            items,
            next_cursor: page.next_cursor,
        })
    }

    async fn query_events(
        &self,
        event_type: &str,
        cursor: Option<String>,
    ) -> KeeperResult<Page<Value>> {
        let result = self
            .call("ledger_queryEvents", json!([event_type, cursor]))
            .await?;
        let page: PageResponse = serde_json::from_value(result)?;
        Ok(Page {
            items: page.items,
            next_cursor: page.next_cursor,
        })
    }

    async fn get_balance(&self, owner: ObjectId) -> KeeperResult<u128> {
        let result = self.call("ledger_getBalance", json!([owner])).await?;
        match &result {
            Value::Number(n) => n
                .as_u64()
                .map(u128::from)
                .ok_or_else(|| KeeperError::Parse("balance out of range".to_string())),
            Value::String(s) => s
                .parse::<u128>()
                .map_err(|_| KeeperError::Parse(format!("balance '{s}' is not an integer"))),
            other => Err(KeeperError::Parse(format!("unexpected balance shape: {other}"))),
        }
    }

    async fn submit(&self, block: &TxBlock) -> KeeperResult<TxReceipt> {
        let bytes = serde_json::to_vec(block)?;
        let signature = self.signer.sign(&bytes);

        let params = json!([
            BASE64.encode(&bytes),
            BASE64.encode(signature.to_bytes()),
            BASE64.encode(self.signer.verifying_key().to_bytes()),
        ]);

        let result = self.call("ledger_executeBlock", params).await?;
        let response: SubmitResponse = serde_json::from_value(result)?;

        if !response.success {
            return Err(KeeperError::Rejected(format!(
                "{} (digest {})",
                response.error.unwrap_or_else(|| "unknown ledger error".to_string()),
                response.digest
            )));
        }

        Ok(TxReceipt {
            digest: response.digest,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn call(function: &str, args: Vec<Arg>) -> Call {
        Call {
            package: ObjectId::ZERO,
            module: "cycler".to_string(),
            function: function.to_string(),
            type_args: vec![],
            args,
        }
    }

    #[test]
    fn test_push_returns_result_indices() {
        let mut block = TxBlock::new(1_000);
        assert!(block.is_empty());
        let first = block.push(call("retrieve_position", vec![]));
        let second = block.push(call("remove_liquidity", vec![Arg::Result(first)]));
        assert_eq!(first, 0);
        assert_eq!(second, 1);
        assert_eq!(block.calls.len(), 2);
    }

    #[test]
    fn test_arg_serialization_shapes() {
        let json = serde_json::to_value(Arg::Result(3)).unwrap();
        assert_eq!(json, serde_json::json!({ "result": 3 }));

        let json = serde_json::to_value(Arg::Pure(serde_json::json!(42))).unwrap();
        assert_eq!(json, serde_json::json!({ "pure": 42 }));

        let json = serde_json::to_value(Arg::Object(ObjectId::ZERO)).unwrap();
        assert_eq!(
            json,
            serde_json::json!({ "object": format!("0x{}", "00".repeat(32)) })
        );
    }

    #[test]
    fn test_block_serialization_preserves_order() {
        let mut block = TxBlock::new(1_000);
        block.push(call("a", vec![]));
        block.push(call("b", vec![]));
        let value = serde_json::to_value(&block).unwrap();
        let functions: Vec<_> = value["calls"]
            .as_array()
            .unwrap()
            .iter()
            .map(|c| c["function"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(functions, vec!["a", "b"]);
        assert_eq!(value["gas_budget"], 1_000);
    }
}
