//! JSON-RPC 2.0 wire types.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use blocksync_core::error::FetchError;

/// A JSON-RPC 2.0 request envelope.
#[derive(Debug, Clone, Serialize)]
pub struct JsonRpcRequest {
    pub jsonrpc: &'static str,
    pub id: u64,
    pub method: String,
    pub params: Value,
}

impl JsonRpcRequest {
    pub fn new(id: u64, method: impl Into<String>, params: Value) -> Self {
        Self {
            jsonrpc: "2.0",
            id,
            method: method.into(),
            params,
        }
    }
}

/// A JSON-RPC 2.0 response envelope. Exactly one of `result` / `error`
/// is populated by a conforming server.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcResponse {
    #[serde(default)]
    pub result: Option<Value>,
    #[serde(default)]
    pub error: Option<JsonRpcError>,
}

/// Error object carried in a JSON-RPC response.
#[derive(Debug, Clone, Deserialize)]
pub struct JsonRpcError {
    pub code: i64,
    pub message: String,
}

// Infura and friends signal request throttling with this code rather
// than an HTTP 429.
const CODE_RATE_LIMITED: i64 = -32005;

impl JsonRpcResponse {
    /// Fold the envelope into the adapter error taxonomy. A response with
    /// neither `result` nor `error` yields `result: null`, which callers
    /// interpret per method (e.g. unknown block for `eth_getBlockByNumber`).
    pub fn into_result(self) -> Result<Value, FetchError> {
        if let Some(err) = self.error {
            if err.code == CODE_RATE_LIMITED {
                return Err(FetchError::RateLimited);
            }
            return Err(FetchError::Provider(format!(
                "rpc error {}: {}",
                err.code, err.message
            )));
        }
        Ok(self.result.unwrap_or(Value::Null))
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
