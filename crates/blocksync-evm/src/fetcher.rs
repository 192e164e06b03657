//! Ethereum block and transaction fetcher over JSON-RPC.

use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};

use blocksync_core::adapter::ChainAdapter;
use blocksync_core::error::FetchError;
use blocksync_core::types::{Block, Chain, Transaction};

use crate::rpc::{JsonRpcRequest, JsonRpcResponse};

/// Parse a `0x`-prefixed hex quantity.
fn parse_quantity(value: &Value) -> Result<u64, FetchError> {
    let s = value
        .as_str()
        .ok_or_else(|| FetchError::Provider(format!("expected hex quantity, got {value}")))?;
    let digits = s
        .strip_prefix("0x")
        .ok_or_else(|| FetchError::Provider(format!("quantity missing 0x prefix: {s:?}")))?;
    u64::from_str_radix(digits, 16)
        .map_err(|_| FetchError::Provider(format!("unparseable hex quantity: {s:?}")))
}

/// Like [`parse_quantity`] but tolerates an absent field.
fn parse_opt_quantity(value: &Value) -> Result<Option<u64>, FetchError> {
    if value.is_null() {
        return Ok(None);
    }
    parse_quantity(value).map(Some)
}

fn require_str(obj: &Value, field: &str) -> Result<String, FetchError> {
    obj[field]
        .as_str()
        .map(str::to_owned)
        .ok_or_else(|| FetchError::Provider(format!("block missing field {field:?}")))
}

/// Normalize an `eth_getBlockByNumber` result object.
fn block_from_value(raw: &Value) -> Result<Block, FetchError> {
    let txs = raw["transactions"].as_array();
    Ok(Block {
        chain: Chain::Ethereum,
        height: parse_quantity(&raw["number"])?,
        hash: require_str(raw, "hash")?,
        parent_hash: require_str(raw, "parentHash")?,
        timestamp: parse_quantity(&raw["timestamp"])? as i64,
        tx_count: txs.map(Vec::len).unwrap_or(0) as u32,
        size: parse_quantity(&raw["size"])?,
        extra: json!({
            "miner": raw["miner"].as_str().unwrap_or_default(),
            "gas_limit": parse_quantity(&raw["gasLimit"])?,
            "gas_used": parse_quantity(&raw["gasUsed"])?,
            "base_fee_per_gas": parse_opt_quantity(&raw["baseFeePerGas"])?,
            "difficulty": raw["difficulty"].as_str().unwrap_or_default(),
        }),
    })
}

/// Normalize one entry of a hydrated block's `transactions` array.
fn transaction_from_value(raw: &Value, block_height: u64) -> Result<Transaction, FetchError> {
    Ok(Transaction {
        chain: Chain::Ethereum,
        id: require_str(raw, "hash")?,
        block_height,
        extra: json!({
            "from": raw["from"].as_str().unwrap_or_default(),
            // Null for contract creation.
            "to": raw["to"].as_str(),
            // Wei amounts overflow u64; kept as the raw hex string.
            "value": raw["value"].as_str().unwrap_or("0x0"),
            "gas": parse_quantity(&raw["gas"])?,
            "gas_price": parse_opt_quantity(&raw["gasPrice"])?,
            "nonce": parse_quantity(&raw["nonce"])?,
            "transaction_index": parse_opt_quantity(&raw["transactionIndex"])?,
        }),
    })
}

/// JSON-RPC-polling Ethereum adapter.
pub struct EvmRpcAdapter {
    endpoint: String,
    http: reqwest::Client,
    next_id: AtomicU64,
}

impl EvmRpcAdapter {
    /// Create an adapter for an Ethereum execution RPC endpoint
    /// (e.g. `https://mainnet.infura.io/v3/{key}`).
    pub fn new(endpoint: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        Self {
            endpoint: endpoint.into(),
            http,
            next_id: AtomicU64::new(1),
        }
    }

    /// Create with the default 30 second request timeout.
    pub fn default_for(endpoint: impl Into<String>) -> Self {
        Self::new(endpoint, Duration::from_secs(30))
    }

    async fn call(&self, method: &str, params: Value) -> Result<Value, FetchError> {
        let id = self.next_id.fetch_add(1, Ordering::Relaxed);
        let req = JsonRpcRequest::new(id, method, params);

        let resp = self
            .http
            .post(&self.endpoint)
            .json(&req)
            .send()
            .await
            .map_err(|e| FetchError::Provider(e.to_string()))?;

        let status = resp.status();
        if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
            return Err(FetchError::RateLimited);
        }
        if !status.is_success() {
            return Err(FetchError::Provider(format!("HTTP {status}")));
        }

        let envelope: JsonRpcResponse = resp
            .json()
            .await
            .map_err(|e| FetchError::Provider(e.to_string()))?;
        envelope.into_result()
    }

    /// `eth_getBlockByNumber` with configurable transaction hydration.
    async fn block_by_number(&self, height: u64, hydrate: bool) -> Result<Value, FetchError> {
        let tag = format!("0x{height:x}");
        let raw = self
            .call("eth_getBlockByNumber", json!([tag, hydrate]))
            .await?;
        if raw.is_null() {
            // The node has no block at this height yet.
            return Err(FetchError::NotFound);
        }
        Ok(raw)
    }
}

#[async_trait]
impl ChainAdapter for EvmRpcAdapter {
    fn chain(&self) -> Chain {
        Chain::Ethereum
    }

    async fn tip(&self) -> Result<u64, FetchError> {
        let raw = self.call("eth_blockNumber", json!([])).await?;
        parse_quantity(&raw)
    }

    async fn block(&self, height: u64) -> Result<Block, FetchError> {
        tracing::debug!(height, "fetching ethereum block");
        let raw = self.block_by_number(height, false).await?;
        block_from_value(&raw)
    }

    async fn transactions(&self, block: &Block) -> Result<Vec<Transaction>, FetchError> {
        tracing::debug!(height = block.height, "fetching ethereum transactions");
        let raw = self.block_by_number(block.height, true).await?;
        let entries = raw["transactions"].as_array().cloned().unwrap_or_default();
        entries
            .iter()
            .map(|tx| transaction_from_value(tx, block.height))
            .collect()
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block() -> Value {
        json!({
            "number": "0x112a880",
            "hash": "0xbb1f6e2f287da2f8bfa81be702a88bb1517b47eb5b21b80b019a2c787b4fbbc3",
            "parentHash": "0x5a2c0f5a7e1b93e3a4c9d6f0b2a8e7d1c3f5a9b8e7d6c5b4a3f2e1d0c9b8a7f6",
            "timestamp": "0x64bd50b5",
            "size": "0x2b4a1",
            "miner": "0x95222290dd7278aa3ddd389cc1e1d165cc4bafe5",
            "gasLimit": "0x1c9c380",
            "gasUsed": "0xd5e3f2",
            "baseFeePerGas": "0x4d7c6e8a1",
            "difficulty": "0x0",
            "transactions": [
                "0xaaaa000000000000000000000000000000000000000000000000000000000001",
                "0xaaaa000000000000000000000000000000000000000000000000000000000002"
            ]
        })
    }

    fn sample_tx() -> Value {
        json!({
            "hash": "0xaaaa000000000000000000000000000000000000000000000000000000000001",
            "from": "0x28c6c06298d514db089934071355e5743bf21d60",
            "to": "0xdac17f958d2ee523a2206206994597c13d831ec7",
            "value": "0xde0b6b3a7640000",
            "gas": "0x186a0",
            "gasPrice": "0x6fc23ac00",
            "nonce": "0x4d2",
            "transactionIndex": "0x0"
        })
    }

    #[test]
    fn hex_quantities_parse() {
        assert_eq!(parse_quantity(&json!("0x0")).unwrap(), 0);
        assert_eq!(parse_quantity(&json!("0x112a880")).unwrap(), 18_000_000);
        assert!(matches!(
            parse_quantity(&json!("112a880")),
            Err(FetchError::Provider(_))
        ));
        assert!(matches!(
            parse_quantity(&json!("0xzz")),
            Err(FetchError::Provider(_))
        ));
        assert!(matches!(
            parse_quantity(&json!(42)),
            Err(FetchError::Provider(_))
        ));
        assert_eq!(parse_opt_quantity(&Value::Null).unwrap(), None);
        assert_eq!(parse_opt_quantity(&json!("0x10")).unwrap(), Some(16));
    }

    #[test]
    fn block_normalizes() {
        let block = block_from_value(&sample_block()).unwrap();

        assert_eq!(block.chain, Chain::Ethereum);
        assert_eq!(block.height, 18_000_000);
        assert!(block.hash.starts_with("0xbb1f6e2f"));
        assert!(block.parent_hash.starts_with("0x5a2c0f5a"));
        assert_eq!(block.timestamp, 1_690_128_565);
        assert_eq!(block.tx_count, 2);
        assert_eq!(block.extra["gas_limit"], 30_000_000);
        assert_eq!(
            block.extra["miner"],
            "0x95222290dd7278aa3ddd389cc1e1d165cc4bafe5"
        );
    }

    #[test]
    fn pre_london_block_without_base_fee_parses() {
        let mut raw = sample_block();
        raw.as_object_mut().unwrap().remove("baseFeePerGas");
        let block = block_from_value(&raw).unwrap();
        assert_eq!(block.extra["base_fee_per_gas"], Value::Null);
    }

    #[test]
    fn block_with_bad_quantity_is_a_provider_error() {
        let mut raw = sample_block();
        raw["number"] = json!("not-hex");
        assert!(matches!(
            block_from_value(&raw),
            Err(FetchError::Provider(_))
        ));
    }

    #[test]
    fn transaction_normalizes() {
        let tx = transaction_from_value(&sample_tx(), 18_000_000).unwrap();

        assert_eq!(tx.chain, Chain::Ethereum);
        assert!(tx.id.ends_with("01"));
        assert_eq!(tx.block_height, 18_000_000);
        assert_eq!(tx.extra["value"], "0xde0b6b3a7640000");
        assert_eq!(tx.extra["gas"], 100_000);
        assert_eq!(tx.extra["nonce"], 1_234);
        assert_eq!(tx.extra["transaction_index"], 0);
    }

    #[test]
    fn contract_creation_has_null_recipient() {
        let mut raw = sample_tx();
        raw["to"] = Value::Null;
        let tx = transaction_from_value(&raw, 1).unwrap();
        assert_eq!(tx.extra["to"], Value::Null);
    }
}
