//! Bitcoin block and transaction fetcher over a mempool.space-style REST API.

use std::time::Duration;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::json;

use blocksync_core::adapter::ChainAdapter;
use blocksync_core::error::FetchError;
use blocksync_core::types::{Block, Chain, Transaction};

/// A raw block as returned by `GET /block/{hash}`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawBlock {
    /// Block hash.
    pub id: String,
    pub height: u64,
    pub version: u32,
    pub timestamp: i64,
    pub tx_count: u32,
    pub size: u64,
    pub weight: u64,
    pub merkle_root: String,
    /// Absent for the genesis block.
    #[serde(default)]
    pub previousblockhash: Option<String>,
    pub mediantime: i64,
    pub nonce: u64,
    pub bits: u64,
    pub difficulty: f64,
}

impl RawBlock {
    /// Normalize into the chain-agnostic model.
    pub fn into_block(self) -> Block {
        Block {
            chain: Chain::Bitcoin,
            height: self.height,
            hash: self.id,
            parent_hash: self.previousblockhash.unwrap_or_default(),
            timestamp: self.timestamp,
            tx_count: self.tx_count,
            size: self.size,
            extra: json!({
                "version": self.version,
                "merkle_root": self.merkle_root,
                "weight": self.weight,
                "nonce": self.nonce,
                "bits": self.bits,
                "difficulty": self.difficulty,
                "mediantime": self.mediantime,
            }),
        }
    }
}

/// A raw transaction as returned by `GET /block/{hash}/txs`.
#[derive(Debug, Clone, Deserialize)]
pub struct RawTx {
    pub txid: String,
    pub version: u32,
    pub locktime: u64,
    #[serde(default)]
    pub vin: Vec<serde_json::Value>,
    #[serde(default)]
    pub vout: Vec<serde_json::Value>,
    pub size: u64,
    pub weight: u64,
    /// Coinbase transactions report no fee.
    #[serde(default)]
    pub fee: u64,
}

impl RawTx {
    /// Normalize into the chain-agnostic model, attached to its block.
    pub fn into_transaction(self, block_height: u64) -> Transaction {
        Transaction {
            chain: Chain::Bitcoin,
            id: self.txid,
            block_height,
            extra: json!({
                "version": self.version,
                "locktime": self.locktime,
                "size": self.size,
                "weight": self.weight,
                "fee": self.fee,
                "input_count": self.vin.len(),
                "output_count": self.vout.len(),
            }),
        }
    }
}

/// Map an HTTP status to the adapter error taxonomy. `Ok(())` means the
/// response should be read as a success body.
fn check_status(status: reqwest::StatusCode) -> Result<(), FetchError> {
    if status.is_success() {
        Ok(())
    } else if status == reqwest::StatusCode::NOT_FOUND {
        Err(FetchError::NotFound)
    } else if status == reqwest::StatusCode::TOO_MANY_REQUESTS {
        Err(FetchError::RateLimited)
    } else {
        Err(FetchError::Provider(format!("HTTP {status}")))
    }
}

/// REST-polling Bitcoin adapter.
pub struct BitcoinRestAdapter {
    base_url: String,
    http: reqwest::Client,
}

impl BitcoinRestAdapter {
    /// Create an adapter for a mempool.space-compatible API base URL
    /// (e.g. `https://mempool.space/api`).
    pub fn new(base_url: impl Into<String>, timeout: Duration) -> Self {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .build()
            .expect("failed to build reqwest client");

        let mut base_url = base_url.into();
        while base_url.ends_with('/') {
            base_url.pop();
        }
        Self { base_url, http }
    }

    /// Create with the default 30 second request timeout.
    pub fn default_for(base_url: impl Into<String>) -> Self {
        Self::new(base_url, Duration::from_secs(30))
    }

    async fn get(&self, path: &str) -> Result<reqwest::Response, FetchError> {
        let url = format!("{}{path}", self.base_url);
        let resp = self
            .http
            .get(&url)
            .send()
            .await
            .map_err(|e| FetchError::Provider(e.to_string()))?;
        check_status(resp.status())?;
        Ok(resp)
    }

    async fn get_text(&self, path: &str) -> Result<String, FetchError> {
        let resp = self.get(path).await?;
        resp.text()
            .await
            .map_err(|e| FetchError::Provider(e.to_string()))
    }

    async fn get_json<T: serde::de::DeserializeOwned>(&self, path: &str) -> Result<T, FetchError> {
        let resp = self.get(path).await?;
        resp.json::<T>()
            .await
            .map_err(|e| FetchError::Provider(e.to_string()))
    }
}

#[async_trait]
impl ChainAdapter for BitcoinRestAdapter {
    fn chain(&self) -> Chain {
        Chain::Bitcoin
    }

    async fn tip(&self) -> Result<u64, FetchError> {
        let text = self.get_text("/blocks/tip/height").await?;
        text.trim()
            .parse()
            .map_err(|_| FetchError::Provider(format!("unparseable tip height: {text:?}")))
    }

    async fn block(&self, height: u64) -> Result<Block, FetchError> {
        tracing::debug!(height, "fetching bitcoin block");
        // Two hops: height → hash, then hash → details.
        let hash = self.get_text(&format!("/block-height/{height}")).await?;
        let raw: RawBlock = self.get_json(&format!("/block/{}", hash.trim())).await?;
        Ok(raw.into_block())
    }

    async fn transactions(&self, block: &Block) -> Result<Vec<Transaction>, FetchError> {
        tracing::debug!(height = block.height, hash = %block.hash, "fetching bitcoin transactions");
        let raw: Vec<RawTx> = self.get_json(&format!("/block/{}/txs", block.hash)).await?;
        Ok(raw
            .into_iter()
            .map(|tx| tx.into_transaction(block.height))
            .collect())
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
