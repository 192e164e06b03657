//! Chain-agnostic data model shared across adapters, engine, and storage.

use serde::{Deserialize, Serialize};

// ─── Chain ───────────────────────────────────────────────────────────────────

/// One of the indexed chains. Store keys are namespaced by chain, so both
/// indexers can share a single store without colliding.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Chain {
    Bitcoin,
    Ethereum,
}

impl Chain {
    /// Stable slug used as the store namespace (e.g. `"bitcoin"`).
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Bitcoin => "bitcoin",
            Self::Ethereum => "ethereum",
        }
    }

    /// Parse a chain slug, accepting the common short forms.
    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "btc" | "bitcoin" => Some(Self::Bitcoin),
            "eth" | "ethereum" => Some(Self::Ethereum),
            _ => None,
        }
    }
}

impl std::fmt::Display for Chain {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

// ─── Block ───────────────────────────────────────────────────────────────────

/// A normalized block, immutable once stored.
///
/// Common fields live at the top level; provider-specific attributes
/// (difficulty, miner, gas fields, …) ride in [`Block::extra`] as JSON so the
/// engine and store never need per-chain variants.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Block {
    pub chain: Chain,
    /// The chain's native monotonic index (height or number).
    pub height: u64,
    /// Canonical block hash, hex-encoded.
    pub hash: String,
    /// Hash of the previous block (empty for a genesis block).
    pub parent_hash: String,
    /// Unix timestamp of the block (seconds since epoch).
    pub timestamp: i64,
    /// Transaction count the provider declared for this block.
    pub tx_count: u32,
    /// Serialized size in bytes.
    pub size: u64,
    /// Chain-specific attributes, already normalized by the adapter.
    pub extra: serde_json::Value,
}

// ─── Transaction ─────────────────────────────────────────────────────────────

/// A normalized transaction, owned by exactly one block.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Transaction {
    pub chain: Chain,
    /// Natural identifier: txid (Bitcoin) or transaction hash (Ethereum).
    pub id: String,
    /// Height of the owning block. Transactions are never re-parented.
    pub block_height: u64,
    /// Chain-specific attributes (fee, gas, addresses, io counts, …).
    pub extra: serde_json::Value,
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn chain_slug_roundtrip() {
        assert_eq!(Chain::parse("btc"), Some(Chain::Bitcoin));
        assert_eq!(Chain::parse("Ethereum"), Some(Chain::Ethereum));
        assert_eq!(Chain::parse("doge"), None);
        assert_eq!(Chain::parse(Chain::Bitcoin.as_str()), Some(Chain::Bitcoin));
    }

    #[test]
    fn chain_serde_uses_slug() {
        let json = serde_json::to_string(&Chain::Bitcoin).unwrap();
        assert_eq!(json, "\"bitcoin\"");
        let back: Chain = serde_json::from_str(&json).unwrap();
        assert_eq!(back, Chain::Bitcoin);
    }

    #[test]
    fn block_serde_roundtrip() {
        let block = Block {
            chain: Chain::Ethereum,
            height: 19_000_000,
            hash: "0xabc".into(),
            parent_hash: "0xdef".into(),
            timestamp: 1_700_000_000,
            tx_count: 150,
            size: 80_000,
            extra: serde_json::json!({ "miner": "0x1111" }),
        };
        let json = serde_json::to_string(&block).unwrap();
        let back: Block = serde_json::from_str(&json).unwrap();
        assert_eq!(back, block);
    }
}
