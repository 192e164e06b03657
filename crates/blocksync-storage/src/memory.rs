//! In-memory storage backend.
//!
//! Keeps blocks and transactions in RAM behind plain mutexes. Useful for
//! tests and short-lived runs that don't need persistence; all data is lost
//! when the process exits.

use std::collections::{BTreeMap, HashMap};
use std::sync::Mutex;

use async_trait::async_trait;

use blocksync_core::error::StoreError;
use blocksync_core::store::{BlockStore, CreateOutcome};
use blocksync_core::types::{Block, Chain, Transaction};

/// In-memory [`BlockStore`].
#[derive(Default)]
pub struct MemoryStore {
    // Keyed by (chain, height) so both indexers can share one store.
    blocks: Mutex<BTreeMap<(Chain, u64), Block>>,
    txs: Mutex<HashMap<(Chain, String), Transaction>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl BlockStore for MemoryStore {
    async fn create_block_if_absent(&self, block: &Block) -> Result<CreateOutcome, StoreError> {
        let mut blocks = self.blocks.lock().unwrap();
        let key = (block.chain, block.height);
        if blocks.contains_key(&key) {
            Ok(CreateOutcome::AlreadyExists)
        } else {
            blocks.insert(key, block.clone());
            Ok(CreateOutcome::Created)
        }
    }

    async fn create_transaction_if_absent(
        &self,
        tx: &Transaction,
    ) -> Result<CreateOutcome, StoreError> {
        let mut txs = self.txs.lock().unwrap();
        let key = (tx.chain, tx.id.clone());
        if txs.contains_key(&key) {
            Ok(CreateOutcome::AlreadyExists)
        } else {
            txs.insert(key, tx.clone());
            Ok(CreateOutcome::Created)
        }
    }

    async fn highest_indexed(&self, chain: Chain) -> Result<Option<u64>, StoreError> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks
            .range((chain, u64::MIN)..=(chain, u64::MAX))
            .next_back()
            .map(|((_, height), _)| *height))
    }

    async fn block_exists(&self, chain: Chain, height: u64) -> Result<bool, StoreError> {
        Ok(self.blocks.lock().unwrap().contains_key(&(chain, height)))
    }

    async fn transaction_exists(&self, chain: Chain, id: &str) -> Result<bool, StoreError> {
        Ok(self
            .txs
            .lock()
            .unwrap()
            .contains_key(&(chain, id.to_string())))
    }

    async fn block_by_height(&self, chain: Chain, height: u64) -> Result<Option<Block>, StoreError> {
        Ok(self.blocks.lock().unwrap().get(&(chain, height)).cloned())
    }

    async fn latest_block(&self, chain: Chain) -> Result<Option<Block>, StoreError> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks
            .range((chain, u64::MIN)..=(chain, u64::MAX))
            .next_back()
            .map(|(_, block)| block.clone()))
    }

    async fn recent_blocks(&self, chain: Chain, limit: u32) -> Result<Vec<Block>, StoreError> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks
            .range((chain, u64::MIN)..=(chain, u64::MAX))
            .rev()
            .take(limit as usize)
            .map(|(_, block)| block.clone())
            .collect())
    }

    async fn transaction_by_id(
        &self,
        chain: Chain,
        id: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        Ok(self
            .txs
            .lock()
            .unwrap()
            .get(&(chain, id.to_string()))
            .cloned())
    }

    async fn transactions_for_block(
        &self,
        chain: Chain,
        height: u64,
    ) -> Result<Vec<Transaction>, StoreError> {
        Ok(self
            .txs
            .lock()
            .unwrap()
            .values()
            .filter(|t| t.chain == chain && t.block_height == height)
            .cloned()
            .collect())
    }

    async fn block_count(&self, chain: Chain) -> Result<u64, StoreError> {
        let blocks = self.blocks.lock().unwrap();
        Ok(blocks.range((chain, u64::MIN)..=(chain, u64::MAX)).count() as u64)
    }

    async fn transaction_count(&self, chain: Chain) -> Result<u64, StoreError> {
        Ok(self
            .txs
            .lock()
            .unwrap()
            .keys()
            .filter(|(c, _)| *c == chain)
            .count() as u64)
    }

    async fn delete_block(&self, chain: Chain, height: u64) -> Result<bool, StoreError> {
        let removed = self
            .blocks
            .lock()
            .unwrap()
            .remove(&(chain, height))
            .is_some();
        self.txs
            .lock()
            .unwrap()
            .retain(|(c, _), t| !(*c == chain && t.block_height == height));
        Ok(removed)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn block(chain: Chain, height: u64) -> Block {
        Block {
            chain,
            height,
            hash: format!("{chain}-{height}"),
            parent_hash: String::new(),
            timestamp: 1_700_000_000,
            tx_count: 1,
            size: 500,
            extra: serde_json::Value::Null,
        }
    }

    fn tx(chain: Chain, id: &str, height: u64) -> Transaction {
        Transaction {
            chain,
            id: id.into(),
            block_height: height,
            extra: serde_json::Value::Null,
        }
    }

    #[tokio::test]
    async fn duplicate_block_create_is_reported_not_written() {
        let store = MemoryStore::new();
        let b = block(Chain::Bitcoin, 100);

        assert_eq!(
            store.create_block_if_absent(&b).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            store.create_block_if_absent(&b).await.unwrap(),
            CreateOutcome::AlreadyExists
        );
        assert_eq!(store.block_count(Chain::Bitcoin).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn highest_indexed_is_per_chain() {
        let store = MemoryStore::new();
        store
            .create_block_if_absent(&block(Chain::Bitcoin, 800_000))
            .await
            .unwrap();
        store
            .create_block_if_absent(&block(Chain::Ethereum, 19_000_000))
            .await
            .unwrap();

        assert_eq!(
            store.highest_indexed(Chain::Bitcoin).await.unwrap(),
            Some(800_000)
        );
        assert_eq!(
            store.highest_indexed(Chain::Ethereum).await.unwrap(),
            Some(19_000_000)
        );
    }

    #[tokio::test]
    async fn empty_chain_has_no_cursor() {
        let store = MemoryStore::new();
        assert_eq!(store.highest_indexed(Chain::Bitcoin).await.unwrap(), None);
        assert!(store.latest_block(Chain::Bitcoin).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn recent_blocks_newest_first() {
        let store = MemoryStore::new();
        for h in 1..=5 {
            store
                .create_block_if_absent(&block(Chain::Bitcoin, h))
                .await
                .unwrap();
        }

        let recent = store.recent_blocks(Chain::Bitcoin, 3).await.unwrap();
        let heights: Vec<u64> = recent.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![5, 4, 3]);
    }

    #[tokio::test]
    async fn transactions_keyed_and_queried_per_block() {
        let store = MemoryStore::new();
        store
            .create_transaction_if_absent(&tx(Chain::Bitcoin, "a", 10))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&tx(Chain::Bitcoin, "b", 10))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&tx(Chain::Bitcoin, "c", 11))
            .await
            .unwrap();

        assert!(store.transaction_exists(Chain::Bitcoin, "a").await.unwrap());
        assert!(!store.transaction_exists(Chain::Ethereum, "a").await.unwrap());
        assert_eq!(
            store
                .transactions_for_block(Chain::Bitcoin, 10)
                .await
                .unwrap()
                .len(),
            2
        );
    }

    #[tokio::test]
    async fn delete_block_removes_its_transactions() {
        let store = MemoryStore::new();
        store
            .create_block_if_absent(&block(Chain::Bitcoin, 10))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&tx(Chain::Bitcoin, "a", 10))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&tx(Chain::Bitcoin, "c", 11))
            .await
            .unwrap();

        assert!(store.delete_block(Chain::Bitcoin, 10).await.unwrap());
        assert!(!store.block_exists(Chain::Bitcoin, 10).await.unwrap());
        assert!(!store.transaction_exists(Chain::Bitcoin, "a").await.unwrap());
        // Other blocks' transactions survive.
        assert!(store.transaction_exists(Chain::Bitcoin, "c").await.unwrap());

        // Deleting a missing block is a no-op.
        assert!(!store.delete_block(Chain::Bitcoin, 10).await.unwrap());
    }
}
