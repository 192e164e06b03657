//! SQLite storage backend.
//!
//! Persists blocks and transactions to a single SQLite file using `sqlx`,
//! with WAL mode for concurrent read performance. Natural-key uniqueness is
//! enforced by primary keys; create-if-absent is `INSERT OR IGNORE`, so a
//! losing duplicate writer observes `AlreadyExists` rather than an error.
//!
//! # Usage
//! ```rust,no_run
//! use blocksync_storage::sqlite::SqliteStore;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! // File-backed (persistent)
//! let store = SqliteStore::open("./blocksync.db").await?;
//!
//! // In-memory (tests / ephemeral)
//! let store = SqliteStore::in_memory().await?;
//! # Ok(())
//! # }
//! ```

use async_trait::async_trait;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use tracing::debug;

use blocksync_core::error::StoreError;
use blocksync_core::store::{BlockStore, CreateOutcome};
use blocksync_core::types::{Block, Chain, Transaction};

/// SQLite-backed [`BlockStore`].
pub struct SqliteStore {
    pool: SqlitePool,
}

impl SqliteStore {
    /// Open (or create) a SQLite database at `path`.
    ///
    /// The path may be a plain file path (`"./blocksync.db"`) or a full
    /// SQLite URL (`"sqlite:./blocksync.db?mode=rwc"`).
    pub async fn open(path: &str) -> Result<Self, StoreError> {
        let url = if path.starts_with("sqlite:") {
            path.to_string()
        } else {
            format!("sqlite:{path}?mode=rwc")
        };

        let pool = SqlitePool::connect(&url)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    /// Open an in-memory SQLite database. Ideal for tests.
    pub async fn in_memory() -> Result<Self, StoreError> {
        let pool = SqlitePool::connect("sqlite::memory:")
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let store = Self { pool };
        store.init_schema().await?;
        Ok(store)
    }

    async fn init_schema(&self) -> Result<(), StoreError> {
        // WAL mode — the query layer reads while the sync engine writes.
        sqlx::query("PRAGMA journal_mode=WAL;")
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS blocks (
                chain       TEXT    NOT NULL,
                height      INTEGER NOT NULL,
                hash        TEXT    NOT NULL,
                parent_hash TEXT    NOT NULL,
                timestamp   INTEGER NOT NULL,
                tx_count    INTEGER NOT NULL,
                size        INTEGER NOT NULL,
                extra_json  TEXT    NOT NULL,
                PRIMARY KEY (chain, height)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE UNIQUE INDEX IF NOT EXISTS idx_blocks_hash ON blocks (chain, hash);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE TABLE IF NOT EXISTS transactions (
                chain        TEXT    NOT NULL,
                txid         TEXT    NOT NULL,
                block_height INTEGER NOT NULL,
                extra_json   TEXT    NOT NULL,
                PRIMARY KEY (chain, txid)
            );",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        sqlx::query(
            "CREATE INDEX IF NOT EXISTS idx_txs_block ON transactions (chain, block_height);",
        )
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(())
    }

    fn block_from_row(row: &SqliteRow) -> Result<Block, StoreError> {
        let chain_slug: String = row.get("chain");
        let chain = Chain::parse(&chain_slug)
            .ok_or_else(|| StoreError::Decode(format!("unknown chain slug: {chain_slug}")))?;
        let extra_str: String = row.get("extra_json");
        let extra = serde_json::from_str(&extra_str)
            .map_err(|e| StoreError::Decode(format!("block extra_json: {e}")))?;

        Ok(Block {
            chain,
            height: row.get::<i64, _>("height") as u64,
            hash: row.get("hash"),
            parent_hash: row.get("parent_hash"),
            timestamp: row.get("timestamp"),
            tx_count: row.get::<i64, _>("tx_count") as u32,
            size: row.get::<i64, _>("size") as u64,
            extra,
        })
    }

    fn tx_from_row(row: &SqliteRow) -> Result<Transaction, StoreError> {
        let chain_slug: String = row.get("chain");
        let chain = Chain::parse(&chain_slug)
            .ok_or_else(|| StoreError::Decode(format!("unknown chain slug: {chain_slug}")))?;
        let extra_str: String = row.get("extra_json");
        let extra = serde_json::from_str(&extra_str)
            .map_err(|e| StoreError::Decode(format!("tx extra_json: {e}")))?;

        Ok(Transaction {
            chain,
            id: row.get("txid"),
            block_height: row.get::<i64, _>("block_height") as u64,
            extra,
        })
    }
}

#[async_trait]
impl BlockStore for SqliteStore {
    async fn create_block_if_absent(&self, block: &Block) -> Result<CreateOutcome, StoreError> {
        let extra = serde_json::to_string(&block.extra)
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO blocks
             (chain, height, hash, parent_hash, timestamp, tx_count, size, extra_json)
             VALUES (?, ?, ?, ?, ?, ?, ?, ?)",
        )
        .bind(block.chain.as_str())
        .bind(block.height as i64)
        .bind(&block.hash)
        .bind(&block.parent_hash)
        .bind(block.timestamp)
        .bind(block.tx_count as i64)
        .bind(block.size as i64)
        .bind(&extra)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 1 {
            debug!(chain = %block.chain, height = block.height, "block stored");
            Ok(CreateOutcome::Created)
        } else {
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    async fn create_transaction_if_absent(
        &self,
        tx: &Transaction,
    ) -> Result<CreateOutcome, StoreError> {
        let extra =
            serde_json::to_string(&tx.extra).map_err(|e| StoreError::Backend(e.to_string()))?;

        let result = sqlx::query(
            "INSERT OR IGNORE INTO transactions (chain, txid, block_height, extra_json)
             VALUES (?, ?, ?, ?)",
        )
        .bind(tx.chain.as_str())
        .bind(&tx.id)
        .bind(tx.block_height as i64)
        .bind(&extra)
        .execute(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        if result.rows_affected() == 1 {
            Ok(CreateOutcome::Created)
        } else {
            Ok(CreateOutcome::AlreadyExists)
        }
    }

    async fn highest_indexed(&self, chain: Chain) -> Result<Option<u64>, StoreError> {
        let row = sqlx::query("SELECT MAX(height) AS h FROM blocks WHERE chain = ?")
            .bind(chain.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.get::<Option<i64>, _>("h").map(|h| h as u64))
    }

    async fn block_exists(&self, chain: Chain, height: u64) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM blocks WHERE chain = ? AND height = ?")
            .bind(chain.as_str())
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn transaction_exists(&self, chain: Chain, id: &str) -> Result<bool, StoreError> {
        let row = sqlx::query("SELECT 1 FROM transactions WHERE chain = ? AND txid = ?")
            .bind(chain.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.is_some())
    }

    async fn block_by_height(&self, chain: Chain, height: u64) -> Result<Option<Block>, StoreError> {
        let row = sqlx::query("SELECT * FROM blocks WHERE chain = ? AND height = ?")
            .bind(chain.as_str())
            .bind(height as i64)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(|r| Self::block_from_row(&r)).transpose()
    }

    async fn latest_block(&self, chain: Chain) -> Result<Option<Block>, StoreError> {
        let row = sqlx::query(
            "SELECT * FROM blocks WHERE chain = ? ORDER BY height DESC LIMIT 1",
        )
        .bind(chain.as_str())
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(|r| Self::block_from_row(&r)).transpose()
    }

    async fn recent_blocks(&self, chain: Chain, limit: u32) -> Result<Vec<Block>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM blocks WHERE chain = ? ORDER BY height DESC LIMIT ?",
        )
        .bind(chain.as_str())
        .bind(limit as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.iter().map(Self::block_from_row).collect()
    }

    async fn transaction_by_id(
        &self,
        chain: Chain,
        id: &str,
    ) -> Result<Option<Transaction>, StoreError> {
        let row = sqlx::query("SELECT * FROM transactions WHERE chain = ? AND txid = ?")
            .bind(chain.as_str())
            .bind(id)
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        row.map(|r| Self::tx_from_row(&r)).transpose()
    }

    async fn transactions_for_block(
        &self,
        chain: Chain,
        height: u64,
    ) -> Result<Vec<Transaction>, StoreError> {
        let rows = sqlx::query(
            "SELECT * FROM transactions WHERE chain = ? AND block_height = ?",
        )
        .bind(chain.as_str())
        .bind(height as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| StoreError::Backend(e.to_string()))?;

        rows.iter().map(Self::tx_from_row).collect()
    }

    async fn block_count(&self, chain: Chain) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM blocks WHERE chain = ?")
            .bind(chain.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.get::<i64, _>("cnt") as u64)
    }

    async fn transaction_count(&self, chain: Chain) -> Result<u64, StoreError> {
        let row = sqlx::query("SELECT COUNT(*) AS cnt FROM transactions WHERE chain = ?")
            .bind(chain.as_str())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        Ok(row.get::<i64, _>("cnt") as u64)
    }

    async fn delete_block(&self, chain: Chain, height: u64) -> Result<bool, StoreError> {
        sqlx::query("DELETE FROM transactions WHERE chain = ? AND block_height = ?")
            .bind(chain.as_str())
            .bind(height as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let result = sqlx::query("DELETE FROM blocks WHERE chain = ? AND height = ?")
            .bind(chain.as_str())
            .bind(height as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| StoreError::Backend(e.to_string()))?;

        let removed = result.rows_affected() > 0;
        if removed {
            debug!(chain = %chain, height, "block deleted for repair");
        }
        Ok(removed)
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    fn sample_block(chain: Chain, height: u64) -> Block {
        Block {
            chain,
            height,
            hash: format!("{}-{height:064x}", chain.as_str()),
            parent_hash: format!("{}-{:064x}", chain.as_str(), height.saturating_sub(1)),
            timestamp: 1_700_000_000 + height as i64,
            tx_count: 3,
            size: 1_234,
            extra: serde_json::json!({ "difficulty": 1024 }),
        }
    }

    fn sample_tx(chain: Chain, id: &str, height: u64) -> Transaction {
        Transaction {
            chain,
            id: id.into(),
            block_height: height,
            extra: serde_json::json!({ "fee": 21_000 }),
        }
    }

    #[tokio::test]
    async fn block_roundtrip() {
        let store = SqliteStore::in_memory().await.unwrap();
        let block = sample_block(Chain::Bitcoin, 800_000);

        assert_eq!(
            store.create_block_if_absent(&block).await.unwrap(),
            CreateOutcome::Created
        );

        let loaded = store
            .block_by_height(Chain::Bitcoin, 800_000)
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, block);
    }

    #[tokio::test]
    async fn duplicate_block_is_ignored() {
        let store = SqliteStore::in_memory().await.unwrap();
        let block = sample_block(Chain::Bitcoin, 1);

        store.create_block_if_absent(&block).await.unwrap();
        let mut altered = block.clone();
        altered.size = 9_999;
        // Second writer for the same key loses; the original row survives.
        assert_eq!(
            store.create_block_if_absent(&altered).await.unwrap(),
            CreateOutcome::AlreadyExists
        );

        let loaded = store.block_by_height(Chain::Bitcoin, 1).await.unwrap().unwrap();
        assert_eq!(loaded.size, block.size);
    }

    #[tokio::test]
    async fn highest_indexed_is_max_per_chain() {
        let store = SqliteStore::in_memory().await.unwrap();
        assert_eq!(store.highest_indexed(Chain::Bitcoin).await.unwrap(), None);

        for h in [5u64, 3, 9] {
            store
                .create_block_if_absent(&sample_block(Chain::Bitcoin, h))
                .await
                .unwrap();
        }
        store
            .create_block_if_absent(&sample_block(Chain::Ethereum, 1_000))
            .await
            .unwrap();

        assert_eq!(store.highest_indexed(Chain::Bitcoin).await.unwrap(), Some(9));
        assert_eq!(
            store.highest_indexed(Chain::Ethereum).await.unwrap(),
            Some(1_000)
        );
    }

    #[tokio::test]
    async fn transaction_roundtrip_and_existence() {
        let store = SqliteStore::in_memory().await.unwrap();
        let tx = sample_tx(Chain::Ethereum, "0xdead", 100);

        assert_eq!(
            store.create_transaction_if_absent(&tx).await.unwrap(),
            CreateOutcome::Created
        );
        assert_eq!(
            store.create_transaction_if_absent(&tx).await.unwrap(),
            CreateOutcome::AlreadyExists
        );

        assert!(store.transaction_exists(Chain::Ethereum, "0xdead").await.unwrap());
        assert!(!store.transaction_exists(Chain::Bitcoin, "0xdead").await.unwrap());

        let loaded = store
            .transaction_by_id(Chain::Ethereum, "0xdead")
            .await
            .unwrap()
            .unwrap();
        assert_eq!(loaded, tx);
        assert_eq!(loaded.extra["fee"], 21_000);
    }

    #[tokio::test]
    async fn recent_blocks_newest_first_with_limit() {
        let store = SqliteStore::in_memory().await.unwrap();
        for h in 1..=10u64 {
            store
                .create_block_if_absent(&sample_block(Chain::Ethereum, h))
                .await
                .unwrap();
        }

        let recent = store.recent_blocks(Chain::Ethereum, 4).await.unwrap();
        let heights: Vec<u64> = recent.iter().map(|b| b.height).collect();
        assert_eq!(heights, vec![10, 9, 8, 7]);

        let latest = store.latest_block(Chain::Ethereum).await.unwrap().unwrap();
        assert_eq!(latest.height, 10);
    }

    #[tokio::test]
    async fn counts_are_per_chain() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .create_block_if_absent(&sample_block(Chain::Bitcoin, 1))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&sample_tx(Chain::Bitcoin, "a", 1))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&sample_tx(Chain::Bitcoin, "b", 1))
            .await
            .unwrap();

        assert_eq!(store.block_count(Chain::Bitcoin).await.unwrap(), 1);
        assert_eq!(store.transaction_count(Chain::Bitcoin).await.unwrap(), 2);
        assert_eq!(store.block_count(Chain::Ethereum).await.unwrap(), 0);
    }

    #[tokio::test]
    async fn delete_block_cascades_to_transactions() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .create_block_if_absent(&sample_block(Chain::Bitcoin, 10))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&sample_tx(Chain::Bitcoin, "a", 10))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&sample_tx(Chain::Bitcoin, "keep", 11))
            .await
            .unwrap();

        assert!(store.delete_block(Chain::Bitcoin, 10).await.unwrap());
        assert!(!store.block_exists(Chain::Bitcoin, 10).await.unwrap());
        assert!(!store.transaction_exists(Chain::Bitcoin, "a").await.unwrap());
        assert!(store.transaction_exists(Chain::Bitcoin, "keep").await.unwrap());

        assert!(!store.delete_block(Chain::Bitcoin, 10).await.unwrap());
    }

    #[tokio::test]
    async fn transactions_for_block_filters_by_height() {
        let store = SqliteStore::in_memory().await.unwrap();
        store
            .create_transaction_if_absent(&sample_tx(Chain::Bitcoin, "a", 10))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&sample_tx(Chain::Bitcoin, "b", 10))
            .await
            .unwrap();
        store
            .create_transaction_if_absent(&sample_tx(Chain::Bitcoin, "c", 11))
            .await
            .unwrap();

        let txs = store
            .transactions_for_block(Chain::Bitcoin, 10)
            .await
            .unwrap();
        assert_eq!(txs.len(), 2);
    }
}
