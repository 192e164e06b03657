//! The idempotent persistence contract.
//!
//! Writes are creates keyed by natural identity (chain+height for blocks,
//! chain+txid for transactions). Concurrent duplicate creates are resolved by
//! the store's uniqueness constraint, not by application-level locking: the
//! second writer gets [`CreateOutcome::AlreadyExists`] and treats it as
//! success.

use async_trait::async_trait;

use crate::error::StoreError;
use crate::types::{Block, Chain, Transaction};

/// Result of a create-if-absent write.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CreateOutcome {
    /// The row was inserted by this call.
    Created,
    /// A row with the same natural key already existed; nothing was written.
    AlreadyExists,
}

/// Durable keyed storage for blocks and transactions.
///
/// The read surface (`latest_block`, `recent_blocks`, lookups) is what the
/// external query layer consumes; the engine itself only uses the existence
/// checks, the creates, and `highest_indexed`.
#[async_trait]
pub trait BlockStore: Send + Sync {
    // ── Write path (engine) ──────────────────────────────────────────────

    async fn create_block_if_absent(&self, block: &Block) -> Result<CreateOutcome, StoreError>;

    async fn create_transaction_if_absent(
        &self,
        tx: &Transaction,
    ) -> Result<CreateOutcome, StoreError>;

    /// The derived sync cursor: `max(height)` stored for `chain`, or `None`
    /// if no block has ever been indexed for it.
    async fn highest_indexed(&self, chain: Chain) -> Result<Option<u64>, StoreError>;

    async fn block_exists(&self, chain: Chain, height: u64) -> Result<bool, StoreError>;

    async fn transaction_exists(&self, chain: Chain, id: &str) -> Result<bool, StoreError>;

    // ── Read surface (query layer) ───────────────────────────────────────

    async fn block_by_height(&self, chain: Chain, height: u64)
        -> Result<Option<Block>, StoreError>;

    async fn latest_block(&self, chain: Chain) -> Result<Option<Block>, StoreError>;

    /// Most recent blocks first, at most `limit` of them.
    async fn recent_blocks(&self, chain: Chain, limit: u32) -> Result<Vec<Block>, StoreError>;

    async fn transaction_by_id(
        &self,
        chain: Chain,
        id: &str,
    ) -> Result<Option<Transaction>, StoreError>;

    async fn transactions_for_block(
        &self,
        chain: Chain,
        height: u64,
    ) -> Result<Vec<Transaction>, StoreError>;

    async fn block_count(&self, chain: Chain) -> Result<u64, StoreError>;

    async fn transaction_count(&self, chain: Chain) -> Result<u64, StoreError>;

    // ── Repair surface (out-of-band) ─────────────────────────────────────

    /// Delete a block and its transactions so the next cycle re-indexes the
    /// gap. Returns `false` if no such block existed.
    async fn delete_block(&self, chain: Chain, height: u64) -> Result<bool, StoreError>;
}
