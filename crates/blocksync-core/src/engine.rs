//! The sync engine — one bounded, sequential, idempotent batch per call.
//!
//! Each cycle re-derives its resume point from the store (`max(height)` per
//! chain), pulls at most `max_batch_per_cycle` blocks through the adapter,
//! and commits them with per-item create-if-absent writes. No cycle is ever
//! rolled back: correctness comes from convergence over repeated cycles, not
//! from any single cycle's atomicity.
//!
//! Batch items are processed strictly sequentially. This bounds upstream
//! load and keeps ordering trivial: transactions for block N are persisted,
//! to the extent they succeed, before block N+1 fetching begins.

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::adapter::ChainAdapter;
use crate::config::SyncConfig;
use crate::error::{FetchError, StoreError, SyncError};
use crate::store::{BlockStore, CreateOutcome};
use crate::types::Chain;
use crate::window::SyncWindow;

/// Outcome of indexing a single height.
#[derive(Debug)]
pub enum IndexOutcome {
    /// Block (and whatever transactions succeeded) committed this call.
    Indexed { transactions_stored: u32 },
    /// A block row already existed; nothing was fetched or written.
    AlreadyIndexed,
    /// The block itself could not be fetched; no row was created, so the
    /// height is retried on a later cycle.
    FetchFailed(FetchError),
}

/// Summary of one sync cycle.
#[derive(Debug, Clone, serde::Serialize)]
pub struct SyncReport {
    pub chain: Chain,
    /// Provider tip observed at the start of the cycle.
    pub tip: u64,
    /// Derived cursor before the cycle ran.
    pub cursor_before: Option<u64>,
    /// Derived cursor after the cycle ran.
    pub cursor_after: Option<u64>,
    pub attempted: u32,
    pub indexed: u32,
    pub skipped: u32,
    pub failed: u32,
    pub transactions_stored: u32,
}

impl SyncReport {
    /// Returns `true` if the cycle found nothing to do.
    pub fn is_up_to_date(&self) -> bool {
        self.attempted == 0
    }
}

/// The per-chain sync engine.
///
/// Dependencies are injected so the engine can run against fake adapters and
/// stores in tests. Overlapping `sync_once` calls are serialized by an
/// internal mutex; the scheduler uses [`SyncEngine::try_sync_once`] instead
/// so that overlapping ticks are dropped rather than queued.
pub struct SyncEngine {
    config: SyncConfig,
    adapter: Arc<dyn ChainAdapter>,
    store: Arc<dyn BlockStore>,
    in_flight: Mutex<()>,
}

impl SyncEngine {
    pub fn new(
        config: SyncConfig,
        adapter: Arc<dyn ChainAdapter>,
        store: Arc<dyn BlockStore>,
    ) -> Self {
        Self {
            config,
            adapter,
            store,
            in_flight: Mutex::new(()),
        }
    }

    pub fn chain(&self) -> Chain {
        self.config.chain
    }

    pub fn config(&self) -> &SyncConfig {
        &self.config
    }

    /// Run one sync cycle. Waits if another cycle is already in flight, so a
    /// caller that overlaps a running sync simply observes its writes as
    /// already present.
    pub async fn sync_once(&self) -> Result<SyncReport, SyncError> {
        let _guard = self.in_flight.lock().await;
        self.run_cycle().await
    }

    /// Non-blocking variant for the scheduler: returns `None` when a sync
    /// for this chain is already running.
    pub async fn try_sync_once(&self) -> Option<Result<SyncReport, SyncError>> {
        let guard = self.in_flight.try_lock().ok()?;
        let result = self.run_cycle().await;
        drop(guard);
        Some(result)
    }

    /// On-demand "index this height now" entry point, used for backfill and
    /// post-repair re-indexing. Same guarantees as the scheduled path; a
    /// fetch failure is surfaced as an error instead of a report line.
    pub async fn index_height(&self, height: u64) -> Result<IndexOutcome, SyncError> {
        let _guard = self.in_flight.lock().await;
        match self.index_one(height).await? {
            IndexOutcome::FetchFailed(err) => Err(SyncError::Fetch(err)),
            outcome => Ok(outcome),
        }
    }

    async fn run_cycle(&self) -> Result<SyncReport, SyncError> {
        let chain = self.config.chain;
        let tip = self.adapter.tip().await.map_err(SyncError::Tip)?;
        let cursor_before = self.store.highest_indexed(chain).await?;

        let mut report = SyncReport {
            chain,
            tip,
            cursor_before,
            cursor_after: cursor_before,
            attempted: 0,
            indexed: 0,
            skipped: 0,
            failed: 0,
            transactions_stored: 0,
        };

        let Some(window) =
            SyncWindow::compute(cursor_before, tip, self.config.max_batch_per_cycle)
        else {
            tracing::debug!(%chain, tip, cursor = ?cursor_before, "store is up to date");
            return Ok(report);
        };

        tracing::info!(
            %chain,
            from = window.start(),
            to = window.end(),
            tip,
            "sync batch starting"
        );

        for height in window.heights() {
            report.attempted += 1;
            match self.index_one(height).await? {
                IndexOutcome::Indexed {
                    transactions_stored,
                } => {
                    report.indexed += 1;
                    report.transactions_stored += transactions_stored;
                }
                IndexOutcome::AlreadyIndexed => report.skipped += 1,
                IndexOutcome::FetchFailed(err) => {
                    tracing::warn!(
                        %chain,
                        height,
                        error = %err,
                        "block fetch failed; no row created, height retried later"
                    );
                    report.failed += 1;
                }
            }
        }

        report.cursor_after = self.store.highest_indexed(chain).await?;
        tracing::info!(
            %chain,
            indexed = report.indexed,
            skipped = report.skipped,
            failed = report.failed,
            cursor = ?report.cursor_after,
            "sync batch finished"
        );
        Ok(report)
    }

    /// Index one height with per-item idempotence. Only a [`StoreError`]
    /// propagates; fetch failures are folded into the outcome so the batch
    /// loop can continue.
    async fn index_one(&self, height: u64) -> Result<IndexOutcome, StoreError> {
        let chain = self.config.chain;

        // Idempotence guard: a previous cycle may have partially committed.
        if self.store.block_exists(chain, height).await? {
            tracing::debug!(%chain, height, "block already indexed, skipping");
            return Ok(IndexOutcome::AlreadyIndexed);
        }

        let block = match self.adapter.block(height).await {
            Ok(block) => block,
            Err(err) => return Ok(IndexOutcome::FetchFailed(err)),
        };

        // AlreadyExists here means a concurrent writer won the race; either
        // way the row is present, which is all this step guarantees.
        self.store.create_block_if_absent(&block).await?;

        let txs = match self.adapter.transactions(&block).await {
            Ok(txs) => txs,
            Err(err) => {
                // The block row stays. A block with fewer stored transactions
                // than declared is a detectable, externally-repairable
                // inconsistency, not a crash condition.
                tracing::warn!(
                    %chain,
                    height,
                    error = %err,
                    "transaction fetch failed; block kept without transactions"
                );
                return Ok(IndexOutcome::Indexed {
                    transactions_stored: 0,
                });
            }
        };

        let mut stored = 0u32;
        for tx in &txs {
            if let CreateOutcome::Created = self.store.create_transaction_if_absent(tx).await? {
                stored += 1;
            }
        }

        tracing::debug!(
            %chain,
            height,
            transactions = stored,
            declared = block.tx_count,
            "block indexed"
        );
        Ok(IndexOutcome::Indexed {
            transactions_stored: stored,
        })
    }
}

// ─── Tests ───────────────────────────────────────────────────────────────────
