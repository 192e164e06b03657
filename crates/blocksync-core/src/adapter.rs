//! The chain adapter seam — translates abstract "fetch block N" requests
//! into provider-specific calls and normalizes the responses.
//!
//! Provider-native encodings (hex-prefixed quantities, nested status objects)
//! are converted exactly once, behind this trait. The engine and store only
//! ever see the normalized [`Block`] and [`Transaction`] representation.

use async_trait::async_trait;

use crate::error::FetchError;
use crate::types::{Block, Chain, Transaction};

/// A per-chain data source.
///
/// Implementations exist for Bitcoin (REST polling) and Ethereum (JSON-RPC);
/// tests use hand-rolled fakes.
#[async_trait]
pub trait ChainAdapter: Send + Sync {
    /// Which chain this adapter serves.
    fn chain(&self) -> Chain;

    /// The highest index the provider currently reports as available.
    async fn tip(&self) -> Result<u64, FetchError>;

    /// Fetch and normalize the block at `height`.
    ///
    /// Fails with [`FetchError::NotFound`] if the provider has not produced
    /// that height yet; the engine treats this as transient.
    async fn block(&self, height: u64) -> Result<Block, FetchError>;

    /// Fetch and normalize the transactions belonging to `block`.
    async fn transactions(&self, block: &Block) -> Result<Vec<Transaction>, FetchError>;
}
