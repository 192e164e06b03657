//! blocksync-bitcoin — Bitcoin adapter for BlockSync.
//!
//! Polls a mempool.space-compatible REST API:
//!
//! ```text
//! GET /blocks/tip/height      → current tip height (plain text)
//! GET /block-height/{h}       → block hash at height h (plain text)
//! GET /block/{hash}           → block details (JSON)
//! GET /block/{hash}/txs       → block transactions (JSON)
//! ```
//!
//! All normalization to the chain-agnostic model happens here; the engine
//! never sees mempool-native field names.

pub mod fetcher;

pub use fetcher::BitcoinRestAdapter;
