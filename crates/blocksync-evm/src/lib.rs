//! blocksync-evm — Ethereum adapter for BlockSync.
//!
//! Talks JSON-RPC 2.0 over HTTP (`eth_blockNumber`, `eth_getBlockByNumber`)
//! against any Ethereum execution endpoint. Hex-prefixed quantities are
//! decoded here, exactly once; the engine and store only ever see canonical
//! integers.

pub mod fetcher;
pub mod rpc;

pub use fetcher::EvmRpcAdapter;
pub use rpc::{JsonRpcError, JsonRpcRequest, JsonRpcResponse};
