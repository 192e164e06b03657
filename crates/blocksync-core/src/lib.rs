//! blocksync-core — foundation for the incremental two-chain block indexer.
//!
//! # Architecture
//!
//! ```text
//! Scheduler ──► SyncEngine
//!                  ├── ChainAdapter   (fetch tip / block / transactions)
//!                  ├── SyncWindow     (cursor derivation from the store)
//!                  └── BlockStore     (idempotent create-if-absent writes)
//! ```
//!
//! The cursor is never persisted separately: every cycle re-derives the
//! resume point from `max(block.height)` in the store, so a crash mid-batch
//! is picked up by the next cycle without any recovery step.

pub mod adapter;
pub mod config;
pub mod engine;
pub mod error;
pub mod scheduler;
pub mod store;
pub mod types;
pub mod window;

pub use adapter::ChainAdapter;
pub use config::SyncConfig;
pub use engine::{IndexOutcome, SyncEngine, SyncReport};
pub use error::{FetchError, StoreError, SyncError};
pub use scheduler::Scheduler;
pub use store::{BlockStore, CreateOutcome};
pub use types::{Block, Chain, Transaction};
pub use window::SyncWindow;
