//! Per-chain sync tunables.

use std::time::Duration;

use crate::types::Chain;

/// Configuration for one chain's sync engine + scheduler pair.
///
/// Batch sizes are deliberately small: they are the primary rate-limit
/// mitigation against the upstream provider and bound worst-case cycle
/// latency. The defaults mirror how fast each chain produces blocks relative
/// to its poll interval.
#[derive(Debug, Clone)]
pub struct SyncConfig {
    pub chain: Chain,
    /// Upper bound on blocks attempted per cycle.
    pub max_batch_per_cycle: u64,
    /// Scheduler period.
    pub poll_interval: Duration,
}

impl SyncConfig {
    /// Defaults per chain: Bitcoin syncs 5 blocks every 5 minutes, Ethereum
    /// 20 blocks every 3 minutes.
    pub fn for_chain(chain: Chain) -> Self {
        match chain {
            Chain::Bitcoin => Self {
                chain,
                max_batch_per_cycle: 5,
                poll_interval: Duration::from_secs(300),
            },
            Chain::Ethereum => Self {
                chain,
                max_batch_per_cycle: 20,
                poll_interval: Duration::from_secs(180),
            },
        }
    }

    /// Override the per-cycle batch bound.
    pub fn max_batch_per_cycle(mut self, n: u64) -> Self {
        self.max_batch_per_cycle = n;
        self
    }

    /// Override the scheduler period.
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }
}
