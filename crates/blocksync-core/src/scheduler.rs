//! Fixed-interval sync driver, one independent task per chain.
//!
//! A tick that fires while the previous sync is still running is dropped,
//! not queued: sync duration is network-bound and queuing ticks would build
//! an unbounded backlog under sustained upstream slowness.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use crate::engine::SyncEngine;

pub struct Scheduler;

impl Scheduler {
    /// Drive `engine` forever: one sync immediately, then one per
    /// `interval`. Aborting the returned handle stops the scheduler; the
    /// next process start resumes from the store's derived cursor, so no
    /// drain step is needed.
    pub fn spawn(engine: Arc<SyncEngine>, interval: Duration) -> JoinHandle<()> {
        tokio::spawn(async move {
            let chain = engine.chain();
            let mut ticker = tokio::time::interval(interval);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            tracing::info!(%chain, interval_secs = interval.as_secs(), "scheduler started");

            loop {
                // The first tick completes immediately.
                ticker.tick().await;
                match engine.try_sync_once().await {
                    Some(Ok(report)) if report.is_up_to_date() => {
                        tracing::debug!(%chain, tip = report.tip, "up to date");
                    }
                    Some(Ok(report)) => {
                        tracing::info!(
                            %chain,
                            indexed = report.indexed,
                            skipped = report.skipped,
                            failed = report.failed,
                            cursor = ?report.cursor_after,
                            "sync cycle finished"
                        );
                    }
                    Some(Err(err)) => {
                        // Transient by design: the next tick retries from the
                        // store's derived cursor.
                        tracing::error!(%chain, error = %err, "sync cycle failed");
                    }
                    None => {
                        tracing::info!(%chain, "previous sync still running, dropping tick");
                    }
                }
            }
        })
    }
}
