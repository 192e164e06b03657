//! Sync window derivation — which contiguous run of heights the next cycle
//! should attempt.

use std::ops::RangeInclusive;

/// The batch of heights one sync cycle will attempt, inclusive on both ends.
///
/// Derived fresh every cycle from the store's highest indexed height and the
/// provider tip; never persisted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SyncWindow {
    start: u64,
    end: u64,
}

impl SyncWindow {
    /// Compute the next window, or `None` when the store is already at the
    /// tip (or `max_batch` is zero).
    ///
    /// A cold start (no block stored yet) does not crawl the whole history:
    /// it behaves as if the cursor sat one batch behind the tip, so the first
    /// cycle indexes at most `max_batch` blocks ending at the tip. For a
    /// young chain whose tip is within the batch size this degenerates to
    /// indexing everything from height 1.
    pub fn compute(highest_indexed: Option<u64>, tip: u64, max_batch: u64) -> Option<Self> {
        if max_batch == 0 {
            return None;
        }
        let highest = match highest_indexed {
            Some(h) => h,
            None => tip.saturating_sub(max_batch),
        };
        let start = highest.checked_add(1)?;
        if start > tip {
            return None;
        }
        let len = (tip - start + 1).min(max_batch);
        Some(Self {
            start,
            end: start + len - 1,
        })
    }

    /// First height in the window.
    pub fn start(&self) -> u64 {
        self.start
    }

    /// Last height in the window.
    pub fn end(&self) -> u64 {
        self.end
    }

    /// Number of heights in the window.
    pub fn len(&self) -> u64 {
        self.end - self.start + 1
    }

    pub fn is_empty(&self) -> bool {
        false // a window is only constructed when at least one height is due
    }

    /// The heights to attempt, in ascending order.
    pub fn heights(&self) -> RangeInclusive<u64> {
        self.start..=self.end
    }
}
