//! Error taxonomy for the sync pipeline.
//!
//! Fetch-side failures are all transient from the engine's point of view: the
//! failed height has no store row, so the next cycle retries it. Store-side
//! failures abort the running batch — there is no point indexing against a
//! store that is down.

use thiserror::Error;

/// Errors returned by a [`crate::ChainAdapter`].
#[derive(Debug, Error)]
pub enum FetchError {
    /// The provider has no data at the requested height yet.
    #[error("not found upstream")]
    NotFound,

    /// The provider asked us to back off.
    #[error("rate limited by provider")]
    RateLimited,

    /// Any other upstream failure (connection, timeout, malformed payload).
    #[error("provider error: {0}")]
    Provider(String),
}

impl FetchError {
    /// Returns `true` if the height simply is not produced/available yet.
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

/// Errors returned by a [`crate::BlockStore`].
///
/// A duplicate natural key is *not* an error — stores report it as
/// [`crate::CreateOutcome::AlreadyExists`].
#[derive(Debug, Error)]
pub enum StoreError {
    /// The backing store rejected or failed the operation.
    #[error("storage error: {0}")]
    Backend(String),

    /// A stored row could not be decoded back into the data model.
    #[error("corrupt row: {0}")]
    Decode(String),
}

/// Errors that terminate a sync cycle.
#[derive(Debug, Error)]
pub enum SyncError {
    /// The provider's tip could not be determined, so no window exists.
    #[error("failed to fetch chain tip: {0}")]
    Tip(#[source] FetchError),

    /// On-demand indexing surfaced a fetch failure for the requested height.
    #[error("failed to fetch requested height: {0}")]
    Fetch(#[source] FetchError),

    /// The store is unavailable; the batch was aborted.
    #[error(transparent)]
    Store(#[from] StoreError),
}
