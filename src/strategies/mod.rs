//! The three fetch/cache strategies.
//!
//! Each strategy holds a store handle and a fetcher and answers a single
//! request. Background refreshes are spawned tasks whose outcome feeds
//! tracing and nothing else: a response that has already been returned
//! is never affected by what its refresh does.

mod cache_first;
mod network_first;
mod stale_while_revalidate;

pub use cache_first::CacheFirstRefresh;
pub use network_first::NetworkFirst;
pub use stale_while_revalidate::StaleWhileRevalidate;

use tracing::{debug, warn};

/// Best-effort result of a background refresh. Callers on the response
/// path never see this; spawn sites log it and drop it.
#[derive(Debug)]
pub enum RefreshOutcome {
  /// The store entry was overwritten with a newer copy.
  Updated,
  /// The fetched copy was not newer (or not cacheable); entry untouched.
  Unchanged,
  /// The fetch or store write failed; prior cached state is preserved.
  Failed(color_eyre::Report),
}

impl RefreshOutcome {
  pub(crate) fn log(&self, url: &str) {
    match self {
      RefreshOutcome::Updated => debug!(url, "Background refresh updated cache entry"),
      RefreshOutcome::Unchanged => debug!(url, "Background refresh left cache entry unchanged"),
      RefreshOutcome::Failed(e) => warn!(url, error = %e, "Background refresh failed"),
    }
  }
}
