//! Generation lifecycle: populate a new store generation, promote it,
//! reap every other one.
//!
//! Sequencing contract: `initialize` → `promote` → `reap`. Reaping only
//! compares tags against this manager's own immutable tag, so the
//! current generation can never be deleted, even if a promotion races
//! with it.

use color_eyre::{eyre::eyre, Result};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tracing::{info, warn};

use crate::http::{CacheKey, Request};
use crate::network::Fetch;
use crate::store::{Store, StoreBackend};

/// Owns one generation tag of the versioned store.
pub struct GenerationManager {
  backend: Arc<dyn StoreBackend>,
  tag: String,
  active: AtomicBool,
}

/// What happened while precaching the manifest. Individual failures are
/// warnings, not errors: the engine works with a partially warmed cache.
#[derive(Debug, Default)]
pub struct PopulationReport {
  /// Entries fetched and stored successfully.
  pub populated: usize,
  /// Entries that could not be fetched or stored.
  pub failures: Vec<PopulationFailure>,
}

#[derive(Debug)]
pub struct PopulationFailure {
  pub url: String,
  pub reason: String,
}

impl GenerationManager {
  pub fn new(backend: Arc<dyn StoreBackend>, tag: impl Into<String>) -> Self {
    Self {
      backend,
      tag: tag.into(),
      active: AtomicBool::new(false),
    }
  }

  pub fn tag(&self) -> &str {
    &self.tag
  }

  /// Store handle bound to this manager's generation.
  pub fn store(&self) -> Store {
    Store::new(Arc::clone(&self.backend), self.tag.clone())
  }

  /// Open this generation and precache the given requests.
  ///
  /// Fails only if the store itself cannot be opened. Each precache
  /// fetch is best-effort: failures are logged, recorded in the report
  /// and skipped, so a flaky network still yields a usable (partially
  /// warmed) cache.
  pub async fn initialize(&self, manifest: &[Request], fetcher: &dyn Fetch) -> Result<PopulationReport> {
    self
      .backend
      .open(&self.tag)
      .map_err(|e| eyre!("Failed to open cache generation {}: {}", self.tag, e))?;

    let mut report = PopulationReport::default();

    for request in manifest {
      match self.populate_one(request, fetcher).await {
        Ok(()) => report.populated += 1,
        Err(e) => {
          warn!(url = %request.url, error = %e, "Precache entry skipped");
          report.failures.push(PopulationFailure {
            url: request.url.clone(),
            reason: e.to_string(),
          });
        }
      }
    }

    info!(
      generation = %self.tag,
      populated = report.populated,
      failed = report.failures.len(),
      "Generation initialized"
    );

    Ok(report)
  }

  async fn populate_one(&self, request: &Request, fetcher: &dyn Fetch) -> Result<()> {
    let response = fetcher.fetch(request.clone()).await?;
    if !response.is_ok() {
      return Err(eyre!("Unexpected status {}", response.status));
    }
    self
      .backend
      .put(&self.tag, &CacheKey::for_request(request), &response)
  }

  /// Mark this generation as the one future reads and writes resolve
  /// against. Idempotent.
  pub fn promote(&self) {
    if !self.active.swap(true, Ordering::SeqCst) {
      info!(generation = %self.tag, "Generation promoted");
    }
  }

  pub fn is_active(&self) -> bool {
    self.active.load(Ordering::SeqCst)
  }

  /// Delete every generation whose tag differs from this manager's.
  pub fn reap(&self) -> Result<()> {
    for tag in self.backend.list()? {
      if tag != self.tag {
        info!(generation = %tag, "Reaping stale generation");
        self.backend.delete(&tag)?;
      }
    }
    Ok(())
  }

  /// Drop every entry of the current generation; subsequent requests
  /// behave as full cache misses, subsequent writes still land.
  pub fn clear(&self) -> Result<()> {
    self.backend.delete(&self.tag)?;
    self.backend.open(&self.tag)?;
    info!(generation = %self.tag, "Generation cleared");
    Ok(())
  }
}
