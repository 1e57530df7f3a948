//! Cache-first with background refresh, for own-origin assets.

use color_eyre::Result;
use std::sync::Arc;
use tracing::debug;

use super::RefreshOutcome;
use crate::freshness;
use crate::http::{CacheKey, Request, Response};
use crate::network::Fetch;
use crate::store::Store;

/// Serve from the store immediately and correct it in the background;
/// fall back to network, then to the root document or a placeholder.
pub struct CacheFirstRefresh {
  store: Store,
  fetcher: Arc<dyn Fetch>,
  /// URL of the application's root document, the navigation fallback.
  root_url: String,
}

impl CacheFirstRefresh {
  pub fn new(store: Store, fetcher: Arc<dyn Fetch>, root_url: impl Into<String>) -> Self {
    Self {
      store,
      fetcher,
      root_url: root_url.into(),
    }
  }

  pub async fn handle(&self, request: Request) -> Result<Response> {
    let key = CacheKey::for_request(&request);

    if let Some(cached) = self.store.get(&key)? {
      // Hit: respond now, revalidate behind the caller's back
      let store = self.store.clone();
      let fetcher = Arc::clone(&self.fetcher);
      let prior = cached.response.clone();
      tokio::spawn(async move {
        let url = request.url.clone();
        revalidate(store, fetcher, request, prior).await.log(&url);
      });
      return Ok(cached.response);
    }

    match self.fetcher.fetch(request.clone()).await {
      Ok(response) => {
        if response.is_ok() {
          self.store.put(&key, &response)?;
        }
        Ok(response)
      }
      Err(e) => {
        debug!(url = %request.url, error = %e, "Cache miss and network down, falling back");
        if request.navigation {
          let root_key = CacheKey::for_request(&Request::get(&self.root_url));
          if let Some(root) = self.store.get(&root_key)? {
            return Ok(root.response);
          }
        }
        Ok(Response::placeholder())
      }
    }
  }
}

/// Refetch a cached resource and overwrite the entry only if its
/// validators (etag / last-modified) changed.
async fn revalidate(
  store: Store,
  fetcher: Arc<dyn Fetch>,
  request: Request,
  prior: Response,
) -> RefreshOutcome {
  let fresh = match fetcher.fetch(request.clone()).await {
    Ok(response) => response,
    Err(e) => return RefreshOutcome::Failed(e),
  };

  if !fresh.is_ok() || !freshness::differs(&prior, &fresh) {
    return RefreshOutcome::Unchanged;
  }

  match store.put(&CacheKey::for_request(&request), &fresh) {
    Ok(()) => RefreshOutcome::Updated,
    Err(e) => RefreshOutcome::Failed(e),
  }
}
