//! Network-first, for external and potentially dynamic resources.

use color_eyre::Result;
use std::sync::Arc;
use tracing::{debug, warn};

use crate::http::{CacheKey, Request, Response};
use crate::network::Fetch;
use crate::store::Store;

/// Try the network, fall back to the store. With neither available the
/// failure propagates: external resources get no placeholder, only
/// "whatever happened to be cached".
pub struct NetworkFirst {
  store: Store,
  fetcher: Arc<dyn Fetch>,
}

impl NetworkFirst {
  pub fn new(store: Store, fetcher: Arc<dyn Fetch>) -> Self {
    Self { store, fetcher }
  }

  pub async fn handle(&self, request: Request) -> Result<Response> {
    let key = CacheKey::for_request(&request);

    match self.fetcher.fetch(request.clone()).await {
      Ok(response) => {
        if response.is_ok() {
          self.store.put(&key, &response)?;
        }
        Ok(response)
      }
      Err(fetch_err) => {
        match self.store.get(&key) {
          Ok(Some(cached)) => {
            debug!(url = %request.url, "Network down, serving cached copy");
            Ok(cached.response)
          }
          Ok(None) => Err(fetch_err),
          Err(store_err) => {
            // A broken store reads as a miss; the network error is the
            // one the caller can act on
            warn!(url = %request.url, error = %store_err, "Store lookup failed during fallback");
            Err(fetch_err)
          }
        }
      }
    }
  }
}
