//! Stale-while-revalidate, for slow-changing static asset CDNs.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;

use super::RefreshOutcome;
use crate::http::{CacheKey, Request, Response};
use crate::network::Fetch;
use crate::store::Store;

/// Serve the stored copy while a refresh runs concurrently. On a cache
/// miss the caller gets the result of that same in-flight fetch, with no
/// offline fallback.
pub struct StaleWhileRevalidate {
  store: Store,
  fetcher: Arc<dyn Fetch>,
}

impl StaleWhileRevalidate {
  pub fn new(store: Store, fetcher: Arc<dyn Fetch>) -> Self {
    Self { store, fetcher }
  }

  pub async fn handle(&self, request: Request) -> Result<Response> {
    let key = CacheKey::for_request(&request);

    // Kick off the network fetch before even looking at the store. The
    // task overwrites unconditionally: last writer wins, no freshness
    // comparison.
    let store = self.store.clone();
    let task_key = key.clone();
    let url = request.url.clone();
    let fetch = self.fetcher.fetch(request);
    let in_flight = tokio::spawn(async move {
      let result = fetch.await;
      let outcome = match &result {
        Ok(response) if response.is_ok() => match store.put(&task_key, response) {
          Ok(()) => RefreshOutcome::Updated,
          Err(e) => RefreshOutcome::Failed(e),
        },
        Ok(_) => RefreshOutcome::Unchanged,
        Err(e) => RefreshOutcome::Failed(eyre!("{}", e)),
      };
      outcome.log(&url);
      result
    });

    if let Some(cached) = self.store.get(&key)? {
      // The in-flight refresh keeps running after we return
      return Ok(cached.response);
    }

    match in_flight.await {
      Ok(result) => result,
      Err(e) => Err(eyre!("Refresh task panicked: {}", e)),
    }
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use crate::network::testing::FakeFetch;
  use crate::store::{MemoryStore, StoreBackend};
  use std::time::Duration;

  fn setup() -> (Store, FakeFetch, StaleWhileRevalidate) {
    let backend: Arc<dyn StoreBackend> = Arc::new(MemoryStore::new());
    backend.open("v1").unwrap();
    let store = Store::new(backend, "v1");
    let fetcher = FakeFetch::new();
    let strategy = StaleWhileRevalidate::new(store.clone(), Arc::new(fetcher.clone()));
    (store, fetcher, strategy)
  }

  #[tokio::test]
  async fn test_hit_served_while_refresh_overwrites_unconditionally() {
    let (store, fetcher, strategy) = setup();
    let url = "https://fonts.example.net/icons.woff2";
    let key = CacheKey::for_request(&Request::get(url));

    // Same etag as the cached copy; unlike cache-first this still
    // overwrites
    store
      .put(
        &key,
        &Response::new(200).with_header("etag", "\"v1\"").with_body("old"),
      )
      .unwrap();
    fetcher.serve(
      url,
      Response::new(200).with_header("etag", "\"v1\"").with_body("new"),
    );

    let served = strategy.handle(Request::get(url)).await.unwrap();
    assert_eq!(served.body, b"old");

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(store.get(&key).unwrap().unwrap().response.body, b"new");
  }

  #[tokio::test]
  async fn test_hit_with_network_down_keeps_cached_entry() {
    crate::network::testing::init_tracing();
    let (store, fetcher, strategy) = setup();
    let url = "https://fonts.example.net/a.css";
    let key = CacheKey::for_request(&Request::get(url));
    store.put(&key, &Response::new(200).with_body("cached")).unwrap();

    let served = strategy.handle(Request::get(url)).await.unwrap();
    assert_eq!(served.body, b"cached");

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(fetcher.call_count(), 1);
    assert_eq!(store.get(&key).unwrap().unwrap().response.body, b"cached");
  }

  #[tokio::test]
  async fn test_miss_returns_in_flight_fetch_result() {
    let (store, fetcher, strategy) = setup();
    let url = "https://fonts.example.net/b.css";
    fetcher.serve(url, Response::new(200).with_body("fresh"));

    let served = strategy.handle(Request::get(url)).await.unwrap();
    assert_eq!(served.body, b"fresh");

    // Exactly one fetch: the miss path awaited the same in-flight task
    assert_eq!(fetcher.call_count(), 1);
    assert!(store
      .get(&CacheKey::for_request(&Request::get(url)))
      .unwrap()
      .is_some());
  }

  #[tokio::test]
  async fn test_miss_with_network_down_propagates_error() {
    let (_store, _fetcher, strategy) = setup();
    let result = strategy
      .handle(Request::get("https://fonts.example.net/missing.css"))
      .await;
    assert!(result.is_err());
  }

  #[tokio::test]
  async fn test_non_ok_refresh_does_not_store() {
    let (store, fetcher, strategy) = setup();
    let url = "https://fonts.example.net/c.css";
    fetcher.serve(url, Response::new(500));

    let served = strategy.handle(Request::get(url)).await.unwrap();
    assert_eq!(served.status, 500);
    assert!(store
      .get(&CacheKey::for_request(&Request::get(url)))
      .unwrap()
      .is_none());
  }
}
