//! Network seam: the `Fetch` trait and its reqwest-backed implementation.

use color_eyre::{eyre::eyre, Result};
use futures::future::BoxFuture;
use std::collections::BTreeMap;

use crate::http::{Request, Response};

/// Something that can perform a network fetch and capture the response.
///
/// Returned futures are `'static` so strategies can hand them to spawned
/// background tasks; implementors clone whatever client state they need
/// into the future.
pub trait Fetch: Send + Sync {
  fn fetch(&self, request: Request) -> BoxFuture<'static, Result<Response>>;
}

/// reqwest-backed fetcher.
#[derive(Clone)]
pub struct HttpFetcher {
  client: reqwest::Client,
}

impl HttpFetcher {
  pub fn new() -> Result<Self> {
    let client = reqwest::Client::builder()
      .build()
      .map_err(|e| eyre!("Failed to build HTTP client: {}", e))?;

    Ok(Self { client })
  }
}

impl Fetch for HttpFetcher {
  fn fetch(&self, request: Request) -> BoxFuture<'static, Result<Response>> {
    let client = self.client.clone();

    // The no-cors manifest hint has no effect here: CORS is a browser
    // restriction and these fetches carry no ambient credentials.
    Box::pin(async move {
      let method = reqwest::Method::from_bytes(request.method.as_str().as_bytes())
        .map_err(|e| eyre!("Invalid method {}: {}", request.method, e))?;

      let reply = client
        .request(method, &request.url)
        .send()
        .await
        .map_err(|e| eyre!("Fetch failed for {}: {}", request.url, e))?;

      let status = reply.status().as_u16();

      let mut headers = BTreeMap::new();
      for (name, value) in reply.headers() {
        if let Ok(value) = value.to_str() {
          headers.insert(name.as_str().to_string(), value.to_string());
        }
      }

      let body = reply
        .bytes()
        .await
        .map_err(|e| eyre!("Failed to read body for {}: {}", request.url, e))?
        .to_vec();

      Ok(Response {
        status,
        headers,
        body,
      })
    })
  }
}

#[cfg(test)]
pub(crate) mod testing {
  //! Scriptable in-memory fetcher for strategy tests.

  use super::*;
  use std::sync::{Arc, Mutex};

  /// Route tracing output through the test harness so background
  /// refresh warnings show up under `--nocapture`. Safe to call from
  /// every test; only the first call installs the subscriber.
  pub(crate) fn init_tracing() {
    use tracing_subscriber::EnvFilter;

    let _ = tracing_subscriber::fmt()
      .with_env_filter(EnvFilter::from_default_env())
      .with_test_writer()
      .try_init();
  }

  enum Route {
    Reply(Response),
    Fail(String),
  }

  #[derive(Default)]
  struct Inner {
    routes: Mutex<std::collections::HashMap<String, Route>>,
    calls: Mutex<Vec<String>>,
  }

  /// Fake network: serves scripted responses per URL, fails everything
  /// else, and records every fetch it receives.
  #[derive(Clone, Default)]
  pub(crate) struct FakeFetch {
    inner: Arc<Inner>,
  }

  impl FakeFetch {
    pub fn new() -> Self {
      Self::default()
    }

    /// Script a successful response for a URL.
    pub fn serve(&self, url: &str, response: Response) {
      self
        .inner
        .routes
        .lock()
        .unwrap()
        .insert(url.to_string(), Route::Reply(response));
    }

    /// Script a network failure for a URL.
    pub fn fail(&self, url: &str, reason: &str) {
      self
        .inner
        .routes
        .lock()
        .unwrap()
        .insert(url.to_string(), Route::Fail(reason.to_string()));
    }

    /// URLs fetched so far, in order.
    pub fn calls(&self) -> Vec<String> {
      self.inner.calls.lock().unwrap().clone()
    }

    pub fn call_count(&self) -> usize {
      self.inner.calls.lock().unwrap().len()
    }
  }

  impl Fetch for FakeFetch {
    fn fetch(&self, request: Request) -> BoxFuture<'static, Result<Response>> {
      let inner = Arc::clone(&self.inner);

      Box::pin(async move {
        inner.calls.lock().unwrap().push(request.url.clone());

        let routes = inner.routes.lock().unwrap();
        match routes.get(&request.url) {
          Some(Route::Reply(response)) => Ok(response.clone()),
          Some(Route::Fail(reason)) => Err(eyre!("{}", reason)),
          None => Err(eyre!("Network unreachable: {}", request.url)),
        }
      })
    }
  }
}
