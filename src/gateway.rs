//! The gateway wires router, generation manager and strategies into the
//! single entry point the host calls per intercepted request.

use color_eyre::{eyre::eyre, Result};
use std::sync::Arc;
use tracing::debug;
use url::Url;

use crate::config::Config;
use crate::control::ControlChannel;
use crate::generation::{GenerationManager, PopulationReport};
use crate::http::{Request, Response};
use crate::network::{Fetch, HttpFetcher};
use crate::router::{RouteDecision, StrategyKind, StrategyRouter};
use crate::store::{SqliteStore, StoreBackend};
use crate::strategies::{CacheFirstRefresh, NetworkFirst, StaleWhileRevalidate};

/// What the host should do with an intercepted request.
#[derive(Debug)]
pub enum FetchOutcome {
  /// Answer the client with this response.
  Response(Response),
  /// Not intercepted: send the request to the network untouched.
  PassThrough(Request),
}

/// Request-interception layer between a client application and the
/// network.
pub struct Gateway {
  router: StrategyRouter,
  manager: Arc<GenerationManager>,
  cache_first: CacheFirstRefresh,
  stale_while_revalidate: StaleWhileRevalidate,
  network_first: NetworkFirst,
  fetcher: Arc<dyn Fetch>,
  precache: Vec<Request>,
}

impl Gateway {
  pub fn new(config: Config, backend: Arc<dyn StoreBackend>, fetcher: Arc<dyn Fetch>) -> Result<Self> {
    let router = StrategyRouter::new(&config.origin, &config.static_origins)?;

    let base = Url::parse(&config.origin)
      .map_err(|e| eyre!("Invalid origin {}: {}", config.origin, e))?;
    let precache = config
      .manifest
      .iter()
      .map(|entry| entry.to_request(&base))
      .collect::<Result<Vec<_>>>()?;

    let manager = Arc::new(GenerationManager::new(backend, config.generation));
    let store = manager.store();
    let root_url = format!("{}/", router.own_origin());

    Ok(Self {
      cache_first: CacheFirstRefresh::new(store.clone(), Arc::clone(&fetcher), root_url),
      stale_while_revalidate: StaleWhileRevalidate::new(store.clone(), Arc::clone(&fetcher)),
      network_first: NetworkFirst::new(store, Arc::clone(&fetcher)),
      router,
      manager,
      fetcher,
      precache,
    })
  }

  /// Convenience constructor: SQLite store at the configured path (or
  /// the default data directory) and the reqwest-backed fetcher.
  pub fn open(config: Config) -> Result<Self> {
    let backend: Arc<dyn StoreBackend> = match &config.store_path {
      Some(path) => Arc::new(SqliteStore::open_at(path)?),
      None => Arc::new(SqliteStore::open_default()?),
    };
    let fetcher = Arc::new(HttpFetcher::new()?);
    Self::new(config, backend, fetcher)
  }

  /// Bring a fresh generation online: precache the manifest, promote the
  /// generation, then reap every other one, in that order.
  pub async fn install(&self) -> Result<PopulationReport> {
    let report = self
      .manager
      .initialize(&self.precache, self.fetcher.as_ref())
      .await?;
    self.manager.promote();
    self.manager.reap()?;
    Ok(report)
  }

  /// Handle one intercepted request.
  pub async fn handle(&self, request: Request) -> Result<FetchOutcome> {
    match self.router.route(&request) {
      RouteDecision::Bypass => Ok(FetchOutcome::PassThrough(request)),
      RouteDecision::Handle(kind) => {
        debug!(url = %request.url, strategy = ?kind, "Handling intercepted request");
        let response = match kind {
          StrategyKind::CacheFirst => self.cache_first.handle(request).await?,
          StrategyKind::StaleWhileRevalidate => self.stale_while_revalidate.handle(request).await?,
          StrategyKind::NetworkFirst => self.network_first.handle(request).await?,
        };
        Ok(FetchOutcome::Response(response))
      }
    }
  }

  /// Receiving end for host control signals.
  pub fn control(&self) -> ControlChannel {
    ControlChannel::new(Arc::clone(&self.manager))
  }

  pub fn generation(&self) -> &str {
    self.manager.tag()
  }
}
