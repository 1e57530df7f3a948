//! cachegate: an offline-first request-interception and caching engine.
//!
//! The engine sits between a client application and the network. Each
//! intercepted GET request is classified by origin and handled by one of
//! three strategies: cache-first with background refresh for own-origin
//! assets, stale-while-revalidate for known static asset CDNs, and
//! network-first for everything else. Cached entries live in a single
//! generation-tagged store; bumping the generation tag in configuration
//! creates a fresh generation at install time and schedules deletion of
//! every other one.
//!
//! The host embedding this crate owns the actual interception point and
//! the control-message transport; the engine only exposes
//! [`Gateway::handle`] for requests and [`ControlChannel`] for the
//! `SKIP_WAITING` / `CLEAR_CACHE` signals.

mod config;
mod control;
mod freshness;
mod gateway;
mod generation;
mod http;
mod network;
mod router;
mod store;
mod strategies;

pub use config::{Config, FetchMode, ManifestEntry};
pub use control::{ControlChannel, ControlMessage};
pub use gateway::{FetchOutcome, Gateway};
pub use generation::{GenerationManager, PopulationFailure, PopulationReport};
pub use http::{CacheKey, Method, Request, Response};
pub use network::{Fetch, HttpFetcher};
pub use router::{RouteDecision, StrategyKind, StrategyRouter};
pub use store::{CachedResponse, MemoryStore, SqliteStore, Store, StoreBackend};
pub use strategies::{CacheFirstRefresh, NetworkFirst, RefreshOutcome, StaleWhileRevalidate};
