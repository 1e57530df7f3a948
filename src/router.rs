//! Request classification: which strategy handles which request.

use color_eyre::{eyre::eyre, Result};
use url::Url;

use crate::http::{Method, Request};

/// The three fetch/cache policies.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StrategyKind {
  /// Own-origin assets: versioned by the generation tag, served
  /// instantly with background correction.
  CacheFirst,
  /// Known static asset CDNs: slow-changing, staleness tolerated.
  StaleWhileRevalidate,
  /// Everything else: potentially dynamic, freshness over availability.
  NetworkFirst,
}

/// Outcome of routing a request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RouteDecision {
  /// Not intercepted; the host sends it untouched.
  Bypass,
  Handle(StrategyKind),
}

/// Classifies requests by method and origin. First match wins:
/// non-GET → bypass, own origin → cache-first, static CDN origin →
/// stale-while-revalidate, anything else → network-first.
pub struct StrategyRouter {
  own_origin: String,
  static_origins: Vec<String>,
}

impl StrategyRouter {
  pub fn new(own_origin: &str, static_origins: &[String]) -> Result<Self> {
    Ok(Self {
      own_origin: normalize_origin(own_origin)?,
      static_origins: static_origins
        .iter()
        .map(|o| normalize_origin(o))
        .collect::<Result<_>>()?,
    })
  }

  /// Normalized origin of the host application.
  pub fn own_origin(&self) -> &str {
    &self.own_origin
  }

  pub fn route(&self, request: &Request) -> RouteDecision {
    if request.method != Method::Get {
      return RouteDecision::Bypass;
    }

    // Unparseable URLs cannot match a configured origin
    match request.origin() {
      Some(origin) if origin == self.own_origin => RouteDecision::Handle(StrategyKind::CacheFirst),
      Some(origin) if self.static_origins.contains(&origin) => {
        RouteDecision::Handle(StrategyKind::StaleWhileRevalidate)
      }
      _ => RouteDecision::Handle(StrategyKind::NetworkFirst),
    }
  }
}

fn normalize_origin(origin: &str) -> Result<String> {
  let url = Url::parse(origin).map_err(|e| eyre!("Invalid origin {}: {}", origin, e))?;
  Ok(url.origin().ascii_serialization())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn router() -> StrategyRouter {
    StrategyRouter::new(
      "https://app.example.com",
      &["https://fonts.example.net".to_string()],
    )
    .unwrap()
  }

  #[test]
  fn test_non_get_bypasses_even_own_origin() {
    let router = router();
    let mut request = Request::get("https://app.example.com/api/submit");
    request.method = Method::Post;
    assert_eq!(router.route(&request), RouteDecision::Bypass);
  }

  #[test]
  fn test_own_origin_is_cache_first() {
    let router = router();
    assert_eq!(
      router.route(&Request::get("https://app.example.com/app.js")),
      RouteDecision::Handle(StrategyKind::CacheFirst)
    );
    // Navigations route the same way
    assert_eq!(
      router.route(&Request::navigate("https://app.example.com/about")),
      RouteDecision::Handle(StrategyKind::CacheFirst)
    );
  }

  #[test]
  fn test_static_cdn_is_stale_while_revalidate() {
    let router = router();
    assert_eq!(
      router.route(&Request::get("https://fonts.example.net/icons.woff2")),
      RouteDecision::Handle(StrategyKind::StaleWhileRevalidate)
    );
  }

  #[test]
  fn test_unknown_origin_is_network_first() {
    let router = router();
    assert_eq!(
      router.route(&Request::get("https://api.thirdparty.io/data")),
      RouteDecision::Handle(StrategyKind::NetworkFirst)
    );
  }

  #[test]
  fn test_origin_comparison_ignores_path_and_default_port() {
    let router = StrategyRouter::new("https://app.example.com:443/some/path", &[]).unwrap();
    assert_eq!(
      router.route(&Request::get("https://app.example.com/other")),
      RouteDecision::Handle(StrategyKind::CacheFirst)
    );
  }

  #[test]
  fn test_unparseable_url_is_network_first() {
    let router = router();
    assert_eq!(
      router.route(&Request::get("not a url")),
      RouteDecision::Handle(StrategyKind::NetworkFirst)
    );
  }

  #[test]
  fn test_invalid_configured_origin_is_rejected() {
    assert!(StrategyRouter::new("nonsense", &[]).is_err());
  }
}
