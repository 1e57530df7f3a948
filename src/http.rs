//! Request and response model for intercepted traffic.
//!
//! This is deliberately minimal: a request carries method, URL and a
//! navigation-vs-subresource flag; a response is a captured snapshot
//! (status, headers, body) that can be stored and replayed. Streaming
//! bodies and byte ranges are out of scope.

use std::collections::BTreeMap;
use std::fmt;

use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use url::Url;

use crate::config::FetchMode;

/// HTTP method. Only GET requests are ever cached; everything else is
/// passed through untouched by the router.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Method {
  Get,
  Head,
  Post,
  Put,
  Delete,
  Patch,
  Options,
}

impl Method {
  pub fn as_str(&self) -> &'static str {
    match self {
      Method::Get => "GET",
      Method::Head => "HEAD",
      Method::Post => "POST",
      Method::Put => "PUT",
      Method::Delete => "DELETE",
      Method::Patch => "PATCH",
      Method::Options => "OPTIONS",
    }
  }
}

impl fmt::Display for Method {
  fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
    f.write_str(self.as_str())
  }
}

/// An intercepted request.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Request {
  pub method: Method,
  pub url: String,
  /// True for top-level page navigations, false for subresources.
  pub navigation: bool,
  /// Fetch mode hint carried over from the manifest (cross-origin
  /// resources that should be fetched without reading CORS headers).
  #[serde(default)]
  pub mode: FetchMode,
}

impl Request {
  /// A plain GET subresource request.
  pub fn get(url: impl Into<String>) -> Self {
    Self {
      method: Method::Get,
      url: url.into(),
      navigation: false,
      mode: FetchMode::Default,
    }
  }

  /// A top-level navigation request.
  pub fn navigate(url: impl Into<String>) -> Self {
    Self {
      navigation: true,
      ..Self::get(url)
    }
  }

  pub fn with_mode(mut self, mode: FetchMode) -> Self {
    self.mode = mode;
    self
  }

  /// ASCII origin of the request URL, or None if the URL doesn't parse.
  pub fn origin(&self) -> Option<String> {
    Url::parse(&self.url)
      .ok()
      .map(|u| u.origin().ascii_serialization())
  }
}

/// Canonical cache identity of a request: method + URL.
///
/// The store keys entries by the SHA256 of this identity, which keeps
/// storage keys fixed-length and index-friendly regardless of URL size.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CacheKey {
  identity: String,
}

impl CacheKey {
  pub fn for_request(request: &Request) -> Self {
    Self {
      identity: format!("{} {}", request.method, request.url),
    }
  }

  /// Human-readable identity, e.g. `GET https://example.com/app.css`.
  pub fn identity(&self) -> &str {
    &self.identity
  }

  /// SHA256 hash for stable, fixed-length storage keys.
  pub fn hash(&self) -> String {
    let mut hasher = Sha256::new();
    hasher.update(self.identity.as_bytes());
    hex::encode(hasher.finalize())
  }
}

/// A captured response snapshot.
///
/// Header names are lowercased on insert so lookups for `etag` and
/// `last-modified` behave the same regardless of the producing server.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl Response {
  pub fn new(status: u16) -> Self {
    Self {
      status,
      headers: BTreeMap::new(),
      body: Vec::new(),
    }
  }

  pub fn with_header(mut self, name: &str, value: &str) -> Self {
    self.headers.insert(name.to_lowercase(), value.to_string());
    self
  }

  pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
    self.body = body.into();
    self
  }

  /// Look up a header by name (case-insensitive).
  pub fn header(&self, name: &str) -> Option<&str> {
    self.headers.get(&name.to_lowercase()).map(String::as_str)
  }

  /// True for 2xx statuses; only these are worth caching.
  pub fn is_ok(&self) -> bool {
    (200..=299).contains(&self.status)
  }

  /// Synthesized fallback returned when both store and network fail.
  pub fn placeholder() -> Self {
    Self::new(503)
      .with_header("content-type", "text/plain")
      .with_body("Offline: this resource is not available without a network connection.")
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_cache_key_identity_and_hash() {
    let key = CacheKey::for_request(&Request::get("https://example.com/a.css"));
    assert_eq!(key.identity(), "GET https://example.com/a.css");
    // Hash is hex SHA256: 64 chars, stable across calls
    assert_eq!(key.hash().len(), 64);
    assert_eq!(key.hash(), key.hash());

    let other = CacheKey::for_request(&Request::get("https://example.com/b.css"));
    assert_ne!(key.hash(), other.hash());
  }

  #[test]
  fn test_headers_case_insensitive() {
    let response = Response::new(200).with_header("ETag", "\"v1\"");
    assert_eq!(response.header("etag"), Some("\"v1\""));
    assert_eq!(response.header("ETAG"), Some("\"v1\""));
  }

  #[test]
  fn test_origin_extraction() {
    let request = Request::get("https://example.com:8443/deep/path?q=1");
    assert_eq!(request.origin().as_deref(), Some("https://example.com:8443"));

    let bad = Request::get("not a url");
    assert_eq!(bad.origin(), None);
  }

  #[test]
  fn test_placeholder_shape() {
    let placeholder = Response::placeholder();
    assert_eq!(placeholder.status, 503);
    assert_eq!(placeholder.header("content-type"), Some("text/plain"));
    assert!(!placeholder.body.is_empty());
    assert!(!placeholder.is_ok());
  }
}
