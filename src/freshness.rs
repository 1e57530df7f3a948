//! Freshness comparison for cache-first revalidation.
//!
//! A refreshed copy replaces the stored one when either validator
//! changed: the etag strings are unequal, or the `last-modified` dates
//! differ when compared numerically as timestamps. Equal or absent
//! validators on both sides mean the stored copy is still current.

use chrono::DateTime;

use crate::http::Response;

/// True when the fresh response carries different validators than the
/// cached one and should overwrite it.
pub fn differs(cached: &Response, fresh: &Response) -> bool {
  etag_differs(cached, fresh) || last_modified_differs(cached, fresh)
}

fn etag_differs(cached: &Response, fresh: &Response) -> bool {
  values_differ(cached.header("etag"), fresh.header("etag"))
}

fn last_modified_differs(cached: &Response, fresh: &Response) -> bool {
  values_differ(
    parse_http_date(cached.header("last-modified")),
    parse_http_date(fresh.header("last-modified")),
  )
}

/// Parse an HTTP date (RFC 2822 form) into a unix timestamp.
/// Unparseable values are treated the same as absent ones.
fn parse_http_date(value: Option<&str>) -> Option<i64> {
  value
    .and_then(|v| DateTime::parse_from_rfc2822(v).ok())
    .map(|dt| dt.timestamp())
}

fn values_differ<T: PartialEq>(cached: Option<T>, fresh: Option<T>) -> bool {
  match (cached, fresh) {
    (None, None) => false,
    (Some(a), Some(b)) => a != b,
    _ => true,
  }
}
