//! Core records and result types for the caching system.

use chrono::Utc;
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use serde_json::Value;

use crate::error::RequestError;

/// `fetched_at` value of a record that was explicitly invalidated.
pub const FORCED_STALE: i64 = 0;

/// A stored response.
///
/// `fetched_at` is epoch milliseconds; [`FORCED_STALE`] marks a record
/// whose payload is kept only as a fallback. `next_page` is `None` exactly
/// when the response was the last page.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheRecord {
  pub key: String,
  pub payload: Value,
  pub fetched_at: i64,
  pub next_page: Option<String>,
}

impl CacheRecord {
  /// A record fetched just now.
  pub fn fresh(key: impl Into<String>, payload: Value, next_page: Option<String>) -> Self {
    Self {
      key: key.into(),
      payload,
      fetched_at: now_millis(),
      next_page,
    }
  }

  pub fn is_forced_stale(&self) -> bool {
    self.fetched_at == FORCED_STALE
  }
}

/// Current time in epoch milliseconds.
pub fn now_millis() -> i64 {
  Utc::now().timestamp_millis()
}

/// A successful response decoded off the wire.
#[derive(Debug, Clone)]
pub struct NetworkPage {
  pub status: u16,
  pub payload: Value,
  pub next_page: Option<String>,
}

/// Result of a cached request, with metadata about where it came from.
#[derive(Debug, Clone)]
pub struct CacheResult {
  /// The payload
  pub data: Value,
  /// Where the payload came from
  pub source: CacheSource,
  /// HTTP status, only for network responses
  pub status: Option<u16>,
  /// Cursor of the following page
  pub next_page: Option<String>,
  /// When the payload was fetched (epoch ms), only for cached payloads
  pub fetched_at: Option<i64>,
}

impl CacheResult {
  /// Create a new cache result from fresh network data.
  pub fn from_network(page: NetworkPage) -> Self {
    Self {
      data: page.payload,
      source: CacheSource::Network,
      status: Some(page.status),
      next_page: page.next_page,
      fetched_at: None,
    }
  }

  /// Create a new cache result from a fresh cached record.
  pub fn from_cache(record: CacheRecord) -> Self {
    Self::cached(record, CacheSource::CacheFresh)
  }

  /// Create a new cache result for offline mode (network failed).
  pub fn offline(record: CacheRecord) -> Self {
    Self::cached(record, CacheSource::Offline)
  }

  fn cached(record: CacheRecord, source: CacheSource) -> Self {
    Self {
      data: record.payload,
      source,
      status: None,
      next_page: record.next_page,
      fetched_at: Some(record.fetched_at),
    }
  }

  /// Decode the payload into a concrete type.
  pub fn parse<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
    Ok(T::deserialize(&self.data)?)
  }
}

/// Indicates where a payload came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Data from cache, still considered fresh
  CacheFresh,
  /// Network failed, serving the last cached (possibly stale) data
  Offline,
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde_json::json;

  #[test]
  fn test_fresh_record_has_timestamp() {
    let record = CacheRecord::fresh("k", json!([1]), None);
    assert!(record.fetched_at > 0);
    assert!(!record.is_forced_stale());
  }

  #[test]
  fn test_offline_result_keeps_cursor() {
    let record = CacheRecord {
      key: "k".into(),
      payload: json!({"id": 7}),
      fetched_at: FORCED_STALE,
      next_page: Some("https://x.test/?page=2".into()),
    };
    let result = CacheResult::offline(record);

    assert_eq!(result.source, CacheSource::Offline);
    assert_eq!(result.next_page.as_deref(), Some("https://x.test/?page=2"));
    assert_eq!(result.fetched_at, Some(0));
    assert_eq!(result.status, None);
  }

  #[test]
  fn test_parse_payload() {
    #[derive(Deserialize)]
    struct Repo {
      id: u64,
    }

    let result = CacheResult::from_network(NetworkPage {
      status: 200,
      payload: json!({"id": 42}),
      next_page: None,
    });
    let repo: Repo = result.parse().expect("payload should decode");
    assert_eq!(repo.id, 42);
  }
}
