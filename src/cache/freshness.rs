//! Freshness policy for stored records.

use super::traits::{now_millis, CacheRecord};

/// Default max age: ten minutes.
pub const DEFAULT_MAX_AGE_MS: u64 = 10 * 60 * 1000;

/// A record is stale when absent, forced stale, or older than `max_age_ms`.
pub fn is_stale(record: Option<&CacheRecord>, max_age_ms: u64) -> bool {
  is_stale_at(record, max_age_ms, now_millis())
}

/// [`is_stale`] evaluated at a given time.
pub fn is_stale_at(record: Option<&CacheRecord>, max_age_ms: u64, now_ms: i64) -> bool {
  match record {
    None => true,
    Some(record) if record.is_forced_stale() => true,
    Some(record) => {
      let age = i128::from(now_ms) - i128::from(record.fetched_at);
      age > i128::from(max_age_ms)
    }
  }
}
