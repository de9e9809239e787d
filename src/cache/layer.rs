//! Cache layer that orchestrates caching logic with network fetching.

use std::future::Future;
use std::sync::{Arc, Mutex};
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RequestError;
use crate::http::RequestOptions;

use super::freshness::{is_stale, DEFAULT_MAX_AGE_MS};
use super::storage::CacheStorage;
use super::traits::{CacheRecord, CacheResult, NetworkPage};

/// Cache layer that manages caching logic and network fetching.
///
/// This layer sits between the request facade and the transport,
/// providing transparent caching with offline support.
pub struct CacheLayer {
  storage: Arc<dyn CacheStorage>,
  /// How long before cached data is considered stale
  max_age_ms: u64,
  /// Background write-backs not yet awaited
  pending_writes: Arc<Mutex<Vec<JoinHandle<()>>>>,
}

impl CacheLayer {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: Arc<dyn CacheStorage>) -> Self {
    Self {
      storage,
      max_age_ms: DEFAULT_MAX_AGE_MS,
      pending_writes: Arc::new(Mutex::new(Vec::new())),
    }
  }

  /// Set the default max age for cached data.
  pub fn with_max_age(mut self, max_age_ms: u64) -> Self {
    self.max_age_ms = max_age_ms;
    self
  }

  pub fn storage(&self) -> &Arc<dyn CacheStorage> {
    &self.storage
  }

  /// Read a record, treating storage errors as a miss.
  fn lookup(&self, key: &str) -> Option<CacheRecord> {
    match self.storage.get(key) {
      Ok(record) => record,
      Err(e) => {
        warn!(key, error = %e, "Cache read failed, treating as miss");
        None
      }
    }
  }

  /// Fetch with cache-first strategy.
  ///
  /// 1. Check cache (unless `skip_cache`) - if fresh, return immediately
  /// 2. If stale/missing, fetch from network
  /// 3. Write the response back in the background
  /// 4. On network failure, return the cached record or the error
  ///
  /// `Ok(None)` means the fetch failed and there was nothing to fall back on.
  pub async fn fetch<F, Fut>(
    &self,
    key: &str,
    options: &RequestOptions,
    fetcher: F,
  ) -> Result<Option<CacheResult>, RequestError>
  where
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<NetworkPage, RequestError>>,
  {
    let cached = if options.skip_cache {
      None
    } else {
      self.lookup(key)
    };

    let max_age_ms = options.max_age_ms.unwrap_or(self.max_age_ms);
    if let Some(record) = &cached {
      if !is_stale(Some(record), max_age_ms) {
        debug!(key, "Cache hit");
        return Ok(Some(CacheResult::from_cache(record.clone())));
      }
    }
    debug!(key, cached = cached.is_some(), "Cache miss or stale");

    match fetcher().await {
      Ok(page) => {
        self.write_back(CacheRecord::fresh(
          key,
          page.payload.clone(),
          page.next_page.clone(),
        ));
        Ok(Some(CacheResult::from_network(page)))
      }
      Err(e) if options.should_throw => Err(e),
      Err(e) => {
        // Network failed, serve whatever the cache had (offline mode)
        warn!(key, error = %e, fallback = cached.is_some(), "Request failed");
        Ok(cached.map(CacheResult::offline))
      }
    }
  }

  /// Persist a record without blocking the caller. Failures are logged.
  fn write_back(&self, record: CacheRecord) {
    let storage = Arc::clone(&self.storage);
    let handle = tokio::task::spawn_blocking(move || {
      if let Err(e) = storage.put(&record) {
        warn!(key = %record.key, error = %e, "Failed to write result to cache");
      }
    });

    match self.pending_writes.lock() {
      Ok(mut pending) => {
        pending.retain(|h| !h.is_finished());
        pending.push(handle);
      }
      Err(e) => warn!("Pending write list poisoned: {}", e),
    }
  }

  /// Wait for every write-back issued so far.
  pub async fn flush(&self) {
    let handles: Vec<JoinHandle<()>> = match self.pending_writes.lock() {
      Ok(mut pending) => pending.drain(..).collect(),
      Err(_) => Vec::new(),
    };

    for handle in handles {
      if let Err(e) = handle.await {
        warn!("Cache write task failed: {}", e);
      }
    }
  }
}

impl Clone for CacheLayer {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      max_age_ms: self.max_age_ms,
      pending_writes: Arc::clone(&self.pending_writes),
    }
  }
}
