//! Request client with transparent caching, pagination and expiry.

use color_eyre::Result;
use serde_json::Value;
use std::collections::HashSet;
use std::sync::Arc;
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::auth::{AuthFailure, AuthFailureSignal, CredentialProvider, Subscription};
use crate::cache::{
  cache_key, CacheLayer, CacheRecord, CacheResult, CacheStorage, KeyDeriver, NetworkPage,
  NoopStorage, SqliteStorage,
};
use crate::config::Config;
use crate::error::RequestError;
use crate::http::link::next_link;
use crate::http::{Fetch, FetchOptions, HttpResponse, RequestOptions, ACCEPT, AUTHORIZATION, LINK};

/// Media type requested by [`CachedRequest::request_diff`].
pub const DIFF_MEDIA_TYPE: &str = "application/vnd.github.v3.diff";

/// JSON API client that caches every successful response.
///
/// Fresh responses are served from the store, stale or missing ones are
/// refetched, and a failed refetch falls back to whatever the store still
/// holds. Concurrent requests for the same key are not coalesced.
pub struct CachedRequest {
  config: Config,
  keys: KeyDeriver,
  cache: CacheLayer,
  fetcher: Arc<dyn Fetch>,
  credentials: Arc<dyn CredentialProvider>,
  auth_failures: AuthFailureSignal,
}

impl CachedRequest {
  /// Create a client backed by the on-disk store for `config.cache_version`.
  ///
  /// If the store can't be opened the client keeps working without a cache.
  pub fn new(
    config: Config,
    fetcher: Arc<dyn Fetch>,
    credentials: Arc<dyn CredentialProvider>,
  ) -> Result<Self, RequestError> {
    let storage: Arc<dyn CacheStorage> =
      match config.cache_path().and_then(|path| SqliteStorage::open_at(&path)) {
        Ok(storage) => Arc::new(storage),
        Err(e) => {
          warn!(error = %e, "Cache storage unavailable, continuing without cache");
          Arc::new(NoopStorage)
        }
      };

    Self::with_storage(config, storage, fetcher, credentials)
  }

  /// Create a client on an explicit storage backend.
  pub fn with_storage(
    config: Config,
    storage: Arc<dyn CacheStorage>,
    fetcher: Arc<dyn Fetch>,
    credentials: Arc<dyn CredentialProvider>,
  ) -> Result<Self, RequestError> {
    let keys = KeyDeriver::new(&config.base_url)?;
    let cache = CacheLayer::new(storage).with_max_age(config.max_cache_age_ms);

    Ok(Self {
      config,
      keys,
      cache,
      fetcher,
      credentials,
      auth_failures: AuthFailureSignal::new(),
    })
  }

  pub fn config(&self) -> &Config {
    &self.config
  }

  /// Whether responses are actually being persisted.
  pub fn cache_enabled(&self) -> bool {
    self.cache.storage().is_enabled()
  }

  /// Default headers, then the current credential, then `overrides`.
  pub fn effective_options(&self, overrides: &FetchOptions) -> FetchOptions {
    let mut options = overrides.merged_over(&self.config.default_headers);
    if !overrides.has_authorization() {
      if let Some(token) = self.credentials.token() {
        options.set_header(AUTHORIZATION, self.config.authorization(&token));
      }
    }
    options
  }

  /// Cache key a request for `path` with `fetch_options` is stored under.
  pub fn cache_key_for(
    &self,
    path: &str,
    fetch_options: &FetchOptions,
  ) -> Result<String, RequestError> {
    self
      .keys
      .derive(path, &self.effective_options(fetch_options))
  }

  /// Fetch `path` through the cache.
  ///
  /// `Ok(None)` means the request failed, `should_throw` was off, and
  /// there was no cached payload to fall back on.
  pub async fn request(
    &self,
    path: &str,
    fetch_options: &FetchOptions,
    options: &RequestOptions,
  ) -> Result<Option<CacheResult>, RequestError> {
    let fetch_options = self.effective_options(fetch_options);
    let url = self.keys.resolve(path)?;
    let key = cache_key(url.as_str(), &fetch_options);

    self
      .cache
      .fetch(&key, options, move || {
        self.fetch_page(url.to_string(), fetch_options)
      })
      .await
  }

  /// Follow `next` cursors from `path` and concatenate every page.
  ///
  /// Pages are requested one after another. The walk ends at the first
  /// page without a cursor, or at the first page that can't be obtained.
  pub async fn paginated_request(
    &self,
    path: &str,
    options: &RequestOptions,
  ) -> Result<Vec<Value>, RequestError> {
    let mut items = Vec::new();
    let mut visited = HashSet::new();
    let mut next = Some(path.to_string());

    while let Some(target) = next.take() {
      let url = self.keys.resolve(&target)?;
      if !visited.insert(url.to_string()) {
        warn!(%url, "Pagination cursor repeats, stopping");
        break;
      }

      let Some(page) = self
        .request(url.as_str(), &FetchOptions::get(), options)
        .await?
      else {
        debug!(%url, "Page unavailable, ending pagination");
        break;
      };

      match page.data {
        Value::Array(values) => items.extend(values),
        other => items.push(other),
      }
      next = page.next_page;
    }

    Ok(items)
  }

  /// Fetch a diff as text. Not cached.
  pub async fn request_diff(&self, url: &str) -> Result<String, RequestError> {
    let url = self.keys.resolve(url)?;
    let options = self.effective_options(&FetchOptions::get().header(ACCEPT, DIFF_MEDIA_TYPE));

    self.send(url.to_string(), options).await?.text()
  }

  /// Mark every cached variant and page under `path` as stale.
  ///
  /// Payloads are kept so they can still serve as a fallback.
  pub async fn expire_path(&self, path: &str) -> Result<Vec<CacheRecord>> {
    let url = self.keys.resolve(path)?;
    self.expire(url.as_str()).await
  }

  /// Mark every record whose key starts with `url_fragment` as stale.
  pub async fn expire(&self, url_fragment: &str) -> Result<Vec<CacheRecord>> {
    self.cache.flush().await;
    let expired = self.cache.storage().expire_prefix(url_fragment)?;
    info!(
      prefix = url_fragment,
      count = expired.len(),
      "Expired cached requests"
    );
    Ok(expired)
  }

  /// Remove a single record.
  pub async fn delete(&self, key: &str) -> Result<()> {
    self.cache.flush().await;
    self.cache.storage().delete(key)
  }

  /// Remove every record.
  pub async fn clear(&self) -> Result<()> {
    self.cache.flush().await;
    self.cache.storage().clear()
  }

  /// Wait for background cache writes to land.
  pub async fn flush_writes(&self) {
    self.cache.flush().await;
  }

  pub fn auth_failures(&self) -> &AuthFailureSignal {
    &self.auth_failures
  }

  /// Receive a message whenever credentials are rejected.
  pub fn subscribe_auth_failure(&self) -> broadcast::Receiver<AuthFailure> {
    self.auth_failures.subscribe()
  }

  /// Run `handler` whenever credentials are rejected.
  pub fn on_auth_failure<F>(&self, handler: F) -> Subscription
  where
    F: Fn() + Send + 'static,
  {
    self.auth_failures.on_failure(handler)
  }

  async fn fetch_page(
    &self,
    url: String,
    options: FetchOptions,
  ) -> Result<NetworkPage, RequestError> {
    let response = self.send(url, options).await?;
    let next_page = response.header(LINK).and_then(next_link);
    let payload = if response.body.is_empty() {
      Value::Null
    } else {
      response.json()?
    };

    Ok(NetworkPage {
      status: response.status,
      payload,
      next_page,
    })
  }

  /// One round trip. Raises the auth signal for a credentialed 401.
  async fn send(&self, url: String, options: FetchOptions) -> Result<HttpResponse, RequestError> {
    let authenticated = options.has_authorization();
    info!(%url, method = options.method(), authenticated, "Fetching");

    let response = self.fetcher.fetch(url.clone(), options).await?;
    if response.is_success() {
      return Ok(response);
    }

    if response.status == 401 && authenticated {
      warn!(%url, "Credentials rejected");
      self.auth_failures.publish();
      return Err(RequestError::AuthRejected);
    }

    Err(RequestError::Http {
      status: response.status,
    })
  }
}
