//! Cache key derivation.

use sha2::{Digest, Sha256};
use url::Url;

use crate::error::RequestError;
use crate::http::FetchOptions;

/// Derives cache keys of the form `<absolute url>-<options hash>`.
#[derive(Debug, Clone)]
pub struct KeyDeriver {
  base_url: Url,
}

impl KeyDeriver {
  pub fn new(base_url: &str) -> Result<Self, RequestError> {
    let base_url = Url::parse(base_url).map_err(|e| RequestError::InvalidUrl {
      url: base_url.to_string(),
      reason: e.to_string(),
    })?;

    Ok(Self { base_url })
  }

  pub fn base_url(&self) -> &Url {
    &self.base_url
  }

  /// Resolve `path` against the base URL. Absolute URLs pass through.
  pub fn resolve(&self, path: &str) -> Result<Url, RequestError> {
    self
      .base_url
      .join(path)
      .map_err(|e| RequestError::InvalidUrl {
        url: path.to_string(),
        reason: e.to_string(),
      })
  }

  pub fn derive(&self, path: &str, options: &FetchOptions) -> Result<String, RequestError> {
    let url = self.resolve(path)?;
    Ok(cache_key(url.as_str(), options))
  }
}

/// Key for an already resolved URL.
pub fn cache_key(url: &str, options: &FetchOptions) -> String {
  format!("{}-{}", url, options_hash(options))
}

/// SHA256 over the canonical JSON form of the options.
///
/// Headers live in a sorted map and object keys serialize sorted, so the
/// hash does not depend on how the options were built.
pub fn options_hash(options: &FetchOptions) -> String {
  let canonical = serde_json::json!({
    "method": options.method(),
    "headers": options.headers(),
    "body": options.body(),
  })
  .to_string();

  let mut hasher = Sha256::new();
  hasher.update(canonical.as_bytes());
  hex::encode(hasher.finalize())
}

#[cfg(test)]
mod tests {
  use super::*;

  fn deriver() -> KeyDeriver {
    KeyDeriver::new("https://api.github.com").unwrap()
  }

  #[test]
  fn test_key_is_insensitive_to_header_order() {
    let a = FetchOptions::get()
      .header("Accept", "application/json")
      .header("Authorization", "token abc");
    let b = FetchOptions::get()
      .header("authorization", "token abc")
      .header("accept", "application/json");

    assert_eq!(
      deriver().derive("/repos/x/y", &a).unwrap(),
      deriver().derive("/repos/x/y", &b).unwrap()
    );
  }

  #[test]
  fn test_key_distinguishes_method_headers_and_body() {
    let base = FetchOptions::get().header("Accept", "application/json");
    let keys = [
      deriver().derive("/r", &base).unwrap(),
      deriver().derive("/r", &FetchOptions::new("POST").header("Accept", "application/json")).unwrap(),
      deriver().derive("/r", &base.clone().header("Accept", "text/plain")).unwrap(),
      deriver().derive("/r", &base.clone().with_body("{}")).unwrap(),
    ];

    for (i, a) in keys.iter().enumerate() {
      for b in &keys[i + 1..] {
        assert_ne!(a, b);
      }
    }
  }

  #[test]
  fn test_key_starts_with_absolute_url() {
    let key = deriver().derive("/repos/x/y", &FetchOptions::get()).unwrap();
    assert!(key.starts_with("https://api.github.com/repos/x/y-"));
    assert_eq!(key.len(), "https://api.github.com/repos/x/y-".len() + 64);
  }

  #[test]
  fn test_absolute_cursor_passes_through() {
    let url = deriver()
      .resolve("https://api.github.com/repositories/1/pulls?page=2")
      .unwrap();
    assert_eq!(
      url.as_str(),
      "https://api.github.com/repositories/1/pulls?page=2"
    );
  }

  #[test]
  fn test_invalid_base_url() {
    assert!(matches!(
      KeyDeriver::new("not a url"),
      Err(RequestError::InvalidUrl { .. })
    ));
  }
}
