//! Wire-level request and response types.

use serde::{de::DeserializeOwned, Serialize};
use std::collections::BTreeMap;

use crate::error::RequestError;

pub const AUTHORIZATION: &str = "authorization";
pub const ACCEPT: &str = "accept";
pub const LINK: &str = "link";

/// Method, headers and body of a request.
///
/// Header names are lowercased and kept sorted, so two option sets built
/// in a different order normalize to the same value.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct FetchOptions {
  method: String,
  headers: BTreeMap<String, String>,
  body: Option<String>,
}

impl Default for FetchOptions {
  fn default() -> Self {
    Self::new("GET")
  }
}

impl FetchOptions {
  pub fn new(method: impl AsRef<str>) -> Self {
    Self {
      method: method.as_ref().to_uppercase(),
      headers: BTreeMap::new(),
      body: None,
    }
  }

  pub fn get() -> Self {
    Self::new("GET")
  }

  pub fn method(&self) -> &str {
    &self.method
  }

  pub fn headers(&self) -> &BTreeMap<String, String> {
    &self.headers
  }

  pub fn body(&self) -> Option<&str> {
    self.body.as_deref()
  }

  /// Set a header, replacing any value with the same (case-insensitive) name.
  pub fn header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
    self.set_header(name, value);
    self
  }

  pub fn set_header(&mut self, name: impl AsRef<str>, value: impl Into<String>) {
    self
      .headers
      .insert(name.as_ref().to_lowercase(), value.into());
  }

  pub fn header_value(&self, name: &str) -> Option<&str> {
    self.headers.get(&name.to_lowercase()).map(String::as_str)
  }

  pub fn with_body(mut self, body: impl Into<String>) -> Self {
    self.body = Some(body.into());
    self
  }

  /// Set a JSON body and the matching content type.
  pub fn json<T: Serialize>(self, value: &T) -> Result<Self, RequestError> {
    let body = serde_json::to_string(value)?;
    Ok(
      self
        .header("Content-Type", "application/json")
        .with_body(body),
    )
  }

  pub fn has_authorization(&self) -> bool {
    self.headers.contains_key(AUTHORIZATION)
  }

  /// Layer these options over `defaults`. Headers set here win.
  pub fn merged_over(&self, defaults: &BTreeMap<String, String>) -> Self {
    let mut headers: BTreeMap<String, String> = defaults
      .iter()
      .map(|(k, v)| (k.to_lowercase(), v.clone()))
      .collect();
    headers.extend(self.headers.clone());

    Self {
      method: self.method.clone(),
      headers,
      body: self.body.clone(),
    }
  }
}

/// Per-call caching behavior.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RequestOptions {
  /// Skip the cache lookup. The response is still written back.
  pub skip_cache: bool,
  /// Override the client's max age, in milliseconds.
  pub max_age_ms: Option<u64>,
  /// Return the original error instead of falling back to cached data.
  pub should_throw: bool,
}

impl RequestOptions {
  pub fn skip_cache(mut self) -> Self {
    self.skip_cache = true;
    self
  }

  pub fn max_age_ms(mut self, max_age_ms: u64) -> Self {
    self.max_age_ms = Some(max_age_ms);
    self
  }

  pub fn should_throw(mut self) -> Self {
    self.should_throw = true;
    self
  }
}

/// An HTTP response as returned by a [`Fetch`](super::Fetch) implementation.
#[derive(Debug, Clone)]
pub struct HttpResponse {
  pub status: u16,
  pub headers: BTreeMap<String, String>,
  pub body: Vec<u8>,
}

impl HttpResponse {
  pub fn new(status: u16, body: impl Into<Vec<u8>>) -> Self {
    Self {
      status,
      headers: BTreeMap::new(),
      body: body.into(),
    }
  }

  pub fn with_header(mut self, name: impl AsRef<str>, value: impl Into<String>) -> Self {
    self
      .headers
      .insert(name.as_ref().to_lowercase(), value.into());
    self
  }

  /// 2xx and 3xx count as success.
  pub fn is_success(&self) -> bool {
    (200..400).contains(&self.status)
  }

  /// Case-insensitive header lookup.
  pub fn header(&self, name: &str) -> Option<&str> {
    let name = name.to_lowercase();
    self
      .headers
      .iter()
      .find(|(k, _)| k.to_lowercase() == name)
      .map(|(_, v)| v.as_str())
  }

  pub fn json<T: DeserializeOwned>(&self) -> Result<T, RequestError> {
    Ok(serde_json::from_slice(&self.body)?)
  }

  pub fn text(&self) -> Result<String, RequestError> {
    String::from_utf8(self.body.clone())
      .map_err(|e| RequestError::Decode(format!("Invalid UTF-8: {}", e)))
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn test_header_names_are_case_insensitive() {
    let options = FetchOptions::get()
      .header("Accept", "a")
      .header("ACCEPT", "b");

    assert_eq!(options.headers().len(), 1);
    assert_eq!(options.header_value("accept"), Some("b"));
  }

  #[test]
  fn test_merged_over_prefers_call_headers() {
    let mut defaults = BTreeMap::new();
    defaults.insert("Accept".to_string(), "application/json".to_string());
    defaults.insert("User-Agent".to_string(), "reqcache".to_string());

    let merged = FetchOptions::new("post")
      .header("accept", "text/plain")
      .merged_over(&defaults);

    assert_eq!(merged.method(), "POST");
    assert_eq!(merged.header_value("accept"), Some("text/plain"));
    assert_eq!(merged.header_value("user-agent"), Some("reqcache"));
  }

  #[test]
  fn test_response_success_range() {
    assert!(HttpResponse::new(200, "").is_success());
    assert!(HttpResponse::new(304, "").is_success());
    assert!(!HttpResponse::new(401, "").is_success());
    assert!(!HttpResponse::new(500, "").is_success());
  }

  #[test]
  fn test_response_header_lookup() {
    let response = HttpResponse::new(200, "[]").with_header("Link", "<x>; rel=\"next\"");
    assert_eq!(response.header("LINK"), Some("<x>; rel=\"next\""));
    assert_eq!(response.header("etag"), None);
  }

  #[test]
  fn test_json_decode_failure() {
    let response = HttpResponse::new(200, "not json");
    let result: Result<serde_json::Value, _> = response.json();
    assert!(matches!(result, Err(RequestError::Decode(_))));
  }
}
