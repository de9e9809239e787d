//! The fetch primitive the cache delegates transport to.

use futures::future::BoxFuture;
use std::collections::BTreeMap;

use crate::error::RequestError;

use super::types::{FetchOptions, HttpResponse};

/// Injected transport.
///
/// Implementations perform exactly one HTTP exchange and report transport
/// problems as [`RequestError::Network`]. Status codes are not interpreted
/// here. Timeouts, if any, belong to the implementation.
pub trait Fetch: Send + Sync {
  fn fetch(
    &self,
    url: String,
    options: FetchOptions,
  ) -> BoxFuture<'_, Result<HttpResponse, RequestError>>;
}

/// `Fetch` backed by a shared reqwest client.
#[derive(Clone)]
pub struct ReqwestFetch {
  client: reqwest::Client,
}

impl ReqwestFetch {
  pub fn new() -> Result<Self, RequestError> {
    let client = reqwest::Client::builder()
      .user_agent(concat!("reqcache/", env!("CARGO_PKG_VERSION")))
      .build()
      .map_err(|e| RequestError::Network(format!("Failed to build HTTP client: {}", e)))?;

    Ok(Self { client })
  }

  /// Wrap an already configured client.
  pub fn with_client(client: reqwest::Client) -> Self {
    Self { client }
  }
}

fn parse_method(method: &str) -> Result<reqwest::Method, RequestError> {
  reqwest::Method::from_bytes(method.as_bytes())
    .map_err(|_| RequestError::InvalidMethod(method.to_string()))
}

impl Fetch for ReqwestFetch {
  fn fetch(
    &self,
    url: String,
    options: FetchOptions,
  ) -> BoxFuture<'_, Result<HttpResponse, RequestError>> {
    Box::pin(async move {
      let method = parse_method(options.method())?;

      let mut builder = self.client.request(method, &url);
      for (name, value) in options.headers() {
        builder = builder.header(name, value);
      }
      if let Some(body) = options.body() {
        builder = builder.body(body.to_string());
      }

      let response = builder
        .send()
        .await
        .map_err(|e| RequestError::Network(e.to_string()))?;

      let status = response.status().as_u16();
      let headers: BTreeMap<String, String> = response
        .headers()
        .iter()
        .filter_map(|(name, value)| {
          value
            .to_str()
            .ok()
            .map(|v| (name.as_str().to_string(), v.to_string()))
        })
        .collect();
      let body = response
        .bytes()
        .await
        .map_err(|e| RequestError::Network(e.to_string()))?
        .to_vec();

      Ok(HttpResponse {
        status,
        headers,
        body,
      })
    })
  }
}
