//! Scripted transport for tests.

use futures::future::BoxFuture;
use serde_json::Value;
use std::collections::HashMap;
use std::sync::Mutex;

use crate::error::RequestError;
use crate::http::{Fetch, FetchOptions, HttpResponse, LINK};

enum Reply {
  Response(HttpResponse),
  Fail(String),
}

/// A `Fetch` that answers by exact URL and records every call.
///
/// Unrouted URLs fail with a network error.
#[derive(Default)]
pub(crate) struct MockFetch {
  routes: Mutex<HashMap<String, Reply>>,
  calls: Mutex<Vec<(String, FetchOptions)>>,
}

impl MockFetch {
  pub(crate) fn new() -> Self {
    Self::default()
  }

  pub(crate) fn respond(&self, url: &str, status: u16, body: Value) {
    self.route(url, Reply::Response(HttpResponse::new(status, body.to_string())));
  }

  pub(crate) fn respond_raw(&self, url: &str, response: HttpResponse) {
    self.route(url, Reply::Response(response));
  }

  /// 200 with a `Link: <next>; rel="next"` header.
  pub(crate) fn respond_page(&self, url: &str, body: Value, next: Option<&str>) {
    let mut response = HttpResponse::new(200, body.to_string());
    if let Some(next) = next {
      response = response.with_header(LINK, format!("<{}>; rel=\"next\"", next));
    }
    self.route(url, Reply::Response(response));
  }

  pub(crate) fn fail(&self, url: &str, reason: &str) {
    self.route(url, Reply::Fail(reason.to_string()));
  }

  fn route(&self, url: &str, reply: Reply) {
    self.routes.lock().unwrap().insert(url.to_string(), reply);
  }

  pub(crate) fn calls(&self) -> Vec<(String, FetchOptions)> {
    self.calls.lock().unwrap().clone()
  }

  pub(crate) fn call_count(&self) -> usize {
    self.calls.lock().unwrap().len()
  }
}

impl Fetch for MockFetch {
  fn fetch(
    &self,
    url: String,
    options: FetchOptions,
  ) -> BoxFuture<'_, Result<HttpResponse, RequestError>> {
    self.calls.lock().unwrap().push((url.clone(), options));

    let reply = match self.routes.lock().unwrap().get(&url) {
      Some(Reply::Response(response)) => Ok(response.clone()),
      Some(Reply::Fail(reason)) => Err(RequestError::Network(reason.clone())),
      None => Err(RequestError::Network(format!("no route for {}", url))),
    };

    Box::pin(async move { reply })
  }
}
