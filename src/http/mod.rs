//! HTTP plumbing: the injected transport, request options and `Link` parsing.

mod fetch;
pub mod link;
mod types;

pub use fetch::{Fetch, ReqwestFetch};
pub use types::{FetchOptions, HttpResponse, RequestOptions, ACCEPT, AUTHORIZATION, LINK};
