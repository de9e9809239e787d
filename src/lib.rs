//! Client-side request cache for JSON HTTP APIs.
//!
//! [`CachedRequest`] stores every successful response in a durable
//! key-value store, serves it while fresh, refetches when stale, follows
//! `Link: rel="next"` cursors across pages, and falls back to the last
//! stored payload when the network fails.
//!
//! ```ignore
//! let config = Config::load(None)?;
//! let client = CachedRequest::new(
//!   config,
//!   Arc::new(ReqwestFetch::new()?),
//!   Arc::new(EnvToken),
//! )?;
//!
//! let pulls = client
//!   .paginated_request("/repos/owner/name/pulls", &RequestOptions::default())
//!   .await?;
//! ```

pub mod auth;
pub mod cache;
mod cached_request;
pub mod config;
mod error;
pub mod http;

#[cfg(test)]
mod testing;

pub use auth::{AuthFailure, AuthFailureSignal, CredentialProvider, EnvToken, Subscription};
pub use cache::{CacheRecord, CacheResult, CacheSource};
pub use cached_request::{CachedRequest, DIFF_MEDIA_TYPE};
pub use config::Config;
pub use error::RequestError;
pub use http::{Fetch, FetchOptions, RequestOptions, ReqwestFetch};
