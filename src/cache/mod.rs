//! Durable response cache.
//!
//! This module provides the storage-facing half of the client:
//! - Stores JSON payloads under keys derived from URL + request options
//! - Decides freshness from a per-record fetch timestamp and a max age
//! - Expires whole URL prefixes without dropping their payloads
//! - Serves stale records when the network is unavailable

mod freshness;
mod key;
mod layer;
mod storage;
mod traits;

pub use freshness::{is_stale, is_stale_at, DEFAULT_MAX_AGE_MS};
pub use key::{cache_key, options_hash, KeyDeriver};
pub use layer::CacheLayer;
pub use storage::{CacheStorage, NoopStorage, SqliteStorage};
pub use traits::{now_millis, CacheRecord, CacheResult, CacheSource, NetworkPage, FORCED_STALE};
