//! Cache storage trait and SQLite implementation.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::path::Path;
use std::sync::Mutex;

use super::traits::{CacheRecord, FORCED_STALE};

/// Upper bound appended to a prefix to form a key range.
const HIGH_SENTINEL: char = char::MAX;

/// Trait for cache storage backends.
pub trait CacheStorage: Send + Sync {
  /// Insert or replace the record stored under `record.key`.
  fn put(&self, record: &CacheRecord) -> Result<()>;

  /// Get a record by key. A missing key is `Ok(None)`.
  fn get(&self, key: &str) -> Result<Option<CacheRecord>>;

  /// Remove a single record.
  fn delete(&self, key: &str) -> Result<()>;

  /// Remove every record.
  fn clear(&self) -> Result<()>;

  /// Records whose key lies in `[prefix, prefix + HIGH_SENTINEL)`, in
  /// descending key order.
  fn scan_prefix(&self, prefix: &str) -> Result<Vec<CacheRecord>>;

  /// Mark every record under `prefix` as forced stale, keeping payloads.
  /// Returns the updated records.
  fn expire_prefix(&self, prefix: &str) -> Result<Vec<CacheRecord>> {
    let mut expired = self.scan_prefix(prefix)?;
    for record in &mut expired {
      record.fetched_at = FORCED_STALE;
      self.put(record)?;
    }
    Ok(expired)
  }

  /// Whether this backend actually retains anything.
  fn is_enabled(&self) -> bool {
    true
  }
}

/// Storage implementation that doesn't cache anything.
/// Used when the real store can't be opened - all operations are no-ops.
pub struct NoopStorage;

impl CacheStorage for NoopStorage {
  fn put(&self, _record: &CacheRecord) -> Result<()> {
    Ok(()) // Discard
  }

  fn get(&self, _key: &str) -> Result<Option<CacheRecord>> {
    Ok(None) // Always miss
  }

  fn delete(&self, _key: &str) -> Result<()> {
    Ok(())
  }

  fn clear(&self) -> Result<()> {
    Ok(())
  }

  fn scan_prefix(&self, _prefix: &str) -> Result<Vec<CacheRecord>> {
    Ok(Vec::new())
  }

  fn is_enabled(&self) -> bool {
    false
  }
}

/// SQLite-based cache storage implementation.
pub struct SqliteStorage {
  conn: Mutex<Connection>,
}

impl SqliteStorage {
  /// Open (or create) a store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create cache directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache database at {}: {}", path.display(), e))?;

    Self::from_connection(conn)
  }

  /// A store that lives only as long as this value.
  pub fn open_in_memory() -> Result<Self> {
    let conn = Connection::open_in_memory()
      .map_err(|e| eyre!("Failed to open in-memory cache database: {}", e))?;

    Self::from_connection(conn)
  }

  fn from_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;

    Ok(storage)
  }

  /// Run database migrations for cache tables.
  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(CACHE_SCHEMA)
      .map_err(|e| eyre!("Failed to run cache migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for cache tables.
///
/// Keys compare with the default BINARY collation, which orders UTF-8
/// text by code point. Prefix range scans rely on that.
const CACHE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS cached_requests (
    request_key TEXT PRIMARY KEY,
    payload BLOB NOT NULL,
    fetched_at INTEGER NOT NULL,
    next_page TEXT
);
"#;

fn upper_bound(prefix: &str) -> String {
  let mut bound = String::with_capacity(prefix.len() + HIGH_SENTINEL.len_utf8());
  bound.push_str(prefix);
  bound.push(HIGH_SENTINEL);
  bound
}

fn row_to_record(row: &rusqlite::Row<'_>) -> rusqlite::Result<(String, Vec<u8>, i64, Option<String>)> {
  Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
}

fn decode_record(
  (key, payload, fetched_at, next_page): (String, Vec<u8>, i64, Option<String>),
) -> Result<CacheRecord> {
  let payload = serde_json::from_slice(&payload)
    .map_err(|e| eyre!("Failed to deserialize cached payload for {}: {}", key, e))?;

  Ok(CacheRecord {
    key,
    payload,
    fetched_at,
    next_page,
  })
}

fn scan_range(conn: &Connection, prefix: &str) -> Result<Vec<CacheRecord>> {
  let mut stmt = conn
    .prepare(
      "SELECT request_key, payload, fetched_at, next_page FROM cached_requests
       WHERE request_key >= ? AND request_key < ?
       ORDER BY request_key DESC",
    )
    .map_err(|e| eyre!("Failed to prepare prefix scan: {}", e))?;

  let rows: Vec<_> = stmt
    .query_map(params![prefix, upper_bound(prefix)], row_to_record)
    .map_err(|e| eyre!("Failed to scan cache: {}", e))?
    .collect::<rusqlite::Result<_>>()
    .map_err(|e| eyre!("Failed to read cache row: {}", e))?;

  rows.into_iter().map(decode_record).collect()
}

impl CacheStorage for SqliteStorage {
  fn put(&self, record: &CacheRecord) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    let payload = serde_json::to_vec(&record.payload)
      .map_err(|e| eyre!("Failed to serialize payload: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO cached_requests (request_key, payload, fetched_at, next_page)
         VALUES (?, ?, ?, ?)",
        params![record.key, payload, record.fetched_at, record.next_page],
      )
      .map_err(|e| eyre!("Failed to store record {}: {}", record.key, e))?;

    Ok(())
  }

  fn get(&self, key: &str) -> Result<Option<CacheRecord>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let row = conn
      .query_row(
        "SELECT request_key, payload, fetched_at, next_page FROM cached_requests
         WHERE request_key = ?",
        params![key],
        row_to_record,
      )
      .optional()
      .map_err(|e| eyre!("Failed to read record {}: {}", key, e))?;

    row.map(decode_record).transpose()
  }

  fn delete(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "DELETE FROM cached_requests WHERE request_key = ?",
        params![key],
      )
      .map_err(|e| eyre!("Failed to delete record {}: {}", key, e))?;

    Ok(())
  }

  fn clear(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM cached_requests", [])
      .map_err(|e| eyre!("Failed to clear cache: {}", e))?;

    Ok(())
  }

  fn scan_prefix(&self, prefix: &str) -> Result<Vec<CacheRecord>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    scan_range(&conn, prefix)
  }

  fn expire_prefix(&self, prefix: &str) -> Result<Vec<CacheRecord>> {
    let mut conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let tx = conn
      .transaction()
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    let mut expired = scan_range(&tx, prefix)?;
    tx.execute(
      "UPDATE cached_requests SET fetched_at = ?
       WHERE request_key >= ? AND request_key < ?",
      params![FORCED_STALE, prefix, upper_bound(prefix)],
    )
    .map_err(|e| eyre!("Failed to expire records under {}: {}", prefix, e))?;

    tx.commit()
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    for record in &mut expired {
      record.fetched_at = FORCED_STALE;
    }
    Ok(expired)
  }
}
