//! Versioned cache store: trait, in-memory backend and SQLite backend.
//!
//! A backend holds any number of named generations, each mapping request
//! keys to response snapshots. Backends only know how to open, read,
//! write, enumerate and delete by name; which generation is current is
//! the `GenerationManager`'s business.

use chrono::{DateTime, Utc};
use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

use crate::http::{CacheKey, Response};

/// A response snapshot as returned from the store.
#[derive(Debug, Clone)]
pub struct CachedResponse {
  pub response: Response,
  pub cached_at: DateTime<Utc>,
}

/// Storage backend holding named generations of request→response pairs.
///
/// Backends are shared across concurrently in-flight requests; writes are
/// last-writer-wins, with at most one entry per key per generation.
pub trait StoreBackend: Send + Sync {
  /// Create the named generation if absent. Idempotent.
  fn open(&self, generation: &str) -> Result<()>;

  /// Look up an entry in the named generation.
  fn get(&self, generation: &str, key: &CacheKey) -> Result<Option<CachedResponse>>;

  /// Insert or replace an entry in the named generation.
  fn put(&self, generation: &str, key: &CacheKey, response: &Response) -> Result<()>;

  /// All known generation tags.
  fn list(&self) -> Result<Vec<String>>;

  /// Delete a whole generation and its entries. No error if absent.
  fn delete(&self, generation: &str) -> Result<()>;
}

/// Cheap-clone handle binding a backend to one generation tag.
///
/// This is what strategies read and write through; they never see other
/// generations.
#[derive(Clone)]
pub struct Store {
  backend: Arc<dyn StoreBackend>,
  generation: String,
}

impl Store {
  pub fn new(backend: Arc<dyn StoreBackend>, generation: impl Into<String>) -> Self {
    Self {
      backend,
      generation: generation.into(),
    }
  }

  pub fn generation(&self) -> &str {
    &self.generation
  }

  pub fn get(&self, key: &CacheKey) -> Result<Option<CachedResponse>> {
    self.backend.get(&self.generation, key)
  }

  pub fn put(&self, key: &CacheKey, response: &Response) -> Result<()> {
    self.backend.put(&self.generation, key, response)
  }
}

/// In-process store backend. Used for embedding without a disk and in
/// tests.
#[derive(Default)]
pub struct MemoryStore {
  generations: Mutex<HashMap<String, HashMap<String, CachedResponse>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl StoreBackend for MemoryStore {
  fn open(&self, generation: &str) -> Result<()> {
    let mut generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    generations.entry(generation.to_string()).or_default();
    Ok(())
  }

  fn get(&self, generation: &str, key: &CacheKey) -> Result<Option<CachedResponse>> {
    let generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(
      generations
        .get(generation)
        .and_then(|entries| entries.get(&key.hash()))
        .cloned(),
    )
  }

  fn put(&self, generation: &str, key: &CacheKey, response: &Response) -> Result<()> {
    let mut generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    generations.entry(generation.to_string()).or_default().insert(
      key.hash(),
      CachedResponse {
        response: response.clone(),
        cached_at: Utc::now(),
      },
    );
    Ok(())
  }

  fn list(&self) -> Result<Vec<String>> {
    let generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(generations.keys().cloned().collect())
  }

  fn delete(&self, generation: &str) -> Result<()> {
    let mut generations = self
      .generations
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    generations.remove(generation);
    Ok(())
  }
}

/// SQLite-based store backend.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default data directory location.
  pub fn open_default() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open or create the store at the given path.
  pub fn open_at(path: &Path) -> Result<Self> {
    // Ensure parent directory exists
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create store directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open cache store at {}: {}", path.display(), e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// In-memory SQLite store, mainly for tests.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;

    let store = Self {
      conn: Mutex::new(conn),
    };
    store.run_migrations()?;

    Ok(store)
  }

  /// Get the default database path.
  fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("cachegate").join("store.db"))
  }

  fn run_migrations(&self) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute_batch(STORE_SCHEMA)
      .map_err(|e| eyre!("Failed to run store migrations: {}", e))?;

    Ok(())
  }
}

/// Schema for the versioned store.
const STORE_SCHEMA: &str = r#"
-- Known generations; rows here make empty generations enumerable
CREATE TABLE IF NOT EXISTS generations (
    tag TEXT PRIMARY KEY,
    created_at TEXT NOT NULL DEFAULT (datetime('now'))
);

-- Response snapshots, one per request key per generation
CREATE TABLE IF NOT EXISTS entries (
    generation TEXT NOT NULL,
    request_key TEXT NOT NULL,
    request_identity TEXT NOT NULL,
    status INTEGER NOT NULL,
    headers BLOB NOT NULL,
    body BLOB NOT NULL,
    cached_at TEXT NOT NULL DEFAULT (datetime('now')),
    PRIMARY KEY (generation, request_key)
);

CREATE INDEX IF NOT EXISTS idx_entries_generation ON entries(generation);
"#;

impl StoreBackend for SqliteStore {
  fn open(&self, generation: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR IGNORE INTO generations (tag) VALUES (?)",
        params![generation],
      )
      .map_err(|e| eyre!("Failed to open generation {}: {}", generation, e))?;

    Ok(())
  }

  fn get(&self, generation: &str, key: &CacheKey) -> Result<Option<CachedResponse>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare(
        "SELECT status, headers, body, cached_at FROM entries
         WHERE generation = ? AND request_key = ?",
      )
      .map_err(|e| eyre!("Failed to prepare entry query: {}", e))?;

    // Only no-rows maps to a miss; a damaged row is an error, not a
    // silent downgrade to the network path
    let row: Option<(u16, Vec<u8>, Vec<u8>, String)> = stmt
      .query_row(params![generation, key.hash()], |row| {
        Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?))
      })
      .optional()
      .map_err(|e| eyre!("Failed to read entry: {}", e))?;

    match row {
      Some((status, headers, body, cached_at_str)) => {
        let headers = serde_json::from_slice(&headers)
          .map_err(|e| eyre!("Failed to deserialize headers: {}", e))?;
        let cached_at = parse_datetime(&cached_at_str)?;
        Ok(Some(CachedResponse {
          response: Response {
            status,
            headers,
            body,
          },
          cached_at,
        }))
      }
      None => Ok(None),
    }
  }

  fn put(&self, generation: &str, key: &CacheKey, response: &Response) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let headers = serde_json::to_vec(&response.headers)
      .map_err(|e| eyre!("Failed to serialize headers: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO entries (generation, request_key, request_identity, status, headers, body, cached_at)
         VALUES (?, ?, ?, ?, ?, ?, datetime('now'))",
        params![
          generation,
          key.hash(),
          key.identity(),
          response.status,
          headers,
          response.body
        ],
      )
      .map_err(|e| eyre!("Failed to store entry: {}", e))?;

    Ok(())
  }

  fn list(&self) -> Result<Vec<String>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    let mut stmt = conn
      .prepare("SELECT tag FROM generations")
      .map_err(|e| eyre!("Failed to prepare generation query: {}", e))?;

    let tags: Vec<String> = stmt
      .query_map([], |row| row.get(0))
      .map_err(|e| eyre!("Failed to query generations: {}", e))?
      .collect::<std::result::Result<_, _>>()
      .map_err(|e| eyre!("Failed to read generation row: {}", e))?;

    Ok(tags)
  }

  fn delete(&self, generation: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("BEGIN TRANSACTION", [])
      .map_err(|e| eyre!("Failed to begin transaction: {}", e))?;

    conn
      .execute(
        "DELETE FROM entries WHERE generation = ?",
        params![generation],
      )
      .map_err(|e| eyre!("Failed to delete entries: {}", e))?;

    conn
      .execute("DELETE FROM generations WHERE tag = ?", params![generation])
      .map_err(|e| eyre!("Failed to delete generation: {}", e))?;

    conn
      .execute("COMMIT", [])
      .map_err(|e| eyre!("Failed to commit transaction: {}", e))?;

    Ok(())
  }
}

/// Parse a datetime string from SQLite format.
fn parse_datetime(s: &str) -> Result<DateTime<Utc>> {
  // SQLite stores as "YYYY-MM-DD HH:MM:SS"
  chrono::NaiveDateTime::parse_from_str(s, "%Y-%m-%d %H:%M:%S")
    .map(|dt| dt.and_utc())
    .map_err(|e| eyre!("Failed to parse datetime '{}': {}", s, e))
}
