//! Durable key-value storage trait and its SQLite and in-memory implementations.

use color_eyre::{eyre::eyre, Result};
use rusqlite::{params, Connection, OptionalExtension};
use serde::{de::DeserializeOwned, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

/// Persisted key → value map.
///
/// Each operation is atomic per key, and a successful `set_raw` must be
/// observable after a process restart. No cross-key transactions.
pub trait DurableStore: Send + Sync {
  /// Get the raw value stored under `key`.
  fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>>;

  /// Replace the value stored under `key`.
  fn set_raw(&self, key: &str, value: &[u8]) -> Result<()>;

  /// Remove `key`. Missing keys are not an error.
  fn delete(&self, key: &str) -> Result<()>;

  /// Get and deserialize a JSON value.
  fn get<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>>
  where
    Self: Sized,
  {
    match self.get_raw(key)? {
      Some(data) => {
        let value = serde_json::from_slice(&data)
          .map_err(|e| eyre!("Failed to deserialize value at {}: {}", key, e))?;
        Ok(Some(value))
      }
      None => Ok(None),
    }
  }

  /// Serialize and store a JSON value.
  fn set<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<()>
  where
    Self: Sized,
  {
    let data =
      serde_json::to_vec(value).map_err(|e| eyre!("Failed to serialize value at {}: {}", key, e))?;
    self.set_raw(key, &data)
  }
}

/// Volatile storage, for tests and sessions that must not touch disk.
#[derive(Default)]
pub struct MemoryStore {
  entries: Mutex<HashMap<String, Vec<u8>>>,
}

impl MemoryStore {
  pub fn new() -> Self {
    Self::default()
  }
}

impl DurableStore for MemoryStore {
  fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    Ok(entries.get(key).cloned())
  }

  fn set_raw(&self, key: &str, value: &[u8]) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.insert(key.to_string(), value.to_vec());
    Ok(())
  }

  fn delete(&self, key: &str) -> Result<()> {
    let mut entries = self
      .entries
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;
    entries.remove(key);
    Ok(())
  }
}

/// SQLite-based durable storage.
pub struct SqliteStore {
  conn: Mutex<Connection>,
}

impl SqliteStore {
  /// Open the store at the default location.
  pub fn open() -> Result<Self> {
    Self::open_at(&Self::default_path()?)
  }

  /// Open (or create) the store at `path`.
  pub fn open_at(path: &Path) -> Result<Self> {
    if let Some(parent) = path.parent() {
      std::fs::create_dir_all(parent)
        .map_err(|e| eyre!("Failed to create storage directory: {}", e))?;
    }

    let conn = Connection::open(path)
      .map_err(|e| eyre!("Failed to open store at {}: {}", path.display(), e))?;

    // WAL survives crashes without blocking readers; FULL syncs every commit
    conn
      .pragma_update_and_check(None, "journal_mode", "WAL", |row| row.get::<_, String>(0))
      .map_err(|e| eyre!("Failed to enable WAL: {}", e))?;
    conn
      .pragma_update(None, "synchronous", "FULL")
      .map_err(|e| eyre!("Failed to set synchronous mode: {}", e))?;

    Self::with_connection(conn)
  }

  /// Open a private in-memory database.
  pub fn open_in_memory() -> Result<Self> {
    let conn =
      Connection::open_in_memory().map_err(|e| eyre!("Failed to open in-memory store: {}", e))?;
    Self::with_connection(conn)
  }

  fn with_connection(conn: Connection) -> Result<Self> {
    let storage = Self {
      conn: Mutex::new(conn),
    };
    storage.run_migrations()?;
    Ok(storage)
  }

  /// Get the default database path.
  pub fn default_path() -> Result<PathBuf> {
    let data_dir = dirs::data_dir()
      .or_else(|| dirs::home_dir().map(|p| p.join(".local/share")))
      .ok_or_else(|| eyre!("Could not determine data directory"))?;

    Ok(data_dir.join("fieldsync").join("store.db"))
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

const STORE_SCHEMA: &str = r#"
CREATE TABLE IF NOT EXISTS kv_store (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL,
    updated_at TEXT NOT NULL DEFAULT (datetime('now'))
);
"#;

impl DurableStore for SqliteStore {
  fn get_raw(&self, key: &str) -> Result<Option<Vec<u8>>> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .query_row(
        "SELECT value FROM kv_store WHERE key = ?",
        params![key],
        |row| row.get(0),
      )
      .optional()
      .map_err(|e| eyre!("Failed to read {}: {}", key, e))
  }

  fn set_raw(&self, key: &str, value: &[u8]) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute(
        "INSERT OR REPLACE INTO kv_store (key, value, updated_at)
         VALUES (?, ?, datetime('now'))",
        params![key, value],
      )
      .map_err(|e| eyre!("Failed to write {}: {}", key, e))?;

    Ok(())
  }

  fn delete(&self, key: &str) -> Result<()> {
    let conn = self
      .conn
      .lock()
      .map_err(|e| eyre!("Lock poisoned: {}", e))?;

    conn
      .execute("DELETE FROM kv_store WHERE key = ?", params![key])
      .map_err(|e| eyre!("Failed to delete {}: {}", key, e))?;

    Ok(())
  }
}

#[cfg(test)]
mod tests {
  use super::*;
  use serde::Deserialize;

  #[derive(Debug, PartialEq, Serialize, Deserialize)]
  struct Quote {
    crop: String,
    price: u32,
  }

  fn exercise(store: &impl DurableStore) {
    assert_eq!(store.get::<Quote>("missing").unwrap(), None);

    let quote = Quote {
      crop: "beans".into(),
      price: 90,
    };
    store.set("q", &quote).unwrap();
    assert_eq!(store.get::<Quote>("q").unwrap(), Some(quote));

    store
      .set(
        "q",
        &Quote {
          crop: "beans".into(),
          price: 95,
        },
      )
      .unwrap();
    assert_eq!(store.get::<Quote>("q").unwrap().unwrap().price, 95);

    store.delete("q").unwrap();
    store.delete("q").unwrap();
    assert_eq!(store.get_raw("q").unwrap(), None);
  }

  #[test]
  fn memory_store_get_set_delete() {
    exercise(&MemoryStore::new());
  }

  #[test]
  fn sqlite_store_get_set_delete() {
    exercise(&SqliteStore::open_in_memory().unwrap());
  }

  #[test]
  fn sqlite_store_survives_reopen() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("nested").join("store.db");

    {
      let store = SqliteStore::open_at(&path).unwrap();
      store.set("answer", &42u32).unwrap();
    }

    let store = SqliteStore::open_at(&path).unwrap();
    assert_eq!(store.get::<u32>("answer").unwrap(), Some(42));
  }

  #[test]
  fn type_mismatch_is_an_error() {
    let store = MemoryStore::new();
    store.set("n", &"not a number").unwrap();
    assert!(store.get::<u32>("n").is_err());
  }
}
