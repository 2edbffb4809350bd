//! Core traits and types for the caching system.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

/// Identifies one cached collection.
///
/// Implementors map a logical query (e.g. "prices for district X") onto a
/// stable, fixed-length storage key.
pub trait QueryKey {
  /// Stable hash used as the storage key
  fn cache_hash(&self) -> String;

  /// Human-readable description for logs
  fn description(&self) -> String;
}

impl QueryKey for str {
  fn cache_hash(&self) -> String {
    sha256_hex(&format!("snapshot:{}", self))
  }

  fn description(&self) -> String {
    self.to_string()
  }
}

impl QueryKey for String {
  fn cache_hash(&self) -> String {
    self.as_str().cache_hash()
  }

  fn description(&self) -> String {
    self.clone()
  }
}

/// SHA256 hex digest for stable, fixed-length keys.
pub fn sha256_hex(input: &str) -> String {
  let mut hasher = Sha256::new();
  hasher.update(input.as_bytes());
  hex::encode(hasher.finalize())
}

/// Last known good snapshot of a remote read.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CacheEntry<T> {
  pub data: T,
  pub fetched_at: DateTime<Utc>,
}

/// Result from a cache read, including data and metadata about the source.
#[derive(Debug, Clone, PartialEq)]
pub struct CacheResult<T> {
  /// The actual data
  pub data: T,
  /// Where the data came from
  pub source: CacheSource,
  /// When the data was fetched from the remote service
  pub fetched_at: DateTime<Utc>,
}

impl<T> CacheResult<T> {
  /// Create a new cache result from fresh network data.
  pub fn from_network(data: T, fetched_at: DateTime<Utc>) -> Self {
    Self {
      data,
      source: CacheSource::Network,
      fetched_at,
    }
  }

  /// Create a new cache result from cached data.
  pub fn from_cache(entry: CacheEntry<T>, source: CacheSource) -> Self {
    Self {
      data: entry.data,
      source,
      fetched_at: entry.fetched_at,
    }
  }

  /// True when the network could not be reached and a snapshot was served.
  pub fn is_stale(&self) -> bool {
    self.source == CacheSource::Stale
  }
}

/// Indicates where data came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheSource {
  /// Fresh data from network
  Network,
  /// Snapshot still inside the freshness window, network skipped
  Fresh,
  /// Network failed, serving the last known good snapshot
  Stale,
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn string_keys_hash_like_str_keys() {
    let owned = String::from("prices:nakuru");
    assert_eq!(owned.cache_hash(), "prices:nakuru".cache_hash());
    assert_eq!(owned.cache_hash().len(), 64);
    assert_ne!("prices:nakuru".cache_hash(), "prices:eldoret".cache_hash());
  }
}
