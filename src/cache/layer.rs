//! Cache layer that orchestrates caching logic with network fetching.

use chrono::Utc;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, warn};

use crate::remote::GatewayError;

use super::storage::DurableStore;
use super::traits::{CacheEntry, CacheResult, CacheSource, QueryKey};

/// Why a read produced no data at all.
#[derive(Debug, thiserror::Error)]
pub enum ReadError {
  /// The remote call failed and nothing was cached for this key.
  #[error("data unavailable: {0}")]
  Unavailable(GatewayError),

  /// The remote call failed and the cache itself could not be read.
  #[error("cache storage failed: {0}")]
  Storage(color_eyre::Report),
}

/// Read-through cache over a [`DurableStore`].
///
/// Reads are network-first. A successful fetch overwrites the snapshot for
/// its key; a failed fetch falls back to the last snapshot.
pub struct CacheLayer<S: DurableStore> {
  storage: Arc<S>,
  /// Snapshots younger than this are served without a fetch
  fresh_window: Option<Duration>,
}

impl<S: DurableStore> CacheLayer<S> {
  /// Create a new cache layer with the given storage backend.
  pub fn new(storage: Arc<S>) -> Self {
    Self {
      storage,
      fresh_window: None,
    }
  }

  /// Serve snapshots younger than `window` without calling the fetcher.
  pub fn with_fresh_window(mut self, window: Duration) -> Self {
    self.fresh_window = Some(window);
    self
  }

  fn storage_key<K: QueryKey + ?Sized>(key: &K) -> String {
    format!("cache:{}", key.cache_hash())
  }

  fn is_fresh(&self, entry_age: chrono::Duration) -> bool {
    match self.fresh_window.and_then(|w| chrono::Duration::from_std(w).ok()) {
      Some(window) => entry_age < window,
      None => false,
    }
  }

  /// Read through the cache.
  ///
  /// 1. Inside the freshness window (if configured), return the snapshot
  /// 2. Otherwise call `fetcher` and store its result
  /// 3. On fetch failure, return the snapshot tagged stale
  /// 4. With no snapshot, report `Unavailable`
  pub async fn read<K, T, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>, ReadError>
  where
    K: QueryKey + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
  {
    let storage_key = Self::storage_key(key);

    if self.fresh_window.is_some() {
      match self.storage.get::<CacheEntry<T>>(&storage_key) {
        Ok(Some(entry)) if self.is_fresh(Utc::now() - entry.fetched_at) => {
          debug!(key = %key.description(), "serving fresh snapshot");
          return Ok(CacheResult::from_cache(entry, CacheSource::Fresh));
        }
        Ok(_) => {}
        Err(e) => warn!(key = %key.description(), error = %e, "failed to read snapshot"),
      }
    }

    match fetcher().await {
      Ok(data) => {
        let entry = CacheEntry {
          data,
          fetched_at: Utc::now(),
        };
        if let Err(e) = self.storage.set(&storage_key, &entry) {
          warn!(key = %key.description(), error = %e, "failed to store snapshot");
        }
        Ok(CacheResult::from_network(entry.data, entry.fetched_at))
      }
      Err(err) => match self.storage.get::<CacheEntry<T>>(&storage_key) {
        Ok(Some(entry)) => {
          debug!(
            key = %key.description(),
            error = %err,
            fetched_at = %entry.fetched_at,
            "fetch failed, serving stale snapshot"
          );
          Ok(CacheResult::from_cache(entry, CacheSource::Stale))
        }
        Ok(None) => {
          debug!(key = %key.description(), error = %err, "fetch failed with cold cache");
          Err(ReadError::Unavailable(err))
        }
        Err(e) => {
          warn!(key = %key.description(), error = %e, "failed to read snapshot");
          Err(ReadError::Storage(e))
        }
      },
    }
  }

  /// Current snapshot for `key`, without touching the network.
  pub fn peek<K, T>(&self, key: &K) -> color_eyre::Result<Option<CacheEntry<T>>>
  where
    K: QueryKey + ?Sized,
    T: DeserializeOwned,
  {
    self.storage.get(&Self::storage_key(key))
  }

  /// Drop the snapshot for `key`.
  pub fn invalidate<K: QueryKey + ?Sized>(&self, key: &K) -> color_eyre::Result<()> {
    self.storage.delete(&Self::storage_key(key))
  }
}

impl<S: DurableStore> Clone for CacheLayer<S> {
  fn clone(&self) -> Self {
    Self {
      storage: Arc::clone(&self.storage),
      fresh_window: self.fresh_window,
    }
  }
}
