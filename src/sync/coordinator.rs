//! Entry point for application code: cached reads, durable writes, drains.

use color_eyre::Result;
use serde::{de::DeserializeOwned, Serialize};
use std::future::Future;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::auth::EnvToken;
use crate::cache::{CacheLayer, CacheResult, DurableStore, QueryKey, ReadError, SqliteStore};
use crate::config::{Config, SyncConfig};
use crate::remote::{Gateway, GatewayError, HttpGateway, Request};

use super::payload::SyncPayload;
use super::queue::PendingQueue;
use super::scheduler::spawn_periodic_drain;
use super::types::{
  DeadLetter, DeadLetterReason, DrainReport, PendingOperation, RetryOutcome, RetryPolicy,
  WriteOutcome,
};

/// Offline-first front door to the remote service.
///
/// Reads go through the snapshot cache, writes fall back to the pending
/// queue, and `drain` delivers the queue. Only one drain runs at a time.
pub struct SyncCoordinator<G: Gateway, S: DurableStore> {
  gateway: Arc<G>,
  cache: CacheLayer<S>,
  queue: PendingQueue<S>,
  retry_policy: RetryPolicy,
  draining: AtomicBool,
}

impl SyncCoordinator<HttpGateway, SqliteStore> {
  /// Build the production stack: reqwest gateway, SQLite store, env token.
  pub fn from_config(config: &Config) -> Result<Self> {
    let gateway = HttpGateway::new(&config.remote, Arc::new(EnvToken::new()))?;
    let storage = match &config.storage.path {
      Some(path) => SqliteStore::open_at(path)?,
      None => SqliteStore::open()?,
    };

    Ok(Self::new(gateway, Arc::new(storage), &config.sync))
  }
}

impl<G: Gateway + 'static, S: DurableStore + 'static> SyncCoordinator<G, S> {
  /// Start the background drain at `config.drain_interval_secs`.
  pub fn spawn_background_drain(self: &Arc<Self>, config: &SyncConfig) -> JoinHandle<()> {
    spawn_periodic_drain(Arc::clone(self), config.drain_interval())
  }
}

impl<G: Gateway, S: DurableStore> SyncCoordinator<G, S> {
  pub fn new(gateway: G, storage: Arc<S>, config: &SyncConfig) -> Self {
    let mut cache = CacheLayer::new(Arc::clone(&storage));
    if let Some(window) = config.fresh_window() {
      cache = cache.with_fresh_window(window);
    }
    let queue = PendingQueue::with_namespace(storage, &config.namespace, config.max_retries);

    Self {
      gateway: Arc::new(gateway),
      cache,
      queue,
      retry_policy: config.retry_policy,
      draining: AtomicBool::new(false),
    }
  }

  pub fn queue(&self) -> &PendingQueue<S> {
    &self.queue
  }

  pub fn cache(&self) -> &CacheLayer<S> {
    &self.cache
  }

  /// Read through the snapshot cache with a caller-supplied fetcher.
  pub async fn read<K, T, F, Fut>(&self, key: &K, fetcher: F) -> Result<CacheResult<T>, ReadError>
  where
    K: QueryKey + ?Sized,
    T: Serialize + DeserializeOwned,
    F: FnOnce() -> Fut,
    Fut: Future<Output = Result<T, GatewayError>>,
  {
    self.cache.read(key, fetcher).await
  }

  /// GET `endpoint` through the gateway, decoding the body as `T`.
  pub async fn fetch<K, T>(&self, key: &K, endpoint: &str) -> Result<CacheResult<T>, ReadError>
  where
    K: QueryKey + ?Sized,
    T: Serialize + DeserializeOwned,
  {
    let gateway = Arc::clone(&self.gateway);
    let request = Request::get(endpoint);
    self
      .cache
      .read(key, || async move { gateway.call(&request).await?.json::<T>() })
      .await
  }

  /// Deliver `payload` now, or queue it durably if the remote call fails.
  ///
  /// Only a storage failure is reported as an error.
  pub async fn write<P: SyncPayload>(&self, payload: &P) -> Result<WriteOutcome> {
    let request = payload
      .to_request()?
      .with_idempotency_key(Uuid::new_v4().to_string());

    match self.gateway.call(&request).await {
      Ok(_) => {
        debug!(endpoint = %request.endpoint, "write synced");
        Ok(WriteOutcome::Synced)
      }
      Err(err) => {
        let id = self.queue.enqueue(request)?;
        info!(id = %id, error = %err, "write queued for sync");
        Ok(WriteOutcome::QueuedForSync { id })
      }
    }
  }

  /// Try to deliver every queued operation once.
  ///
  /// Returns an empty report straight away if another drain is running.
  pub async fn drain(&self) -> Result<DrainReport> {
    let Some(_guard) = DrainGuard::acquire(&self.draining) else {
      debug!("drain already in progress");
      return Ok(DrainReport::default());
    };

    let snapshot = self.queue.list()?;
    let mut report = DrainReport::default();

    for op in snapshot {
      match self.gateway.call(&op.request).await {
        Ok(_) => {
          report.synced += 1;
          // Delivered; a failed remove only means a duplicate attempt later
          if let Err(e) = self.queue.remove(&op.id) {
            warn!(id = %op.id, error = %e, "failed to remove synced operation");
          }
        }
        Err(err) => {
          report.failed += 1;
          match self.record_failure(&op, &err) {
            Ok(true) => report.dead_lettered += 1,
            Ok(false) => {}
            Err(e) => warn!(id = %op.id, error = %e, "failed to record delivery failure"),
          }
        }
      }
    }

    if !report.is_empty() {
      info!(
        synced = report.synced,
        failed = report.failed,
        dead_lettered = report.dead_lettered,
        "drain finished"
      );
    }
    Ok(report)
  }

  /// Returns true if the operation left the active queue.
  fn record_failure(&self, op: &PendingOperation, err: &GatewayError) -> Result<bool> {
    let message = err.to_string();

    if self.retry_policy == RetryPolicy::FailFast && !err.is_retryable() {
      let reason = DeadLetterReason::Terminal {
        status: err.status(),
      };
      return self.queue.dead_letter(&op.id, reason, &message);
    }

    match self.queue.mark_retried(&op.id, &message)? {
      RetryOutcome::Requeued { retry_count } => {
        debug!(id = %op.id, retry_count, error = %message, "delivery failed, will retry");
        Ok(false)
      }
      RetryOutcome::DeadLettered => Ok(true),
      RetryOutcome::NotFound => {
        // Removed by someone else while the call was in flight
        debug!(id = %op.id, error = %message, "failed operation no longer queued");
        Ok(false)
      }
    }
  }

  pub fn is_draining(&self) -> bool {
    self.draining.load(Ordering::Acquire)
  }

  pub fn has_pending(&self) -> Result<bool> {
    Ok(!self.queue.is_empty()?)
  }

  pub fn pending_count(&self) -> Result<usize> {
    self.queue.len()
  }

  pub fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
    self.queue.dead_letters()
  }

  pub fn dead_letter_count(&self) -> Result<usize> {
    Ok(self.queue.dead_letters()?.len())
  }

  /// Give a dead letter another full retry budget.
  pub fn requeue_dead_letter(&self, id: &str) -> Result<bool> {
    self.queue.requeue_dead_letter(id)
  }
}

/// Holds the in-progress flag; clears it on drop, including cancellation.
struct DrainGuard<'a> {
  flag: &'a AtomicBool,
}

impl<'a> DrainGuard<'a> {
  fn acquire(flag: &'a AtomicBool) -> Option<Self> {
    flag
      .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
      .ok()
      .map(|_| Self { flag })
  }
}

impl Drop for DrainGuard<'_> {
  fn drop(&mut self) {
    self.flag.store(false, Ordering::Release);
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn drain_guard_is_exclusive_and_released_on_drop() {
    let flag = AtomicBool::new(false);

    let first = DrainGuard::acquire(&flag);
    assert!(first.is_some());
    assert!(DrainGuard::acquire(&flag).is_none());

    drop(first);
    assert!(!flag.load(Ordering::Acquire));
    assert!(DrainGuard::acquire(&flag).is_some());
  }
}
