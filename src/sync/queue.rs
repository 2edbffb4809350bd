//! Durable queue of writes waiting for delivery.
//!
//! The whole active queue lives under a single store key as a JSON array, and
//! dead letters under a second one. Nothing is cached in memory, so every
//! read reflects what survives a restart.

use chrono::Utc;
use color_eyre::{eyre::eyre, Result};
use std::sync::{Arc, Mutex, MutexGuard};
use tracing::{debug, warn};
use uuid::Uuid;

use crate::cache::DurableStore;
use crate::remote::Request;

use super::types::{DeadLetter, DeadLetterReason, PendingOperation, RetryOutcome};

/// Pending writes plus the dead-letter list.
pub struct PendingQueue<S: DurableStore> {
  storage: Arc<S>,
  queue_key: String,
  dead_letter_key: String,
  max_retries: u32,
  /// Serializes read-modify-write cycles over the queue keys
  lock: Mutex<()>,
}

impl<S: DurableStore> PendingQueue<S> {
  /// Queue stored under the default "sync" namespace.
  pub fn new(storage: Arc<S>, max_retries: u32) -> Self {
    Self::with_namespace(storage, "sync", max_retries)
  }

  pub fn with_namespace(storage: Arc<S>, namespace: &str, max_retries: u32) -> Self {
    Self {
      storage,
      queue_key: format!("{}:queue", namespace),
      dead_letter_key: format!("{}:dead_letter", namespace),
      max_retries: max_retries.max(1),
      lock: Mutex::new(()),
    }
  }

  pub fn max_retries(&self) -> u32 {
    self.max_retries
  }

  fn guard(&self) -> Result<MutexGuard<'_, ()>> {
    self
      .lock
      .lock()
      .map_err(|e| eyre!("Queue lock poisoned: {}", e))
  }

  fn load_active(&self) -> Result<Vec<PendingOperation>> {
    Ok(self.storage.get(&self.queue_key)?.unwrap_or_default())
  }

  fn store_active(&self, ops: &[PendingOperation]) -> Result<()> {
    if ops.is_empty() {
      self.storage.delete(&self.queue_key)
    } else {
      self.storage.set(&self.queue_key, ops)
    }
  }

  fn load_dead(&self) -> Result<Vec<DeadLetter>> {
    Ok(self.storage.get(&self.dead_letter_key)?.unwrap_or_default())
  }

  fn store_dead(&self, letters: &[DeadLetter]) -> Result<()> {
    if letters.is_empty() {
      self.storage.delete(&self.dead_letter_key)
    } else {
      self.storage.set(&self.dead_letter_key, letters)
    }
  }

  /// Append a write to the queue and return its id.
  ///
  /// A request that already carries an idempotency key keeps it as the
  /// operation id, so the first attempt and every retry share one key.
  pub fn enqueue(&self, mut request: Request) -> Result<String> {
    let id = request
      .idempotency_key
      .clone()
      .unwrap_or_else(|| Uuid::new_v4().to_string());
    request.idempotency_key = Some(id.clone());

    let _guard = self.guard()?;
    let mut ops = self.load_active()?;
    if ops.iter().any(|op| op.id == id) {
      return Err(eyre!("Operation {} is already queued", id));
    }

    ops.push(PendingOperation {
      id: id.clone(),
      request,
      created_at: Utc::now(),
      retry_count: 0,
      max_retries: self.max_retries,
      last_error: None,
    });
    self.store_active(&ops)?;

    debug!(id = %id, pending = ops.len(), "operation queued");
    Ok(id)
  }

  /// Snapshot of the active queue in FIFO order.
  pub fn list(&self) -> Result<Vec<PendingOperation>> {
    let mut ops = self.load_active()?;
    // Stable sort keeps insertion order for equal timestamps
    ops.sort_by_key(|op| op.created_at);
    Ok(ops)
  }

  /// Number of active operations.
  pub fn len(&self) -> Result<usize> {
    Ok(self.load_active()?.len())
  }

  pub fn is_empty(&self) -> Result<bool> {
    Ok(self.len()? == 0)
  }

  /// Delete an operation. Returns false if it was not queued.
  pub fn remove(&self, id: &str) -> Result<bool> {
    let _guard = self.guard()?;
    let mut ops = self.load_active()?;
    let before = ops.len();
    ops.retain(|op| op.id != id);
    if ops.len() == before {
      return Ok(false);
    }
    self.store_active(&ops)?;
    Ok(true)
  }

  /// Record a failed delivery attempt.
  ///
  /// Once `retry_count` reaches `max_retries` the operation moves to the
  /// dead-letter list.
  pub fn mark_retried(&self, id: &str, error: &str) -> Result<RetryOutcome> {
    let _guard = self.guard()?;
    let mut ops = self.load_active()?;
    let Some(index) = ops.iter().position(|op| op.id == id) else {
      return Ok(RetryOutcome::NotFound);
    };

    let op = &mut ops[index];
    op.retry_count += 1;
    op.last_error = Some(error.to_string());

    if op.retry_count < op.max_retries {
      let retry_count = op.retry_count;
      self.store_active(&ops)?;
      return Ok(RetryOutcome::Requeued { retry_count });
    }

    let op = ops.remove(index);
    self.move_to_dead_letters(op, DeadLetterReason::RetriesExhausted, &ops)?;
    Ok(RetryOutcome::DeadLettered)
  }

  /// Move an operation straight to the dead-letter list.
  ///
  /// Counts the failed attempt that caused it. Returns false if not queued.
  pub fn dead_letter(&self, id: &str, reason: DeadLetterReason, error: &str) -> Result<bool> {
    let _guard = self.guard()?;
    let mut ops = self.load_active()?;
    let Some(index) = ops.iter().position(|op| op.id == id) else {
      return Ok(false);
    };

    let mut op = ops.remove(index);
    op.retry_count += 1;
    op.last_error = Some(error.to_string());
    self.move_to_dead_letters(op, reason, &ops)?;
    Ok(true)
  }

  // Dead list is written before the active list: a crash in between leaves a
  // duplicate, never a lost operation.
  fn move_to_dead_letters(
    &self,
    op: PendingOperation,
    reason: DeadLetterReason,
    remaining: &[PendingOperation],
  ) -> Result<()> {
    warn!(
      id = %op.id,
      endpoint = %op.request.endpoint,
      retries = op.retry_count,
      reason = ?reason,
      last_error = op.last_error.as_deref().unwrap_or(""),
      "operation dead-lettered"
    );

    let mut dead = self.load_dead()?;
    dead.push(DeadLetter {
      operation: op,
      reason,
      dead_lettered_at: Utc::now(),
    });
    self.store_dead(&dead)?;
    self.store_active(remaining)
  }

  /// All dead-lettered operations, oldest first.
  pub fn dead_letters(&self) -> Result<Vec<DeadLetter>> {
    self.load_dead()
  }

  /// Put a dead letter back on the active queue with a fresh retry budget.
  pub fn requeue_dead_letter(&self, id: &str) -> Result<bool> {
    let _guard = self.guard()?;
    let mut dead = self.load_dead()?;
    let Some(index) = dead.iter().position(|d| d.operation.id == id) else {
      return Ok(false);
    };

    let mut ops = self.load_active()?;
    let mut op = dead.remove(index).operation;
    op.retry_count = 0;
    op.max_retries = self.max_retries;
    op.created_at = Utc::now();

    if !ops.iter().any(|queued| queued.id == op.id) {
      ops.push(op);
    }
    self.store_active(&ops)?;
    self.store_dead(&dead)?;
    Ok(true)
  }

  /// Drop every dead letter. Returns how many were removed.
  pub fn purge_dead_letters(&self) -> Result<usize> {
    let _guard = self.guard()?;
    let count = self.load_dead()?.len();
    self.storage.delete(&self.dead_letter_key)?;
    Ok(count)
  }
}
