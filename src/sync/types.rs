use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::remote::Request;

/// A write that could not be delivered yet.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PendingOperation {
  /// Client-generated, unique; also the request's idempotency key
  pub id: String,
  pub request: Request,
  pub created_at: DateTime<Utc>,
  pub retry_count: u32,
  pub max_retries: u32,
  /// Most recent delivery failure
  #[serde(default)]
  pub last_error: Option<String>,
}

/// Why an operation left the active queue without being delivered.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum DeadLetterReason {
  /// `retry_count` reached `max_retries`
  RetriesExhausted,
  /// The server answered with a non-retryable error
  Terminal { status: Option<u16> },
}

/// An operation retained for diagnostics after it stopped being retried.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DeadLetter {
  pub operation: PendingOperation,
  pub reason: DeadLetterReason,
  pub dead_lettered_at: DateTime<Utc>,
}

/// Result of recording a failed delivery attempt.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryOutcome {
  /// Still queued for the next drain
  Requeued { retry_count: u32 },
  /// Crossed `max_retries` and moved to the dead-letter list
  DeadLettered,
  /// No active operation with that id
  NotFound,
}

/// How a write call ended, from the caller's point of view.
///
/// Both variants are a success: the write is either visible remotely or
/// durably queued.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WriteOutcome {
  Synced,
  QueuedForSync { id: String },
}

/// Summary of one drain pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct DrainReport {
  pub synced: usize,
  pub failed: usize,
  /// Subset of `failed` that moved to the dead-letter list during this pass
  pub dead_lettered: usize,
}

impl DrainReport {
  pub fn is_empty(&self) -> bool {
    *self == Self::default()
  }
}

/// Whether non-retryable failures consume the retry budget.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RetryPolicy {
  /// Every failure is retried until `max_retries`
  #[default]
  RetryAll,
  /// Non-retryable failures (4xx validation errors) dead-letter on first sight
  FailFast,
}
