//! Offline write queue and its delivery.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────┐     ┌─────────────┐
//! │ SyncCoordinator │────►│   Gateway   │────►│   Remote    │
//! │ read/write/drain│◄────│   (trait)   │◄────│   Service   │
//! └─────────────────┘     └─────────────┘     └─────────────┘
//!        │      │
//!        ▼      ▼
//! ┌──────────┐ ┌──────────────┐
//! │CacheLayer│ │ PendingQueue │   (both persisted in a DurableStore)
//! └──────────┘ └──────────────┘
//! ```
//!
//! Writes that fail are queued with a client-generated id that doubles as
//! the idempotency key. Each drain walks a snapshot of the queue in FIFO
//! order; failures are isolated per operation and dead-lettered once their
//! retry budget runs out.

mod coordinator;
mod payload;
mod queue;
mod scheduler;
mod types;

pub use coordinator::SyncCoordinator;
pub use payload::SyncPayload;
pub use queue::PendingQueue;
pub use scheduler::spawn_periodic_drain;
pub use types::{
  DeadLetter, DeadLetterReason, DrainReport, PendingOperation, RetryOutcome, RetryPolicy,
  WriteOutcome,
};
