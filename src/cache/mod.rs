//! Generic caching layer for data persistence and offline support.
//!
//! This module provides a data-agnostic caching mechanism that:
//! - Persists JSON values in a durable key-value store
//! - Keeps the last successful remote read per query key
//! - Serves that snapshot when the network is unavailable

mod layer;
mod storage;
mod traits;

pub use layer::{CacheLayer, ReadError};
pub use storage::{DurableStore, MemoryStore, SqliteStore};
pub use traits::{sha256_hex, CacheEntry, CacheResult, CacheSource, QueryKey};
