//! Offline-first synchronization engine.
//!
//! Reads are served from the remote service when it answers and from the
//! last known good snapshot when it does not. Writes always succeed for the
//! caller: they are delivered immediately or queued durably and drained
//! later with bounded retries.
//!
//! ```no_run
//! use fieldsync::{Config, SyncCoordinator, SyncPayload};
//! use serde::Serialize;
//!
//! #[derive(Serialize)]
//! struct PriceQuote {
//!   market: String,
//!   crop: String,
//!   price: u32,
//! }
//!
//! impl SyncPayload for PriceQuote {
//!   fn endpoint(&self) -> String {
//!     "prices".to_string()
//!   }
//! }
//!
//! # async fn run() -> color_eyre::Result<()> {
//! let config = Config::load(None)?;
//! let sync = SyncCoordinator::from_config(&config)?;
//!
//! let prices = sync.fetch::<_, Vec<serde_json::Value>>("prices:nakuru", "prices?market=nakuru").await?;
//! if prices.is_stale() {
//!   println!("offline, showing prices from {}", prices.fetched_at);
//! }
//!
//! sync
//!   .write(&PriceQuote { market: "nakuru".into(), crop: "maize".into(), price: 42 })
//!   .await?;
//! sync.drain().await?;
//! # Ok(())
//! # }
//! ```

pub mod auth;
pub mod cache;
pub mod config;
pub mod logging;
pub mod remote;
pub mod sync;

pub use cache::{CacheResult, CacheSource, DurableStore, MemoryStore, ReadError, SqliteStore};
pub use config::Config;
pub use remote::{Gateway, GatewayError, HttpGateway, Method, Request, Response};
pub use sync::{
  spawn_periodic_drain, DeadLetter, DrainReport, PendingOperation, RetryPolicy, SyncCoordinator,
  SyncPayload, WriteOutcome,
};
