//! Tracing subscriber setup for applications embedding the engine.
//!
//! The engine itself only emits `tracing` events; installing a subscriber is
//! left to the host application, which can use these helpers.

use color_eyre::{eyre::eyre, Result};
use std::path::Path;
use tracing_appender::non_blocking::{NonBlocking, WorkerGuard};
use tracing_subscriber::EnvFilter;

use crate::config::LogConfig;

/// Log file prefix inside the configured directory.
pub const LOG_FILE_NAME: &str = "fieldsync.log";

/// RUST_LOG wins over the configured default.
fn env_filter(default_directive: &str) -> EnvFilter {
  EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Log to stderr.
pub fn init_stderr(default_directive: &str) -> Result<()> {
  tracing_subscriber::fmt()
    .with_env_filter(env_filter(default_directive))
    .with_writer(std::io::stderr)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))
}

/// Log to a daily-rolling file in `dir`.
///
/// Keep the returned guard alive; dropping it flushes and stops the writer.
pub fn init_file(dir: &Path, default_directive: &str) -> Result<WorkerGuard> {
  let (writer, guard) = file_writer(dir)?;

  tracing_subscriber::fmt()
    .with_env_filter(env_filter(default_directive))
    .with_writer(writer)
    .with_ansi(false)
    .try_init()
    .map_err(|e| eyre!("Failed to install log subscriber: {}", e))?;

  Ok(guard)
}

/// Non-blocking writer onto the daily-rolling file in `dir`, creating it if needed.
pub fn file_writer(dir: &Path) -> Result<(NonBlocking, WorkerGuard)> {
  std::fs::create_dir_all(dir)
    .map_err(|e| eyre!("Failed to create log directory {}: {}", dir.display(), e))?;

  let appender = tracing_appender::rolling::daily(dir, LOG_FILE_NAME);
  Ok(tracing_appender::non_blocking(appender))
}

/// Install the subscriber described by `config`.
pub fn init(config: &LogConfig) -> Result<Option<WorkerGuard>> {
  match &config.dir {
    Some(dir) => init_file(dir, &config.level).map(Some),
    None => init_stderr(&config.level).map(|_| None),
  }
}
