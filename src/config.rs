use color_eyre::{eyre::eyre, Result};
use serde::Deserialize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use crate::sync::RetryPolicy;

#[derive(Debug, Clone, Default, Deserialize)]
pub struct Config {
  #[serde(default)]
  pub remote: RemoteConfig,
  #[serde(default)]
  pub sync: SyncConfig,
  #[serde(default)]
  pub storage: StorageConfig,
  #[serde(default)]
  pub log: LogConfig,
}

#[derive(Debug, Clone, Deserialize)]
pub struct RemoteConfig {
  /// Base URL that endpoint paths are joined onto
  #[serde(default = "default_base_url")]
  pub base_url: String,
  /// Per-call deadline in seconds
  #[serde(default = "default_timeout_secs")]
  pub timeout_secs: u64,
}

impl RemoteConfig {
  pub fn timeout(&self) -> Duration {
    Duration::from_secs(self.timeout_secs)
  }
}

impl Default for RemoteConfig {
  fn default() -> Self {
    Self {
      base_url: default_base_url(),
      timeout_secs: default_timeout_secs(),
    }
  }
}

#[derive(Debug, Clone, Deserialize)]
pub struct SyncConfig {
  /// Failed delivery attempts before an operation is dead-lettered
  #[serde(default = "default_max_retries")]
  pub max_retries: u32,
  /// Period of the background drain, in seconds
  #[serde(default = "default_drain_interval_secs")]
  pub drain_interval_secs: u64,
  /// How terminal (4xx) rejections are treated during a drain
  #[serde(default)]
  pub retry_policy: RetryPolicy,
  /// Prefix of the queue and dead-letter keys in the durable store
  #[serde(default = "default_namespace")]
  pub namespace: String,
  /// Serve cached snapshots younger than this without hitting the network
  #[serde(default)]
  pub fresh_window_secs: Option<u64>,
}

impl SyncConfig {
  pub fn drain_interval(&self) -> Duration {
    Duration::from_secs(self.drain_interval_secs)
  }

  pub fn fresh_window(&self) -> Option<Duration> {
    self.fresh_window_secs.map(Duration::from_secs)
  }
}

impl Default for SyncConfig {
  fn default() -> Self {
    Self {
      max_retries: default_max_retries(),
      drain_interval_secs: default_drain_interval_secs(),
      retry_policy: RetryPolicy::default(),
      namespace: default_namespace(),
      fresh_window_secs: None,
    }
  }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct StorageConfig {
  /// SQLite file; defaults to $XDG_DATA_HOME/fieldsync/store.db
  pub path: Option<PathBuf>,
}

#[derive(Debug, Clone, Deserialize)]
pub struct LogConfig {
  /// Default filter directive, overridden by RUST_LOG
  #[serde(default = "default_log_level")]
  pub level: String,
  /// Write daily-rolling log files here instead of stderr
  pub dir: Option<PathBuf>,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      level: default_log_level(),
      dir: None,
    }
  }
}

fn default_base_url() -> String {
  "http://localhost:8080/".to_string()
}

fn default_timeout_secs() -> u64 {
  10
}

fn default_max_retries() -> u32 {
  3
}

fn default_drain_interval_secs() -> u64 {
  30 * 60
}

fn default_namespace() -> String {
  "sync".to_string()
}

fn default_log_level() -> String {
  "info".to_string()
}

impl Config {
  /// Load configuration from file.
  ///
  /// Search order:
  /// 1. Explicit path if provided
  /// 2. ./fieldsync.yaml (current directory)
  /// 3. $XDG_CONFIG_HOME/fieldsync/config.yaml
  ///
  /// Falls back to defaults when no file is found.
  pub fn load(explicit_path: Option<&Path>) -> Result<Self> {
    let path = if let Some(p) = explicit_path {
      if p.exists() {
        Some(p.to_path_buf())
      } else {
        return Err(eyre!("Config file not found: {}", p.display()));
      }
    } else {
      Self::find_config_file()
    };

    match path {
      Some(p) => Self::load_from_path(&p),
      None => Ok(Self::default()),
    }
  }

  fn find_config_file() -> Option<PathBuf> {
    let local = PathBuf::from("fieldsync.yaml");
    if local.exists() {
      return Some(local);
    }

    if let Some(config_dir) = dirs::config_dir() {
      let xdg_path = config_dir.join("fieldsync").join("config.yaml");
      if xdg_path.exists() {
        return Some(xdg_path);
      }
    }

    None
  }

  fn load_from_path(path: &Path) -> Result<Self> {
    let contents = std::fs::read_to_string(path)
      .map_err(|e| eyre!("Failed to read config file {}: {}", path.display(), e))?;

    Self::from_yaml(&contents)
      .map_err(|e| eyre!("Failed to parse config file {}: {}", path.display(), e))
  }

  /// Parse configuration from a YAML document.
  pub fn from_yaml(contents: &str) -> Result<Self> {
    let config: Config = serde_yaml::from_str(contents)?;
    if config.sync.max_retries == 0 {
      return Err(eyre!("sync.max_retries must be at least 1"));
    }
    Ok(config)
  }
}

#[cfg(test)]
mod tests {
  use super::*;

  #[test]
  fn empty_document_uses_defaults() {
    let config = Config::from_yaml("{}").unwrap();
    assert_eq!(config.remote.timeout(), Duration::from_secs(10));
    assert_eq!(config.sync.max_retries, 3);
    assert_eq!(config.sync.drain_interval(), Duration::from_secs(1800));
    assert_eq!(config.sync.retry_policy, RetryPolicy::RetryAll);
    assert_eq!(config.sync.namespace, "sync");
    assert!(config.sync.fresh_window().is_none());
    assert_eq!(config.log.level, "info");
  }

  #[test]
  fn overrides_are_applied() {
    let config = Config::from_yaml(
      r#"
remote:
  base_url: https://api.example.org/v1/
  timeout_secs: 4
sync:
  max_retries: 5
  retry_policy: fail_fast
  fresh_window_secs: 60
storage:
  path: /tmp/fieldsync.db
"#,
    )
    .unwrap();

    assert_eq!(config.remote.base_url, "https://api.example.org/v1/");
    assert_eq!(config.remote.timeout(), Duration::from_secs(4));
    assert_eq!(config.sync.max_retries, 5);
    assert_eq!(config.sync.retry_policy, RetryPolicy::FailFast);
    assert_eq!(config.sync.fresh_window(), Some(Duration::from_secs(60)));
    assert_eq!(
      config.storage.path.as_deref(),
      Some(Path::new("/tmp/fieldsync.db"))
    );
  }

  #[test]
  fn zero_retries_is_rejected() {
    assert!(Config::from_yaml("sync:\n  max_retries: 0\n").is_err());
  }

  #[test]
  fn explicit_missing_path_is_an_error() {
    let dir = tempfile::tempdir().unwrap();
    let missing = dir.path().join("nope.yaml");
    assert!(Config::load(Some(&missing)).is_err());
  }

  #[test]
  fn explicit_path_is_loaded() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("config.yaml");
    std::fs::write(&path, "remote:\n  timeout_secs: 2\n").unwrap();

    let config = Config::load(Some(&path)).unwrap();
    assert_eq!(config.remote.timeout_secs, 2);
  }
}
