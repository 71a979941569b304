//! Lotcheck Config
//!
//! Client configuration read from a TOML file. The file is located in this
//! order:
//! 1. An explicit path (the `--config` flag)
//! 2. The `LOTCHECK_CONFIG` environment variable
//! 3. `<config dir>/lotcheck/config.toml`
//!
//! If none exists the built-in defaults apply. Every field has a default,
//! so partial files are fine.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

/// Environment variable naming the config file.
pub const CONFIG_ENV: &str = "LOTCHECK_CONFIG";

/// Errors loading configuration.
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
  /// An explicitly named config file does not exist.
  #[error("config file not found: {}", path.display())]
  NotFound { path: PathBuf },

  #[error("failed to read {}: {source}", path.display())]
  Read {
    path: PathBuf,
    #[source]
    source: std::io::Error,
  },

  #[error("failed to parse {}: {source}", path.display())]
  Parse {
    path: PathBuf,
    #[source]
    source: toml::de::Error,
  },
}

/// Which record store the client talks to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum StoreBackend {
  #[default]
  Http,
  Sqlite,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
  pub backend: StoreBackend,
  /// Root of the REST API.
  pub base_url: String,
  pub timeout_secs: u64,
  /// Database file for the sqlite backend.
  pub database: PathBuf,
}

impl Default for StoreConfig {
  fn default() -> Self {
    Self {
      backend: StoreBackend::Http,
      base_url: "http://localhost:8000/api/".to_string(),
      timeout_secs: 10,
      database: PathBuf::from("lotcheck.db"),
    }
  }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LogConfig {
  /// `tracing` filter directive, overridden by `RUST_LOG`.
  pub filter: String,
}

impl Default for LogConfig {
  fn default() -> Self {
    Self {
      filter: "info".to_string(),
    }
  }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
  pub store: StoreConfig,
  pub log: LogConfig,
}

impl ClientConfig {
  /// Load the configuration, honoring `LOTCHECK_CONFIG`.
  pub fn load(explicit: Option<&Path>) -> Result<Self, ConfigError> {
    let from_env = std::env::var_os(CONFIG_ENV).map(PathBuf::from);
    let default = dirs::config_dir().map(|d| d.join("lotcheck").join("config.toml"));
    Self::load_from(explicit, from_env.as_deref(), default.as_deref())
  }

  /// Load from the first candidate given.
  ///
  /// A named file (explicit or from the environment) must exist; the
  /// default location may be missing.
  pub fn load_from(
    explicit: Option<&Path>,
    from_env: Option<&Path>,
    default: Option<&Path>,
  ) -> Result<Self, ConfigError> {
    if let Some(path) = explicit.or(from_env) {
      if !path.exists() {
        return Err(ConfigError::NotFound {
          path: path.to_path_buf(),
        });
      }
      return Self::read(path);
    }
    match default {
      Some(path) if path.exists() => Self::read(path),
      _ => Ok(Self::default()),
    }
  }

  /// Read and parse one file.
  pub fn read(path: &Path) -> Result<Self, ConfigError> {
    let content = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
      path: path.to_path_buf(),
      source,
    })?;
    Self::parse(&content).map_err(|source| ConfigError::Parse {
      path: path.to_path_buf(),
      source,
    })
  }

  pub fn parse(content: &str) -> Result<Self, toml::de::Error> {
    toml::from_str(content)
  }
}
