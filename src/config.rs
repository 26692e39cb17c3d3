//! Application configuration and logging setup.

use std::path::{Path, PathBuf};

use serde::Deserialize;
use thiserror::Error;
use tracing_subscriber::EnvFilter;

use crate::{
    core::durable::DurableStore,
    location::LocationProvider,
    persist::{PersistError, sqlite::Synchronous},
    runtime::handle::{RuntimeConfig, spawn_checkin_log},
    service::{CheckInPolicy, CheckInService},
};

/// Environment variable that overrides [`DatabaseConfig::path`].
pub const DB_PATH_ENV: &str = "CHECKIN_DB_PATH";

/// Failure while loading configuration or installing logging.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// The config file could not be read.
    #[error("reading config {}: {source}", path.display())]
    Io {
        /// File that was being read.
        path: PathBuf,
        /// Underlying I/O error.
        #[source]
        source: std::io::Error,
    },
    /// The config is not valid JSON for [`CheckInConfig`].
    #[error("parsing config: {0}")]
    Parse(#[from] serde_json::Error),
    /// A global subscriber is already installed.
    #[error("installing log subscriber: {0}")]
    Logging(String),
}

/// Top-level application configuration. Every section is optional.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct CheckInConfig {
    /// SQLite location and durability.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Runtime channel sizing.
    #[serde(default)]
    pub runtime: RuntimeConfig,
    /// Check-in action limits.
    #[serde(default)]
    pub check_in: CheckInPolicy,
    /// Log filter.
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Where and how check-ins are stored.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// SQLite file path.
    #[serde(default = "default_db_path")]
    pub path: PathBuf,
    /// SQLite `synchronous` mode.
    #[serde(default)]
    pub synchronous: Synchronous,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            synchronous: Synchronous::default(),
        }
    }
}

/// Logging setup for [`init_logging`].
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// `EnvFilter` directive used when `RUST_LOG` is unset.
    #[serde(default = "default_log_level")]
    pub level: String,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
        }
    }
}

fn default_db_path() -> PathBuf {
    PathBuf::from("checkin.db")
}

fn default_log_level() -> String {
    "info".to_string()
}

impl CheckInConfig {
    /// Parses JSON, then applies [`DB_PATH_ENV`].
    pub fn from_json_str(raw: &str) -> Result<Self, ConfigError> {
        let mut config: Self = serde_json::from_str(raw)?;
        config.apply_env();
        Ok(config)
    }

    /// Reads and parses a JSON config file.
    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_json_str(&raw)
    }

    /// Opens the configured database.
    pub fn open_store(&self) -> Result<DurableStore, PersistError> {
        DurableStore::open(&self.database.path, self.database.synchronous)
    }

    /// Opens the store, spawns the runtime, and returns a service over it.
    ///
    /// Must be called from within a Tokio runtime.
    pub fn start_service<L: LocationProvider>(&self, location: L) -> Result<CheckInService<L>, PersistError> {
        let store = self.open_store()?;
        let log = spawn_checkin_log(store, self.runtime.clone());
        Ok(CheckInService::new(log, location, self.check_in.clone()))
    }

    fn apply_env(&mut self) {
        if let Some(path) = std::env::var_os(DB_PATH_ENV).filter(|p| !p.is_empty()) {
            self.database.path = PathBuf::from(path);
        }
    }
}

/// Installs a global fmt subscriber. `RUST_LOG` wins over the configured level.
pub fn init_logging(config: &LoggingConfig) -> Result<(), ConfigError> {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&config.level));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .compact()
        .try_init()
        .map_err(|e| ConfigError::Logging(e.to_string()))
}
