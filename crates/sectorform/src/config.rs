//! Configuration management for sectorform.
//!
//! This module provides configuration loading and validation using figment,
//! supporting TOML config files, environment variables, and defaults.

use std::collections::BTreeMap;
use std::path::PathBuf;

use figment::{
    providers::{Env, Format, Serialized, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};

use crate::choices::RefreshStrategy;
use crate::error::{Error, Result};
use crate::sectors::NestingOrder;

/// Default configuration file name.
const CONFIG_FILE_NAME: &str = "config.toml";

/// Default data directory name.
const DATA_DIR_NAME: &str = "sectorform";

/// Default database file name.
const DATABASE_FILE_NAME: &str = "documents.db";

/// Prefix of environment variables read as configuration.
const ENV_PREFIX: &str = "SECTORFORM_";

/// Application configuration.
///
/// Configuration is loaded from (in order of precedence, highest first):
/// 1. Environment variables (prefixed with `SECTORFORM_`, sections separated
///    by `__`, e.g. `SECTORFORM_STORE__PROJECT_ID`)
/// 2. TOML config file at `~/.config/sectorform/config.toml`
/// 3. Default values
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Document store configuration.
    pub store: StoreConfig,
    /// Sector taxonomy configuration.
    pub sectors: SectorsConfig,
    /// Choice repository configuration.
    pub choices: ChoicesConfig,
}

/// Document store configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StoreConfig {
    /// Path to the database file.
    /// Defaults to `~/.local/share/sectorform/documents.db`
    pub database_path: Option<PathBuf>,
    /// Project whose documents are read and written.
    pub project_id: String,
    /// Connection parameters handed to the store as-is (API keys, domains).
    /// Values are never validated or logged.
    pub connection: BTreeMap<String, String>,
}

/// Sector taxonomy configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SectorsConfig {
    /// Separator between nesting path segments.
    pub delimiter: String,
    /// How nesting paths are compared when ordering sectors.
    pub order: NestingOrder,
}

/// Choice repository configuration.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ChoicesConfig {
    /// How the cached choice list is refreshed after a write.
    pub refresh: RefreshStrategy,
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            database_path: None, // Resolved to the data directory at runtime
            project_id: "default".to_string(),
            connection: BTreeMap::new(),
        }
    }
}

impl Default for SectorsConfig {
    fn default() -> Self {
        Self {
            delimiter: "-".to_string(),
            order: NestingOrder::default(),
        }
    }
}

impl Config {
    /// Load configuration from all sources.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load() -> Result<Self> {
        Self::load_from(None)
    }

    /// Load configuration with an optional custom config path.
    ///
    /// # Errors
    ///
    /// Returns an error if configuration loading or parsing fails.
    pub fn load_from(config_path: Option<PathBuf>) -> Result<Self> {
        let config_file = config_path.unwrap_or_else(Self::default_config_path);

        let figment = Figment::new()
            .merge(Serialized::defaults(Config::default()))
            .merge(Toml::file(&config_file))
            .merge(Env::prefixed(ENV_PREFIX).split("__"));

        let config: Config = figment.extract()?;
        config.validate()?;
        Ok(config)
    }

    /// Get the default configuration file path.
    #[must_use]
    pub fn default_config_path() -> PathBuf {
        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from(".config"))
            .join(DATA_DIR_NAME)
            .join(CONFIG_FILE_NAME)
    }

    /// Get the default data directory path.
    #[must_use]
    pub fn default_data_dir() -> PathBuf {
        dirs::data_local_dir()
            .unwrap_or_else(|| PathBuf::from(".local/share"))
            .join(DATA_DIR_NAME)
    }

    /// Validate the configuration.
    ///
    /// Connection parameters are deliberately left unchecked.
    ///
    /// # Errors
    ///
    /// Returns an error if any configuration values are invalid.
    pub fn validate(&self) -> Result<()> {
        if self.sectors.delimiter.is_empty() {
            return Err(Error::ConfigValidation {
                message: "sectors.delimiter must not be empty".to_string(),
            });
        }

        if self.store.project_id.trim().is_empty() {
            return Err(Error::ConfigValidation {
                message: "store.project_id must not be empty".to_string(),
            });
        }

        Ok(())
    }

    /// Get the database path, resolving defaults if not set.
    #[must_use]
    pub fn database_path(&self) -> PathBuf {
        self.store
            .database_path
            .clone()
            .unwrap_or_else(|| Self::default_data_dir().join(DATABASE_FILE_NAME))
    }

    /// A copy safe to display: connection values are masked.
    #[must_use]
    pub fn redacted(&self) -> Self {
        let mut config = self.clone();
        for value in config.store.connection.values_mut() {
            *value = "***".to_string();
        }
        config
    }
}
