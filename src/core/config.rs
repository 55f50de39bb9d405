//! Configuration file management.
//!
//! Reads and writes `config.toml` under the platform config directory
//! (`CELLAR_CONFIG` points at a different file). Backend keyrings live in a
//! `keys/` directory next to the config file.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::debug;

use crate::core::cipher::CipherBackend;
use crate::core::constants::{APP_DIR, CONFIG_FILE};
use crate::core::fs::atomic_write;
use crate::core::options::OperationOptions;
use crate::core::store::clean_name;
use crate::core::types::MountAlias;
use crate::error::{ConfigError, Result};

/// Environment variable overriding the config file location.
pub const CONFIG_ENV: &str = "CELLAR_CONFIG";

/// Cellar configuration stored in `config.toml`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    pub cellar: Meta,
    /// Mount alias to store directory.
    #[serde(default)]
    pub mounts: BTreeMap<MountAlias, PathBuf>,
}

/// The `[cellar]` section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Meta {
    pub version: String,
    /// Root store directory.
    pub path: PathBuf,
    #[serde(default)]
    pub backend: CipherBackend,
    #[serde(default = "default_true")]
    pub autosync: bool,
    /// Workers for re-encryption and audit.
    #[serde(default = "default_concurrency")]
    pub concurrency: usize,
    #[serde(default)]
    pub check_recipients: bool,
}

fn default_true() -> bool {
    true
}

fn default_concurrency() -> usize {
    1
}

impl Config {
    /// A fresh configuration for a root store at `path`.
    pub fn new(path: impl Into<PathBuf>, backend: CipherBackend) -> Self {
        Self {
            cellar: Meta {
                version: env!("CARGO_PKG_VERSION").to_string(),
                path: path.into(),
                backend,
                autosync: true,
                concurrency: default_concurrency(),
                check_recipients: false,
            },
            mounts: BTreeMap::new(),
        }
    }

    /// Location of the config file.
    pub fn config_path() -> Result<PathBuf> {
        if let Some(path) = std::env::var_os(CONFIG_ENV) {
            return Ok(PathBuf::from(path));
        }
        dirs::config_dir()
            .map(|d| d.join(APP_DIR).join(CONFIG_FILE))
            .ok_or_else(|| ConfigError::NoConfigDir.into())
    }

    /// Directory holding backend keyrings for the config at `config_path`.
    pub fn keys_dir(config_path: &Path) -> PathBuf {
        config_path
            .parent()
            .unwrap_or_else(|| Path::new("."))
            .join("keys")
    }

    /// Default root store directory.
    pub fn default_store_path() -> Result<PathBuf> {
        dirs::data_dir()
            .map(|d| d.join(APP_DIR).join("store"))
            .ok_or_else(|| ConfigError::NoConfigDir.into())
    }

    pub fn exists() -> bool {
        Self::config_path().map(|p| p.is_file()).unwrap_or(false)
    }

    /// Load from the default location.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError::NotInitialized` if the file doesn't exist,
    /// or `ConfigError::Parse` if the TOML is malformed.
    pub fn load() -> Result<Self> {
        Self::load_from(&Self::config_path()?)
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        debug!(path = %path.display(), "loading config");

        if !path.exists() {
            return Err(ConfigError::NotInitialized.into());
        }
        let contents = std::fs::read_to_string(path).map_err(ConfigError::ReadFile)?;
        let config: Self = toml::from_str(&contents).map_err(ConfigError::Parse)?;
        config.validate()?;

        debug!(
            backend = %config.cellar.backend,
            mounts = config.mounts.len(),
            "config loaded"
        );
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        self.save_to(&Self::config_path()?)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        debug!(path = %path.display(), "saving config");
        let contents = toml::to_string_pretty(self).map_err(ConfigError::Serialize)?;
        atomic_write(path, contents.as_bytes())
    }

    /// Validate mount aliases and paths.
    pub fn validate(&self) -> Result<()> {
        for alias in self.mounts.keys() {
            validate_alias(alias)?;
        }
        if self.cellar.concurrency == 0 {
            return Err(ConfigError::InvalidValue {
                field: "concurrency",
                reason: "must be at least 1".to_string(),
            }
            .into());
        }
        Ok(())
    }

    pub fn add_mount(&mut self, alias: &str, path: impl Into<PathBuf>) -> Result<()> {
        let alias = validate_alias(alias)?;
        self.mounts.insert(alias, path.into());
        Ok(())
    }

    /// Returns whether the alias was present.
    pub fn remove_mount(&mut self, alias: &str) -> bool {
        self.mounts.remove(alias.trim_end_matches('/')).is_some()
    }

    /// Operation defaults from this configuration.
    pub fn options(&self) -> OperationOptions {
        OperationOptions {
            autosync: self.cellar.autosync,
            concurrency: self.cellar.concurrency,
            check_recipients: self.cellar.check_recipients,
            ..OperationOptions::default()
        }
    }
}

/// Mount aliases are non-empty relative names without `.`/`..` parts.
fn validate_alias(alias: &str) -> Result<String> {
    clean_name(alias).map_err(|_| ConfigError::InvalidMount(alias.to_string()).into())
}
