//! Everything a command needs: config, backend, root store, options.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::debug;

use crate::cli::prompt::{PromptPassphrase, TerminalConfirm};
use crate::core::cipher::{Cipher, PassphraseSource};
use crate::core::config::Config;
use crate::core::options::{Hooks, OperationOptions};
use crate::core::root::RootStore;
use crate::error::{Result, StoreError};

pub struct Context {
    pub config_path: PathBuf,
    pub config: Config,
    pub crypto: Arc<dyn Cipher>,
    pub root: RootStore,
    pub opts: OperationOptions,
}

impl Context {
    /// Load the config and open every configured store.
    ///
    /// # Errors
    ///
    /// `ConfigError::NotInitialized` without a config file and
    /// `StoreError::NotInitialized` if the root store has no recipients.
    pub fn open(config_flag: Option<PathBuf>) -> Result<Self> {
        let config_path = config_path(config_flag)?;
        let config = Config::load_from(&config_path)?;
        let crypto = config
            .cellar
            .backend
            .open(&Config::keys_dir(&config_path), passphrases())?;
        let root = RootStore::open(&config, crypto.clone(), hooks());
        if !root.root().is_initialized() {
            return Err(StoreError::NotInitialized(config.cellar.path.display().to_string()).into());
        }
        let opts = config.options();
        debug!(config = %config_path.display(), backend = crypto.name(), "context ready");
        Ok(Self {
            config_path,
            config,
            crypto,
            root,
            opts,
        })
    }

    pub fn keys_dir(&self) -> PathBuf {
        Config::keys_dir(&self.config_path)
    }

    pub fn save_config(&self) -> Result<()> {
        self.config.save_to(&self.config_path)
    }
}

/// `--config`/`CELLAR_CONFIG`, else the platform default.
pub fn config_path(flag: Option<PathBuf>) -> Result<PathBuf> {
    match flag {
        Some(path) => Ok(path),
        None => Config::config_path(),
    }
}

pub fn passphrases() -> Arc<dyn PassphraseSource> {
    Arc::new(PromptPassphrase::new())
}

pub fn hooks() -> Hooks {
    Hooks {
        confirm: Arc::new(TerminalConfirm),
        import: Arc::new(TerminalConfirm),
        recipients: None,
    }
}

/// Backend-specific key directory for `backend` under the config's keys dir.
pub fn backend_dir(config_path: &Path, backend: &str) -> PathBuf {
    Config::keys_dir(config_path).join(backend)
}
