//! Init command.
//!
//! Writes the config, creates a first key unless recipients are given and
//! initializes the root store. An already initialized store directory is
//! adopted as is.

use std::path::PathBuf;
use std::sync::Arc;

use tracing::info;

use crate::cli::context::{config_path, hooks, passphrases};
use crate::cli::{keys, output};
use crate::core::cipher::CipherBackend;
use crate::core::config::Config;
use crate::core::store::Store;
use crate::core::sync::GitCli;
use crate::error::{ConfigError, Result};

pub fn execute(
    config: Option<PathBuf>,
    path: Option<PathBuf>,
    backend: CipherBackend,
    mut recipients: Vec<String>,
    name: Option<String>,
    email: Option<String>,
) -> Result<()> {
    let config_path = config_path(config)?;
    if config_path.exists() {
        return Err(ConfigError::AlreadyInitialized(config_path.display().to_string()).into());
    }

    let store_path = match path {
        Some(p) => p,
        None => Config::default_store_path()?,
    };
    let cfg = Config::new(&store_path, backend);

    let crypto = backend.open(&Config::keys_dir(&config_path), passphrases())?;
    let store = Store::new("", &store_path, crypto, Arc::new(GitCli::new(&store_path)), hooks());

    if store.is_initialized() {
        output::warn(&format!(
            "{} is already a store; keeping its recipients",
            output::path(store_path.display())
        ));
    } else {
        if recipients.is_empty() {
            recipients.push(keys::create_key(&config_path, backend, name, email)?);
        }
        store.init(&recipients, &cfg.options())?;
    }
    cfg.save_to(&config_path)?;
    info!(path = %store_path.display(), backend = %backend, "initialized cellar");

    output::success("cellar initialized");
    output::kv("store: ", output::path(store_path.display()));
    output::kv("config:", output::path(config_path.display()));
    output::kv("backend:", backend);
    for r in store.recipients("")? {
        output::kv("recipient:", r);
    }
    output::hint("next: cellar insert <name>");
    Ok(())
}
