//! Mounts command.
//!
//! Attach store directories to the namespace and persist the mount table.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use crate::cli::context::{hooks, Context};
use crate::cli::output;
use crate::core::store::Store;
use crate::core::sync::GitCli;
use crate::error::{Result, StoreError};

/// Mount `path` at `alias`, initializing it for `recipients` if needed.
pub fn add(config: Option<PathBuf>, alias: &str, path: &Path, recipients: &[String]) -> Result<()> {
    let mut ctx = Context::open(config)?;
    let path = if path.is_absolute() {
        path.to_path_buf()
    } else {
        std::env::current_dir()?.join(path)
    };

    let store = Store::new(alias, &path, ctx.crypto.clone(), Arc::new(GitCli::new(&path)), hooks());
    if !store.is_initialized() {
        if recipients.is_empty() {
            return Err(StoreError::NotInitialized(path.display().to_string()).into());
        }
        store.init(recipients, &ctx.opts)?;
        output::success(&format!("initialized store at {}", output::path(path.display())));
    }

    ctx.root.add_mount(alias, store)?;
    ctx.config.add_mount(alias, &path)?;
    ctx.save_config()?;
    output::success(&format!("mounted {} at {}", output::path(path.display()), output::name(alias)));
    Ok(())
}

/// Remove a mount from the table. The store directory is left untouched.
pub fn rm(config: Option<PathBuf>, alias: &str) -> Result<()> {
    let mut ctx = Context::open(config)?;
    if !ctx.config.remove_mount(alias) {
        return Err(StoreError::MountNotFound(alias.to_string()).into());
    }
    ctx.save_config()?;
    output::success(&format!("unmounted {}", output::name(alias)));
    Ok(())
}

pub fn ls(config: Option<PathBuf>) -> Result<()> {
    let ctx = Context::open(config)?;
    let mounts = ctx.root.mounts();
    if mounts.is_empty() {
        output::dimmed("no mounts");
        return Ok(());
    }
    for (alias, path) in mounts {
        println!("{} => {}", alias, path.display());
    }
    Ok(())
}
