//! Sub-store: one directory-rooted, encrypted name → secret namespace.
//!
//! A secret `db/prod` lives at `<path>/db/prod.<ext>`, encrypted for the
//! recipients listed in the nearest `.cellar-id` at or above it. Every
//! mutation is written atomically and then handed to the sync collaborator.
//!
//! Operations are split across submodules:
//! - `secrets`: get/set/delete/prune/list/copy/move
//! - `recipients`: recipient lists, key bundling, re-encryption
//! - `fsck`: consistency checks and repair

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, warn};

use crate::core::cipher::Cipher;
use crate::core::constants::{ID_FILE, SEP};
use crate::core::options::{Hooks, OperationOptions};
use crate::core::sync::SyncBackend;
use crate::error::{Error, Result, StoreError, SyncError};

pub mod fsck;
mod recipients;
mod secrets;

pub use fsck::{Finding, FindingKind, Fsck, FsckReport};

pub struct Store {
    alias: String,
    path: PathBuf,
    crypto: Arc<dyn Cipher>,
    sync: Arc<dyn SyncBackend>,
    hooks: Hooks,
}

impl Store {
    pub fn new(
        alias: impl Into<String>,
        path: impl Into<PathBuf>,
        crypto: Arc<dyn Cipher>,
        sync: Arc<dyn SyncBackend>,
        hooks: Hooks,
    ) -> Self {
        let alias = alias.into();
        let path = path.into();
        debug!(alias = %alias, path = %path.display(), backend = crypto.name(), "opened store");
        Self {
            alias,
            path,
            crypto,
            sync,
            hooks,
        }
    }

    /// Mount alias; empty for the root store.
    pub fn alias(&self) -> &str {
        &self.alias
    }

    /// Rename the mount alias this store answers to.
    pub(crate) fn set_alias(&mut self, alias: impl Into<String>) {
        self.alias = alias.into();
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn crypto(&self) -> &Arc<dyn Cipher> {
        &self.crypto
    }

    pub fn hooks(&self) -> &Hooks {
        &self.hooks
    }

    pub fn is_initialized(&self) -> bool {
        self.path.join(ID_FILE).is_file()
    }

    /// Create the store directory and its top-level recipient list.
    pub fn init(&self, recipients: &[String], opts: &OperationOptions) -> Result<()> {
        if self.is_initialized() {
            return Err(StoreError::AlreadyInitialized(self.path.display().to_string()).into());
        }
        crate::core::fs::ensure_dir(&self.path)?;
        self.save_recipients(recipients, "Initialized store", opts)?;
        debug!(alias = %self.alias, recipients = recipients.len(), "initialized store");
        Ok(())
    }

    /// On-disk file for a secret.
    pub fn passfile(&self, name: &str) -> Result<PathBuf> {
        let name = clean_name(name)?;
        let path = self.path.join(format!("{}.{}", name, self.crypto.ext()));
        if !path.starts_with(&self.path) {
            return Err(StoreError::PathTraversal(name).into());
        }
        Ok(path)
    }

    /// Directory for a (possibly empty) name prefix.
    pub(crate) fn dir_path(&self, prefix: &str) -> Result<PathBuf> {
        let prefix = clean_prefix(prefix)?;
        Ok(if prefix.is_empty() {
            self.path.clone()
        } else {
            self.path.join(prefix)
        })
    }

    /// `path` relative to the store root, for the sync collaborator.
    pub(crate) fn relative(&self, path: &Path) -> PathBuf {
        path.strip_prefix(&self.path).unwrap_or(path).to_path_buf()
    }

    /// Commit `paths` and push, unless autosync is off.
    ///
    /// A missing repository or remote only logs a warning.
    pub(crate) fn sync_paths(&self, paths: &[PathBuf], message: &str, opts: &OperationOptions) -> Result<()> {
        if !opts.autosync {
            debug!(alias = %self.alias, "autosync disabled, not committing");
            return Ok(());
        }

        let rel: Vec<PathBuf> = paths.iter().map(|p| self.relative(p)).collect();
        match self.sync.commit(&rel, message) {
            Ok(()) => {}
            Err(Error::Sync(SyncError::NothingToCommit)) => {
                debug!("nothing to commit");
            }
            Err(e) if e.is_soft_sync() => {
                warn!(alias = %self.alias, error = %e, "not committing");
                return Ok(());
            }
            Err(e) => return Err(e),
        }

        match self.sync.push() {
            Ok(()) => Ok(()),
            Err(e) if e.is_soft_sync() => {
                warn!(alias = %self.alias, error = %e, "not pushing");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }
}

impl fmt::Debug for Store {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Store")
            .field("alias", &self.alias)
            .field("path", &self.path)
            .field("backend", &self.crypto.name())
            .finish()
    }
}

/// Validate a secret name: relative, `/`-separated, no `.`/`..` or empty
/// components. A trailing separator is dropped.
pub fn clean_name(name: &str) -> Result<String> {
    let name = clean_prefix(name)?;
    if name.is_empty() {
        return Err(StoreError::InvalidName(name).into());
    }
    Ok(name)
}

/// Like [`clean_name`] but allows the empty name (the store root).
pub fn clean_prefix(name: &str) -> Result<String> {
    if name.starts_with(SEP) || name.starts_with('\\') || Path::new(name).is_absolute() {
        return Err(StoreError::PathTraversal(name.to_string()).into());
    }
    let trimmed = name.trim_end_matches(SEP);
    if trimmed.is_empty() {
        return Ok(String::new());
    }
    for part in trimmed.split(SEP) {
        match part {
            "." | ".." => return Err(StoreError::PathTraversal(name.to_string()).into()),
            "" => return Err(StoreError::InvalidName(name.to_string()).into()),
            p if p.contains('\\') || p.contains('\0') => {
                return Err(StoreError::PathTraversal(name.to_string()).into())
            }
            _ => {}
        }
    }
    Ok(trimmed.to_string())
}
