//! Sync collaborator: commit and push after writes.
//!
//! The store only needs two calls. Absence of a repository or of a remote
//! is reported as `SyncError::NotInitialized` / `SyncError::NoRemote`,
//! which callers downgrade to warnings.

use std::path::{Path, PathBuf};
use std::process::{Command, Output, Stdio};

use tracing::{debug, trace};

use crate::error::{Result, SyncError};

pub trait SyncBackend: Send + Sync {
    /// Stage `paths` (relative to the store root) and commit them.
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<()>;

    fn push(&self) -> Result<()>;
}

/// Does nothing. For stores outside version control.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopSync;

impl SyncBackend for NoopSync {
    fn commit(&self, _paths: &[PathBuf], _message: &str) -> Result<()> {
        Ok(())
    }

    fn push(&self) -> Result<()> {
        Ok(())
    }
}

/// Shells out to the `git` binary in the store directory.
#[derive(Debug, Clone)]
pub struct GitCli {
    dir: PathBuf,
}

impl GitCli {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn git(&self, args: &[&str]) -> Result<Output> {
        let bin = which::which("git").map_err(|_| SyncError::NotInitialized)?;
        trace!(dir = %self.dir.display(), ?args, "running git");
        Command::new(bin)
            .args(args)
            .current_dir(&self.dir)
            .stdin(Stdio::null())
            .output()
            .map_err(|e| SyncError::Failed(e.to_string()).into())
    }

    fn is_repo(&self) -> bool {
        self.dir.join(".git").exists()
            || self
                .git(&["rev-parse", "--is-inside-work-tree"])
                .map(|o| o.status.success())
                .unwrap_or(false)
    }

    fn failed(out: &Output) -> SyncError {
        SyncError::Failed(String::from_utf8_lossy(&out.stderr).trim().to_string())
    }
}

impl SyncBackend for GitCli {
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        if !self.is_repo() {
            return Err(SyncError::NotInitialized.into());
        }

        let mut args: Vec<String> = vec!["add".into(), "--all".into(), "--".into()];
        args.extend(paths.iter().map(|p| p.to_string_lossy().into_owned()));
        let args: Vec<&str> = args.iter().map(String::as_str).collect();
        let out = self.git(&args)?;
        if !out.status.success() {
            return Err(Self::failed(&out).into());
        }

        let out = self.git(&["commit", "--quiet", "-m", message])?;
        if !out.status.success() {
            let stdout = String::from_utf8_lossy(&out.stdout);
            if stdout.contains("nothing to commit") || stdout.contains("nothing added") {
                return Err(SyncError::NothingToCommit.into());
            }
            return Err(Self::failed(&out).into());
        }
        debug!(paths = paths.len(), "committed");
        Ok(())
    }

    fn push(&self) -> Result<()> {
        if !self.is_repo() {
            return Err(SyncError::NotInitialized.into());
        }
        let remotes = self.git(&["remote"])?;
        if String::from_utf8_lossy(&remotes.stdout).trim().is_empty() {
            return Err(SyncError::NoRemote.into());
        }
        let out = self.git(&["push", "--quiet"])?;
        if !out.status.success() {
            return Err(Self::failed(&out).into());
        }
        debug!("pushed");
        Ok(())
    }
}
