//! Consistency checks and repair for a store.
//!
//! The walk is sequential: directories first, then files. For every
//! secret it checks permission bits, shadowing by a more specific mount,
//! that we can decrypt it, and that the recipients embedded in the
//! ciphertext match the declared list. Check mode only reports; force mode
//! fixes without asking; otherwise each fix is confirmed through the
//! confirm hook. A failure on one entry never aborts the walk.

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::path::{Path, PathBuf};

use tracing::{debug, info, warn};
use walkdir::WalkDir;

use super::secrets::{is_hidden, read_secret};
use super::Store;
use crate::core::constants::{DIR_MODE, FILE_MODE, SEP};
use crate::core::fs::{mode, set_mode};
use crate::core::options::OperationOptions;
use crate::error::{CipherError, Error, Result};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FindingKind {
    PermissionWarning,
    ShadowWarning,
    EmptyDirectory,
    RecipientMismatch,
    /// Terminal for the file; never auto-fixed.
    Undecryptable,
    /// The check itself failed (I/O, unreadable header).
    CheckFailed,
}

impl FindingKind {
    pub fn is_error(&self) -> bool {
        matches!(self, Self::Undecryptable | Self::CheckFailed)
    }
}

#[derive(Debug, Clone)]
pub struct Finding {
    /// Logical name, including the mount alias.
    pub name: String,
    pub path: PathBuf,
    pub kind: FindingKind,
    pub message: String,
    pub fixed: bool,
}

impl fmt::Display for Finding {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.name, self.message)?;
        if self.fixed {
            write!(f, " (fixed)")?;
        }
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct FsckReport {
    pub findings: Vec<Finding>,
    /// Secrets examined.
    pub checked: usize,
}

impl FsckReport {
    pub fn errors(&self) -> usize {
        self.findings.iter().filter(|f| f.kind.is_error()).count()
    }

    pub fn warnings(&self) -> usize {
        self.findings.iter().filter(|f| !f.kind.is_error()).count()
    }

    pub fn fixed(&self) -> usize {
        self.findings.iter().filter(|f| f.fixed).count()
    }

    pub fn is_clean(&self) -> bool {
        self.findings.is_empty()
    }

    pub fn merge(&mut self, other: FsckReport) {
        self.findings.extend(other.findings);
        self.checked += other.checked;
    }

    pub fn of_kind(&self, kind: FindingKind) -> impl Iterator<Item = &Finding> {
        self.findings.iter().filter(move |f| f.kind == kind)
    }
}

/// Logical names already claimed, shared across the stores of one run.
#[derive(Debug, Default)]
pub struct Shadows {
    seen: BTreeMap<String, String>,
    mounts: Vec<String>,
}

impl Shadows {
    pub fn new(mounts: impl IntoIterator<Item = String>) -> Self {
        Self {
            seen: BTreeMap::new(),
            mounts: mounts.into_iter().collect(),
        }
    }

    /// Who shadows `name` found in the store mounted at `alias`, if anyone.
    fn check(&mut self, alias: &str, name: &str) -> Option<String> {
        let covering = self
            .mounts
            .iter()
            .filter(|m| m.len() > alias.len() && under(name, m))
            .max_by_key(|m| m.len());
        if let Some(m) = covering {
            return Some(format!("mount {}", m));
        }
        if let Some(owner) = self.seen.get(name) {
            return Some(if owner.is_empty() {
                "root store".to_string()
            } else {
                format!("mount {}", owner)
            });
        }
        self.seen.insert(name.to_string(), alias.to_string());
        None
    }
}

fn under(name: &str, prefix: &str) -> bool {
    name == prefix
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(SEP))
}

/// One fsck pass over one store.
pub struct Fsck<'a> {
    store: &'a Store,
    opts: &'a OperationOptions,
    shadows: &'a mut Shadows,
    report: FsckReport,
    rewritten: Vec<PathBuf>,
    warned_unsupported: bool,
}

impl<'a> Fsck<'a> {
    pub fn new(store: &'a Store, opts: &'a OperationOptions, shadows: &'a mut Shadows) -> Self {
        Self {
            store,
            opts,
            shadows,
            report: FsckReport::default(),
            rewritten: Vec::new(),
            warned_unsupported: false,
        }
    }

    /// Check everything at or below `prefix`.
    pub fn run(mut self, prefix: &str) -> Result<FsckReport> {
        let root = self.store.dir_path(prefix)?;
        info!(alias = %self.store.alias(), path = %root.display(), "checking store");

        let (dirs, files) = self.collect(&root, prefix)?;
        // deepest first, so a parent emptied by a fix is seen as empty too
        for dir in dirs.iter().rev() {
            self.check_dir(dir);
        }
        for file in files {
            self.check_file(&file);
        }

        if !self.opts.check {
            self.update_public_keys();
            if !self.rewritten.is_empty() {
                let paths = std::mem::take(&mut self.rewritten);
                self.store.sync_paths(&paths, "fsck fix", self.opts)?;
            }
        }

        debug!(
            alias = %self.store.alias(),
            checked = self.report.checked,
            errors = self.report.errors(),
            warnings = self.report.warnings(),
            fixed = self.report.fixed(),
            "fsck done"
        );
        Ok(self.report)
    }

    fn collect(&self, root: &Path, prefix: &str) -> Result<(Vec<PathBuf>, Vec<PathBuf>)> {
        let mut dirs = Vec::new();
        let mut files = Vec::new();

        if !prefix.is_empty() {
            let single = self.store.passfile(prefix)?;
            if single.is_file() {
                files.push(single);
            }
        }
        if !root.is_dir() {
            return Ok((dirs, files));
        }

        let walker = WalkDir::new(root)
            .sort_by_file_name()
            .into_iter()
            .filter_entry(|e| e.depth() == 0 || !(e.file_type().is_dir() && is_hidden(e.file_name())));
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if entry.file_type().is_dir() {
                dirs.push(entry.into_path());
            } else if entry.file_type().is_file() {
                files.push(entry.into_path());
            }
        }
        Ok((dirs, files))
    }

    fn logical(&self, name: &str) -> String {
        if self.store.alias().is_empty() {
            name.to_string()
        } else {
            format!("{}{}{}", self.store.alias(), SEP, name)
        }
    }

    fn display_name(&self, path: &Path) -> String {
        let rel = self.store.relative(path);
        self.logical(&rel.to_string_lossy())
    }

    fn record(&mut self, name: String, path: &Path, kind: FindingKind, message: String, fixed: bool) {
        if kind.is_error() {
            warn!(name = %name, message = %message, "fsck error");
        } else {
            debug!(name = %name, message = %message, fixed, "fsck finding");
        }
        self.report.findings.push(Finding {
            name,
            path: path.to_path_buf(),
            kind,
            message,
            fixed,
        });
    }

    /// Whether a fix may be applied now.
    fn approve(&self, prompt: &str) -> bool {
        if self.opts.check || self.opts.cancel.is_cancelled() {
            return false;
        }
        self.opts.force || self.store.hooks().confirm.confirm(prompt)
    }

    fn check_perms(&mut self, path: &Path, mask: u32, want: u32) {
        let current = match mode(path) {
            Ok(Some(m)) => m,
            Ok(None) => return,
            Err(e) => {
                let name = self.display_name(path);
                self.record(name, path, FindingKind::CheckFailed, e.to_string(), false);
                return;
            }
        };
        if current & mask == 0 {
            return;
        }
        let name = self.display_name(path);
        let message = format!("permissions too wide: {:o} (want {:o})", current, want);
        let fixed = self.approve(&format!("Fix permissions on {}?", name))
            && set_mode(path, want)
                .map_err(|e| warn!(path = %path.display(), error = %e, "chmod failed"))
                .is_ok();
        self.record(name, path, FindingKind::PermissionWarning, message, fixed);
    }

    fn check_dir(&mut self, dir: &Path) {
        self.check_perms(dir, 0o077, DIR_MODE);

        if dir == self.store.path() {
            return;
        }
        let empty = fs::read_dir(dir)
            .map(|mut entries| entries.next().is_none())
            .unwrap_or(false);
        if !empty {
            return;
        }
        let name = self.display_name(dir);
        let fixed = self.approve(&format!("Remove empty directory {}?", name))
            && fs::remove_dir(dir).is_ok();
        if fixed {
            self.rewritten.push(dir.to_path_buf());
        }
        self.record(name, dir, FindingKind::EmptyDirectory, "empty directory".to_string(), fixed);
    }

    fn check_file(&mut self, path: &Path) {
        self.check_perms(path, 0o177, FILE_MODE);

        let suffix = format!(".{}", self.store.crypto().ext());
        let Some(name) = self.store.name_of(path, &suffix) else {
            return;
        };
        self.report.checked += 1;
        let logical = self.logical(&name);

        if let Some(by) = self.shadows.check(self.store.alias(), &logical) {
            self.record(
                logical.clone(),
                path,
                FindingKind::ShadowWarning,
                format!("shadowed by {}", by),
                false,
            );
        }

        let ciphertext = match read_secret(path, &name) {
            Ok(c) => c,
            Err(e) => {
                self.record(logical, path, FindingKind::CheckFailed, e.to_string(), false);
                return;
            }
        };

        let plaintext = match self.store.crypto().decrypt(&ciphertext, self.opts) {
            Ok(plain) => Some(plain),
            Err(e) => {
                self.record(
                    logical.clone(),
                    path,
                    FindingKind::Undecryptable,
                    format!("cannot decrypt: {}", e),
                    false,
                );
                None
            }
        };

        let plain = plaintext.as_ref().map(|p| p.as_slice());
        if let Err(e) = self.check_recipients(&name, &logical, path, &ciphertext, plain) {
            self.record(logical, path, FindingKind::CheckFailed, e.to_string(), false);
        }
    }

    fn check_recipients(
        &mut self,
        name: &str,
        logical: &str,
        path: &Path,
        ciphertext: &[u8],
        plaintext: Option<&[u8]>,
    ) -> Result<()> {
        let crypto = self.store.crypto();
        let embedded = match crypto.recipient_ids(ciphertext) {
            Ok(ids) => ids,
            Err(Error::Cipher(CipherError::Unsupported { backend, .. })) => {
                if !self.warned_unsupported {
                    warn!(backend, "backend cannot list recipients, skipping recipient check");
                    self.warned_unsupported = true;
                }
                return Ok(());
            }
            Err(e) => return Err(e),
        };

        let lookup = OperationOptions {
            check_recipients: false,
            ..self.opts.clone()
        };
        let expected = self.store.usable_recipients(name, &lookup)?;
        let ours = crypto.list_private_keys()?;
        let sender = crypto
            .sender_id(ciphertext)?
            .filter(|s| ours.iter().any(|o| o == s));

        let extra: Vec<&String> = embedded
            .iter()
            .filter(|e| !expected.iter().any(|x| same_key(x, e)))
            .filter(|e| sender.as_deref() != Some(e.as_str()))
            .collect();
        let missing: Vec<&String> = expected
            .iter()
            .filter(|x| !embedded.iter().any(|e| same_key(x, e)))
            .collect();
        // only our own entries can be opened, and only once the file decrypts
        let unreadable = match plaintext {
            Some(_) => crypto.unreadable_recipients(ciphertext, self.opts)?,
            None => Vec::new(),
        };
        if extra.is_empty() && missing.is_empty() && unreadable.is_empty() {
            return Ok(());
        }

        let mut parts = Vec::new();
        if !missing.is_empty() {
            parts.push(format!("missing recipients {:?}", missing));
        }
        if !extra.is_empty() {
            parts.push(format!("extra recipients {:?}", extra));
        }
        if !unreadable.is_empty() {
            parts.push(format!("recipients that cannot unwrap their key {:?}", unreadable));
        }
        let message = parts.join(", ");

        let fixed = match plaintext {
            Some(plain) if self.approve(&format!("Re-encrypt {} for its current recipients?", logical)) => {
                let opts = self.opts.clone().without_sync().with_reason("fsck fix recipients");
                match self.store.write_plaintext(name, plain, &opts, false) {
                    Ok(_) => {
                        self.rewritten.push(path.to_path_buf());
                        true
                    }
                    Err(e) => {
                        warn!(name = %logical, error = %e, "failed to re-encrypt");
                        false
                    }
                }
            }
            _ => false,
        };
        self.record(logical.to_string(), path, FindingKind::RecipientMismatch, message, fixed);
        Ok(())
    }

    fn update_public_keys(&mut self) {
        if let Err(e) = self.store.import_missing_public_keys(self.opts) {
            warn!(error = %e, "failed to import public keys");
        }
        match self
            .store
            .recipients("")
            .and_then(|ids| self.store.export_missing_public_keys(&ids))
        {
            Ok(written) => self.rewritten.extend(written),
            Err(e) => warn!(error = %e, "failed to export public keys"),
        }
    }
}

/// Ids refer to the same key if one is a suffix of the other.
fn same_key(a: &str, b: &str) -> bool {
    !a.is_empty() && !b.is_empty() && (a.ends_with(b) || b.ends_with(a))
}

impl Store {
    /// Check (and possibly repair) this store on its own.
    pub fn fsck(&self, prefix: &str, opts: &OperationOptions) -> Result<FsckReport> {
        let mut shadows = Shadows::default();
        Fsck::new(self, opts, &mut shadows).run(prefix)
    }
}
