//! Recipient lists, bundled public keys and re-encryption.
//!
//! A recipient list is a `.cellar-id` file, one key id per line, sorted
//! and de-duplicated on write. The list for a secret is the one in the
//! nearest directory at or above it; the top-level list is the store's.
//!
//! Public keys of all recipients are exported to `.public-keys/<id>` so
//! other members can import them without a key server.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use tracing::{debug, info, warn};

use super::Store;
use crate::core::constants::{ID_FILE, KEY_DIR, MAX_ID_FILE_DEPTH};
use crate::core::fs::atomic_write;
use crate::core::options::OperationOptions;
use crate::error::{CipherError, Context, Error, Result, StoreError};

impl Store {
    /// The id file governing `name`.
    pub(crate) fn id_file(&self, name: &str) -> Result<PathBuf> {
        let mut dir = self.dir_path(name)?;
        for _ in 0..MAX_ID_FILE_DEPTH {
            if dir == self.path || !dir.starts_with(&self.path) {
                break;
            }
            let candidate = dir.join(ID_FILE);
            if candidate.is_file() {
                return Ok(candidate);
            }
            match dir.parent() {
                Some(parent) => dir = parent.to_path_buf(),
                None => break,
            }
        }
        Ok(self.path.join(ID_FILE))
    }

    /// Recipients for `name` (the empty name gives the store's own list).
    pub fn recipients(&self, name: &str) -> Result<Vec<String>> {
        let file = self.id_file(name)?;
        read_id_file(&file)
    }

    /// Overwrite the store's top-level recipient list.
    ///
    /// # Errors
    ///
    /// Returns `StoreError::LastRecipient` for an empty list; nothing is
    /// written in that case.
    pub fn save_recipients(&self, ids: &[String], message: &str, opts: &OperationOptions) -> Result<()> {
        self.save_recipients_at("", ids, message, opts)
    }

    /// Write a recipient list scoped to the directory `dir`.
    pub fn save_recipients_at(
        &self,
        dir: &str,
        ids: &[String],
        message: &str,
        opts: &OperationOptions,
    ) -> Result<()> {
        let mut ids: Vec<String> = ids
            .iter()
            .map(|s| s.trim().to_string())
            .filter(|s| !s.is_empty())
            .collect();
        ids.sort();
        ids.dedup();
        if ids.is_empty() {
            return Err(StoreError::LastRecipient.into());
        }

        opts.cancel.check()?;
        let file = self.dir_path(dir)?.join(ID_FILE);
        let mut content = ids.join("\n");
        content.push('\n');
        atomic_write(&file, content.as_bytes()).context("save recipients", dir)?;

        let mut paths = vec![file];
        paths.extend(self.export_missing_public_keys(&ids)?);
        debug!(alias = %self.alias, dir = %dir, recipients = ids.len(), "saved recipients");

        self.sync_paths(&paths, message, opts)
    }

    /// Add `id` to the store's list and re-encrypt everything.
    ///
    /// `id` may be a unique suffix of a known key; the full id is stored.
    pub fn add_recipient(&self, id: &str, opts: &OperationOptions) -> Result<()> {
        let mut current = self.recipients("")?;
        if current.iter().any(|r| r == id) {
            return Err(StoreError::RecipientExists(id.to_string()).into());
        }

        let mut found = self.crypto.find_public_keys(&[id.to_string()])?;
        if found.is_empty() {
            self.import_missing_public_keys(opts)?;
            found = self.crypto.find_public_keys(&[id.to_string()])?;
        }
        let full = match found.as_slice() {
            [one] => one.clone(),
            [] => return Err(CipherError::PublicKeyMissing(id.to_string()).into()),
            _ if found.iter().any(|f| f == id) => id.to_string(),
            _ => {
                return Err(CipherError::InvalidPublicKey(format!(
                    "{id} is ambiguous ({} matches)",
                    found.len()
                ))
                .into())
            }
        };
        if current.contains(&full) {
            return Err(StoreError::RecipientExists(full).into());
        }

        current.push(full.clone());
        self.save_recipients(&current, &format!("Added recipient {}", full), opts)?;
        info!(alias = %self.alias, recipient = %full, "added recipient");

        self.reencrypt(&opts.clone().with_reason(format!("Re-encrypted for new recipient {}", full)))
    }

    /// Remove `id` (or the single recipient it is a suffix of) and
    /// re-encrypt everything. Removing the last recipient is rejected.
    pub fn remove_recipient(&self, id: &str, opts: &OperationOptions) -> Result<()> {
        let current = self.recipients("")?;
        let target = if current.iter().any(|r| r == id) {
            id.to_string()
        } else {
            let matches: Vec<&String> = current
                .iter()
                .filter(|r| !id.is_empty() && r.ends_with(id))
                .collect();
            match matches.as_slice() {
                [one] => (*one).clone(),
                _ => return Err(StoreError::RecipientNotFound(id.to_string()).into()),
            }
        };

        let remaining: Vec<String> = current.into_iter().filter(|r| *r != target).collect();
        if remaining.is_empty() {
            return Err(StoreError::LastRecipient.into());
        }

        self.save_recipients(&remaining, &format!("Removed recipient {}", target), opts)?;
        let key_file = self.path.join(KEY_DIR).join(&target);
        match fs::remove_file(&key_file) {
            Ok(()) => self.sync_paths(&[key_file], &format!("Removed public key {}", target), opts)?,
            Err(e) if e.kind() == ErrorKind::NotFound => {}
            Err(e) => warn!(path = %key_file.display(), error = %e, "failed to remove exported key"),
        }
        info!(alias = %self.alias, recipient = %target, "removed recipient");

        self.reencrypt(&opts.clone().with_reason(format!("Re-encrypted without recipient {}", target)))
    }

    /// First store recipient we hold a private key for.
    pub fn our_key_id(&self) -> Result<Option<String>> {
        let private = self.crypto.list_private_keys()?;
        Ok(self
            .recipients("")?
            .into_iter()
            .find(|r| private.iter().any(|p| p == r || (!r.is_empty() && p.ends_with(r.as_str())))))
    }

    /// Export public keys of `ids` that aren't bundled yet. Returns the
    /// files written.
    pub fn export_missing_public_keys(&self, ids: &[String]) -> Result<Vec<PathBuf>> {
        let dir = self.path.join(KEY_DIR);
        let mut written = Vec::new();
        for id in ids {
            let file = dir.join(id);
            if file.exists() || !super::clean_name(id).is_ok_and(|n| !n.contains('/')) {
                continue;
            }
            match self.crypto.export_public_key(id) {
                Ok(buf) => {
                    atomic_write(&file, &buf)?;
                    debug!(recipient = %id, "exported public key");
                    written.push(file);
                }
                Err(e) => warn!(recipient = %id, error = %e, "failed to export public key"),
            }
        }
        Ok(written)
    }

    /// Import bundled public keys the backend doesn't know yet, each after
    /// confirmation by the import hook. Returns how many were imported.
    pub fn import_missing_public_keys(&self, opts: &OperationOptions) -> Result<usize> {
        let dir = self.path.join(KEY_DIR);
        let entries = match fs::read_dir(&dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(0),
            Err(e) => return Err(e.into()),
        };
        let known = self.crypto.list_public_keys()?;

        let mut imported = 0;
        for entry in entries {
            opts.cancel.check()?;
            let entry = entry?;
            let id = entry.file_name().to_string_lossy().into_owned();
            if id.starts_with('.') || known.contains(&id) {
                continue;
            }
            if !self.hooks.import.confirm(&format!("Import public key {}?", id)) {
                debug!(recipient = %id, "import declined");
                continue;
            }
            match fs::read(entry.path())
                .map_err(Error::from)
                .and_then(|buf| self.crypto.import_public_key(&buf))
            {
                Ok(fp) => {
                    info!(recipient = %fp, "imported public key");
                    imported += 1;
                }
                Err(e) => warn!(recipient = %id, error = %e, "failed to import public key"),
            }
        }
        Ok(imported)
    }

    /// Rewrite every secret for its current recipients.
    ///
    /// Workers run with sync disabled; one commit and push follows once
    /// the last secret has been written.
    pub fn reencrypt(&self, opts: &OperationOptions) -> Result<()> {
        let names = self.list("")?;
        let workers = opts.concurrency.max(1).min(names.len().max(1));
        let inner = opts.clone().without_sync();
        debug!(alias = %self.alias, secrets = names.len(), workers, "re-encrypting");

        let queue = Mutex::new(names.iter());
        let failures: Mutex<Vec<(String, Error)>> = Mutex::new(Vec::new());

        std::thread::scope(|scope| {
            for _ in 0..workers {
                scope.spawn(|| loop {
                    let next = match queue.lock() {
                        Ok(mut it) => it.next(),
                        Err(_) => None,
                    };
                    let Some(name) = next else { break };
                    if inner.cancel.is_cancelled() {
                        break;
                    }
                    let result = self.reencrypt_one(name, &inner);
                    if let Err(e) = result {
                        warn!(name = %name, error = %e, "failed to re-encrypt");
                        if let Ok(mut f) = failures.lock() {
                            f.push((name.clone(), e));
                        }
                    }
                });
            }
        });
        inner.cancel.check()?;

        let paths: Vec<PathBuf> = names
            .iter()
            .filter_map(|n| self.passfile(n).ok())
            .collect();
        self.sync_paths(&paths, &opts.reason, opts)?;

        let mut failures = failures.into_inner().unwrap_or_else(|p| p.into_inner());
        failures.sort_by(|a, b| a.0.cmp(&b.0));
        match failures.into_iter().next() {
            Some((name, e)) => Err(Error::Op {
                op: "reencrypt",
                name,
                source: Box::new(e),
            }),
            None => Ok(()),
        }
    }
}

fn read_id_file(path: &Path) -> Result<Vec<String>> {
    let content = match fs::read_to_string(path) {
        Ok(c) => c,
        Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
        Err(e) => return Err(e.into()),
    };
    let mut ids: Vec<String> = content
        .lines()
        .map(|l| l.split('#').next().unwrap_or("").trim().to_string())
        .filter(|l| !l.is_empty())
        .collect();
    ids.sort();
    ids.dedup();
    Ok(ids)
}
