//! Secret CRUD on a single store.

use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};
use walkdir::WalkDir;
use zeroize::Zeroizing;

use super::{clean_name, clean_prefix, Store};
use crate::core::cipher::KeyStatus;
use crate::core::constants::SEP;
use crate::core::fs::atomic_write;
use crate::core::options::OperationOptions;
use crate::core::secret::Secret;
use crate::error::{CipherError, Context, Result, SecretError, StoreError};

impl Store {
    /// Read and decrypt a secret.
    pub fn get(&self, name: &str, opts: &OperationOptions) -> Result<Secret> {
        let plaintext = self.read_plaintext(name, opts)?;
        let (secret, err) = Secret::parse(&plaintext);
        if let Some(e) = err {
            debug!(name = %name, error = %e, "secret body is not valid YAML");
        }
        Ok(secret)
    }

    /// Encrypt and write a secret for the usable recipients of its scope.
    pub fn set(&self, name: &str, secret: &Secret, opts: &OperationOptions) -> Result<()> {
        self.write(name, secret, opts, false)
    }

    /// Like [`set`](Self::set), but lets the recipient review hook veto or
    /// edit the recipient list first.
    pub fn set_confirm(&self, name: &str, secret: &Secret, opts: &OperationOptions) -> Result<()> {
        self.write(name, secret, opts, true)
    }

    fn write(&self, name: &str, secret: &Secret, opts: &OperationOptions, review: bool) -> Result<()> {
        let name = clean_name(name)?;
        let plaintext = Zeroizing::new(secret.to_bytes());
        let path = self.write_plaintext(&name, &plaintext, opts, review)?;
        self.sync_paths(&[path], &format!("Save secret to {}: {}", name, opts.reason), opts)
    }

    /// Encrypt `plaintext` as is for the recipients of `name` and write it.
    /// Does not sync.
    pub(crate) fn write_plaintext(
        &self,
        name: &str,
        plaintext: &[u8],
        opts: &OperationOptions,
        review: bool,
    ) -> Result<PathBuf> {
        let name = clean_name(name)?;
        let path = self.passfile(&name)?;

        let mut recipients = self.usable_recipients(&name, opts)?;
        if review {
            if let Some(hook) = &self.hooks.recipients {
                recipients = hook.review(&name, recipients).context("set", &name)?;
            }
        }
        if recipients.is_empty() {
            return Err(CipherError::NoRecipients).context("set", &name);
        }

        opts.cancel.check()?;
        let ciphertext = self
            .crypto
            .encrypt(plaintext, &recipients, opts)
            .context("set", &name)?;

        // a cancelled unlock must not leave anything on disk
        opts.cancel.check()?;
        atomic_write(&path, &ciphertext).context("set", &name)?;
        debug!(name = %name, recipients = recipients.len(), "wrote secret");
        Ok(path)
    }

    /// Decrypted bytes of `name`, exactly as stored.
    pub(crate) fn read_plaintext(&self, name: &str, opts: &OperationOptions) -> Result<Zeroizing<Vec<u8>>> {
        let path = self.passfile(name)?;
        let ciphertext = read_secret(&path, name)?;
        self.crypto.decrypt(&ciphertext, opts).context("get", name)
    }

    /// Re-encrypt `name` for its current recipients without touching the
    /// plaintext. Does not sync.
    pub fn reencrypt_one(&self, name: &str, opts: &OperationOptions) -> Result<PathBuf> {
        let plaintext = self.read_plaintext(name, opts)?;
        self.write_plaintext(name, &plaintext, opts, false)
    }

    /// Recipients a write to `name` is encrypted for.
    ///
    /// Keys the backend knows to be expired or revoked are dropped; with
    /// `check_recipients`, so are keys it doesn't know at all. Our own key
    /// is added if the scope doesn't list it, so we can read back.
    pub fn usable_recipients(&self, name: &str, opts: &OperationOptions) -> Result<Vec<String>> {
        let declared = self.recipients(name)?;
        let mut usable: Vec<String> = declared
            .into_iter()
            .filter(|id| match self.crypto.key_status(id) {
                KeyStatus::Usable => true,
                KeyStatus::Unusable(reason) => {
                    warn!(recipient = %id, reason = %reason, "skipping unusable recipient");
                    false
                }
                KeyStatus::Unknown if opts.check_recipients => {
                    warn!(recipient = %id, "skipping recipient without a local public key");
                    false
                }
                KeyStatus::Unknown => true,
            })
            .collect();

        if let Some(ours) = self.our_key_id()? {
            if !usable.contains(&ours) {
                usable.push(ours);
            }
        }
        usable.sort();
        usable.dedup();
        Ok(usable)
    }

    /// Remove one secret.
    pub fn delete(&self, name: &str, opts: &OperationOptions) -> Result<()> {
        let name = clean_name(name)?;
        let path = self.passfile(&name)?;
        match fs::remove_file(&path) {
            Ok(()) => {}
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(SecretError::NotFound(name.clone())).context("delete", &name)
            }
            Err(e) => return Err(e).context("delete", &name),
        }
        self.remove_empty_parents(&path);
        debug!(name = %name, "deleted secret");
        self.sync_paths(&[path], &format!("Remove {} from store.", name), opts)
    }

    /// Remove a whole subtree (and a secret of the same name, if any).
    pub fn prune(&self, name: &str, opts: &OperationOptions) -> Result<()> {
        let name = clean_name(name)?;
        let dir = self.dir_path(&name)?;
        let file = self.passfile(&name)?;

        let mut removed = Vec::new();
        if dir.is_dir() {
            fs::remove_dir_all(&dir).context("prune", &name)?;
            removed.push(dir.clone());
        }
        if file.is_file() {
            fs::remove_file(&file).context("prune", &name)?;
            removed.push(file.clone());
        }
        if removed.is_empty() {
            return Err(SecretError::NotFound(name.clone())).context("prune", &name);
        }
        self.remove_empty_parents(&dir);
        debug!(name = %name, "pruned");
        self.sync_paths(&removed, &format!("Remove {} from store.", name), opts)
    }

    fn remove_empty_parents(&self, path: &Path) {
        let mut dir = path.parent();
        while let Some(d) = dir {
            if d == self.path || !d.starts_with(&self.path) {
                break;
            }
            // fails (and stops) on the first non-empty directory
            if fs::remove_dir(d).is_err() {
                break;
            }
            dir = d.parent();
        }
    }

    /// Sorted secret names equal to or below `prefix`.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = clean_prefix(prefix)?;
        if !self.path.is_dir() {
            return Ok(Vec::new());
        }
        let suffix = format!(".{}", self.crypto.ext());

        let mut names = Vec::new();
        let walker = WalkDir::new(&self.path)
            .min_depth(1)
            .into_iter()
            .filter_entry(|e| !is_hidden(e.file_name()));
        for entry in walker {
            let entry = entry.map_err(std::io::Error::from)?;
            if !entry.file_type().is_file() {
                continue;
            }
            let Some(name) = self.name_of(entry.path(), &suffix) else {
                continue;
            };
            if prefix.is_empty() || name == prefix || name.starts_with(&format!("{prefix}{SEP}")) {
                names.push(name);
            }
        }
        names.sort();
        Ok(names)
    }

    /// Logical name of a secret file, if `path` is one.
    pub(crate) fn name_of(&self, path: &Path, suffix: &str) -> Option<String> {
        let rel = path.strip_prefix(&self.path).ok()?;
        let rel = rel
            .components()
            .map(|c| c.as_os_str().to_string_lossy())
            .collect::<Vec<_>>()
            .join(&SEP.to_string());
        rel.strip_suffix(suffix).map(str::to_string)
    }

    pub fn is_dir(&self, name: &str) -> bool {
        match clean_name(name) {
            Ok(name) => self.path.join(name).is_dir(),
            Err(_) => false,
        }
    }

    pub fn exists(&self, name: &str) -> bool {
        self.passfile(name).map(|p| p.is_file()).unwrap_or(false)
    }

    /// Decrypt `from` here and re-encrypt it as `to` in `dst` (possibly
    /// this same store) for the destination's recipients.
    pub fn copy_to(&self, from: &str, dst: &Store, to: &str, opts: &OperationOptions) -> Result<()> {
        if self.is_dir(from) && !self.exists(from) {
            return Err(StoreError::IsADirectory(from.to_string())).context("copy", from);
        }
        let plaintext = self.read_plaintext(from, opts)?;
        let to = clean_name(to)?;
        let path = dst.write_plaintext(&to, &plaintext, opts, false)?;
        dst.sync_paths(&[path], &format!("Copied from {} to {}", from, to), opts)
    }

    /// [`copy_to`](Self::copy_to), then delete the source.
    pub fn move_to(&self, from: &str, dst: &Store, to: &str, opts: &OperationOptions) -> Result<()> {
        self.copy_to(from, dst, to, opts)?;
        self.delete(from, opts).context("move", from)
    }

    pub fn copy(&self, from: &str, to: &str, opts: &OperationOptions) -> Result<()> {
        self.copy_to(from, self, to, opts)
    }

    pub fn rename(&self, from: &str, to: &str, opts: &OperationOptions) -> Result<()> {
        self.move_to(from, self, to, opts)
    }
}

pub(crate) fn is_hidden(name: &std::ffi::OsStr) -> bool {
    name.to_string_lossy().starts_with('.')
}

pub(crate) fn read_secret(path: &Path, name: &str) -> Result<Vec<u8>> {
    match fs::read(path) {
        Ok(buf) => Ok(buf),
        Err(e) if e.kind() == ErrorKind::NotFound => {
            Err(SecretError::NotFound(name.to_string())).context("get", name)
        }
        Err(e) => Err(e).context("get", name),
    }
}
