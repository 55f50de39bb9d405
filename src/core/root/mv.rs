//! Copy and move across the whole namespace.
//!
//! Secrets are always decrypted at the source and re-encrypted for the
//! destination's recipients, never byte-copied. A directory source is
//! handled entry by entry. Each touched store is synced once at the end.

use std::collections::BTreeMap;
use std::path::PathBuf;

use tracing::debug;

use super::{is_under, join, RootStore};
use crate::core::constants::SEP;
use crate::core::options::OperationOptions;
use crate::core::store::{clean_name, clean_prefix};
use crate::error::{Context, Result, SecretError};

impl RootStore {
    /// Copy a secret or a whole directory.
    pub fn copy(&self, from: &str, to: &str, opts: &OperationOptions) -> Result<()> {
        self.transfer(from, to, opts, false)
    }

    /// Move a secret or a whole directory.
    pub fn rename(&self, from: &str, to: &str, opts: &OperationOptions) -> Result<()> {
        self.transfer(from, to, opts, true)
    }

    fn transfer(&self, from: &str, to: &str, opts: &OperationOptions, remove: bool) -> Result<()> {
        let op = if remove { "move" } else { "copy" };
        let src = clean_name(from)?;
        let into_dir = to.ends_with(SEP);
        let dst = clean_prefix(to)?;
        let dst_is_dir = into_dir || dst.is_empty() || (self.is_dir(&dst) && !self.exists(&dst));

        let pairs = self.plan(&src, &dst, dst_is_dir).context(op, &src)?;
        debug!(from = %src, to = %dst, entries = pairs.len(), op, "transfer");

        let inner = opts.clone().without_sync();
        let mut touched: BTreeMap<String, Vec<PathBuf>> = BTreeMap::new();
        for (from, to) in &pairs {
            if from == to {
                return Err(SecretError::AlreadyExists(to.clone())).context(op, from);
            }
            if self.exists(to)
                && !opts.force
                && !self.root().hooks().confirm.confirm(&format!("{} exists. Overwrite it?", to))
            {
                return Err(SecretError::AlreadyExists(to.clone())).context(op, from);
            }

            let (src_store, src_rel) = self.get_store(from)?;
            let (dst_store, dst_rel) = self.get_store(to)?;
            let reason = format!("{} from {} to {}", if remove { "Moved" } else { "Copied" }, from, to);
            src_store.copy_to(&src_rel, dst_store, &dst_rel, &inner.clone().with_reason(reason))?;
            touched
                .entry(dst_store.alias().to_string())
                .or_default()
                .push(dst_store.passfile(&dst_rel)?);

            if remove {
                src_store.delete(&src_rel, &inner)?;
                touched
                    .entry(src_store.alias().to_string())
                    .or_default()
                    .push(src_store.passfile(&src_rel)?);
            }
        }

        let message = format!("{} from {} to {}", if remove { "Moved" } else { "Copied" }, src, dst);
        for (alias, paths) in touched {
            self.store(&alias)?.sync_paths(&paths, &message, opts)?;
        }
        Ok(())
    }

    /// Source/destination name pairs for a transfer.
    fn plan(&self, src: &str, dst: &str, dst_is_dir: bool) -> Result<Vec<(String, String)>> {
        let base = src.rsplit(SEP).next().unwrap_or(src);

        if self.exists(src) {
            let target = if dst_is_dir { join(dst, base) } else { dst.to_string() };
            return Ok(vec![(src.to_string(), target)]);
        }

        let names = self.list(src)?;
        if names.is_empty() {
            return Err(SecretError::NotFound(src.to_string()).into());
        }
        // `cp a b` with an existing `b` lands in `b/a`, like cp -r
        let target = if dst_is_dir && !dst.is_empty() && self.is_dir(dst) {
            join(dst, base)
        } else if dst.is_empty() {
            base.to_string()
        } else {
            dst.to_string()
        };
        if is_under(&target, src) {
            return Err(SecretError::AlreadyExists(target).into());
        }
        Ok(names
            .into_iter()
            .map(|name| {
                let rel = name[src.len()..].trim_start_matches(SEP).to_string();
                let to = join(&target, &rel);
                (name, to)
            })
            .collect())
    }
}
