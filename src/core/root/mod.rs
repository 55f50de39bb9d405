//! Root store: one namespace over a root sub-store and its mounts.
//!
//! A mount attaches a [`Store`] at an alias such as `work/team`. Names are
//! resolved to the mount with the longest alias that is a path prefix of
//! the name; everything else goes to the root store.
//!
//! - `mv`: copy/move, across mounts and recursively
//! - `tree`: the combined listing view

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use tracing::{debug, info, warn};

use crate::core::cipher::Cipher;
use crate::core::config::Config;
use crate::core::constants::SEP;
use crate::core::options::{Hooks, OperationOptions};
use crate::core::secret::Secret;
use crate::core::store::fsck::{Fsck, FsckReport, Shadows};
use crate::core::store::{clean_name, clean_prefix, Store};
use crate::core::sync::{GitCli, SyncBackend};
use crate::error::{Result, StoreError};

mod mv;
mod tree;

pub use tree::Tree;

#[derive(Debug)]
pub struct RootStore {
    root: Store,
    mounts: BTreeMap<String, Store>,
}

impl RootStore {
    pub fn new(mut root: Store) -> Self {
        root.set_alias("");
        Self {
            root,
            mounts: BTreeMap::new(),
        }
    }

    /// Root store and mounts as configured, each synced through git.
    ///
    /// A mount that cannot be attached is skipped with a warning so the
    /// rest of the namespace stays usable.
    pub fn open(config: &Config, crypto: Arc<dyn Cipher>, hooks: Hooks) -> Self {
        let git = |path: &Path| -> Arc<dyn SyncBackend> { Arc::new(GitCli::new(path)) };
        let path = &config.cellar.path;
        let mut root = Self::new(Store::new("", path, crypto.clone(), git(path), hooks.clone()));
        for (alias, path) in &config.mounts {
            let store = Store::new(alias.clone(), path, crypto.clone(), git(path), hooks.clone());
            if let Err(e) = root.add_mount(alias, store) {
                warn!(alias = %alias, error = %e, "skipping mount");
            }
        }
        root
    }

    pub fn root(&self) -> &Store {
        &self.root
    }

    /// Attach `store` at `alias`.
    ///
    /// # Errors
    ///
    /// `AlreadyMounted` if the alias is taken, `DuplicatePath` if the
    /// store's directory already backs the root or another mount, and
    /// `NotInitialized` if it has no recipient list.
    pub fn add_mount(&mut self, alias: &str, mut store: Store) -> Result<()> {
        let alias = clean_name(alias).map_err(|_| StoreError::InvalidAlias(alias.to_string()))?;
        if self.mounts.contains_key(&alias) {
            return Err(StoreError::AlreadyMounted(alias).into());
        }
        let wanted = normalize(store.path());
        if let Some(owner) = self.stores().find(|s| normalize(s.path()) == wanted) {
            return Err(StoreError::DuplicatePath {
                alias: display_alias(owner.alias()),
                path: store.path().display().to_string(),
            }
            .into());
        }
        if !store.is_initialized() {
            return Err(StoreError::NotInitialized(store.path().display().to_string()).into());
        }

        store.set_alias(alias.clone());
        info!(alias = %alias, path = %store.path().display(), "mounted store");
        self.mounts.insert(alias, store);
        Ok(())
    }

    /// Detach a mount. The store's files are left alone.
    pub fn remove_mount(&mut self, alias: &str) -> Result<Store> {
        let key = alias.trim_end_matches(SEP);
        let store = self
            .mounts
            .remove(key)
            .ok_or_else(|| StoreError::MountNotFound(alias.to_string()))?;
        info!(alias = %key, "unmounted store");
        Ok(store)
    }

    /// Mount aliases and their directories, sorted by alias.
    pub fn mounts(&self) -> Vec<(String, PathBuf)> {
        self.mounts
            .iter()
            .map(|(alias, store)| (alias.clone(), store.path().to_path_buf()))
            .collect()
    }

    /// The root store followed by every mount.
    pub fn stores(&self) -> impl Iterator<Item = &Store> {
        std::iter::once(&self.root).chain(self.mounts.values())
    }

    /// The store mounted at `alias`; the empty alias is the root store.
    pub fn store(&self, alias: &str) -> Result<&Store> {
        let alias = alias.trim_end_matches(SEP);
        if alias.is_empty() {
            return Ok(&self.root);
        }
        self.mounts
            .get(alias)
            .ok_or_else(|| StoreError::MountNotFound(alias.to_string()).into())
    }

    /// Longest mount alias that is a path prefix of `name`, or `""`.
    pub fn mount_point(&self, name: &str) -> &str {
        let padded = format!("{}{}", name.trim_end_matches(SEP), SEP);
        self.mounts
            .keys()
            .filter(|alias| padded.starts_with(&format!("{}{}", alias, SEP)))
            .max_by_key(|alias| alias.len())
            .map(String::as_str)
            .unwrap_or("")
    }

    /// Store responsible for `name` and the name relative to it.
    pub fn get_store(&self, name: &str) -> Result<(&Store, String)> {
        let name = clean_prefix(name)?;
        let alias = self.mount_point(&name);
        if alias.is_empty() {
            return Ok((&self.root, name));
        }
        let rel = name[alias.len()..].trim_start_matches(SEP).to_string();
        let store = self.store(alias)?;
        Ok((store, rel))
    }

    pub fn get(&self, name: &str, opts: &OperationOptions) -> Result<Secret> {
        let (store, rel) = self.get_store(name)?;
        store.get(&rel, opts)
    }

    pub fn set(&self, name: &str, secret: &Secret, opts: &OperationOptions) -> Result<()> {
        let (store, rel) = self.get_store(name)?;
        store.set(&rel, secret, opts)
    }

    pub fn set_confirm(&self, name: &str, secret: &Secret, opts: &OperationOptions) -> Result<()> {
        let (store, rel) = self.get_store(name)?;
        store.set_confirm(&rel, secret, opts)
    }

    pub fn delete(&self, name: &str, opts: &OperationOptions) -> Result<()> {
        let (store, rel) = self.get_store(name)?;
        store.delete(&rel, opts)
    }

    /// Remove a subtree. Refused if a mount lives at or below `name`.
    pub fn prune(&self, name: &str, opts: &OperationOptions) -> Result<()> {
        let name = clean_name(name)?;
        if let Some(mount) = self.mounts.keys().find(|alias| is_under(alias, &name)) {
            return Err(StoreError::PruneMountPoint {
                name,
                mount: mount.clone(),
            }
            .into());
        }
        let (store, rel) = self.get_store(&name)?;
        store.prune(&rel, opts)
    }

    pub fn exists(&self, name: &str) -> bool {
        self.get_store(name)
            .map(|(store, rel)| !rel.is_empty() && store.exists(&rel))
            .unwrap_or(false)
    }

    /// Whether `name` is a directory in its store, or leads to a mount.
    pub fn is_dir(&self, name: &str) -> bool {
        let Ok(name) = clean_name(name) else {
            return false;
        };
        if self.mounts.keys().any(|alias| is_under(alias, &name)) {
            return true;
        }
        match self.get_store(&name) {
            Ok((store, rel)) => rel.is_empty() || store.is_dir(&rel),
            Err(_) => false,
        }
    }

    /// Sorted names at or below `prefix` across all stores.
    ///
    /// Entries hidden behind a more specific mount are left out.
    pub fn list(&self, prefix: &str) -> Result<Vec<String>> {
        let prefix = clean_prefix(prefix)?;
        let mut names = Vec::new();
        for store in self.stores() {
            for name in store.list("")? {
                let full = join(store.alias(), &name);
                if self.mount_point(&full) != store.alias() {
                    continue;
                }
                if prefix.is_empty() || is_under(&full, &prefix) {
                    names.push(full);
                }
            }
        }
        names.sort();
        names.dedup();
        Ok(names)
    }

    /// Combined tree of all stores, mounts nested at their aliases.
    pub fn tree(&self) -> Result<Tree> {
        let mut tree = Tree::default();
        for name in self.root.list("")? {
            tree.insert(&name);
        }

        let mut aliases: Vec<&String> = self.mounts.keys().collect();
        // shallow first, so deeper mounts replace nodes inside them
        aliases.sort_by_key(|a| (a.matches(SEP).count(), a.len()));
        for alias in aliases {
            let store = &self.mounts[alias];
            let node = tree.mount(alias, store.path());
            for name in store.list("")? {
                node.insert(&name);
            }
        }
        Ok(tree)
    }

    /// Check every store at or below `prefix`.
    ///
    /// Mounts are visited most specific first and share one shadow map, so
    /// an entry reachable through a deeper mount is reported as shadowing
    /// the same name in a shallower store.
    pub fn fsck(&self, prefix: &str, opts: &OperationOptions) -> Result<FsckReport> {
        let prefix = clean_prefix(prefix)?;
        let mut shadows = Shadows::new(self.mounts.keys().cloned());

        let mut stores: Vec<&Store> = self.mounts.values().collect();
        stores.sort_by(|a, b| b.alias().len().cmp(&a.alias().len()).then(a.alias().cmp(b.alias())));
        stores.push(&self.root);

        let mut report = FsckReport::default();
        for store in stores {
            let alias = store.alias();
            let rel = if alias.is_empty() {
                prefix.clone()
            } else if prefix.is_empty() || is_under(alias, &prefix) {
                String::new()
            } else if is_under(&prefix, alias) {
                prefix[alias.len()..].trim_start_matches(SEP).to_string()
            } else {
                continue;
            };
            debug!(alias = %alias, prefix = %rel, "fsck store");
            report.merge(Fsck::new(store, opts, &mut shadows).run(&rel)?);
        }
        Ok(report)
    }
}

/// `name` equals `prefix` or lies below it.
pub(crate) fn is_under(name: &str, prefix: &str) -> bool {
    name == prefix
        || name
            .strip_prefix(prefix)
            .is_some_and(|rest| rest.starts_with(SEP))
}

pub(crate) fn join(alias: &str, name: &str) -> String {
    match (alias.is_empty(), name.is_empty()) {
        (true, _) => name.to_string(),
        (_, true) => alias.to_string(),
        _ => format!("{}{}{}", alias, SEP, name),
    }
}

fn display_alias(alias: &str) -> String {
    if alias.is_empty() {
        "<root>".to_string()
    } else {
        alias.to_string()
    }
}

fn normalize(path: &Path) -> PathBuf {
    path.canonicalize().unwrap_or_else(|_| path.to_path_buf())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;

    use tempfile::TempDir;

    use crate::core::cipher::Plain;
    use crate::core::options::Hooks;
    use crate::core::sync::NoopSync;

    fn open(tmp: &TempDir, alias: &str, dir: &str) -> Store {
        Store::new(
            alias,
            tmp.path().join(dir),
            Arc::new(Plain::default()),
            Arc::new(NoopSync),
            Hooks::default(),
        )
    }

    fn store(tmp: &TempDir, alias: &str, dir: &str) -> Store {
        let s = open(tmp, alias, dir);
        s.init(&["me".to_string()], &OperationOptions::default()).unwrap();
        s
    }

    fn root_with(tmp: &TempDir, mounts: &[&str]) -> RootStore {
        let mut root = RootStore::new(store(tmp, "", "root"));
        for (i, alias) in mounts.iter().enumerate() {
            root.add_mount(alias, store(tmp, alias, &format!("m{i}"))).unwrap();
        }
        root
    }

    #[test]
    fn test_mount_point_prefers_longest() {
        let tmp = TempDir::new().unwrap();
        let root = root_with(&tmp, &["a", "a/b"]);
        assert_eq!(root.mount_point("a/b/c"), "a/b");
        assert_eq!(root.mount_point("a/x"), "a");
        assert_eq!(root.mount_point("ab/x"), "");
        assert_eq!(root.mount_point("a"), "a");

        let (store, rel) = root.get_store("a/b/c").unwrap();
        assert_eq!(store.alias(), "a/b");
        assert_eq!(rel, "c");
    }

    #[test]
    fn test_add_mount_rejects_duplicates() {
        let tmp = TempDir::new().unwrap();
        let mut root = root_with(&tmp, &["a"]);
        let err = root.add_mount("a", store(&tmp, "a", "other")).unwrap_err();
        assert!(matches!(err, crate::error::Error::Store(StoreError::AlreadyMounted(_))));

        // m0 already backs mount "a"
        let err = root.add_mount("c", open(&tmp, "c", "m0")).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Store(StoreError::DuplicatePath { .. })
        ));
    }

    #[test]
    fn test_prune_refuses_mount_point() {
        let tmp = TempDir::new().unwrap();
        let root = root_with(&tmp, &["team/infra"]);
        let err = root.prune("team", &OperationOptions::default()).unwrap_err();
        assert!(matches!(
            err,
            crate::error::Error::Store(StoreError::PruneMountPoint { .. })
        ));
    }

    #[test]
    fn test_is_under() {
        assert!(is_under("a/b", "a"));
        assert!(is_under("a", "a"));
        assert!(!is_under("ab", "a"));
        assert_eq!(join("", "x"), "x");
        assert_eq!(join("m", "x"), "m/x");
    }
}
