//! In-process fixtures: people with keys, stores, and scripted collaborators.

use std::collections::VecDeque;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use cellar::core::cipher::xc::{Identity, KdfParams};
use cellar::core::cipher::{Cipher, StaticPassphrase, Xc};
use cellar::core::options::{Confirm, Hooks, OperationOptions};
use cellar::core::store::Store;
use cellar::core::sync::SyncBackend;
use cellar::error::{Result, SyncError};
use tempfile::TempDir;

/// Passphrase of every fixture key.
pub const PASSPHRASE: &str = "correct horse battery staple";

/// Someone with their own xc keyring and one key in it.
pub struct Person {
    pub dir: TempDir,
    pub xc: Arc<Xc>,
    pub fp: String,
}

impl Person {
    pub fn new(name: &str) -> Self {
        let dir = TempDir::new().expect("temp keyring dir");
        let xc = Xc::open(dir.path(), Arc::new(StaticPassphrase::new(PASSPHRASE))).expect("open keyring");
        let fp = xc
            .generate_key(
                Identity::new(name, format!("{name}@example.com")),
                PASSPHRASE,
                KdfParams::insecure_fast(),
            )
            .expect("generate key");
        Self {
            dir,
            xc: Arc::new(xc),
            fp,
        }
    }

    /// Generate another key in the same keyring, e.g. a second device.
    pub fn add_key(&self, label: &str) -> String {
        self.xc
            .generate_key(
                Identity::new(label, format!("{label}@example.com")),
                PASSPHRASE,
                KdfParams::insecure_fast(),
            )
            .expect("generate key")
    }

    /// Import `other`'s public key into this keyring.
    pub fn knows(&self, other: &Person) {
        let pk = other.xc.export_public_key(&other.fp).expect("export");
        self.xc.import_public_key(&pk).expect("import");
    }

    pub fn crypto(&self) -> Arc<dyn Cipher> {
        self.xc.clone()
    }
}

/// What the sync collaborator should answer.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncMode {
    Ok,
    NotInitialized,
    NoRemote,
    Broken,
}

/// Records commits and pushes instead of running git.
pub struct RecordingSync {
    pub mode: SyncMode,
    pub commits: Mutex<Vec<(Vec<PathBuf>, String)>>,
    pub pushes: AtomicUsize,
}

impl RecordingSync {
    pub fn new(mode: SyncMode) -> Arc<Self> {
        Arc::new(Self {
            mode,
            commits: Mutex::new(Vec::new()),
            pushes: AtomicUsize::new(0),
        })
    }

    pub fn messages(&self) -> Vec<String> {
        self.commits.lock().unwrap().iter().map(|(_, m)| m.clone()).collect()
    }

    pub fn commit_count(&self) -> usize {
        self.commits.lock().unwrap().len()
    }

    pub fn push_count(&self) -> usize {
        self.pushes.load(Ordering::SeqCst)
    }
}

impl SyncBackend for RecordingSync {
    fn commit(&self, paths: &[PathBuf], message: &str) -> Result<()> {
        match self.mode {
            SyncMode::NotInitialized => Err(SyncError::NotInitialized.into()),
            SyncMode::Broken => Err(SyncError::Failed("disk on fire".to_string()).into()),
            _ => {
                self.commits
                    .lock()
                    .unwrap()
                    .push((paths.to_vec(), message.to_string()));
                Ok(())
            }
        }
    }

    fn push(&self) -> Result<()> {
        match self.mode {
            SyncMode::NoRemote => Err(SyncError::NoRemote.into()),
            _ => {
                self.pushes.fetch_add(1, Ordering::SeqCst);
                Ok(())
            }
        }
    }
}

/// Answers confirmations from a script, then with a default.
pub struct ScriptedConfirm {
    answers: Mutex<VecDeque<bool>>,
    default: bool,
    pub prompts: Mutex<Vec<String>>,
}

impl ScriptedConfirm {
    pub fn new(answers: &[bool], default: bool) -> Arc<Self> {
        Arc::new(Self {
            answers: Mutex::new(answers.iter().copied().collect()),
            default,
            prompts: Mutex::new(Vec::new()),
        })
    }

    pub fn always(answer: bool) -> Arc<Self> {
        Self::new(&[], answer)
    }

    pub fn asked(&self) -> usize {
        self.prompts.lock().unwrap().len()
    }
}

impl Confirm for ScriptedConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        self.prompts.lock().unwrap().push(prompt.to_string());
        self.answers.lock().unwrap().pop_front().unwrap_or(self.default)
    }
}

/// Hooks answering every question with `confirm`.
pub fn hooks_with(confirm: Arc<ScriptedConfirm>) -> Hooks {
    Hooks {
        confirm: confirm.clone(),
        import: confirm,
        recipients: None,
    }
}

/// An initialized store at `path` for `recipients`.
pub fn store_at(
    alias: &str,
    path: &Path,
    crypto: Arc<dyn Cipher>,
    sync: Arc<RecordingSync>,
    hooks: Hooks,
    recipients: &[String],
) -> Store {
    let store = Store::new(alias, path, crypto, sync, hooks);
    store
        .init(recipients, &OperationOptions::default())
        .expect("init store");
    store
}

/// Default options: autosync on, one worker.
pub fn opts() -> OperationOptions {
    OperationOptions::default()
}
