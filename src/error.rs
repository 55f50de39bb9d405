//! Error types.
//!
//! One top-level [`Error`] wraps an enum per concern. Storage and crypto
//! failures are returned with the operation and secret name attached via
//! [`Error::Op`]; use [`Error::root`] to match on the underlying kind.

use std::path::PathBuf;

use thiserror::Error;

/// Top-level error.
#[derive(Error, Debug)]
pub enum Error {
    #[error(transparent)]
    Secret(#[from] SecretError),

    #[error(transparent)]
    Cipher(#[from] CipherError),

    #[error(transparent)]
    Keyring(#[from] KeyringError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Sync(#[from] SyncError),

    #[error(transparent)]
    Config(#[from] ConfigError),

    #[error("io error: {0}")]
    Io(#[from] std::io::Error),

    #[error("yaml error: {0}")]
    Yaml(#[from] serde_yaml::Error),

    #[error("json error: {0}")]
    Json(#[from] serde_json::Error),

    /// A failure annotated with the operation and secret it happened in.
    #[error("{op} {name}: {source}")]
    Op {
        op: &'static str,
        name: String,
        #[source]
        source: Box<Error>,
    },
}

impl Error {
    /// Strip any `Op` context and return the underlying error.
    pub fn root(&self) -> &Error {
        let mut err = self;
        while let Error::Op { source, .. } = err {
            err = source;
        }
        err
    }

    /// Whether this is a sync-backend absence that callers downgrade to a warning.
    pub fn is_soft_sync(&self) -> bool {
        matches!(
            self.root(),
            Error::Sync(SyncError::NotInitialized) | Error::Sync(SyncError::NoRemote)
        )
    }
}

/// Attach operation context to a result.
pub trait Context<T> {
    fn context(self, op: &'static str, name: &str) -> Result<T>;
}

impl<T, E: Into<Error>> Context<T> for std::result::Result<T, E> {
    fn context(self, op: &'static str, name: &str) -> Result<T> {
        self.map_err(|e| Error::Op {
            op,
            name: name.to_string(),
            source: Box::new(e.into()),
        })
    }
}

/// Secret document errors.
#[derive(Error, Debug)]
pub enum SecretError {
    #[error("secret not found: {0}")]
    NotFound(String),

    #[error("secret already exists: {0}")]
    AlreadyExists(String),

    #[error("body is not YAML (no --- marker)")]
    YamlNoMarker,

    #[error("key not found in YAML body: {0}")]
    YamlKeyNotFound(String),

    #[error("YAML value for {0} is not a scalar")]
    YamlValueUnsupported(String),
}

/// Crypto backend errors.
#[derive(Error, Debug)]
pub enum CipherError {
    #[error("no recipients given")]
    NoRecipients,

    #[error("no decryption key found for any recipient")]
    NoDecryptionKey,

    /// Deliberately generic: wrong recipient and tampered data look the same.
    #[error("decryption failed")]
    DecryptFailed,

    #[error("encryption failed: {0}")]
    EncryptFailed(String),

    #[error("public key not available for recipient {0}")]
    PublicKeyMissing(String),

    #[error("no private key available to sign with")]
    NoSigningKey,

    #[error("failed to unlock private key {key} after {attempts} attempts")]
    UnlockFailed { key: String, attempts: u32 },

    #[error("passphrase request failed: {0}")]
    Passphrase(String),

    #[error("operation cancelled")]
    Cancelled,

    #[error("malformed ciphertext: {0}")]
    Malformed(String),

    #[error("{backend} does not support {op}")]
    Unsupported {
        backend: &'static str,
        op: &'static str,
    },

    #[error("invalid public key: {0}")]
    InvalidPublicKey(String),
}

/// Keyring errors.
#[derive(Error, Debug)]
pub enum KeyringError {
    #[error("key not found: {0}")]
    KeyNotFound(String),

    #[error("private key {0} is not available locally")]
    NotExportable(String),

    #[error("private key must be encrypted before it is stored")]
    NotEncrypted,

    #[error("malformed key: {0}")]
    Malformed(String),

    #[error("key derivation failed: {0}")]
    Derivation(String),

    #[error("keyring {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
}

/// Store and mount errors.
#[derive(Error, Debug)]
pub enum StoreError {
    #[error("store not initialized at {0}")]
    NotInitialized(String),

    #[error("store already initialized at {0}")]
    AlreadyInitialized(String),

    #[error("refusing to remove the last recipient")]
    LastRecipient,

    #[error("recipient already in store: {0}")]
    RecipientExists(String),

    #[error("recipient not in store: {0}")]
    RecipientNotFound(String),

    #[error("path escapes store root: {0}")]
    PathTraversal(String),

    #[error("invalid secret name: {0:?}")]
    InvalidName(String),

    #[error("{0} is already mounted")]
    AlreadyMounted(String),

    #[error("path {path} is mounted twice (at {alias})")]
    DuplicatePath { alias: String, path: String },

    #[error("no such mount point: {0}")]
    MountNotFound(String),

    #[error("invalid mount alias: {0}")]
    InvalidAlias(String),

    #[error("cannot prune {name}: it contains mount point {mount}")]
    PruneMountPoint { name: String, mount: String },

    #[error("{0} is a directory; recursive operations are not supported here")]
    IsADirectory(String),

    #[error("recipient review rejected the write: {0}")]
    Rejected(String),
}

/// Sync collaborator outcomes.
#[derive(Error, Debug)]
pub enum SyncError {
    #[error("sync backend not initialized")]
    NotInitialized,

    #[error("no remote configured")]
    NoRemote,

    #[error("nothing to commit")]
    NothingToCommit,

    #[error("sync failed: {0}")]
    Failed(String),
}

/// Configuration errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("not initialized: run `cellar init` first")]
    NotInitialized,

    #[error("already initialized: {0} exists")]
    AlreadyInitialized(String),

    #[error("failed to read config: {0}")]
    ReadFile(#[source] std::io::Error),

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error("unknown crypto backend: {0} (supported: xc, age, plain)")]
    UnknownBackend(String),

    #[error("invalid mount alias in config: {0}")]
    InvalidMount(String),

    #[error("invalid config value for {field}: {reason}")]
    InvalidValue { field: &'static str, reason: String },

    #[error("unable to determine config directory")]
    NoConfigDir,
}

pub type Result<T> = std::result::Result<T, Error>;
