//! Public and private keyrings for the xc backend.
//!
//! Keys are X25519. A fingerprint is the hex encoding of the first 20
//! bytes of SHA-256 over the raw public key. Private keys are stored
//! encrypted with ChaCha20-Poly1305 under an Argon2id-derived key; the raw
//! scalar only ever lives in memory after [`PrivateKey::decrypt`].

use std::collections::BTreeMap;
use std::fmt;
use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use argon2::{Algorithm, Argon2, Params, Version};
use chacha20poly1305::aead::{Aead, KeyInit, Payload};
use chacha20poly1305::{ChaCha20Poly1305, Nonce};
use chrono::{DateTime, Utc};
use rand::rngs::OsRng;
use rand::RngCore;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};
use tracing::debug;
use x25519_dalek::{PublicKey as X25519Public, StaticSecret};
use zeroize::Zeroizing;

use super::encoding::Blob;
use crate::core::fs::atomic_write;
use crate::error::{KeyringError, Result};

const SALT_LEN: usize = 16;
const NONCE_LEN: usize = 12;

/// Fingerprint of a raw X25519 public key.
pub fn fingerprint(key: &[u8]) -> String {
    hex::encode(&Sha256::digest(key)[..20])
}

/// Owner of a key.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Identity {
    pub name: String,
    #[serde(default)]
    pub email: String,
}

impl Identity {
    pub fn new(name: impl Into<String>, email: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            email: email.into(),
        }
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.email.is_empty() {
            write!(f, "{}", self.name)
        } else {
            write!(f, "{} <{}>", self.name, self.email)
        }
    }
}

/// Argon2id cost parameters, persisted with each private key.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct KdfParams {
    /// Memory in KiB.
    pub m_cost: u32,
    pub t_cost: u32,
    pub p_cost: u32,
}

impl Default for KdfParams {
    fn default() -> Self {
        Self {
            m_cost: 65536, // 64 MiB
            t_cost: 3,
            p_cost: 4,
        }
    }
}

impl KdfParams {
    /// Minimal cost. Only for tests and benchmarks.
    pub fn insecure_fast() -> Self {
        Self {
            m_cost: 64,
            t_cost: 1,
            p_cost: 1,
        }
    }

    fn derive(&self, passphrase: &[u8], salt: &[u8]) -> Result<Zeroizing<[u8; 32]>> {
        let params = Params::new(self.m_cost, self.t_cost, self.p_cost, Some(32))
            .map_err(|e| KeyringError::Derivation(format!("argon2 params: {e}")))?;
        let argon2 = Argon2::new(Algorithm::Argon2id, Version::V0x13, params);

        let mut out = Zeroizing::new([0u8; 32]);
        argon2
            .hash_password_into(passphrase, salt, &mut out[..])
            .map_err(|e| KeyringError::Derivation(format!("argon2 hash: {e}")))?;
        Ok(out)
    }
}

/// A recipient's public key.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PublicKey {
    pub fingerprint: String,
    pub key: Blob,
    pub identity: Identity,
    pub created: DateTime<Utc>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub expires: Option<DateTime<Utc>>,
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub revoked: bool,
}

impl PublicKey {
    pub fn new(key: [u8; 32], identity: Identity) -> Self {
        Self {
            fingerprint: fingerprint(&key),
            key: Blob::new(key.to_vec()),
            identity,
            created: Utc::now(),
            expires: None,
            revoked: false,
        }
    }

    pub fn to_x25519(&self) -> Result<X25519Public> {
        let raw = self.key.to_array::<32>().ok_or_else(|| {
            KeyringError::Malformed(format!("{}: public key is not 32 bytes", self.fingerprint))
        })?;
        Ok(X25519Public::from(raw))
    }

    /// Check that the stored fingerprint matches the key bytes.
    pub fn verify(&self) -> Result<()> {
        self.to_x25519()?;
        if fingerprint(&self.key) != self.fingerprint {
            return Err(KeyringError::Malformed(format!(
                "{}: fingerprint does not match key",
                self.fingerprint
            ))
            .into());
        }
        Ok(())
    }

    /// Why this key must not be encrypted to, if anything.
    pub fn unusable_reason(&self, now: DateTime<Utc>) -> Option<String> {
        if self.revoked {
            return Some("revoked".to_string());
        }
        match self.expires {
            Some(at) if at <= now => Some(format!("expired {}", at.format("%Y-%m-%d"))),
            _ => None,
        }
    }
}

/// A private key, encrypted at rest.
#[derive(Clone, Serialize, Deserialize)]
pub struct PrivateKey {
    pub public: PublicKey,
    pub encrypted: bool,
    pub ciphertext: Blob,
    pub nonce: Blob,
    pub salt: Blob,
    #[serde(default)]
    pub kdf: KdfParams,
    #[serde(skip)]
    decrypted: Option<Zeroizing<[u8; 32]>>,
}

impl PrivateKey {
    /// Generate a fresh key pair, encrypted under `passphrase`.
    pub fn generate(identity: Identity, passphrase: &str, kdf: KdfParams) -> Result<Self> {
        let mut raw = Zeroizing::new([0u8; 32]);
        OsRng.fill_bytes(&mut raw[..]);
        let secret = StaticSecret::from(*raw);
        let public = PublicKey::new(X25519Public::from(&secret).to_bytes(), identity);
        Self::seal(public, &raw, passphrase, kdf)
    }

    fn seal(public: PublicKey, raw: &[u8; 32], passphrase: &str, kdf: KdfParams) -> Result<Self> {
        let mut salt = [0u8; SALT_LEN];
        let mut nonce = [0u8; NONCE_LEN];
        OsRng.fill_bytes(&mut salt);
        OsRng.fill_bytes(&mut nonce);

        let key = kdf.derive(passphrase.as_bytes(), &salt)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| KeyringError::Derivation(format!("cipher init: {e}")))?;
        let ciphertext = cipher
            .encrypt(
                Nonce::from_slice(&nonce),
                Payload {
                    msg: raw,
                    aad: public.fingerprint.as_bytes(),
                },
            )
            .map_err(|e| KeyringError::Derivation(format!("encrypt: {e}")))?;

        Ok(Self {
            public,
            encrypted: true,
            ciphertext: Blob::new(ciphertext),
            nonce: Blob::new(nonce.to_vec()),
            salt: Blob::new(salt.to_vec()),
            kdf,
            decrypted: None,
        })
    }

    pub fn fingerprint(&self) -> &str {
        &self.public.fingerprint
    }

    /// Unlock the key in memory.
    ///
    /// # Errors
    ///
    /// Returns `KeyringError::Derivation` on a wrong passphrase.
    pub fn decrypt(&mut self, passphrase: &str) -> Result<()> {
        if self.nonce.len() != NONCE_LEN {
            return Err(KeyringError::Malformed("bad nonce length".to_string()).into());
        }
        let key = self.kdf.derive(passphrase.as_bytes(), &self.salt)?;
        let cipher = ChaCha20Poly1305::new_from_slice(&key[..])
            .map_err(|e| KeyringError::Derivation(format!("cipher init: {e}")))?;
        let plain = Zeroizing::new(
            cipher
                .decrypt(
                    Nonce::from_slice(&self.nonce),
                    Payload {
                        msg: &self.ciphertext,
                        aad: self.public.fingerprint.as_bytes(),
                    },
                )
                .map_err(|_| KeyringError::Derivation("wrong passphrase".to_string()))?,
        );

        let raw: [u8; 32] = plain
            .as_slice()
            .try_into()
            .map_err(|_| KeyringError::Malformed("private key is not 32 bytes".to_string()))?;
        let raw = Zeroizing::new(raw);
        let derived = X25519Public::from(&StaticSecret::from(*raw));
        if fingerprint(derived.as_bytes()) != self.public.fingerprint {
            return Err(KeyringError::Malformed(format!(
                "{}: private key does not match public key",
                self.public.fingerprint
            ))
            .into());
        }

        self.decrypted = Some(raw);
        Ok(())
    }

    pub fn is_unlocked(&self) -> bool {
        self.decrypted.is_some()
    }

    /// The unlocked scalar, if [`decrypt`](Self::decrypt) succeeded.
    pub fn secret(&self) -> Option<StaticSecret> {
        self.decrypted.as_ref().map(|raw| StaticSecret::from(**raw))
    }

    /// Drop the in-memory key material.
    pub fn lock(&mut self) {
        self.decrypted = None;
    }
}

impl fmt::Debug for PrivateKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("PrivateKey")
            .field("fingerprint", &self.public.fingerprint)
            .field("identity", &self.public.identity)
            .field("unlocked", &self.decrypted.is_some())
            .finish()
    }
}

/// Something stored in a keyring under its fingerprint.
pub trait Keyed: Clone + Serialize + DeserializeOwned {
    fn id(&self) -> &str;

    /// Reject entries that must not be persisted.
    fn check(&self) -> Result<()> {
        Ok(())
    }
}

impl Keyed for PublicKey {
    fn id(&self) -> &str {
        &self.fingerprint
    }

    fn check(&self) -> Result<()> {
        self.verify()
    }
}

impl Keyed for PrivateKey {
    fn id(&self) -> &str {
        &self.public.fingerprint
    }

    fn check(&self) -> Result<()> {
        if !self.encrypted || self.ciphertext.is_empty() {
            return Err(KeyringError::NotEncrypted.into());
        }
        self.public.verify()
    }
}

/// A JSON file of keys indexed by fingerprint.
///
/// Inserting a key whose fingerprint is already present replaces it.
#[derive(Debug, Clone)]
pub struct Keyring<K> {
    path: Option<PathBuf>,
    keys: BTreeMap<String, K>,
}

pub type Pubring = Keyring<PublicKey>;
pub type Secring = Keyring<PrivateKey>;

impl<K: Keyed> Keyring<K> {
    /// Load from `path`; a missing file is an empty keyring.
    pub fn load(path: &Path) -> Result<Self> {
        let keys = match fs::read(path) {
            Ok(buf) => {
                let keys: BTreeMap<String, K> = serde_json::from_slice(&buf)
                    .map_err(|e| KeyringError::Malformed(format!("{}: {e}", path.display())))?;
                for (fp, key) in &keys {
                    key.check()?;
                    if fp != key.id() {
                        return Err(KeyringError::Malformed(format!(
                            "{}: entry {fp} holds key {}",
                            path.display(),
                            key.id()
                        ))
                        .into());
                    }
                }
                keys
            }
            Err(e) if e.kind() == ErrorKind::NotFound => BTreeMap::new(),
            Err(source) => {
                return Err(KeyringError::Io {
                    path: path.to_path_buf(),
                    source,
                }
                .into())
            }
        };
        debug!(path = %path.display(), keys = keys.len(), "loaded keyring");
        Ok(Self {
            path: Some(path.to_path_buf()),
            keys,
        })
    }

    /// A keyring that is never written to disk.
    pub fn in_memory() -> Self {
        Self {
            path: None,
            keys: BTreeMap::new(),
        }
    }

    pub fn get(&self, id: &str) -> Option<&K> {
        self.keys.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.keys.contains_key(id)
    }

    /// Sorted fingerprints.
    pub fn ids(&self) -> Vec<String> {
        self.keys.keys().cloned().collect()
    }

    pub fn iter(&self) -> impl Iterator<Item = &K> {
        self.keys.values()
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }

    /// Insert or replace, then persist.
    pub fn insert(&mut self, key: K) -> Result<()> {
        key.check()?;
        self.keys.insert(key.id().to_string(), key);
        self.save()
    }

    /// Remove by fingerprint, then persist. Returns whether it existed.
    pub fn remove(&mut self, id: &str) -> Result<bool> {
        let existed = self.keys.remove(id).is_some();
        if existed {
            self.save()?;
        }
        Ok(existed)
    }

    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        let buf = Zeroizing::new(serde_json::to_vec_pretty(&self.keys)?);
        atomic_write(path, &buf)
    }
}
