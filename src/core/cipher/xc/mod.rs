//! xc: the reference envelope backend.
//!
//! Keys live in two JSON keyrings under the backend directory:
//! `pubring.json` (everyone we can encrypt to) and `secring.json` (our own
//! keys, Argon2id-encrypted). The writer of a message is always added to
//! its recipients so it can read back what it wrote.

use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use chrono::Utc;
use tracing::{debug, trace, warn};
use zeroize::Zeroizing;

use super::{Cipher, KeyCache, KeyStatus, PassphraseSource};
use crate::core::options::OperationOptions;
use crate::error::{CipherError, KeyringError, Result};

pub mod encoding;
pub mod envelope;
pub mod keyring;

pub use envelope::{Message, CHUNK_SIZE};
pub use keyring::{fingerprint, Identity, KdfParams, PrivateKey, Pubring, PublicKey, Secring};

/// Wrong passphrases tolerated per unlock.
pub const MAX_UNLOCK_ATTEMPTS: u32 = 3;

const PUBRING_FILE: &str = "pubring.json";
const SECRING_FILE: &str = "secring.json";

pub struct Xc {
    dir: PathBuf,
    pubring: RwLock<Pubring>,
    secring: RwLock<Secring>,
    passphrases: Arc<dyn PassphraseSource>,
    cache: KeyCache,
}

impl Xc {
    /// Open (or lazily create) the keyrings under `dir`.
    pub fn open(dir: impl Into<PathBuf>, passphrases: Arc<dyn PassphraseSource>) -> Result<Self> {
        let dir = dir.into();
        let pubring = Pubring::load(&dir.join(PUBRING_FILE))?;
        let secring = Secring::load(&dir.join(SECRING_FILE))?;
        debug!(
            dir = %dir.display(),
            public = pubring.len(),
            private = secring.len(),
            "opened xc keyrings"
        );
        Ok(Self {
            dir,
            pubring: RwLock::new(pubring),
            secring: RwLock::new(secring),
            passphrases,
            cache: KeyCache::new(),
        })
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn pubring(&self) -> RwLockReadGuard<'_, Pubring> {
        self.pubring.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn pubring_mut(&self) -> RwLockWriteGuard<'_, Pubring> {
        self.pubring.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn secring(&self) -> RwLockReadGuard<'_, Secring> {
        self.secring.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn secring_mut(&self) -> RwLockWriteGuard<'_, Secring> {
        self.secring.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Generate a key pair and add it to both keyrings.
    pub fn generate_key(
        &self,
        identity: Identity,
        passphrase: &str,
        kdf: KdfParams,
    ) -> Result<String> {
        let key = PrivateKey::generate(identity, passphrase, kdf)?;
        let fp = key.fingerprint().to_string();
        self.pubring_mut().insert(key.public.clone())?;
        self.secring_mut().insert(key)?;
        self.cache.invalidate();
        debug!(fingerprint = %fp, "generated key");
        Ok(fp)
    }

    /// Encrypted private key as JSON, for moving to another machine.
    pub fn export_private_key(&self, id: &str) -> Result<Vec<u8>> {
        let ring = self.secring();
        let key = ring
            .get(id)
            .ok_or_else(|| KeyringError::NotExportable(id.to_string()))?;
        Ok(serde_json::to_vec_pretty(key)?)
    }

    pub fn import_private_key(&self, buf: &[u8]) -> Result<String> {
        let key: PrivateKey =
            serde_json::from_slice(buf).map_err(|e| KeyringError::Malformed(e.to_string()))?;
        let fp = key.fingerprint().to_string();
        self.secring_mut().insert(key.clone())?;
        self.pubring_mut().insert(key.public)?;
        self.cache.invalidate();
        Ok(fp)
    }

    pub fn public_key(&self, id: &str) -> Option<PublicKey> {
        self.pubring().get(id).cloned()
    }

    /// Resolve a (possibly shortened) id to a public key.
    fn resolve_public(&self, id: &str) -> Result<PublicKey> {
        let ring = self.pubring();
        if let Some(key) = ring.get(id) {
            return Ok(key.clone());
        }
        let found = ring
            .iter()
            .find(|k| !id.is_empty() && k.fingerprint.ends_with(id))
            .cloned();
        found.ok_or_else(|| CipherError::PublicKeyMissing(id.to_string()).into())
    }

    /// Unlock a private key, asking for the passphrase up to
    /// [`MAX_UNLOCK_ATTEMPTS`] times and forgetting it after each miss.
    fn unlock(&self, id: &str, opts: &OperationOptions) -> Result<PrivateKey> {
        let mut key = self
            .secring()
            .get(id)
            .cloned()
            .ok_or_else(|| KeyringError::KeyNotFound(id.to_string()))?;
        let reason = format!("unlock {} ({})", id, key.public.identity);

        for attempt in 1..=MAX_UNLOCK_ATTEMPTS {
            opts.cancel.check()?;
            let passphrase = self.passphrases.passphrase(id, &reason, &opts.cancel)?;
            match key.decrypt(&passphrase) {
                Ok(()) => return Ok(key),
                Err(e) => {
                    warn!(key = %id, attempt, error = %e, "failed to unlock private key");
                    self.passphrases.forget(id)?;
                }
            }
        }
        Err(CipherError::UnlockFailed {
            key: id.to_string(),
            attempts: MAX_UNLOCK_ATTEMPTS,
        }
        .into())
    }

    /// Our key to sign with: one that is a recipient if possible.
    fn pick_sender(&self, recipients: &[String]) -> Result<String> {
        let ids = self.list_private_keys()?;
        ids.iter()
            .find(|fp| recipients.iter().any(|r| !r.is_empty() && fp.ends_with(r.as_str())))
            .or_else(|| ids.first())
            .cloned()
            .ok_or_else(|| CipherError::NoSigningKey.into())
    }
}

impl Cipher for Xc {
    fn name(&self) -> &'static str {
        "xc"
    }

    fn ext(&self) -> &'static str {
        "xc"
    }

    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &[String],
        opts: &OperationOptions,
    ) -> Result<Vec<u8>> {
        if recipients.is_empty() {
            return Err(CipherError::NoRecipients.into());
        }
        trace!(
            recipients = recipients.len(),
            plaintext_len = plaintext.len(),
            "encrypting"
        );

        let sender_id = self.pick_sender(recipients)?;
        let mut keys: Vec<PublicKey> = recipients
            .iter()
            .map(|r| self.resolve_public(r))
            .collect::<Result<_>>()?;
        keys.push(self.resolve_public(&sender_id)?);
        keys.sort_by(|a, b| a.fingerprint.cmp(&b.fingerprint));
        keys.dedup_by(|a, b| a.fingerprint == b.fingerprint);

        let sender = self.unlock(&sender_id, opts)?;
        let secret = sender.secret().ok_or(CipherError::NoSigningKey)?;

        let session = envelope::session_key();
        let (body, compressed) = envelope::compress(plaintext)?;
        let chunks = envelope::seal_chunks(&session, &body, compressed)?;

        let mut header = envelope::Header {
            sender: sender_id,
            ..Default::default()
        };
        for key in &keys {
            let wrapped = envelope::wrap_key(&secret, &key.to_x25519()?, &session)?;
            header
                .recipients
                .insert(key.fingerprint.clone(), encoding::Blob(wrapped));
        }
        header
            .metadata
            .insert("created".to_string(), Utc::now().to_rfc3339());

        let msg = Message {
            version: envelope::VERSION,
            header,
            compressed,
            chunks,
        };
        let out = msg.to_bytes()?;
        trace!(ciphertext_len = out.len(), compressed, "encrypted");
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], opts: &OperationOptions) -> Result<Zeroizing<Vec<u8>>> {
        trace!(ciphertext_len = ciphertext.len(), "decrypting");
        let msg = Message::parse(ciphertext)?;

        let ours = self.list_private_keys()?;
        let matching: Vec<(&String, &encoding::Blob)> = msg
            .header
            .recipients
            .iter()
            .filter(|(fp, _)| ours.binary_search(fp).is_ok())
            .collect();
        if matching.is_empty() {
            return Err(CipherError::NoDecryptionKey.into());
        }

        let sender = self
            .public_key(&msg.header.sender)
            .ok_or_else(|| CipherError::PublicKeyMissing(msg.header.sender.clone()))?
            .to_x25519()?;
        for (id, wrapped) in matching {
            let key = self.unlock(id, opts)?;
            let secret = key.secret().ok_or(CipherError::DecryptFailed)?;
            let Ok(session) = envelope::unwrap_key(&secret, &sender, wrapped) else {
                debug!(key = %id, "session key did not unwrap");
                continue;
            };
            let body = envelope::open_chunks(&session, &msg.chunks, msg.compressed)?;
            let plain = if msg.compressed {
                envelope::decompress(&body)?
            } else {
                body
            };
            trace!(plaintext_len = plain.len(), "decrypted");
            return Ok(plain);
        }
        Err(CipherError::DecryptFailed.into())
    }

    fn unreadable_recipients(&self, ciphertext: &[u8], opts: &OperationOptions) -> Result<Vec<String>> {
        let msg = Message::parse(ciphertext)?;
        let ours = self.list_private_keys()?;
        let sender = self
            .public_key(&msg.header.sender)
            .ok_or_else(|| CipherError::PublicKeyMissing(msg.header.sender.clone()))?
            .to_x25519()?;

        let mut bad = Vec::new();
        for (id, wrapped) in &msg.header.recipients {
            if ours.binary_search(id).is_err() {
                continue;
            }
            let key = self.unlock(id, opts)?;
            let secret = key.secret().ok_or(CipherError::DecryptFailed)?;
            if envelope::unwrap_key(&secret, &sender, wrapped).is_err() {
                bad.push(id.clone());
            }
        }
        Ok(bad)
    }

    fn recipient_ids(&self, ciphertext: &[u8]) -> Result<Vec<String>> {
        Ok(Message::parse(ciphertext)?.recipient_ids())
    }

    fn sender_id(&self, ciphertext: &[u8]) -> Result<Option<String>> {
        Ok(Some(Message::parse(ciphertext)?.header.sender))
    }

    fn list_public_keys(&self) -> Result<Vec<String>> {
        self.cache.public_keys(|| Ok(self.pubring().ids()))
    }

    fn list_private_keys(&self) -> Result<Vec<String>> {
        self.cache.private_keys(|| Ok(self.secring().ids()))
    }

    fn key_status(&self, id: &str) -> KeyStatus {
        match self.resolve_public(id) {
            Ok(key) => match key.unusable_reason(Utc::now()) {
                Some(reason) => KeyStatus::Unusable(reason),
                None => KeyStatus::Usable,
            },
            Err(_) => KeyStatus::Unknown,
        }
    }

    fn export_public_key(&self, id: &str) -> Result<Vec<u8>> {
        let key = self
            .public_key(id)
            .ok_or_else(|| KeyringError::KeyNotFound(id.to_string()))?;
        Ok(serde_json::to_vec_pretty(&key)?)
    }

    fn import_public_key(&self, buf: &[u8]) -> Result<String> {
        let key: PublicKey =
            serde_json::from_slice(buf).map_err(|e| KeyringError::Malformed(e.to_string()))?;
        let fp = key.fingerprint.clone();
        self.pubring_mut().insert(key)?;
        self.cache.invalidate();
        debug!(fingerprint = %fp, "imported public key");
        Ok(fp)
    }

    fn format_key(&self, id: &str) -> String {
        match self.public_key(id) {
            Some(key) => format!("{} - {}", id, key.identity),
            None => id.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::cipher::StaticPassphrase;
    use crate::error::Error;

    fn backend(dir: &Path, pass: &str) -> Xc {
        Xc::open(dir, Arc::new(StaticPassphrase::new(pass))).unwrap()
    }

    #[test]
    fn test_encrypt_decrypt_roundtrip() {
        let tmp = tempfile::tempdir().unwrap();
        let xc = backend(tmp.path(), "pw");
        let fp = xc
            .generate_key(Identity::new("alice", ""), "pw", KdfParams::insecure_fast())
            .unwrap();
        let opts = OperationOptions::default();

        let ct = xc.encrypt(b"hello world", &[fp.clone()], &opts).unwrap();
        assert_eq!(xc.recipient_ids(&ct).unwrap(), vec![fp.clone()]);
        assert_eq!(xc.sender_id(&ct).unwrap(), Some(fp));
        assert_eq!(&*xc.decrypt(&ct, &opts).unwrap(), b"hello world");
    }

    #[test]
    fn test_sender_is_added_as_recipient() {
        let tmp = tempfile::tempdir().unwrap();
        let alice = backend(&tmp.path().join("alice"), "a");
        let bob = backend(&tmp.path().join("bob"), "b");
        let a = alice
            .generate_key(Identity::new("alice", ""), "a", KdfParams::insecure_fast())
            .unwrap();
        let b = bob
            .generate_key(Identity::new("bob", ""), "b", KdfParams::insecure_fast())
            .unwrap();
        alice
            .import_public_key(&bob.export_public_key(&b).unwrap())
            .unwrap();
        bob.import_public_key(&alice.export_public_key(&a).unwrap())
            .unwrap();

        let opts = OperationOptions::default();
        let ct = alice.encrypt(b"for bob", &[b.clone()], &opts).unwrap();
        let mut expected = vec![a, b];
        expected.sort();
        assert_eq!(alice.recipient_ids(&ct).unwrap(), expected);

        assert_eq!(&*bob.decrypt(&ct, &opts).unwrap(), b"for bob");
        assert_eq!(&*alice.decrypt(&ct, &opts).unwrap(), b"for bob");
    }

    #[test]
    fn test_short_id_resolves_to_full_key() {
        let tmp = tempfile::tempdir().unwrap();
        let xc = backend(tmp.path(), "pw");
        let fp = xc
            .generate_key(Identity::new("alice", ""), "pw", KdfParams::insecure_fast())
            .unwrap();
        let short = fp[fp.len() - 8..].to_string();
        let opts = OperationOptions::default();

        assert_eq!(xc.key_status(&short), KeyStatus::Usable);
        assert_eq!(xc.key_status("ffffffffffff"), KeyStatus::Unknown);
        let ct = xc.encrypt(b"x", &[short], &opts).unwrap();
        assert_eq!(xc.recipient_ids(&ct).unwrap(), vec![fp]);
    }

    #[test]
    fn test_no_decryption_key() {
        let tmp = tempfile::tempdir().unwrap();
        let alice = backend(&tmp.path().join("alice"), "a");
        let eve = backend(&tmp.path().join("eve"), "e");
        let a = alice
            .generate_key(Identity::new("alice", ""), "a", KdfParams::insecure_fast())
            .unwrap();
        eve.generate_key(Identity::new("eve", ""), "e", KdfParams::insecure_fast())
            .unwrap();

        let opts = OperationOptions::default();
        let ct = alice.encrypt(b"x", &[a], &opts).unwrap();
        assert!(matches!(
            eve.decrypt(&ct, &opts),
            Err(Error::Cipher(CipherError::NoDecryptionKey))
        ));
    }

    #[test]
    fn test_unknown_recipient() {
        let tmp = tempfile::tempdir().unwrap();
        let xc = backend(tmp.path(), "pw");
        xc.generate_key(Identity::new("alice", ""), "pw", KdfParams::insecure_fast())
            .unwrap();
        let err = xc
            .encrypt(b"x", &["f".repeat(40)], &OperationOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Cipher(CipherError::PublicKeyMissing(_))
        ));
    }

    #[test]
    fn test_wrong_passphrase_gives_up() {
        let tmp = tempfile::tempdir().unwrap();
        let setup = backend(tmp.path(), "right");
        let fp = setup
            .generate_key(Identity::new("alice", ""), "right", KdfParams::insecure_fast())
            .unwrap();

        let xc = backend(tmp.path(), "wrong");
        let err = xc
            .encrypt(b"x", &[fp], &OperationOptions::default())
            .unwrap_err();
        assert!(matches!(
            err,
            Error::Cipher(CipherError::UnlockFailed { attempts: 3, .. })
        ));
    }

    #[test]
    fn test_keys_persist_and_export_private() {
        let tmp = tempfile::tempdir().unwrap();
        let fp = {
            let xc = backend(&tmp.path().join("one"), "pw");
            let fp = xc
                .generate_key(Identity::new("alice", "a@x"), "pw", KdfParams::insecure_fast())
                .unwrap();
            let other = backend(&tmp.path().join("two"), "pw");
            other
                .import_private_key(&xc.export_private_key(&fp).unwrap())
                .unwrap();
            fp
        };

        let xc = backend(&tmp.path().join("two"), "pw");
        assert_eq!(xc.list_private_keys().unwrap(), vec![fp.clone()]);
        assert_eq!(xc.list_public_keys().unwrap(), vec![fp.clone()]);
        assert_eq!(xc.key_status(&fp), KeyStatus::Usable);
        assert!(xc.format_key(&fp).ends_with("alice <a@x>"));
        assert!(matches!(
            xc.export_private_key("nope"),
            Err(Error::Keyring(KeyringError::NotExportable(_)))
        ));
    }

    #[test]
    fn test_tampered_chunk_fails_generically() {
        let tmp = tempfile::tempdir().unwrap();
        let xc = backend(tmp.path(), "pw");
        let fp = xc
            .generate_key(Identity::new("alice", ""), "pw", KdfParams::insecure_fast())
            .unwrap();
        let opts = OperationOptions::default();
        let ct = xc.encrypt(b"secret data", &[fp], &opts).unwrap();

        let mut msg = Message::parse(&ct).unwrap();
        msg.chunks[0].0[0] ^= 0x01;
        let tampered = msg.to_bytes().unwrap();
        assert!(matches!(
            xc.decrypt(&tampered, &opts),
            Err(Error::Cipher(CipherError::DecryptFailed))
        ));
    }
}
