//! Cryptographic backends.
//!
//! Every store encrypts through the [`Cipher`] trait, so backends are
//! interchangeable per mount.
//!
//! ## Backends
//!
//! - **xc**: reference envelope protocol. X25519 key wrapping per
//!   recipient, chunked XChaCha20-Poly1305 body, Argon2id-protected keyring.
//! - **age**: wraps the age library. Recipients are `age1…` strings.
//! - **plain**: no encryption at all. Test-only.
//!
//! ## Adding a New Backend
//!
//! 1. Implement the `Cipher` trait
//! 2. Add the implementation in a new file
//! 3. Register its identifier in `backend.rs`

use zeroize::Zeroizing;

use crate::core::options::OperationOptions;
use crate::error::Result;

mod age;
mod backend;
mod cache;
mod passphrase;
mod plain;
pub mod xc;

pub use self::age::Age;
pub use backend::CipherBackend;
pub use cache::KeyCache;
pub use passphrase::{PassphraseSource, StaticPassphrase};
pub use plain::{Plain, PLAIN_KEY};
pub use xc::Xc;

/// What the backend knows about a recipient's public key.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum KeyStatus {
    /// No local public key for this id.
    Unknown,
    Usable,
    /// Known locally but expired or revoked.
    Unusable(String),
}

/// Cryptographic backend contract.
///
/// Recipients are backend-specific key identifiers:
/// - xc: 40 hex character fingerprints
/// - age: `age1…` public keys
/// - plain: arbitrary strings
pub trait Cipher: Send + Sync {
    /// Backend name for display/config.
    fn name(&self) -> &'static str;

    /// File extension for encrypted secrets, without the dot.
    fn ext(&self) -> &'static str;

    /// Encrypt `plaintext` so every recipient can decrypt it.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::NoRecipients` for an empty list.
    fn encrypt(
        &self,
        plaintext: &[u8],
        recipients: &[String],
        opts: &OperationOptions,
    ) -> Result<Vec<u8>>;

    /// Decrypt with whichever local private key matches a recipient.
    ///
    /// # Errors
    ///
    /// Returns `CipherError::NoDecryptionKey` if no local key matches, and
    /// `CipherError::DecryptFailed` if a matched key fails to authenticate.
    fn decrypt(&self, ciphertext: &[u8], opts: &OperationOptions) -> Result<Zeroizing<Vec<u8>>>;

    /// Recipient ids embedded in the ciphertext, sorted. No private key needed.
    fn recipient_ids(&self, ciphertext: &[u8]) -> Result<Vec<String>>;

    /// Local private keys listed in `ciphertext` whose wrapped session key
    /// fails to open. Backends that cannot tell return nothing.
    fn unreadable_recipients(
        &self,
        _ciphertext: &[u8],
        _opts: &OperationOptions,
    ) -> Result<Vec<String>> {
        Ok(Vec::new())
    }

    /// Id the backend adds on its own (the writer), if any.
    fn sender_id(&self, _ciphertext: &[u8]) -> Result<Option<String>> {
        Ok(None)
    }

    fn list_public_keys(&self) -> Result<Vec<String>>;

    fn list_private_keys(&self) -> Result<Vec<String>>;

    /// Public key ids ending with any of `search`.
    fn find_public_keys(&self, search: &[String]) -> Result<Vec<String>> {
        Ok(match_suffix(&self.list_public_keys()?, search))
    }

    /// Private key ids ending with any of `search`.
    fn find_private_keys(&self, search: &[String]) -> Result<Vec<String>> {
        Ok(match_suffix(&self.list_private_keys()?, search))
    }

    fn key_status(&self, _id: &str) -> KeyStatus {
        KeyStatus::Unknown
    }

    /// Serialize a public key for bundling next to the secrets.
    fn export_public_key(&self, id: &str) -> Result<Vec<u8>>;

    /// Import a bundled public key, returning its id.
    fn import_public_key(&self, buf: &[u8]) -> Result<String>;

    /// Human-readable key description.
    fn format_key(&self, id: &str) -> String {
        id.to_string()
    }
}

/// Candidates that end with any needle, sorted and de-duplicated.
pub(crate) fn match_suffix(candidates: &[String], search: &[String]) -> Vec<String> {
    let mut ids: Vec<String> = candidates
        .iter()
        .filter(|c| search.iter().any(|n| !n.is_empty() && c.ends_with(n.as_str())))
        .cloned()
        .collect();
    ids.sort();
    ids.dedup();
    ids
}
