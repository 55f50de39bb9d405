//! Age encryption backend implementation.
//!
//! Recipients are `age1…` x25519 public keys and are self-describing, so
//! there is no public keyring: any well-formed recipient is usable. Local
//! identities live one per line in `identities.txt`. The age format hides
//! who a file was encrypted to, so recipient listing is unsupported.

use std::fs;
use std::io::{ErrorKind, Read, Write};
use std::path::{Path, PathBuf};

use ::age::secrecy::ExposeSecret;
use ::age::x25519;
use tracing::{debug, trace};
use zeroize::Zeroizing;

use super::{match_suffix, Cipher, KeyCache, KeyStatus};
use crate::core::fs::atomic_write;
use crate::core::options::OperationOptions;
use crate::error::{CipherError, KeyringError, Result};

const IDENTITIES_FILE: &str = "identities.txt";

/// Age-based cryptographic backend using x25519 keys
pub struct Age {
    identities_file: PathBuf,
    cache: KeyCache,
}

impl Age {
    pub fn open(dir: &Path) -> Self {
        Self {
            identities_file: dir.join(IDENTITIES_FILE),
            cache: KeyCache::new(),
        }
    }

    fn identities(&self) -> Result<Vec<x25519::Identity>> {
        let content = match fs::read_to_string(&self.identities_file) {
            Ok(c) => Zeroizing::new(c),
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(source) => {
                return Err(KeyringError::Io {
                    path: self.identities_file.clone(),
                    source,
                }
                .into())
            }
        };
        content
            .lines()
            .map(str::trim)
            .filter(|l| !l.is_empty() && !l.starts_with('#'))
            .map(|l| {
                l.parse::<x25519::Identity>().map_err(|_| {
                    KeyringError::Malformed(format!(
                        "invalid identity in {}",
                        self.identities_file.display()
                    ))
                    .into()
                })
            })
            .collect()
    }

    /// Generate an identity and append it to the identities file.
    /// Returns the public recipient string.
    pub fn generate_identity(&self) -> Result<String> {
        let identity = x25519::Identity::generate();
        let recipient = identity.to_public().to_string();

        let mut content = Zeroizing::new(match fs::read_to_string(&self.identities_file) {
            Ok(c) => c,
            Err(e) if e.kind() == ErrorKind::NotFound => String::new(),
            Err(e) => return Err(e.into()),
        });
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        content.push_str(&format!("# public key: {recipient}\n"));
        content.push_str(identity.to_string().expose_secret());
        content.push('\n');

        atomic_write(&self.identities_file, content.as_bytes())?;
        self.cache.invalidate();
        debug!(recipient = %recipient, "generated age identity");
        Ok(recipient)
    }
}

impl Cipher for Age {
    fn name(&self) -> &'static str {
        "age"
    }

    fn ext(&self) -> &'static str {
        "age"
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
        opts.cancel.check()?;
        trace!(
            recipients = recipients.len(),
            plaintext_len = plaintext.len(),
            "encrypting"
        );

        let parsed: Vec<x25519::Recipient> = recipients
            .iter()
            .map(|r| parse_recipient(r))
            .collect::<Result<_>>()?;

        let encryptor =
            age::Encryptor::with_recipients(parsed.iter().map(|r| r as &dyn age::Recipient))
                .map_err(|e| CipherError::EncryptFailed(e.to_string()))?;

        let mut encrypted = Vec::new();
        let mut writer = encryptor
            .wrap_output(age::armor::ArmoredWriter::wrap_output(
                &mut encrypted,
                age::armor::Format::AsciiArmor,
            )?)
            .map_err(|e| CipherError::EncryptFailed(e.to_string()))?;

        writer.write_all(plaintext)?;
        let armored = writer
            .finish()
            .map_err(|e| CipherError::EncryptFailed(e.to_string()))?;
        armored
            .finish()
            .map_err(|e| CipherError::EncryptFailed(format!("armor: {e}")))?;

        trace!(ciphertext_len = encrypted.len(), "encrypted");
        Ok(encrypted)
    }

    fn decrypt(&self, ciphertext: &[u8], opts: &OperationOptions) -> Result<Zeroizing<Vec<u8>>> {
        opts.cancel.check()?;
        trace!(ciphertext_len = ciphertext.len(), "decrypting");

        let identities = self.identities()?;
        if identities.is_empty() {
            return Err(CipherError::NoDecryptionKey.into());
        }

        let reader = age::armor::ArmoredReader::new(ciphertext);
        let decryptor =
            age::Decryptor::new(reader).map_err(|e| CipherError::Malformed(e.to_string()))?;

        let mut reader = decryptor
            .decrypt(identities.iter().map(|i| i as &dyn age::Identity))
            .map_err(|e| match e {
                age::DecryptError::NoMatchingKeys => CipherError::NoDecryptionKey,
                _ => CipherError::DecryptFailed,
            })?;

        let mut decrypted = Zeroizing::new(Vec::new());
        reader
            .read_to_end(&mut decrypted)
            .map_err(|_| CipherError::DecryptFailed)?;

        trace!(plaintext_len = decrypted.len(), "decrypted");
        Ok(decrypted)
    }

    fn recipient_ids(&self, _ciphertext: &[u8]) -> Result<Vec<String>> {
        Err(CipherError::Unsupported {
            backend: "age",
            op: "listing recipients",
        }
        .into())
    }

    fn list_public_keys(&self) -> Result<Vec<String>> {
        self.list_private_keys()
    }

    fn list_private_keys(&self) -> Result<Vec<String>> {
        self.cache.private_keys(|| {
            Ok(self
                .identities()?
                .iter()
                .map(|i| i.to_public().to_string())
                .collect())
        })
    }

    fn find_public_keys(&self, search: &[String]) -> Result<Vec<String>> {
        let mut found = match_suffix(&self.list_public_keys()?, search);
        found.extend(
            search
                .iter()
                .filter(|s| parse_recipient(s).is_ok())
                .cloned(),
        );
        found.sort();
        found.dedup();
        Ok(found)
    }

    fn key_status(&self, id: &str) -> KeyStatus {
        match parse_recipient(id) {
            Ok(_) => KeyStatus::Usable,
            Err(_) => KeyStatus::Unusable("not an age recipient".to_string()),
        }
    }

    fn export_public_key(&self, id: &str) -> Result<Vec<u8>> {
        let recipient = parse_recipient(id)?;
        Ok(format!("{recipient}\n").into_bytes())
    }

    fn import_public_key(&self, buf: &[u8]) -> Result<String> {
        let text = String::from_utf8_lossy(buf);
        let id = text.trim();
        parse_recipient(id)?;
        Ok(id.to_string())
    }
}

/// Parse a public key string into an age recipient
///
/// # Errors
///
/// Returns `CipherError::InvalidPublicKey` if the key format is invalid.
pub fn parse_recipient(key: &str) -> Result<x25519::Recipient> {
    key.parse::<x25519::Recipient>()
        .map_err(|_| CipherError::InvalidPublicKey(key.to_string()).into())
}
