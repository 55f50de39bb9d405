//! Plaintext backend. Test-only: nothing is encrypted.
//!
//! Output is one header line naming the recipients followed by the raw
//! plaintext, so recipient bookkeeping still works end to end.

use zeroize::Zeroizing;

use super::{Cipher, KeyStatus};
use crate::core::options::OperationOptions;
use crate::error::{CipherError, Result};

const MAGIC: &str = "cellar-plain:";

/// Key id held by a default [`Plain`] backend.
pub const PLAIN_KEY: &str = "0000000000000000000000000000000DEADBEEF";

#[derive(Debug, Clone)]
pub struct Plain {
    keys: Vec<String>,
}

impl Default for Plain {
    fn default() -> Self {
        Self::new(vec![PLAIN_KEY.to_string()])
    }
}

impl Plain {
    /// A backend that "holds private keys" for `keys`.
    pub fn new(mut keys: Vec<String>) -> Self {
        keys.sort();
        keys.dedup();
        Self { keys }
    }

    fn split(ciphertext: &[u8]) -> Result<(Vec<String>, &[u8])> {
        let malformed = || CipherError::Malformed("missing plain header".to_string());
        let end = ciphertext
            .iter()
            .position(|&b| b == b'\n')
            .ok_or_else(malformed)?;
        let header = std::str::from_utf8(&ciphertext[..end]).map_err(|_| malformed())?;
        let list = header.strip_prefix(MAGIC).ok_or_else(malformed)?;
        let ids = list
            .split(',')
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();
        Ok((ids, &ciphertext[end + 1..]))
    }
}

impl Cipher for Plain {
    fn name(&self) -> &'static str {
        "plain"
    }

    fn ext(&self) -> &'static str {
        "txt"
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
        let mut ids: Vec<&str> = recipients.iter().map(String::as_str).collect();
        ids.sort_unstable();
        ids.dedup();

        let mut out = format!("{MAGIC}{}\n", ids.join(",")).into_bytes();
        out.extend_from_slice(plaintext);
        Ok(out)
    }

    fn decrypt(&self, ciphertext: &[u8], opts: &OperationOptions) -> Result<Zeroizing<Vec<u8>>> {
        opts.cancel.check()?;
        let (ids, body) = Self::split(ciphertext)?;
        if !ids.iter().any(|id| self.keys.contains(id)) {
            return Err(CipherError::NoDecryptionKey.into());
        }
        Ok(Zeroizing::new(body.to_vec()))
    }

    fn recipient_ids(&self, ciphertext: &[u8]) -> Result<Vec<String>> {
        Ok(Self::split(ciphertext)?.0)
    }

    fn list_public_keys(&self) -> Result<Vec<String>> {
        Ok(self.keys.clone())
    }

    fn list_private_keys(&self) -> Result<Vec<String>> {
        Ok(self.keys.clone())
    }

    /// Any id is a valid plain "public key".
    fn find_public_keys(&self, search: &[String]) -> Result<Vec<String>> {
        let mut ids: Vec<String> = search.iter().filter(|s| !s.is_empty()).cloned().collect();
        ids.sort();
        ids.dedup();
        Ok(ids)
    }

    fn key_status(&self, id: &str) -> KeyStatus {
        if self.keys.iter().any(|k| k == id) {
            KeyStatus::Usable
        } else {
            KeyStatus::Unknown
        }
    }

    fn export_public_key(&self, id: &str) -> Result<Vec<u8>> {
        Ok(format!("{id}\n").into_bytes())
    }

    fn import_public_key(&self, buf: &[u8]) -> Result<String> {
        let id = String::from_utf8_lossy(buf).trim().to_string();
        if id.is_empty() || id.contains(',') || id.contains('\n') {
            return Err(CipherError::InvalidPublicKey(id).into());
        }
        Ok(id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::Error;

    #[test]
    fn test_roundtrip_and_recipients() {
        let plain = Plain::default();
        let opts = OperationOptions::default();
        let ct = plain
            .encrypt(b"pw\nbody", &["b".into(), PLAIN_KEY.into(), "b".into()], &opts)
            .unwrap();
        assert_eq!(
            plain.recipient_ids(&ct).unwrap(),
            vec![PLAIN_KEY.to_string(), "b".to_string()]
        );
        assert_eq!(&*plain.decrypt(&ct, &opts).unwrap(), b"pw\nbody");
    }

    #[test]
    fn test_not_a_recipient() {
        let plain = Plain::new(vec!["me".into()]);
        let opts = OperationOptions::default();
        let ct = plain.encrypt(b"x", &["you".into()], &opts).unwrap();
        assert!(matches!(
            plain.decrypt(&ct, &opts),
            Err(Error::Cipher(CipherError::NoDecryptionKey))
        ));
        assert!(plain.decrypt(b"garbage", &opts).is_err());
    }
}
