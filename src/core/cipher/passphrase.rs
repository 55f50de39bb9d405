//! Passphrase collaborator for unlocking private keys.

use zeroize::Zeroizing;

use crate::core::options::CancelToken;
use crate::error::Result;

/// Supplies (and may cache) passphrases for private keys.
///
/// `forget` is called after a wrong passphrase so the next request asks
/// again instead of replaying the cached value.
pub trait PassphraseSource: Send + Sync {
    fn passphrase(
        &self,
        key_id: &str,
        reason: &str,
        cancel: &CancelToken,
    ) -> Result<Zeroizing<String>>;

    fn forget(&self, key_id: &str) -> Result<()>;
}

/// A fixed passphrase, e.g. from `CELLAR_PASSPHRASE`.
pub struct StaticPassphrase(Zeroizing<String>);

impl StaticPassphrase {
    pub fn new(passphrase: impl Into<String>) -> Self {
        Self(Zeroizing::new(passphrase.into()))
    }
}

impl PassphraseSource for StaticPassphrase {
    fn passphrase(
        &self,
        _key_id: &str,
        _reason: &str,
        cancel: &CancelToken,
    ) -> Result<Zeroizing<String>> {
        cancel.check()?;
        Ok(self.0.clone())
    }

    fn forget(&self, _key_id: &str) -> Result<()> {
        Ok(())
    }
}

impl std::fmt::Debug for StaticPassphrase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticPassphrase([redacted])")
    }
}
