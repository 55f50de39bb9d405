//! Interactive collaborators: confirmation and passphrase prompts.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use dialoguer::{Confirm as ConfirmPrompt, Password};
use zeroize::Zeroizing;

use crate::core::cipher::PassphraseSource;
use crate::core::options::{CancelToken, Confirm};
use crate::error::{CipherError, Result};

/// Environment variable supplying the passphrase non-interactively.
pub const PASSPHRASE_ENV: &str = "CELLAR_PASSPHRASE";

/// Asks on the terminal; answers "no" when there is no terminal.
#[derive(Debug, Default, Clone, Copy)]
pub struct TerminalConfirm;

impl Confirm for TerminalConfirm {
    fn confirm(&self, prompt: &str) -> bool {
        if !atty::is(atty::Stream::Stdin) {
            return false;
        }
        ConfirmPrompt::new()
            .with_prompt(prompt)
            .default(false)
            .interact()
            .unwrap_or(false)
    }
}

/// `CELLAR_PASSPHRASE` if set, otherwise a hidden prompt. Answers are
/// cached per key until forgotten.
#[derive(Default)]
pub struct PromptPassphrase {
    cache: Mutex<HashMap<String, Zeroizing<String>>>,
}

impl PromptPassphrase {
    pub fn new() -> Self {
        Self::default()
    }
}

impl PassphraseSource for PromptPassphrase {
    fn passphrase(
        &self,
        key_id: &str,
        reason: &str,
        cancel: &CancelToken,
    ) -> Result<Zeroizing<String>> {
        cancel.check()?;
        if let Ok(pass) = std::env::var(PASSPHRASE_ENV) {
            return Ok(Zeroizing::new(pass));
        }
        let mut cache = self.cache.lock().unwrap_or_else(PoisonError::into_inner);
        if let Some(pass) = cache.get(key_id) {
            return Ok(pass.clone());
        }
        if !atty::is(atty::Stream::Stdin) {
            return Err(CipherError::Passphrase(format!(
                "no terminal to ask for the passphrase of {key_id}; set {PASSPHRASE_ENV}"
            ))
            .into());
        }
        let pass = Password::new()
            .with_prompt(format!("Passphrase for {} ({})", short(key_id), reason))
            .interact()
            .map_err(|e| CipherError::Passphrase(e.to_string()))?;
        cancel.check()?;
        let pass = Zeroizing::new(pass);
        cache.insert(key_id.to_string(), pass.clone());
        Ok(pass)
    }

    fn forget(&self, key_id: &str) -> Result<()> {
        self.cache
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(key_id);
        Ok(())
    }
}

/// Passphrase for a new key, entered twice.
pub fn new_passphrase() -> Result<Zeroizing<String>> {
    if let Ok(pass) = std::env::var(PASSPHRASE_ENV) {
        return Ok(Zeroizing::new(pass));
    }
    let pass = Password::new()
        .with_prompt("Passphrase for the new key")
        .with_confirmation("Repeat passphrase", "passphrases don't match")
        .interact()
        .map_err(|e| CipherError::Passphrase(e.to_string()))?;
    Ok(Zeroizing::new(pass))
}

fn short(id: &str) -> &str {
    &id[id.len().saturating_sub(16)..]
}
