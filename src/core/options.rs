//! Per-operation flags and injected user-interaction capabilities.
//!
//! Flags travel by value in [`OperationOptions`]; anything that may ask a
//! human lives behind a trait in [`Hooks`] so non-interactive runs can plug
//! in [`AlwaysConfirm`].

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use crate::core::constants::DEFAULT_REASON;
use crate::error::{CipherError, Result};

/// Cancellation signal shared between a caller and a running operation.
///
/// Checked before passphrase requests and before any file is written, so an
/// aborted unlock never leaves a partial write behind.
#[derive(Clone, Debug, Default)]
pub struct CancelToken {
    flag: Arc<AtomicBool>,
    deadline: Option<Instant>,
}

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    /// A token that trips by itself once `timeout` has elapsed.
    pub fn with_timeout(timeout: Duration) -> Self {
        Self {
            flag: Arc::default(),
            deadline: Some(Instant::now() + timeout),
        }
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.flag.load(Ordering::SeqCst) || self.deadline.is_some_and(|d| Instant::now() >= d)
    }

    /// Fail with `CipherError::Cancelled` if the token has tripped.
    pub fn check(&self) -> Result<()> {
        if self.is_cancelled() {
            return Err(CipherError::Cancelled.into());
        }
        Ok(())
    }
}

/// Flags for a single store operation.
#[derive(Clone, Debug)]
pub struct OperationOptions {
    /// Skip interactive confirmation but still perform fixes.
    pub force: bool,
    /// Report only, never mutate (fsck).
    pub check: bool,
    /// Only encrypt for recipients with a usable local public key.
    pub check_recipients: bool,
    /// Commit and push after writes.
    pub autosync: bool,
    /// Workers used for bulk re-encryption.
    pub concurrency: usize,
    /// Commit message for the next write.
    pub reason: String,
    pub cancel: CancelToken,
}

impl Default for OperationOptions {
    fn default() -> Self {
        Self {
            force: false,
            check: false,
            check_recipients: false,
            autosync: true,
            concurrency: 1,
            reason: DEFAULT_REASON.to_string(),
            cancel: CancelToken::default(),
        }
    }
}

impl OperationOptions {
    pub fn with_reason(mut self, reason: impl Into<String>) -> Self {
        self.reason = reason.into();
        self
    }

    pub fn forced(mut self) -> Self {
        self.force = true;
        self
    }

    pub fn check_only(mut self) -> Self {
        self.check = true;
        self
    }

    pub fn without_sync(mut self) -> Self {
        self.autosync = false;
        self
    }
}

/// Yes/no question to a human.
pub trait Confirm: Send + Sync {
    fn confirm(&self, prompt: &str) -> bool;
}

/// Approves everything. Used for forced and non-interactive runs.
#[derive(Debug, Default, Clone, Copy)]
pub struct AlwaysConfirm;

impl Confirm for AlwaysConfirm {
    fn confirm(&self, _prompt: &str) -> bool {
        true
    }
}

/// Lets the caller veto or edit the recipient list before a write.
pub trait RecipientReview: Send + Sync {
    /// Return the approved recipients for `name`, or an error to abort.
    fn review(&self, name: &str, recipients: Vec<String>) -> Result<Vec<String>>;
}

/// Capabilities handed to stores and fsck at construction.
#[derive(Clone)]
pub struct Hooks {
    /// fsck fixes and destructive actions.
    pub confirm: Arc<dyn Confirm>,
    /// Importing bundled public keys.
    pub import: Arc<dyn Confirm>,
    /// Recipient list review on `set_confirm`.
    pub recipients: Option<Arc<dyn RecipientReview>>,
}

impl Default for Hooks {
    fn default() -> Self {
        Self {
            confirm: Arc::new(AlwaysConfirm),
            import: Arc::new(AlwaysConfirm),
            recipients: None,
        }
    }
}

impl std::fmt::Debug for Hooks {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Hooks")
            .field("recipients", &self.recipients.is_some())
            .finish()
    }
}
