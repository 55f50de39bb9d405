//! Password audit over every secret in a root store.
//!
//! A bounded pool of workers pulls names from a job channel, decrypts each
//! secret and sends back only the password length and digest, so plaintext
//! never outlives the worker that read it. Results arrive in any order and
//! are sorted by name before being reported.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::{mpsc, Mutex};

use sha2::{Digest, Sha256};
use tracing::{debug, warn};

use crate::core::options::OperationOptions;
use crate::core::root::RootStore;
use crate::error::Result;

/// Passwords shorter than this are reported.
pub const MIN_PASSWORD_LEN: usize = 12;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Issue {
    Empty,
    Short { len: usize },
    /// Same password as the listed secrets.
    Duplicate { with: Vec<String> },
    ReadFailed(String),
}

impl fmt::Display for Issue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Empty => write!(f, "empty password"),
            Self::Short { len } => write!(f, "short password ({} chars)", len),
            Self::Duplicate { with } => write!(f, "password reused in {}", with.join(", ")),
            Self::ReadFailed(e) => write!(f, "cannot read: {}", e),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditEntry {
    pub name: String,
    pub issues: Vec<Issue>,
}

#[derive(Debug, Default, Clone)]
pub struct AuditReport {
    /// Secrets with at least one issue, sorted by name.
    pub entries: Vec<AuditEntry>,
    pub checked: usize,
}

impl AuditReport {
    pub fn is_clean(&self) -> bool {
        self.entries.is_empty()
    }
}

enum Outcome {
    Read { len: usize, digest: [u8; 32] },
    Failed(String),
}

/// Audit all secrets at or below `prefix`.
pub fn audit(root: &RootStore, prefix: &str, opts: &OperationOptions) -> Result<AuditReport> {
    let names = root.list(prefix)?;
    let workers = opts.concurrency.max(1).min(names.len().max(1));
    debug!(secrets = names.len(), workers, "auditing");

    let (job_tx, job_rx) = mpsc::channel::<String>();
    for name in &names {
        // receiver is alive until the scope below ends
        let _ = job_tx.send(name.clone());
    }
    drop(job_tx);
    let job_rx = Mutex::new(job_rx);
    let (result_tx, result_rx) = mpsc::channel::<(String, Outcome)>();

    std::thread::scope(|scope| {
        for _ in 0..workers {
            let result_tx = result_tx.clone();
            let job_rx = &job_rx;
            scope.spawn(move || loop {
                let next = match job_rx.lock() {
                    Ok(rx) => rx.recv(),
                    Err(_) => break,
                };
                let Ok(name) = next else { break };
                if opts.cancel.is_cancelled() {
                    break;
                }
                let outcome = match root.get(&name, opts) {
                    Ok(secret) => Outcome::Read {
                        len: secret.password().chars().count(),
                        digest: Sha256::digest(secret.password().as_bytes()).into(),
                    },
                    Err(e) => {
                        warn!(name = %name, error = %e, "audit could not read secret");
                        Outcome::Failed(e.to_string())
                    }
                };
                if result_tx.send((name, outcome)).is_err() {
                    break;
                }
            });
        }
    });
    drop(result_tx);
    opts.cancel.check()?;

    let mut results: Vec<(String, Outcome)> = result_rx.into_iter().collect();
    results.sort_by(|a, b| a.0.cmp(&b.0));

    let mut by_digest: BTreeMap<[u8; 32], Vec<String>> = BTreeMap::new();
    for (name, outcome) in &results {
        if let Outcome::Read { len, digest } = outcome {
            if *len > 0 {
                by_digest.entry(*digest).or_default().push(name.clone());
            }
        }
    }

    let mut report = AuditReport {
        entries: Vec::new(),
        checked: results.len(),
    };
    for (name, outcome) in results {
        let mut issues = Vec::new();
        match outcome {
            Outcome::Failed(e) => issues.push(Issue::ReadFailed(e)),
            Outcome::Read { len: 0, .. } => issues.push(Issue::Empty),
            Outcome::Read { len, digest } => {
                if len < MIN_PASSWORD_LEN {
                    issues.push(Issue::Short { len });
                }
                let others: Vec<String> = by_digest
                    .get(&digest)
                    .map(|names| names.iter().filter(|n| **n != name).cloned().collect())
                    .unwrap_or_default();
                if !others.is_empty() {
                    issues.push(Issue::Duplicate { with: others });
                }
            }
        }
        if !issues.is_empty() {
            report.entries.push(AuditEntry { name, issues });
        }
    }
    Ok(report)
}
