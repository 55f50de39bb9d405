//! Cipher backend selection.
//!
//! Each mount names its backend in the config (`xc` by default). Key
//! material for a backend lives in its own subdirectory of the keys dir.

use std::fmt;
use std::path::Path;
use std::str::FromStr;
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use tracing::debug;

use super::{Age, Cipher, PassphraseSource, Plain, Xc};
use crate::error::{ConfigError, Error, Result};

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CipherBackend {
    /// Reference envelope protocol (default)
    #[default]
    Xc,

    /// age x25519
    Age,

    /// No encryption; for tests only
    Plain,
}

impl CipherBackend {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Xc => "xc",
            Self::Age => "age",
            Self::Plain => "plain",
        }
    }

    /// Instantiate the backend, keeping its keys under `keys_dir/<name>`.
    pub fn open(
        self,
        keys_dir: &Path,
        passphrases: Arc<dyn PassphraseSource>,
    ) -> Result<Arc<dyn Cipher>> {
        let dir = keys_dir.join(self.as_str());
        debug!(backend = self.as_str(), dir = %dir.display(), "creating cipher backend");
        Ok(match self {
            Self::Xc => Arc::new(Xc::open(dir, passphrases)?),
            Self::Age => Arc::new(Age::open(&dir)),
            Self::Plain => Arc::new(Plain::default()),
        })
    }
}

impl FromStr for CipherBackend {
    type Err = Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "xc" => Ok(Self::Xc),
            "age" => Ok(Self::Age),
            "plain" => Ok(Self::Plain),
            other => Err(ConfigError::UnknownBackend(other.to_string()).into()),
        }
    }
}

impl fmt::Display for CipherBackend {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}
