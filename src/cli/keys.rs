//! Keys command.
//!
//! Generate, list, export and import keys of the configured backend.

use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::info;

use crate::cli::context::{backend_dir, config_path, passphrases};
use crate::cli::output;
use crate::cli::prompt::new_passphrase;
use crate::core::cipher::xc::{Identity, KdfParams};
use crate::core::cipher::{Age, CipherBackend, Xc, PLAIN_KEY};
use crate::core::config::Config;
use crate::error::{CipherError, Result};

/// Create a key for `backend` and return its recipient id.
pub fn create_key(
    config_path: &Path,
    backend: CipherBackend,
    name: Option<String>,
    email: Option<String>,
) -> Result<String> {
    let id = match backend {
        CipherBackend::Xc => {
            let xc = Xc::open(backend_dir(config_path, backend.as_str()), passphrases())?;
            let identity = Identity::new(
                name.unwrap_or_else(whoami::realname),
                email.unwrap_or_else(default_email),
            );
            let pass = new_passphrase()?;
            xc.generate_key(identity, &pass, KdfParams::default())?
        }
        CipherBackend::Age => Age::open(&backend_dir(config_path, backend.as_str())).generate_identity()?,
        CipherBackend::Plain => PLAIN_KEY.to_string(),
    };
    info!(backend = %backend, key = %id, "created key");
    Ok(id)
}

fn default_email() -> String {
    let host = whoami::fallible::hostname().unwrap_or_else(|_| "localhost".to_string());
    format!("{}@{}", whoami::username(), host)
}

fn load(config: Option<PathBuf>) -> Result<(PathBuf, Config)> {
    let path = config_path(config)?;
    let cfg = Config::load_from(&path)?;
    Ok((path, cfg))
}

/// Generate a new key pair.
pub fn generate(config: Option<PathBuf>, name: Option<String>, email: Option<String>) -> Result<()> {
    let (path, cfg) = load(config)?;
    let id = create_key(&path, cfg.cellar.backend, name, email)?;
    output::success(&format!("generated key {}", output::name(&id)));
    output::hint(&format!("add it to a store: cellar recipients add {}", id));
    Ok(())
}

/// List public and private keys.
pub fn list(config: Option<PathBuf>) -> Result<()> {
    let (path, cfg) = load(config)?;
    let crypto = cfg.cellar.backend.open(&Config::keys_dir(&path), passphrases())?;

    output::header("Private keys");
    let private = crypto.list_private_keys()?;
    if private.is_empty() {
        output::dimmed("  none");
    }
    for id in &private {
        output::list_item(&crypto.format_key(id));
    }

    output::header("Public keys");
    for id in crypto.list_public_keys()? {
        output::list_item(&crypto.format_key(&id));
    }
    Ok(())
}

/// Print a key to stdout.
pub fn export(config: Option<PathBuf>, id: &str, private: bool) -> Result<()> {
    let (path, cfg) = load(config)?;
    let buf = if private {
        match cfg.cellar.backend {
            CipherBackend::Xc => Xc::open(backend_dir(&path, "xc"), passphrases())?.export_private_key(id)?,
            other => {
                return Err(CipherError::Unsupported {
                    backend: other.as_str(),
                    op: "private key export",
                }
                .into())
            }
        }
    } else {
        let crypto = cfg.cellar.backend.open(&Config::keys_dir(&path), passphrases())?;
        let found = crypto.find_public_keys(&[id.to_string()])?;
        let full = found.first().map(String::as_str).unwrap_or(id);
        crypto.export_public_key(full)?
    };
    let mut out = std::io::stdout().lock();
    out.write_all(&buf)?;
    if !buf.ends_with(b"\n") {
        out.write_all(b"\n")?;
    }
    Ok(())
}

/// Import a key from a file.
pub fn import(config: Option<PathBuf>, file: &Path, private: bool) -> Result<()> {
    let (path, cfg) = load(config)?;
    let buf = std::fs::read(file)?;
    let id = if private {
        match cfg.cellar.backend {
            CipherBackend::Xc => Xc::open(backend_dir(&path, "xc"), passphrases())?.import_private_key(&buf)?,
            other => {
                return Err(CipherError::Unsupported {
                    backend: other.as_str(),
                    op: "private key import",
                }
                .into())
            }
        }
    } else {
        let crypto = cfg.cellar.backend.open(&Config::keys_dir(&path), passphrases())?;
        crypto.import_public_key(&buf)?
    };
    output::success(&format!("imported {}", output::name(&id)));
    Ok(())
}
