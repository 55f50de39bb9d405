//! Constants used throughout cellar.
//!
//! Centralizes on-disk names and protocol parameters.

/// Per-directory recipient list file.
pub const ID_FILE: &str = ".cellar-id";

/// Directory holding exported public keys next to the secrets.
pub const KEY_DIR: &str = ".public-keys";

/// Configuration file name inside the config directory.
pub const CONFIG_FILE: &str = "config.toml";

/// Application directory under the platform config dir.
pub const APP_DIR: &str = "cellar";

/// Path separator for logical secret names.
pub const SEP: char = '/';

/// Permission bits for secret and metadata files.
pub const FILE_MODE: u32 = 0o600;

/// Permission bits for store directories.
pub const DIR_MODE: u32 = 0o700;

/// Upper bound on directory levels walked when looking for an id file.
pub const MAX_ID_FILE_DEPTH: usize = 100;

/// Default commit message when none is given.
pub const DEFAULT_REASON: &str = "cellar update";
