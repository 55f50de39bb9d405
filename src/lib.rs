//! Cellar - a hierarchical, multi-recipient encrypted secret store.
//!
//! # Architecture
//!
//! ```text
//! src/
//! ├── cli/              # Command-line interface
//! │   ├── init          # Config, first key, root store
//! │   ├── keys          # Keyring management
//! │   ├── secrets       # show/insert/rm/mv/cp/ls
//! │   ├── mounts        # Mount table
//! │   ├── recipients    # Recipient lists
//! │   ├── fsck, audit   # Maintenance
//! │   └── completions   # Shell completions
//! └── core/             # Core library components
//!     ├── secret        # Password + body (+ YAML) document
//!     ├── cipher/       # Cipher trait and backends
//!     │   ├── xc/       # Reference envelope protocol + keyrings
//!     │   ├── age       # age library wrapper
//!     │   └── plain     # No-op, tests only
//!     ├── store/        # Sub-store: CRUD, recipients, fsck
//!     ├── root/         # Mount resolver, cross-mount copy, tree
//!     ├── audit         # Parallel password audit
//!     ├── sync          # git commit/push collaborator
//!     ├── options       # OperationOptions, CancelToken, hooks
//!     └── config        # config.toml
//! ```
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//!
//! use cellar::core::cipher::Plain;
//! use cellar::core::options::{Hooks, OperationOptions};
//! use cellar::core::secret::Secret;
//! use cellar::core::store::Store;
//! use cellar::core::sync::NoopSync;
//!
//! # fn main() -> cellar::error::Result<()> {
//! let store = Store::new("", "/tmp/store", Arc::new(Plain::default()), Arc::new(NoopSync), Hooks::default());
//! let opts = OperationOptions::default();
//! store.init(&[cellar::core::cipher::PLAIN_KEY.to_string()], &opts)?;
//! store.set("db/prod", &Secret::new("s3cret", "---\nuser: admin\n"), &opts)?;
//! assert_eq!(store.get("db/prod", &opts)?.value("user")?, "admin");
//! # Ok(())
//! # }
//! ```

pub mod cli;
pub mod core;
pub mod error;
