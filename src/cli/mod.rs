//! Command-line interface.

pub mod audit;
pub mod completions;
pub mod context;
pub mod fsck;
pub mod init;
pub mod keys;
pub mod mounts;
pub mod output;
pub mod prompt;
pub mod recipients;
pub mod secrets;

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::core::cipher::CipherBackend;
use crate::error::Result;

/// Cellar - hierarchical multi-recipient encrypted secret store.
#[derive(Parser)]
#[command(name = "cellar", about = "Hierarchical multi-recipient encrypted secret store", version)]
pub struct Cli {
    /// Config file (default: <config dir>/cellar/config.toml)
    #[arg(long, global = true, env = "CELLAR_CONFIG")]
    pub config: Option<PathBuf>,

    /// Verbose logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    #[command(subcommand)]
    pub command: Command,
}

/// Top-level commands.
#[derive(Subcommand)]
pub enum Command {
    /// Create the config, a first key and the root store
    Init {
        /// Root store directory
        #[arg(long)]
        path: Option<PathBuf>,
        /// Crypto backend: xc, age or plain
        #[arg(long, default_value = "xc")]
        backend: CipherBackend,
        /// Use these recipients instead of generating a key
        #[arg(short, long = "recipient")]
        recipients: Vec<String>,
        /// Name for the generated key
        #[arg(long)]
        name: Option<String>,
        /// Email for the generated key
        #[arg(long)]
        email: Option<String>,
    },

    /// Manage keys in the local keyring
    Keys {
        #[command(subcommand)]
        action: KeysAction,
    },

    /// Show a secret
    Show {
        name: String,
        /// Print only this YAML key
        #[arg(short, long)]
        key: Option<String>,
        /// Print only the password
        #[arg(short, long)]
        password: bool,
    },

    /// Insert a secret (reads stdin when it is not a terminal)
    Insert {
        name: String,
        /// Overwrite without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Remove a secret
    Rm {
        name: String,
        /// Remove a whole directory
        #[arg(short, long)]
        recursive: bool,
        /// Don't ask
        #[arg(short, long)]
        force: bool,
    },

    /// Move a secret or directory, re-encrypting for the destination
    Mv {
        from: String,
        to: String,
        #[arg(short, long)]
        force: bool,
    },

    /// Copy a secret or directory, re-encrypting for the destination
    Cp {
        from: String,
        to: String,
        #[arg(short, long)]
        force: bool,
    },

    /// List secrets as a tree
    Ls {
        prefix: Option<String>,
        /// One full name per line
        #[arg(long)]
        flat: bool,
    },

    /// Manage mounted stores
    Mounts {
        #[command(subcommand)]
        action: MountsAction,
    },

    /// Manage a store's recipients
    Recipients {
        #[command(subcommand)]
        action: RecipientsAction,
    },

    /// Check and repair stores
    Fsck {
        prefix: Option<String>,
        /// Report only, change nothing
        #[arg(long, conflicts_with = "force")]
        check: bool,
        /// Fix without asking
        #[arg(short, long)]
        force: bool,
    },

    /// Report empty, short and reused passwords
    Audit { prefix: Option<String> },

    /// Generate shell completions
    Completions {
        /// Shell to generate completions for
        #[arg(value_enum)]
        shell: Shell,
    },
}

/// Supported shells for completions.
#[derive(clap::ValueEnum, Clone, Debug)]
pub enum Shell {
    Bash,
    Zsh,
    Fish,
    PowerShell,
}

#[derive(Subcommand)]
pub enum KeysAction {
    /// Generate a new key pair
    Generate {
        #[arg(long)]
        name: Option<String>,
        #[arg(long)]
        email: Option<String>,
    },
    /// List public and private keys
    List,
    /// Print a public key (or, with --private, the encrypted private key)
    Export {
        id: String,
        #[arg(long)]
        private: bool,
    },
    /// Import a key from a file
    Import {
        file: PathBuf,
        #[arg(long)]
        private: bool,
    },
}

#[derive(Subcommand)]
pub enum MountsAction {
    /// Mount a store directory at an alias
    Add {
        alias: String,
        path: PathBuf,
        /// Initialize the store for these recipients if needed
        #[arg(short, long = "recipient")]
        recipients: Vec<String>,
    },
    /// Unmount an alias (files are kept)
    Rm { alias: String },
    /// List mounts
    Ls,
}

#[derive(Subcommand)]
pub enum RecipientsAction {
    /// List recipients
    Ls {
        /// Mount alias (default: root store)
        #[arg(long, default_value = "")]
        store: String,
    },
    /// Add a recipient and re-encrypt the store
    Add {
        id: String,
        #[arg(long, default_value = "")]
        store: String,
    },
    /// Remove a recipient and re-encrypt the store
    Rm {
        id: String,
        #[arg(long, default_value = "")]
        store: String,
    },
}

/// Execute a command.
pub fn execute(cli: Cli) -> Result<()> {
    use Command::*;

    let config = cli.config;
    match cli.command {
        Init {
            path,
            backend,
            recipients,
            name,
            email,
        } => init::execute(config, path, backend, recipients, name, email),
        Keys { action } => match action {
            KeysAction::Generate { name, email } => keys::generate(config, name, email),
            KeysAction::List => keys::list(config),
            KeysAction::Export { id, private } => keys::export(config, &id, private),
            KeysAction::Import { file, private } => keys::import(config, &file, private),
        },
        Show {
            name,
            key,
            password,
        } => secrets::show(config, &name, key.as_deref(), password),
        Insert { name, force } => secrets::insert(config, &name, force),
        Rm {
            name,
            recursive,
            force,
        } => secrets::rm(config, &name, recursive, force),
        Mv { from, to, force } => secrets::mv(config, &from, &to, force),
        Cp { from, to, force } => secrets::cp(config, &from, &to, force),
        Ls { prefix, flat } => secrets::ls(config, prefix.as_deref().unwrap_or(""), flat),
        Mounts { action } => match action {
            MountsAction::Add {
                alias,
                path,
                recipients,
            } => mounts::add(config, &alias, &path, &recipients),
            MountsAction::Rm { alias } => mounts::rm(config, &alias),
            MountsAction::Ls => mounts::ls(config),
        },
        Recipients { action } => match action {
            RecipientsAction::Ls { store } => recipients::ls(config, &store),
            RecipientsAction::Add { id, store } => recipients::add(config, &store, &id),
            RecipientsAction::Rm { id, store } => recipients::rm(config, &store, &id),
        },
        Fsck {
            prefix,
            check,
            force,
        } => fsck::execute(config, prefix.as_deref().unwrap_or(""), check, force),
        Audit { prefix } => audit::execute(config, prefix.as_deref().unwrap_or("")),
        Completions { shell } => completions::execute(shell),
    }
}
