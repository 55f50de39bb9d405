//! Core library components.
//!
//! Everything here is usable without the CLI: secret documents, crypto
//! backends, sub-stores, the mount-aware root store, fsck and audit.

pub mod audit;
pub mod cipher;
pub mod config;
pub mod constants;
pub mod fs;
pub mod options;
pub mod root;
pub mod secret;
pub mod store;
pub mod sync;
pub mod types;
