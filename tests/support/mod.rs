//! Test support utilities for cellar integration tests.
//!
//! `fixtures` builds stores in-process (fast keys, recording sync, scripted
//! confirmations); `Test` drives the binary against a throwaway config.

#![allow(dead_code)]

pub mod assertions;
pub mod commands;
pub mod fixtures;

#[allow(unused_imports)]
pub use assertions::*;
#[allow(unused_imports)]
pub use fixtures::*;

use std::path::PathBuf;

use tempfile::TempDir;

/// Isolated environment for CLI tests.
///
/// Config, keys and stores all live under one temp dir; child processes get
/// `CELLAR_CONFIG` and `HOME` pointed into it, so tests run in parallel.
pub struct Test {
    pub dir: TempDir,
}

impl Test {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("failed to create temp dir"),
        }
    }

    /// A test environment with `cellar init` done on the plain backend.
    pub fn init() -> Self {
        let t = Self::new();
        let output = t.init_cmd();
        assert!(
            output.status.success(),
            "Failed to initialize: {}",
            String::from_utf8_lossy(&output.stderr)
        );
        t
    }

    /// Initialized, with secrets inserted.
    pub fn with_secrets(secrets: &[(&str, &str)]) -> Self {
        let t = Self::init();
        for (name, content) in secrets {
            let output = t.insert(name, content);
            assert!(
                output.status.success(),
                "Failed to insert {}: {}",
                name,
                String::from_utf8_lossy(&output.stderr)
            );
        }
        t
    }

    pub fn config_path(&self) -> PathBuf {
        self.dir.path().join("config").join("config.toml")
    }

    pub fn store_path(&self) -> PathBuf {
        self.dir.path().join("store")
    }
}
