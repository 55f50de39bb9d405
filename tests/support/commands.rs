//! Command helper methods for Test.

use super::Test;
use assert_cmd::Command;
use std::process::Output;

impl Test {
    /// A cellar command pointed at this test's config.
    pub fn cmd(&self) -> Command {
        #[allow(deprecated)]
        let mut cmd = Command::cargo_bin("cellar").expect("failed to find cellar binary");
        cmd.env("CELLAR_CONFIG", self.config_path());
        cmd.env("HOME", self.dir.path());
        cmd.env("USERPROFILE", self.dir.path());
        cmd.env("NO_COLOR", "1");
        cmd.env_remove("CELLAR_LOG");
        cmd.current_dir(self.dir.path());
        cmd
    }

    /// `cellar init` on the plain backend, without git.
    pub fn init_cmd(&self) -> Output {
        let output = self
            .cmd()
            .args(["init", "--backend", "plain", "--path"])
            .arg(self.store_path())
            .output()
            .expect("failed to run cellar init");
        if output.status.success() {
            // keep tests independent of a git binary
            let config = std::fs::read_to_string(self.config_path()).expect("config written");
            let config = config.replace("autosync = true", "autosync = false");
            std::fs::write(self.config_path(), config).expect("config rewritten");
        }
        output
    }

    /// `cellar insert -f`, content piped on stdin.
    pub fn insert(&self, name: &str, content: &str) -> Output {
        self.cmd()
            .args(["insert", "-f", name])
            .write_stdin(content)
            .output()
            .expect("failed to run cellar insert")
    }

    pub fn show(&self, name: &str) -> Output {
        self.cmd()
            .args(["show", name])
            .output()
            .expect("failed to run cellar show")
    }

    pub fn run(&self, args: &[&str]) -> Output {
        self.cmd()
            .args(args)
            .output()
            .expect("failed to run cellar")
    }
}
