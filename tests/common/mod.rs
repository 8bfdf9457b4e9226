//! Common test utilities for daylog integration tests.
//!
//! Provides `TestEnv` for isolated test environments that don't touch the
//! user's real config or data directories.

#![allow(dead_code)]

use assert_cmd::Command;
use std::path::PathBuf;
pub use tempfile::TempDir;

/// A test environment with isolated config and data storage.
///
/// The `dl()` method returns a `Command` with `DAYLOG_CONFIG_DIR` and
/// `DAYLOG_DATA_DIR` set per-invocation, making tests parallel-safe.
pub struct TestEnv {
    pub config_dir: TempDir,
    pub data_dir: TempDir,
}

impl TestEnv {
    pub fn new() -> Self {
        Self {
            config_dir: TempDir::new().unwrap(),
            data_dir: TempDir::new().unwrap(),
        }
    }

    /// Get a Command for the dl binary with isolated directories.
    pub fn dl(&self) -> Command {
        let mut cmd = Command::new(env!("CARGO_BIN_EXE_dl"));
        cmd.env("DAYLOG_CONFIG_DIR", self.config_dir.path());
        cmd.env("DAYLOG_DATA_DIR", self.data_dir.path());
        cmd.env_remove("DAYLOG_BACKEND");
        cmd
    }

    /// Default flat-file directory for this environment.
    pub fn files_dir(&self) -> PathBuf {
        self.data_dir.path().join("files")
    }

    /// Run a dl command and parse its JSON stdout.
    pub fn dl_json(&self, args: &[&str]) -> serde_json::Value {
        let assert = self.dl().args(args).assert().success();
        serde_json::from_slice(&assert.get_output().stdout).unwrap()
    }
}

impl Default for TestEnv {
    fn default() -> Self {
        Self::new()
    }
}
