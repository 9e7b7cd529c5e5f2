// Shared test helpers for integration tests
#![allow(dead_code)]

use assert_cmd::prelude::*;
use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;
use tempfile::{TempDir, tempdir};

/// `[testenv]` block shared by the fixtures: `sh` stands in for the
/// interpreter and no context is created, so no Python is needed.
pub const SHELL_TESTENV: &str = r#"
[testenv]
basepython = "sh"
create_command = []
"#;

/// Creates a temporary project directory holding `tox.toml` with `content`.
pub fn project_with(content: &str) -> (TempDir, PathBuf) {
    let dir = tempdir().expect("Failed to create temporary directory");
    let path = dir.path().join("tox.toml");
    fs::write(&path, content).expect("Failed to write tox.toml");
    (dir, path)
}

/// Same as [`project_with`], with [`SHELL_TESTENV`] prepended to `envs`.
pub fn shell_project(envs: &str) -> (TempDir, PathBuf) {
    project_with(&format!("{SHELL_TESTENV}\n{envs}"))
}

/// The `tox-matrix` binary running `run` against `config` in English.
pub fn run_cmd(config: &Path) -> Command {
    let mut cmd = Command::cargo_bin("tox-matrix").expect("binary is built");
    cmd.arg("--lang").arg("en").arg("run").arg("-c").arg(config);
    cmd
}

/// The `tox-matrix` binary running an arbitrary subcommand in English.
pub fn tox_matrix(args: &[&str]) -> Command {
    let mut cmd = Command::cargo_bin("tox-matrix").expect("binary is built");
    cmd.arg("--lang").arg("en").args(args);
    cmd
}
