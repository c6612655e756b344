//! Integration tests for the `tcc-bridge` binary.
//!
//! Argument parsing, config handling and early failures; nothing here
//! reaches the real portal.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// `tcc-bridge` with the user's config and `TCC_*` variables out of reach.
fn tcc_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("tcc-bridge");
    cmd.env("HOME", "/tmp/tcc-bridge-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/tcc-bridge-test-nonexistent")
        .env_remove("TCC_CONFIG")
        .env_remove("TCC_PASSWORD")
        .env_remove("TCC_TEST_PASSWORD")
        .env_remove("RUST_LOG");
    cmd
}

fn write_config(dir: &Path, body: &str) -> std::path::PathBuf {
    let path = dir.join("config.toml");
    std::fs::write(&path, body).unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn no_args_shows_usage() {
    let output = tcc_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let stderr = String::from_utf8_lossy(&output.stderr);
    assert!(stderr.contains("Usage"), "{stderr}");
}

#[test]
fn help_lists_commands() {
    tcc_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("run")
            .and(predicate::str::contains("poll"))
            .and(predicate::str::contains("test-credentials"))
            .and(predicate::str::contains("set-setpoint")),
    );
}

#[test]
fn unknown_mode_is_a_usage_error() {
    tcc_cmd()
        .args(["set-mode", "dry"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn config_path_honors_flag() {
    tcc_cmd()
        .args(["--config", "/etc/tcc/custom.toml", "config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("/etc/tcc/custom.toml"));
}

#[test]
fn config_show_redacts_password() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(
        dir.path(),
        "[credentials]\nusername = \"me@example.com\"\npassword = \"hunter2\"\n",
    );

    tcc_cmd()
        .arg("--config")
        .arg(&path)
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("me@example.com")
                .and(predicate::str::contains("********"))
                .and(predicate::str::contains("hunter2").not())
                .and(predicate::str::contains("mytotalconnectcomfort.com")),
        );
}

#[test]
fn invalid_config_exits_with_config_code() {
    let dir = tempfile::tempdir().unwrap();
    let path = write_config(dir.path(), "[cloud]\npoll_interval_secs = 0\n");

    tcc_cmd()
        .arg("--config")
        .arg(&path)
        .arg("poll")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("poll_interval_secs"));
}

#[test]
fn poll_without_credentials_exits_before_any_request() {
    let dir = tempfile::tempdir().unwrap();
    // Unroutable base URL: reaching the network would hang or fail differently.
    let path = write_config(dir.path(), "[cloud]\nbase_url = \"http://192.0.2.1\"\n");

    tcc_cmd()
        .arg("--config")
        .arg(&path)
        .arg("poll")
        .assert()
        .code(4)
        .stderr(predicate::str::contains("No cloud credentials configured"));
}
