//! Integration tests for the `toonly` CLI binary.
//!
//! These cover argument parsing, help output, shell completions, config
//! inspection and local precondition errors, all without a live service.
#![allow(clippy::unwrap_used)]

use std::path::PathBuf;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use tempfile::TempDir;

// ── Helpers ─────────────────────────────────────────────────────────

const ENV_VARS: &[&str] = &[
    "TOONLY_CONFIG",
    "TOONLY_AGREEMENT_ID",
    "TOONLY_ACCESS_TOKEN",
    "TOONLY_REFRESH_TOKEN",
    "TOONLY_OUTPUT",
    "TOONLY_CLIENT_ID",
    "TOONLY_CLIENT_SECRET",
    "TOONLY_API_URL",
    "TOONLY_TOKEN_URL",
    "TOONLY_AUTHORIZE_URL",
    "TOONLY_POLL_INTERVAL",
];

/// Build a [`Command`] for the `toonly` binary with env isolation.
///
/// Clears all `TOONLY_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn toonly_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("toonly");
    cmd.env("HOME", "/tmp/toonly-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/toonly-cli-test-nonexistent")
        .env("NO_COLOR", "1");
    for var in ENV_VARS {
        cmd.env_remove(var);
    }
    cmd
}

/// Write a config file with client registration pointing at an unroutable
/// host, so any accidental network call fails fast.
fn config_file(extra: &str) -> (TempDir, PathBuf) {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("config.toml");
    std::fs::write(
        &path,
        format!(
            "client_id = \"client-1\"\n\
             client_secret = \"s3cret\"\n\
             api_url = \"http://127.0.0.1:9/toon/v3/\"\n\
             token_url = \"http://127.0.0.1:9/token\"\n\
             {extra}\n"
        ),
    )
    .unwrap();
    (dir, path)
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = toonly_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    toonly_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("thermostat")
            .and(predicate::str::contains("agreements"))
            .and(predicate::str::contains("set-temp"))
            .and(predicate::str::contains("watch")),
    );
}

#[test]
fn test_version_flag() {
    toonly_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("toonly"));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    toonly_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

#[test]
fn test_completions_zsh() {
    toonly_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::contains("#compdef"));
}

// ── Argument validation ─────────────────────────────────────────────

#[test]
fn test_set_temp_requires_number() {
    toonly_cmd()
        .args(["set-temp", "warm"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("invalid value"));
}

#[test]
fn test_set_state_rejects_unknown_preset() {
    toonly_cmd()
        .args(["set-state", "party"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("comfort"));
}

#[test]
fn test_watch_rejects_zero_interval() {
    toonly_cmd()
        .args(["watch", "--interval", "0"])
        .assert()
        .code(2);
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_honors_flag() {
    let (_dir, path) = config_file("");
    toonly_cmd()
        .args(["config", "path", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_show_masks_secrets() {
    let (_dir, path) = config_file("access_token = \"super-secret-token\"");
    toonly_cmd()
        .args(["config", "show", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("client_id = \"client-1\"")
                .and(predicate::str::contains("super-secret-token").not())
                .and(predicate::str::contains("s3cret").not()),
        );
}

#[test]
fn test_missing_client_registration_is_config_error() {
    toonly_cmd()
        .args(["status", "--config", "/tmp/toonly-cli-test-nonexistent/none.toml"])
        .assert()
        .code(6)
        .stderr(predicate::str::contains("client_id"));
}

// ── Local preconditions ─────────────────────────────────────────────

#[test]
fn test_authorize_url_needs_no_network() {
    let (_dir, path) = config_file("authorize_url = \"https://auth.example.com/authorize\"");
    toonly_cmd()
        .args(["authorize-url", "--state", "xyz", "--config"])
        .arg(&path)
        .assert()
        .success()
        .stdout(
            predicate::str::contains("https://auth.example.com/authorize?")
                .and(predicate::str::contains("client_id=client-1"))
                .and(predicate::str::contains("state=xyz")),
        );
}

#[test]
fn test_status_without_tokens_is_auth_error() {
    let (_dir, path) = config_file("agreement_id = \"A-1\"");
    toonly_cmd()
        .args(["status", "--config"])
        .arg(&path)
        .assert()
        .code(3)
        .stderr(predicate::str::contains("No access token"));
}

#[test]
fn test_status_without_agreement_is_usage_error() {
    let (_dir, path) = config_file("");
    toonly_cmd()
        .args(["status", "--access-token", "tok", "--config"])
        .arg(&path)
        .assert()
        .code(2)
        .stderr(predicate::str::contains("toonly agreements"));
}

#[test]
fn test_unreachable_service_is_connection_error() {
    let (_dir, path) = config_file("");
    toonly_cmd()
        .args(["agreements", "--access-token", "tok", "--config"])
        .arg(&path)
        .assert()
        .code(7);
}
