//! Integration tests for the `pairlink` CLI binary.
//!
//! Argument parsing, help output, completions, config handling and a few
//! bridge round-trips against a mock server.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;
use serde_json::json;
use wiremock::matchers::{header, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `pairlink` binary with env isolation.
///
/// Clears all `PAIRLINK_*` env vars and points the config file into
/// `config_dir` so tests never touch the user's real configuration.
fn pairlink_cmd(config_dir: &Path) -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("pairlink");
    cmd.env("HOME", "/tmp/pairlink-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/pairlink-cli-test-nonexistent")
        .env("PAIRLINK_CONFIG", config_dir.join("config.toml"))
        .env("NO_COLOR", "1")
        .env_remove("PAIRLINK_PROFILE")
        .env_remove("PAIRLINK_BRIDGE")
        .env_remove("PAIRLINK_ADMIN_KEY")
        .env_remove("PAIRLINK_OUTPUT")
        .env_remove("PAIRLINK_INSECURE")
        .env_remove("PAIRLINK_TIMEOUT")
        .env_remove("RUST_LOG");
    cmd
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
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path()).output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    let dir = tempfile::tempdir().unwrap();
    pairlink_cmd(dir.path())
        .arg("--help")
        .assert()
        .success()
        .stdout(
            predicate::str::contains("messaging bridge")
                .and(predicate::str::contains("pair"))
                .and(predicate::str::contains("unlink"))
                .and(predicate::str::contains("close-session")),
        );
}

#[test]
fn test_version_flag() {
    let dir = tempfile::tempdir().unwrap();
    pairlink_cmd(dir.path())
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("pairlink"));
}

#[test]
fn test_invalid_subcommand() {
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path()).arg("frobnicate").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_invalid_output_format() {
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path())
        .args(["--output", "xml", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(text.contains("xml"), "Expected the bad value echoed:\n{text}");
}

#[test]
fn test_max_wait_requires_wait_on_unlink() {
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path())
        .args(["unlink", "--max-wait", "30s"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_generate_for_common_shells() {
    let dir = tempfile::tempdir().unwrap();
    for shell in ["bash", "zsh", "fish"] {
        pairlink_cmd(dir.path())
            .args(["completions", shell])
            .assert()
            .success()
            .stdout(predicate::str::is_empty().not());
    }
}

// ── Configuration ───────────────────────────────────────────────────

#[test]
fn test_config_show_no_config() {
    let dir = tempfile::tempdir().unwrap();
    pairlink_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[defaults]").and(predicate::str::contains("timeout = 5")));
}

#[test]
fn test_config_set_then_show_masks_admin_key() {
    let dir = tempfile::tempdir().unwrap();
    pairlink_cmd(dir.path())
        .args(["config", "set", "bridge", "https://clinic.example.com/api"])
        .assert()
        .success();
    pairlink_cmd(dir.path())
        .args(["config", "set", "admin_key", "super-secret"])
        .assert()
        .success();

    pairlink_cmd(dir.path())
        .args(["config", "show"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("[profiles.default]")
                .and(predicate::str::contains("bridge = \"https://clinic.example.com/api\""))
                .and(predicate::str::contains("admin_key = \"****\""))
                .and(predicate::str::contains("super-secret").not()),
        );

    pairlink_cmd(dir.path())
        .args(["--output", "json", "config", "show"])
        .assert()
        .success()
        .stdout(predicate::str::contains("super-secret").not());
}

#[test]
fn test_config_set_rejects_unknown_key_and_bad_values() {
    let dir = tempfile::tempdir().unwrap();

    let output = pairlink_cmd(dir.path())
        .args(["config", "set", "colour", "blue"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("unknown config key"));

    let output = pairlink_cmd(dir.path())
        .args(["config", "set", "poll_interval_ms", "0"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));

    let output = pairlink_cmd(dir.path())
        .args(["config", "set", "bridge", "not a url"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_config_use_unknown_profile() {
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path())
        .args(["config", "use", "ghost"])
        .output()
        .unwrap();
    assert!(!output.status.success());
    assert!(combined_output(&output).contains("ghost"));
}

// ── Bridge-bound commands without a bridge ──────────────────────────

#[test]
fn test_status_without_bridge_explains_setup() {
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path()).arg("status").output().unwrap();
    assert_eq!(output.status.code(), Some(1));
    let text = combined_output(&output);
    assert!(text.contains("No bridge configured"), "{text}");
    assert!(text.contains("pairlink config init"), "{text}");
}

#[test]
fn test_status_rejects_invalid_bridge_url() {
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path())
        .args(["--bridge", "not a url", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
}

#[test]
fn test_unlink_requires_yes_without_a_terminal() {
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path())
        .args(["--bridge", "http://127.0.0.1:9/api", "unlink"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("--yes"));
}

#[test]
fn test_notify_validates_number_before_sending() {
    let dir = tempfile::tempdir().unwrap();
    let output = pairlink_cmd(dir.path())
        .args([
            "--bridge",
            "http://127.0.0.1:9/api",
            "notify",
            "--number",
            "12345",
            "--name",
            "Ana",
            "--patient",
            "Firulais",
            "--date",
            "2026-10-20",
        ])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(2));
    assert!(combined_output(&output).contains("country prefix 569"));
}

// ── Against a mock bridge ───────────────────────────────────────────

#[tokio::test(flavor = "multi_thread")]
async fn test_status_json_against_mock_bridge() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "connected": true, "identifier": "56912345678" })),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let bridge = format!("{}/api", server.uri());
    let output = pairlink_cmd(dir.path())
        .args(["--bridge", &bridge, "--output", "json", "status"])
        .output()
        .unwrap();
    assert!(output.status.success(), "{}", combined_output(&output));

    let body: serde_json::Value = serde_json::from_slice(&output.stdout).unwrap();
    assert_eq!(body["connected"], json!(true));
    assert_eq!(body["identifier"], json!("56912345678"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_slow_bridge_reports_request_timeout() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "connected": true }))
                .set_delay(std::time::Duration::from_secs(3)),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let bridge = format!("{}/api", server.uri());

    let output = pairlink_cmd(dir.path())
        .args(["--bridge", &bridge, "--timeout", "1", "status"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(8), "{}", combined_output(&output));
    assert!(combined_output(&output).contains("Timed out after 1s"));

    // Through the controller the timeout lands in the session error.
    let output = pairlink_cmd(dir.path())
        .args(["--bridge", &bridge, "--timeout", "1", "pair"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1), "{}", combined_output(&output));
    let text = combined_output(&output);
    assert!(text.contains("timed out after 1s"), "{text}");
    assert!(!text.contains("after 0s"), "{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_close_session_surfaces_refusal() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bridge/close-session"))
        .and(header("X-Admin-Key", "k3y"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "ok": false, "mensaje": "No hay sesión activa" })),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let bridge = format!("{}/api", server.uri());
    let output = pairlink_cmd(dir.path())
        .args(["--bridge", &bridge, "--admin-key", "k3y", "close-session"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(1));
    assert!(combined_output(&output).contains("No hay sesión activa"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_refused_admin_key_names_the_active_profile() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/bridge/close-session"))
        .and(header("X-Admin-Key", "stale-key"))
        .respond_with(
            ResponseTemplate::new(401).set_body_json(json!({ "detail": "Invalid admin key" })),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let bridge = format!("{}/api", server.uri());
    pairlink_cmd(dir.path())
        .args(["--profile", "clinic", "config", "set", "bridge", &bridge])
        .assert()
        .success();
    pairlink_cmd(dir.path())
        .args(["--profile", "clinic", "config", "set", "admin_key_env", "CLINIC_BRIDGE_KEY"])
        .assert()
        .success();

    let output = pairlink_cmd(dir.path())
        .env("CLINIC_BRIDGE_KEY", "stale-key")
        .args(["--profile", "clinic", "close-session"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(3), "{}", combined_output(&output));
    let text = combined_output(&output);
    assert!(text.contains("'clinic'"), "{text}");
    assert!(!text.contains("'current'"), "{text}");
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pair_when_already_linked_exits_cleanly() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({ "connected": true, "identifier": "56912345678" })),
        )
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let bridge = format!("{}/api", server.uri());
    pairlink_cmd(dir.path())
        .args(["--bridge", &bridge, "--output", "plain", "pair"])
        .assert()
        .success()
        .stdout(predicate::str::contains("56912345678"));
}

#[tokio::test(flavor = "multi_thread")]
async fn test_pair_prints_code_then_gives_up_after_max_wait() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/api/bridge/status"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "connected": false })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/api/bridge/pairing-code"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({ "code": "ABC123" })))
        .mount(&server)
        .await;

    let dir = tempfile::tempdir().unwrap();
    let bridge = format!("{}/api", server.uri());
    let output = pairlink_cmd(dir.path())
        .args(["--bridge", &bridge, "--output", "plain", "pair", "--max-wait", "1s"])
        .output()
        .unwrap();

    assert_eq!(output.status.code(), Some(8), "{}", combined_output(&output));
    assert!(String::from_utf8_lossy(&output.stdout).contains("ABC123"));
}
