//! Integration tests for the `onuctl` CLI binary.
//!
//! These tests validate argument parsing, help output, shell completions,
//! work order errors and ledger listing, all without a reachable OLT.
#![allow(clippy::unwrap_used)]

use std::path::Path;

use assert_cmd::cargo::cargo_bin_cmd;
use predicates::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────

/// Build a [`Command`] for the `onuctl` binary with env isolation.
///
/// Clears all `ONUCTL_*` env vars and points config directories at a
/// nonexistent path so tests never touch the user's real configuration.
fn onuctl_cmd() -> assert_cmd::Command {
    let mut cmd = cargo_bin_cmd!("onuctl");
    cmd.env("HOME", "/tmp/onuctl-cli-test-nonexistent")
        .env("XDG_CONFIG_HOME", "/tmp/onuctl-cli-test-nonexistent")
        .env_remove("ONUCTL_PROFILE")
        .env_remove("ONUCTL_HOST")
        .env_remove("ONUCTL_PORT")
        .env_remove("ONUCTL_USERNAME")
        .env_remove("ONUCTL_PASSWORD")
        .env_remove("ONUCTL_LEDGER")
        .env_remove("ONUCTL_TRANSCRIPT")
        .env_remove("ONUCTL_OUTPUT")
        .env_remove("ONUCTL_LOG_FILE")
        .env_remove("RUST_LOG");
    cmd
}

/// Concatenate stdout + stderr from a command output for flexible matching.
fn combined_output(output: &std::process::Output) -> String {
    let stdout = String::from_utf8_lossy(&output.stdout);
    let stderr = String::from_utf8_lossy(&output.stderr);
    format!("{stdout}{stderr}")
}

const ORDER_HEADER: &str =
    "interface,onu_id,sn,name,description,profile,username,password,vlan_inet,vlan_hotspot,wifi_ssid\n";

fn write_order(dir: &Path, name: &str, body: &str) -> std::path::PathBuf {
    let path = dir.join(name);
    std::fs::write(&path, format!("{ORDER_HEADER}{body}")).unwrap();
    path
}

fn write_ledger(dir: &Path) -> std::path::PathBuf {
    let path = dir.join("status.csv");
    std::fs::write(
        &path,
        "interface,onu_id,sn,name,status,message\n\
         gpon-olt_1/2/6,10,ZTEGC0000010,Siti,success,OK\n\
         gpon-olt_1/2/6,2,ZTEGC0000002,Budi,registered,Registered and confirmed\n\
         gpon-olt_1/2/7,1,ZTEGC0000101,Agus,error,Error during config: %Error 20202\n",
    )
    .unwrap();
    path
}

// ── Basic invocation ────────────────────────────────────────────────

#[test]
fn test_no_args_shows_help() {
    let output = onuctl_cmd().output().unwrap();
    assert_eq!(output.status.code(), Some(2), "Expected exit code 2");
    let text = combined_output(&output);
    assert!(text.contains("Usage"), "Expected 'Usage' in output:\n{text}");
}

#[test]
fn test_help_flag() {
    onuctl_cmd().arg("--help").assert().success().stdout(
        predicate::str::contains("ONU")
            .and(predicate::str::contains("run"))
            .and(predicate::str::contains("status"))
            .and(predicate::str::contains("config")),
    );
}

#[test]
fn test_version_flag() {
    onuctl_cmd()
        .arg("--version")
        .assert()
        .success()
        .stdout(predicate::str::contains("onuctl"));
}

#[test]
fn test_run_requires_a_file() {
    let output = onuctl_cmd().arg("run").output().unwrap();
    assert_eq!(output.status.code(), Some(2));
}

// ── Shell completions ───────────────────────────────────────────────

#[test]
fn test_completions_bash() {
    onuctl_cmd()
        .args(["completions", "bash"])
        .assert()
        .success()
        .stdout(predicate::str::contains("onuctl"));
}

#[test]
fn test_completions_zsh() {
    onuctl_cmd()
        .args(["completions", "zsh"])
        .assert()
        .success()
        .stdout(predicate::str::is_empty().not());
}

// ── Work order errors ───────────────────────────────────────────────

#[test]
fn test_run_missing_file_is_not_found() {
    let output = onuctl_cmd()
        .args(["run", "/tmp/onuctl-cli-test-nonexistent/orders.csv"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("not found"), "Expected 'not found':\n{text}");
}

#[test]
fn test_run_rejects_multi_port_order() {
    let dir = tempfile::tempdir().unwrap();
    let order = write_order(
        dir.path(),
        "mixed.csv",
        "gpon-olt_1/2/6,1,ZTEGC0000001,,,,,,,,\n\
         gpon-olt_1/2/7,1,ZTEGC0000002,,,,,,,,\n",
    );

    let output = onuctl_cmd().arg("run").arg(&order).output().unwrap();
    assert_eq!(output.status.code(), Some(2));
    let text = combined_output(&output);
    assert!(
        text.contains("exactly one port"),
        "Expected port error:\n{text}"
    );
}

#[test]
fn test_run_without_profile_or_host_needs_config() {
    let dir = tempfile::tempdir().unwrap();
    let order = write_order(dir.path(), "port6.csv", "gpon-olt_1/2/6,1,ZTEGC0000001,,,,,,,,\n");

    let output = onuctl_cmd().arg("run").arg(&order).output().unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(
        text.contains("No OLT configured"),
        "Expected config hint:\n{text}"
    );
}

// ── Status listing ──────────────────────────────────────────────────

#[test]
fn test_status_plain_lists_units_in_slot_order() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = write_ledger(dir.path());

    let output = onuctl_cmd()
        .arg("--ledger")
        .arg(&ledger)
        .args(["-o", "plain", "status"])
        .output()
        .unwrap();
    assert!(output.status.success());
    let stdout = String::from_utf8_lossy(&output.stdout);
    assert_eq!(
        stdout.trim_end(),
        "gpon-olt_1/2/6:2\ngpon-olt_1/2/6:10\ngpon-olt_1/2/7:1"
    );
}

#[test]
fn test_status_filters_by_state_and_port() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = write_ledger(dir.path());

    onuctl_cmd()
        .arg("--ledger")
        .arg(&ledger)
        .args(["-o", "json-compact", "status", "-s", "error", "-i", "gpon-olt_1/2/7"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("\"sn\":\"ZTEGC0000101\"")
                .and(predicate::str::contains("ZTEGC0000010").not()),
        );
}

#[test]
fn test_status_table_shows_headers() {
    let dir = tempfile::tempdir().unwrap();
    let ledger = write_ledger(dir.path());

    onuctl_cmd()
        .arg("--ledger")
        .arg(&ledger)
        .args(["--color", "never", "status"])
        .assert()
        .success()
        .stdout(
            predicate::str::contains("Port")
                .and(predicate::str::contains("Status"))
                .and(predicate::str::contains("registered")),
        );
}

#[test]
fn test_status_missing_ledger_is_empty() {
    let dir = tempfile::tempdir().unwrap();

    onuctl_cmd()
        .arg("--ledger")
        .arg(dir.path().join("none.csv"))
        .args(["-o", "json-compact", "status"])
        .assert()
        .success()
        .stdout(predicate::str::contains("[]"));
}

// ── Config ──────────────────────────────────────────────────────────

#[test]
fn test_config_path_prints_toml_location() {
    onuctl_cmd()
        .args(["config", "path"])
        .assert()
        .success()
        .stdout(predicate::str::contains("config.toml"));
}

#[test]
fn test_config_use_unknown_profile() {
    let output = onuctl_cmd()
        .args(["config", "use", "edge"])
        .output()
        .unwrap();
    assert_eq!(output.status.code(), Some(4));
    let text = combined_output(&output);
    assert!(text.contains("edge"), "Expected profile name:\n{text}");
}
