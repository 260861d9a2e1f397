//! Command-line surface tests. Nothing here reaches the network.

use assert_cmd::Command;
use predicates::prelude::*;

fn loadfleet() -> Command {
    Command::cargo_bin("loadfleet").unwrap()
}

#[test]
fn help_lists_commands() {
    loadfleet()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("run"))
        .stdout(predicate::str::contains("provision"))
        .stdout(predicate::str::contains("release"))
        .stdout(predicate::str::contains("fetch"));
}

#[test]
fn missing_config_file_fails() {
    loadfleet()
        .args(["--config", "/nonexistent/loadfleet.toml", "release", "i-1"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("/nonexistent/loadfleet.toml"));
}

#[test]
fn release_requires_ids() {
    loadfleet().arg("release").assert().failure();
}

#[test]
fn run_without_script_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("loadfleet.toml");
    std::fs::write(&config, "[fleet]\nhosts = [\"10.0.0.1\"]\n").unwrap();

    loadfleet()
        .arg("--config")
        .arg(&config)
        .arg("run")
        .assert()
        .failure()
        .stderr(predicate::str::contains("run.script is not set"));
}

#[test]
fn provision_with_unknown_region_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let config = dir.path().join("loadfleet.toml");
    std::fs::write(&config, "[cloud]\nregion = \"atlantis\"\n").unwrap();

    loadfleet()
        .arg("--config")
        .arg(&config)
        .args(["provision", "--count", "2"])
        .env_remove("LOADFLEET_ACCESS_KEY_ID")
        .assert()
        .failure()
        .stderr(predicate::str::contains("atlantis"));
}
