// Binary-level behaviour: hint screen, config errors, dry runs

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;

const PLAN: &str = r#"
[run]
plan = "cli-smoke"

[hosts.clone]
address = "clone.lpar"
user = "qsecofr"

[[phases]]
name = "clone-online"
interval_secs = 30
max_attempts = 15
probe = { kind = "reachable", host = "clone" }

[[phases]]
name = "drain-transfers"
interval_secs = 300
max_attempts = 72
leaves = "clone LPAR is in backup mode"

[phases.probe]
kind = "drain"
host = "clone"
command = "system \"WRKMEDBRM TYPE(*TRF)\""
empty_markers = ["No media"]
"#;

fn plan_file(contents: &str) -> tempfile::NamedTempFile {
    let mut file = tempfile::Builder::new().suffix(".toml").tempfile().unwrap();
    file.write_all(contents.as_bytes()).unwrap();
    file
}

fn runner() -> Command {
    let mut cmd = Command::cargo_bin("flashcopy-runner").unwrap();
    cmd.env_remove("RUST_LOG");
    cmd
}

#[test]
fn test_no_subcommand_shows_how_to_run() {
    runner()
        .assert()
        .success()
        .stdout(predicate::str::contains("flashcopy-runner validate"))
        .stdout(predicate::str::contains("flashcopy-runner run"))
        .stdout(predicate::str::contains("--config"));
}

#[test]
fn test_missing_config_file_exits_with_config_error() {
    runner()
        .args(["--config", "/nonexistent/flashcopy-runner.toml", "validate"])
        .assert()
        .code(2)
        .stderr(predicate::str::contains("Configuration file not found"));
}

#[test]
fn test_validate_lists_phases_and_budget() {
    let file = plan_file(PLAN);

    runner()
        .arg("--config")
        .arg(file.path())
        .arg("validate")
        .assert()
        .success()
        .stdout(predicate::str::contains("cli-smoke"))
        .stdout(predicate::str::contains("clone-online"))
        .stdout(predicate::str::contains("drain-transfers"))
        .stdout(predicate::str::contains("Plan is valid"));
}

#[test]
fn test_invalid_plan_exits_with_config_error() {
    let file = plan_file(&PLAN.replace("interval_secs = 30", "interval_secs = 0"));

    runner()
        .arg("--config")
        .arg(file.path())
        .arg("validate")
        .assert()
        .code(2)
        .stderr(predicate::str::contains("clone-online"));
}

#[test]
fn test_dry_run_contacts_no_host() {
    let file = plan_file(PLAN);

    runner()
        .arg("--config")
        .arg(file.path())
        .args(["run", "--dry-run"])
        .assert()
        .success()
        .stdout(predicate::str::contains("Dry run"))
        .stdout(predicate::str::contains("leaves: clone LPAR is in backup mode"));
}

#[test]
fn test_probe_of_unknown_phase_fails() {
    let file = plan_file(PLAN);

    runner()
        .arg("--config")
        .arg(file.path())
        .args(["probe", "no-such-phase"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("No phase named"));
}
