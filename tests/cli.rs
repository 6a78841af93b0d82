// ABOUTME: CLI surface tests for side-effect-free subcommands.
// ABOUTME: Plan output ordering and error reporting, no engine required.

use assert_cmd::Command;
use predicates::prelude::*;
use std::io::Write;
use tempfile::NamedTempFile;

fn caravel() -> Command {
    Command::cargo_bin("caravel").unwrap()
}

#[test]
fn help_lists_subcommands() {
    caravel()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("deploy"))
        .stdout(predicate::str::contains("plan"))
        .stdout(predicate::str::contains("status"))
        .stdout(predicate::str::contains("down"));
}

#[test]
fn plan_prints_default_application_order() {
    let assert = caravel().arg("plan").assert().success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    assert!(stdout.contains("infrastructure:"));
    assert!(stdout.contains("platform: placement"));
    assert!(stdout.contains("services:"));

    // Dependencies must be listed before their dependents.
    let position = |name: &str| stdout.find(&format!(". {name}\n")).unwrap();
    assert!(position("redis") < position("placement"));
    assert!(position("placement") < position("gateway"));
    assert!(position("postgres") < position("orders"));
}

#[test]
fn plan_rejects_cyclic_declaration() {
    let mut file = NamedTempFile::new().unwrap();
    file.write_all(
        br#"
units:
  - name: a
    tier: services
    image: nginx
    port: 3001
    depends_on: [b]
  - name: b
    tier: services
    image: nginx
    port: 3002
    depends_on: [a]
"#,
    )
    .unwrap();
    file.flush().unwrap();

    caravel()
        .arg("plan")
        .arg("--declaration")
        .arg(file.path())
        .assert()
        .failure()
        .stderr(predicate::str::contains("circular dependency"));
}

#[test]
fn plan_fails_for_missing_declaration_file() {
    caravel()
        .arg("plan")
        .arg("--declaration")
        .arg("/nonexistent/caravel.yml")
        .assert()
        .failure()
        .stderr(predicate::str::contains("not found"));
}

#[test]
fn deploy_to_staging_requires_platform_credentials() {
    caravel()
        .arg("deploy")
        .arg("--environment")
        .arg("staging")
        .env_remove("CARAVEL_PLATFORM_URL")
        .env_remove("CARAVEL_PLATFORM_TOKEN")
        .assert()
        .failure()
        .stderr(predicate::str::contains("CARAVEL_PLATFORM_URL"));
}

#[test]
fn json_plan_emits_machine_readable_order() {
    let assert = caravel().arg("--json").arg("plan").assert().success();

    let stdout = String::from_utf8(assert.get_output().stdout.clone()).unwrap();
    let line = stdout.lines().find(|l| l.starts_with('{')).unwrap();
    let value: serde_json::Value = serde_json::from_str(line).unwrap();
    assert_eq!(value["environment"], "development");
    assert_eq!(value["order"].as_array().unwrap().len(), 7);
}
