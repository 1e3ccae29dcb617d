// ABOUTME: Integration tests for the flotilla CLI commands.
// ABOUTME: Validates --help output, init, scan, and topology behavior.

use assert_cmd::Command;
use predicates::prelude::*;
use std::fs;
use std::path::Path;

fn flotilla_cmd() -> Command {
    Command::new(assert_cmd::cargo::cargo_bin!("flotilla"))
}

fn write_spec(root: &Path, yaml: &str) {
    fs::write(root.join("flotilla.yml"), yaml).unwrap();
}

#[test]
fn help_shows_commands() {
    flotilla_cmd()
        .arg("--help")
        .assert()
        .success()
        .stdout(predicate::str::contains("init"))
        .stdout(predicate::str::contains("scan"))
        .stdout(predicate::str::contains("fix"))
        .stdout(predicate::str::contains("topology"))
        .stdout(predicate::str::contains("deploy"));
}

#[test]
fn init_creates_spec_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    let spec_path = temp_dir.path().join("flotilla.yml");

    flotilla_cmd()
        .current_dir(temp_dir.path())
        .args(["init", "--name", "myapp"])
        .assert()
        .success();

    assert!(spec_path.exists(), "flotilla.yml should be created");
    let content = fs::read_to_string(&spec_path).unwrap();
    assert!(content.contains("name: myapp"));
    assert!(content.contains("environments:"));
}

#[test]
fn init_refuses_to_overwrite_existing_spec() {
    let temp_dir = tempfile::tempdir().unwrap();
    fs::write(temp_dir.path().join("flotilla.yml"), "existing: spec").unwrap();

    flotilla_cmd()
        .current_dir(temp_dir.path())
        .arg("init")
        .assert()
        .failure()
        .stderr(predicate::str::contains("already exists"));
}

#[test]
fn scan_reports_missing_env_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_spec(
        temp_dir.path(),
        "name: api\nenvironments:\n  dev:\n    env_file: .env\n  production:\n    domain: api.example.com\n",
    );

    flotilla_cmd()
        .current_dir(temp_dir.path())
        .args(["scan", "dev"])
        .assert()
        .success()
        .stderr(predicate::str::contains("env-file-missing"));
}

#[test]
fn fix_creates_missing_env_file() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_spec(
        temp_dir.path(),
        "name: api\nenvironments:\n  dev:\n    env_file: .env\n  production:\n    domain: api.example.com\n",
    );

    flotilla_cmd()
        .current_dir(temp_dir.path())
        .args(["fix", "dev"])
        .assert()
        .success();

    assert!(temp_dir.path().join(".env").exists());
}

#[test]
fn scan_fails_on_unresolved_critical() {
    let temp_dir = tempfile::tempdir().unwrap();
    // No production environment at all: prod-domain is critical.
    write_spec(
        temp_dir.path(),
        "name: api\nenvironments:\n  staging:\n    domain: staging.example.com\n",
    );

    flotilla_cmd()
        .current_dir(temp_dir.path())
        .args(["scan", "prod"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("critical"));
}

#[test]
fn topology_merges_multiple_repos() {
    let temp_dir = tempfile::tempdir().unwrap();
    let api = temp_dir.path().join("api");
    let web = temp_dir.path().join("web");
    fs::create_dir_all(&api).unwrap();
    fs::create_dir_all(&web).unwrap();
    write_spec(&api, "name: api\nenvironments:\n  prod:\n    domain: api.example.com\n");
    write_spec(&web, "name: web\nenvironments:\n  prod:\n    domain: web.example.com\n");

    flotilla_cmd()
        .args(["topology"])
        .arg(&api)
        .arg(&web)
        .assert()
        .success()
        .stdout(predicate::str::contains("api.example.com"))
        .stdout(predicate::str::contains("3001"))
        .stdout(predicate::str::contains("3002"));
}

#[test]
fn topology_fails_on_domain_conflict() {
    let temp_dir = tempfile::tempdir().unwrap();
    let api = temp_dir.path().join("api");
    let web = temp_dir.path().join("web");
    fs::create_dir_all(&api).unwrap();
    fs::create_dir_all(&web).unwrap();
    write_spec(&api, "name: api\nenvironments:\n  prod:\n    domain: app.example.com\n");
    write_spec(&web, "name: web\nenvironments:\n  prod:\n    domain: app.example.com\n");

    flotilla_cmd()
        .args(["topology"])
        .arg(&api)
        .arg(&web)
        .assert()
        .failure()
        .stderr(predicate::str::contains("app.example.com"))
        .stderr(predicate::str::contains("api"))
        .stderr(predicate::str::contains("web"));
}

#[test]
fn topology_renders_routing_for_target() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_spec(
        temp_dir.path(),
        "name: api\nenvironments:\n  prod:\n    domain: api.example.com\n",
    );

    flotilla_cmd()
        .current_dir(temp_dir.path())
        .args(["topology", "--routing", "local"])
        .assert()
        .success()
        .stdout(predicate::str::contains("server_name api.example.com;"))
        .stdout(predicate::str::contains("proxy_pass http://127.0.0.1:3001;"));
}

#[test]
fn scan_rejects_placeholder_domain() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_spec(
        temp_dir.path(),
        "name: api\nenvironments:\n  prod:\n    domain: CHANGEME.example.com\n",
    );

    flotilla_cmd()
        .current_dir(temp_dir.path())
        .args(["scan", "dev"])
        .assert()
        .failure()
        .stderr(predicate::str::contains("placeholder"));
}
