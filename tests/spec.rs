// ABOUTME: Integration tests for spec discovery and validation.
// ABOUTME: Covers filename aliases, placeholder rejection, and environment order.

use std::fs;

use flotilla::spec::{EnvironmentSpec, SpecError};
use tempfile::TempDir;

const VALID: &str = "name: api\nenvironments:\n  staging:\n    domain: staging.example.com\n  production:\n    domain: api.example.com\n";

#[test]
fn discover_prefers_the_canonical_filename() {
    let dir = TempDir::new().unwrap();
    fs::write(dir.path().join("flotilla.yml"), VALID).unwrap();
    fs::write(
        dir.path().join("flotilla.yaml"),
        "name: other\nenvironments:\n  prod:\n    domain: other.example.com\n",
    )
    .unwrap();

    let spec = EnvironmentSpec::discover(dir.path()).unwrap();
    assert_eq!(spec.name.as_str(), "api");
}

#[test]
fn discover_falls_back_to_legacy_aliases() {
    let dir = TempDir::new().unwrap();
    fs::create_dir_all(dir.path().join(".flotilla")).unwrap();
    fs::write(dir.path().join(".flotilla/config.yml"), VALID).unwrap();

    let spec = EnvironmentSpec::discover(dir.path()).unwrap();
    assert_eq!(spec.name.as_str(), "api");
}

#[test]
fn discover_reports_all_candidates_when_missing() {
    let dir = TempDir::new().unwrap();
    let err = EnvironmentSpec::discover(dir.path()).unwrap_err();
    let message = err.to_string();
    assert!(message.contains("flotilla.yml"));
    assert!(message.contains("flotilla.yaml"));
    assert!(message.contains(".flotilla/config.yml"));
}

#[test]
fn environments_preserve_file_order() {
    let spec = EnvironmentSpec::from_yaml(VALID).unwrap();
    let names: Vec<&str> = spec
        .environments
        .iter()
        .map(|(name, _)| name.as_str())
        .collect();
    assert_eq!(names, vec!["staging", "production"]);
}

#[test]
fn placeholder_domain_names_the_field() {
    let err = EnvironmentSpec::from_yaml(
        "name: api\nenvironments:\n  production:\n    domain: CHANGEME.example.com\n",
    )
    .unwrap_err();

    match err {
        SpecError::Placeholder { field, value } => {
            assert_eq!(field, "environments.production.domain");
            assert!(value.starts_with("CHANGEME"));
        }
        other => panic!("expected Placeholder, got {other}"),
    }
}

#[test]
fn a_spec_needs_at_least_one_routed_environment() {
    let err = EnvironmentSpec::from_yaml("name: api\nenvironments:\n  dev: {}\n").unwrap_err();
    assert!(err.to_string().contains("domain"));
}

#[test]
fn out_of_range_port_is_rejected() {
    let err = EnvironmentSpec::from_yaml(
        "name: api\nenvironments:\n  production:\n    domain: api.example.com\n    port: 70000\n",
    )
    .unwrap_err();
    assert!(err.to_string().contains("out of range"));
}

#[test]
fn health_timeout_parses_human_durations() {
    let spec = EnvironmentSpec::from_yaml(
        "name: api\nenvironments:\n  production:\n    domain: api.example.com\n    health_timeout: 3m\n",
    )
    .unwrap();
    let env = spec.environment("production").unwrap();
    assert_eq!(env.health_timeout, Some(std::time::Duration::from_secs(180)));
}
