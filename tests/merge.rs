// ABOUTME: Property tests for the topology merge algorithm.
// ABOUTME: Checks determinism and injectivity of port and domain assignment.

use std::collections::HashSet;

use flotilla::spec::EnvironmentSpec;
use flotilla::topology::{MergeOptions, PORT_BASE, merge};
use proptest::prelude::*;

/// Build one repo's spec from (env index, optional requested port) pairs.
/// Domains are derived from the repo and env indices so they never conflict;
/// ports are drawn from a tiny range so they often do.
fn build_spec(repo_idx: usize, envs: &[Option<u16>]) -> EnvironmentSpec {
    let mut yaml = format!("name: repo{repo_idx}\nenvironments:\n");
    for (env_idx, port) in envs.iter().enumerate() {
        yaml.push_str(&format!(
            "  env{env_idx}:\n    domain: r{repo_idx}-e{env_idx}.example.com\n"
        ));
        if let Some(port) = port {
            yaml.push_str(&format!("    port: {port}\n"));
        }
    }
    EnvironmentSpec::from_yaml(&yaml).unwrap()
}

fn repos_strategy() -> impl Strategy<Value = Vec<Vec<Option<u16>>>> {
    prop::collection::vec(
        prop::collection::vec(prop::option::of(PORT_BASE..PORT_BASE + 4), 1..4),
        1..6,
    )
}

proptest! {
    #[test]
    fn merge_is_deterministic(repos in repos_strategy()) {
        let specs: Vec<EnvironmentSpec> = repos
            .iter()
            .enumerate()
            .map(|(i, envs)| build_spec(i, envs))
            .collect();

        let first = merge(&specs, MergeOptions::default()).unwrap();
        let second = merge(&specs, MergeOptions::default()).unwrap();

        let ports_a: Vec<u16> = first.topology.entries().iter().map(|e| e.port).collect();
        let ports_b: Vec<u16> = second.topology.entries().iter().map(|e| e.port).collect();
        prop_assert_eq!(ports_a, ports_b);
        prop_assert_eq!(first.warnings.len(), second.warnings.len());
    }

    #[test]
    fn merged_ports_and_domains_are_injective(repos in repos_strategy()) {
        let specs: Vec<EnvironmentSpec> = repos
            .iter()
            .enumerate()
            .map(|(i, envs)| build_spec(i, envs))
            .collect();

        let merged = merge(&specs, MergeOptions::default()).unwrap();

        let mut ports = HashSet::new();
        let mut domains = HashSet::new();
        for entry in merged.topology.entries() {
            prop_assert!(entry.port >= PORT_BASE);
            prop_assert!(ports.insert(entry.port), "duplicate port {}", entry.port);
            prop_assert!(
                domains.insert(entry.domain.clone()),
                "duplicate domain {}",
                entry.domain
            );
        }
    }

    #[test]
    fn honored_requests_keep_their_port(port in PORT_BASE + 10..PORT_BASE + 100) {
        let spec = build_spec(0, &[Some(port)]);
        let merged = merge(std::slice::from_ref(&spec), MergeOptions::default()).unwrap();
        prop_assert_eq!(merged.topology.entries()[0].port, port);
        prop_assert!(merged.warnings.is_empty());
    }
}

#[test]
fn every_warning_names_the_holder_of_the_requested_port() {
    let a = build_spec(0, &[Some(PORT_BASE)]);
    let b = build_spec(1, &[Some(PORT_BASE)]);

    let merged = merge(&[a, b], MergeOptions::default()).unwrap();
    assert_eq!(merged.warnings.len(), 1);
    let rendered = merged.warnings[0].to_string();
    assert!(rendered.contains("repo0"), "warning names the holder: {rendered}");
    assert!(rendered.contains("repo1"), "warning names the loser: {rendered}");
}
