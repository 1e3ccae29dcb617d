// ABOUTME: Merge algorithm combining independent EnvironmentSpecs into one topology.
// ABOUTME: Deterministic in input order; domains are fatal on conflict, ports reassign.

use std::collections::{HashMap, HashSet};

use thiserror::Error;

use crate::spec::EnvironmentSpec;
use crate::types::{DomainName, RepoName, ServiceKey};

use super::{ServiceEntry, Topology};

/// Auto-assigned ports start here and grow upward.
pub const PORT_BASE: u16 = 3001;

#[derive(Debug, Error)]
pub enum MergeError {
    /// Two loaded specs carry the same repository name. Every service key,
    /// and with it every container name, would collide; the second rollout
    /// would tear down the first.
    #[error("repository {name} is declared by more than one spec")]
    DuplicateRepo { name: RepoName },

    /// Domains are externally visible routing keys and are never silently
    /// reassigned.
    #[error("domain {domain} claimed by both {first} and {second}")]
    DomainConflict {
        domain: DomainName,
        first: ServiceKey,
        second: ServiceKey,
    },

    /// Only raised under `MergeOptions::strict_ports`.
    #[error("port {port} requested by {second} is already claimed by {first}")]
    PortConflict {
        port: u16,
        first: ServiceKey,
        second: ServiceKey,
    },

    #[error("auto-port space exhausted above {PORT_BASE}")]
    PortSpaceExhausted,
}

/// Non-fatal degradations surfaced alongside a successful merge.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MergeWarning {
    PortReassigned {
        key: ServiceKey,
        requested: u16,
        assigned: u16,
        held_by: ServiceKey,
    },
}

impl std::fmt::Display for MergeWarning {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MergeWarning::PortReassigned {
                key,
                requested,
                assigned,
                held_by,
            } => write!(
                f,
                "{}: requested port {} is held by {}, reassigned to {}",
                key, requested, held_by, assigned
            ),
        }
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct MergeOptions {
    /// Treat an explicit port collision as fatal instead of auto-reassigning.
    /// Default is lenient (warn and reassign).
    pub strict_ports: bool,
}

/// A fully merged topology plus any warnings accumulated along the way.
#[derive(Debug)]
pub struct Merged {
    pub topology: Topology,
    pub warnings: Vec<MergeWarning>,
}

/// Merge N specs into one topology. Deterministic given a fixed input order:
/// iteration follows spec order, then each spec's environment file order, and
/// ties in port allocation are broken purely by input order (first seen wins
/// the low port).
pub fn merge(specs: &[EnvironmentSpec], options: MergeOptions) -> Result<Merged, MergeError> {
    let mut entries: Vec<ServiceEntry> = Vec::new();
    let mut repo_claims: HashSet<RepoName> = HashSet::new();
    let mut domain_claims: HashMap<DomainName, ServiceKey> = HashMap::new();
    let mut port_claims: HashMap<u16, ServiceKey> = HashMap::new();
    let mut warnings = Vec::new();

    for spec in specs {
        if !repo_claims.insert(spec.name.clone()) {
            return Err(MergeError::DuplicateRepo {
                name: spec.name.clone(),
            });
        }

        for (env_name, env) in spec.environments.iter() {
            // Environments without a domain receive no routing and no port.
            let Some(domain) = env.domain.clone() else {
                continue;
            };

            let key = ServiceKey::new(spec.name.clone(), env_name.clone());

            if let Some(first) = domain_claims.get(&domain) {
                return Err(MergeError::DomainConflict {
                    domain,
                    first: first.clone(),
                    second: key,
                });
            }

            let port = match env.port {
                Some(requested) => match port_claims.get(&requested) {
                    None => requested,
                    Some(holder) => {
                        if options.strict_ports {
                            return Err(MergeError::PortConflict {
                                port: requested,
                                first: holder.clone(),
                                second: key,
                            });
                        }
                        let assigned = lowest_free_port(&port_claims)?;
                        warnings.push(MergeWarning::PortReassigned {
                            key: key.clone(),
                            requested,
                            assigned,
                            held_by: holder.clone(),
                        });
                        assigned
                    }
                },
                None => lowest_free_port(&port_claims)?,
            };

            domain_claims.insert(domain.clone(), key.clone());
            port_claims.insert(port, key.clone());

            entries.push(ServiceEntry {
                key,
                domain,
                port,
                health_check: env.health_check.clone(),
                depends_on: env.depends_on.clone(),
                target: env.server.clone(),
                health_timeout: env.health_timeout,
            });
        }
    }

    Ok(Merged {
        topology: Topology::new(entries),
        warnings,
    })
}

/// Lowest unclaimed port at or above the base.
fn lowest_free_port(claims: &HashMap<u16, ServiceKey>) -> Result<u16, MergeError> {
    (PORT_BASE..=u16::MAX)
        .find(|p| !claims.contains_key(p))
        .ok_or(MergeError::PortSpaceExhausted)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn spec(yaml: &str) -> EnvironmentSpec {
        EnvironmentSpec::from_yaml(yaml).unwrap()
    }

    #[test]
    fn auto_ports_start_at_base() {
        let a = spec("name: api\nenvironments:\n  staging:\n    domain: a.example.com\n");
        let b = spec("name: web\nenvironments:\n  staging:\n    domain: b.example.com\n");

        let merged = merge(&[a, b], MergeOptions::default()).unwrap();
        let ports: Vec<u16> = merged.topology.entries().iter().map(|e| e.port).collect();
        assert_eq!(ports, vec![3001, 3002]);
        assert!(merged.warnings.is_empty());
    }

    #[test]
    fn explicit_port_collision_reassigns_with_warning() {
        let a = spec(
            "name: api\nenvironments:\n  staging:\n    domain: a.example.com\n    port: 3001\n",
        );
        let b = spec(
            "name: web\nenvironments:\n  staging:\n    domain: b.example.com\n    port: 3001\n",
        );

        let merged = merge(&[a, b], MergeOptions::default()).unwrap();
        let ports: Vec<u16> = merged.topology.entries().iter().map(|e| e.port).collect();
        assert_eq!(ports, vec![3001, 3002]);
        assert_eq!(merged.warnings.len(), 1);
        match &merged.warnings[0] {
            MergeWarning::PortReassigned {
                requested,
                assigned,
                ..
            } => {
                assert_eq!(*requested, 3001);
                assert_eq!(*assigned, 3002);
            }
        }
    }

    #[test]
    fn strict_ports_makes_collision_fatal() {
        let a = spec(
            "name: api\nenvironments:\n  staging:\n    domain: a.example.com\n    port: 3001\n",
        );
        let b = spec(
            "name: web\nenvironments:\n  staging:\n    domain: b.example.com\n    port: 3001\n",
        );

        let result = merge(
            &[a, b],
            MergeOptions {
                strict_ports: true,
            },
        );
        assert!(matches!(result, Err(MergeError::PortConflict { port: 3001, .. })));
    }

    #[test]
    fn domain_conflict_names_both_claimants() {
        let a = spec("name: api\nenvironments:\n  prod:\n    domain: api.example.com\n");
        let b = spec("name: gateway\nenvironments:\n  prod:\n    domain: api.example.com\n");

        let err = merge(&[a, b], MergeOptions::default()).unwrap_err();
        match err {
            MergeError::DomainConflict { first, second, .. } => {
                assert_eq!(first.repo().as_str(), "api");
                assert_eq!(second.repo().as_str(), "gateway");
            }
            other => panic!("expected DomainConflict, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_repo_names_are_rejected() {
        // Distinct domains and auto ports: only the name collides, yet both
        // specs would produce the same container names on the target.
        let a = spec("name: api\nenvironments:\n  production:\n    domain: a.example.com\n");
        let b = spec("name: api\nenvironments:\n  production:\n    domain: b.example.com\n");

        let err = merge(&[a, b], MergeOptions::default()).unwrap_err();
        match err {
            MergeError::DuplicateRepo { name } => assert_eq!(name.as_str(), "api"),
            other => panic!("expected DuplicateRepo, got {other:?}"),
        }
    }

    #[test]
    fn duplicate_repo_names_are_rejected_across_environments() {
        let a = spec("name: api\nenvironments:\n  production:\n    domain: a.example.com\n");
        let b = spec("name: api\nenvironments:\n  staging:\n    domain: b.example.com\n");

        assert!(matches!(
            merge(&[a, b], MergeOptions::default()),
            Err(MergeError::DuplicateRepo { .. })
        ));
    }

    #[test]
    fn environments_without_domain_are_skipped() {
        let a = spec(
            "name: api\nenvironments:\n  dev: {}\n  staging:\n    domain: a.example.com\n",
        );

        let merged = merge(&[a], MergeOptions::default()).unwrap();
        assert_eq!(merged.topology.len(), 1);
        assert_eq!(merged.topology.entries()[0].key.environment(), "staging");
    }
}
