// ABOUTME: Merged service topology across all participating repositories.
// ABOUTME: Exports the merge algorithm, topology container, and routing renderer.

mod merge;
mod render;

pub use merge::{MergeError, MergeOptions, MergeWarning, Merged, PORT_BASE, merge};
pub use render::{ROUTING_PATH, render_routing};

use std::collections::HashMap;
use std::time::Duration;

use crate::exec::Target;
use crate::types::{DomainName, RepoName, ServiceKey};

/// One (repo, environment) pair materialized for deployment. Created by the
/// merge algorithm, never mutated afterward.
#[derive(Debug, Clone)]
pub struct ServiceEntry {
    pub key: ServiceKey,
    pub domain: DomainName,
    /// Resolved port, never unset after merge.
    pub port: u16,
    pub health_check: String,
    pub depends_on: Vec<RepoName>,
    pub target: Target,
    /// Per-environment override for the deploy health gate deadline.
    pub health_timeout: Option<Duration>,
}

/// The merge result: ordered service entries plus injective domain and port
/// maps. A merge either fully succeeds or fails with a conflict error; a
/// topology is never partially updated in place.
#[derive(Debug)]
pub struct Topology {
    entries: Vec<ServiceEntry>,
    by_domain: HashMap<DomainName, usize>,
    by_port: HashMap<u16, usize>,
}

impl Topology {
    pub(crate) fn new(entries: Vec<ServiceEntry>) -> Self {
        let mut by_domain = HashMap::new();
        let mut by_port = HashMap::new();
        for (idx, entry) in entries.iter().enumerate() {
            // The merge algorithm guarantees injectivity before construction.
            by_domain.insert(entry.domain.clone(), idx);
            by_port.insert(entry.port, idx);
        }
        Self {
            entries,
            by_domain,
            by_port,
        }
    }

    pub fn entries(&self) -> &[ServiceEntry] {
        &self.entries
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn entry(&self, key: &ServiceKey) -> Option<&ServiceEntry> {
        self.entries.iter().find(|e| &e.key == key)
    }

    pub fn entry_for_domain(&self, domain: &DomainName) -> Option<&ServiceEntry> {
        self.by_domain.get(domain).map(|&idx| &self.entries[idx])
    }

    pub fn entry_for_port(&self, port: u16) -> Option<&ServiceEntry> {
        self.by_port.get(&port).map(|&idx| &self.entries[idx])
    }

    /// Target servers implied by the environments in play, deduplicated in
    /// first-seen order.
    pub fn targets(&self) -> Vec<&Target> {
        let mut seen = Vec::new();
        for entry in &self.entries {
            if !seen.contains(&&entry.target) {
                seen.push(&entry.target);
            }
        }
        seen
    }

    /// Entries destined for one target, in merge order.
    pub fn entries_for_target<'a>(
        &'a self,
        target: &'a Target,
    ) -> impl Iterator<Item = &'a ServiceEntry> {
        self.entries.iter().filter(move |e| &e.target == target)
    }
}
