// ABOUTME: Per-target rollout locks serializing the mutation critical section.
// ABOUTME: Attempts on distinct targets proceed concurrently; same target queues.

use std::collections::HashMap;
use std::sync::Arc;

use crate::exec::Target;

/// One async mutex per physical target. Keyed by `Target::key()`, so two SSH
/// users on the same host:port share a lock.
#[derive(Default)]
pub struct RolloutLocks {
    locks: parking_lot::Mutex<HashMap<String, Arc<tokio::sync::Mutex<()>>>>,
}

impl RolloutLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// The lock for a target, created on first use. Callers hold the returned
    /// mutex across rollout and verify.
    pub fn for_target(&self, target: &Target) -> Arc<tokio::sync::Mutex<()>> {
        let mut locks = self.locks.lock();
        locks.entry(target.key()).or_default().clone()
    }
}
