// ABOUTME: Generic deploy attempt struct parameterized by state marker.
// ABOUTME: State types carry their own data for compile-time guarantees.

use chrono::Utc;

use crate::topology::ServiceEntry;
use crate::types::ServiceKey;

use super::state::{BackedUp, BackupHandle, Migrated, Prepared, RolledOut, Verified};

/// One service's deploy in progress, parameterized by its current state.
///
/// The state type parameter `S` carries state-specific data (like the backup
/// handle) directly in the state type, so a restore can only be attempted
/// once a backup provably exists.
#[derive(Debug)]
pub struct Attempt<S> {
    pub(crate) entry: ServiceEntry,
    pub(crate) image: String,
    pub(crate) env_file: Option<String>,
    pub(crate) state: S,
}

impl Attempt<Prepared> {
    /// Start an attempt for one topology entry. The image tag is fixed here
    /// so every later step names the same build.
    pub fn new(entry: ServiceEntry, env_file: Option<String>) -> Self {
        let image = format!(
            "flotilla/{}:{}",
            entry.key.container_name(),
            Utc::now().format("%Y%m%d%H%M%S")
        );
        Attempt {
            entry,
            image,
            env_file,
            state: Prepared,
        }
    }
}

impl<S> Attempt<S> {
    pub fn key(&self) -> &ServiceKey {
        &self.entry.key
    }

    pub fn entry(&self) -> &ServiceEntry {
        &self.entry
    }

    pub fn image(&self) -> &str {
        &self.image
    }

    pub(crate) fn container_name(&self) -> String {
        self.entry.key.container_name()
    }
}

// State-specific accessors for the backup handle.
impl Attempt<BackedUp> {
    pub fn backup(&self) -> Option<&BackupHandle> {
        self.state.backup.as_ref()
    }
}

impl Attempt<Migrated> {
    pub fn backup(&self) -> Option<&BackupHandle> {
        self.state.backup.as_ref()
    }
}

impl Attempt<RolledOut> {
    pub fn backup(&self) -> Option<&BackupHandle> {
        self.state.backup.as_ref()
    }
}

impl Attempt<Verified> {
    pub fn backup(&self) -> Option<&BackupHandle> {
        self.state.backup.as_ref()
    }
}
