// ABOUTME: Deploy attempt state types for the type state pattern.
// ABOUTME: States carry the data that must exist once that state is reached.

/// A datastore dump taken on the target before any mutation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BackupHandle {
    /// Absolute path of the dump on the target.
    pub path: String,
}

/// Ready to deploy: target connected, nothing touched yet.
/// Available actions: `build()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Prepared;

/// Image built on the target.
/// Available actions: `backup()`
#[derive(Debug, Clone, Copy, Default)]
pub struct Built;

/// Datastore dumped (or nothing needed protecting). First mutating step is
/// next. Available actions: `migrate()`
#[derive(Debug, Clone)]
pub struct BackedUp {
    pub(crate) backup: Option<BackupHandle>,
    /// False when the pending-migrations probe found nothing to run, in which
    /// case the migrate step is skipped too.
    pub(crate) migrations_pending: bool,
}

/// Migrations ran against the live datastore.
/// Available actions: `rollout()`
#[derive(Debug, Clone)]
pub struct Migrated {
    pub(crate) backup: Option<BackupHandle>,
}

/// New container is live and routed. Health is not yet known.
/// Available actions: `verify()`
#[derive(Debug, Clone)]
pub struct RolledOut {
    pub(crate) backup: Option<BackupHandle>,
}

/// Health gate passed. The attempt succeeded.
/// Available actions: `finish()`
#[derive(Debug, Clone)]
pub struct Verified {
    pub(crate) backup: Option<BackupHandle>,
}
