// ABOUTME: Error types for deploy attempts.
// ABOUTME: Distinguishes plain failures from failed restores, which escalate.

use thiserror::Error;

/// Which step of an attempt was running. Used in failure reporting so the
/// operator knows what the target looked like when the attempt stopped.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeployPhase {
    Prepare,
    Build,
    Backup,
    Migrate,
    Rollout,
    Verify,
}

impl std::fmt::Display for DeployPhase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            DeployPhase::Prepare => "prepare",
            DeployPhase::Build => "build",
            DeployPhase::Backup => "backup",
            DeployPhase::Migrate => "migrate",
            DeployPhase::Rollout => "rollout",
            DeployPhase::Verify => "verify",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum DeployError {
    #[error("image build failed: {0}")]
    BuildFailed(String),

    #[error("backup failed, nothing was mutated: {0}")]
    BackupFailed(String),

    #[error("migration failed: {0}")]
    MigrateFailed(String),

    #[error("rollout failed: {0}")]
    RolloutFailed(String),

    #[error("health check failed: {0}")]
    HealthCheckFailed(String),

    #[error("health check timed out after {0} seconds")]
    HealthCheckTimeout(u64),

    #[error("deploy cancelled")]
    Cancelled,

    #[error("execution error: {0}")]
    Exec(#[from] crate::exec::ExecError),

    /// The attempt failed and the backup could not be restored. The target is
    /// in an unknown state; this always escalates past ordinary failure
    /// handling.
    #[error("deploy failed ({error}) and restore also failed ({restore_error}); target state is unknown, backup retained at {backup_path}")]
    RestoreFailed {
        error: String,
        restore_error: String,
        backup_path: String,
    },
}
