// ABOUTME: Deploy orchestration using the type state pattern.
// ABOUTME: Drives one service through build, backup, migrate, rollout, verify.

mod attempt;
mod error;
mod lock;
mod state;
mod transitions;

pub use attempt::Attempt;
pub use error::{DeployError, DeployPhase};
pub use lock::RolloutLocks;
pub use state::{BackedUp, BackupHandle, Built, Migrated, Prepared, RolledOut, Verified};
pub use transitions::{BACKUP_DIR, TransitionResult};

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use crate::diagnostics::{Diagnostics, Warning};
use crate::exec::{Execute, ExecutionContext, Gateway};
use crate::plugin::{FrameworkPlugin, ServerPlugin};
use crate::topology::{ServiceEntry, Topology, render_routing};
use crate::types::ServiceKey;

#[derive(Debug, Clone, Copy)]
pub struct DeployOptions {
    /// Deadline for the verify health gate.
    pub health_timeout: Duration,
    /// Grace period after rollout before the first health poll.
    pub settle_delay: Duration,
    /// Concurrent deploys across distinct targets.
    pub worker_limit: usize,
}

impl Default for DeployOptions {
    fn default() -> Self {
        Self {
            health_timeout: Duration::from_secs(120),
            settle_delay: Duration::from_secs(5),
            worker_limit: 4,
        }
    }
}

/// One service deployed and verified.
#[derive(Debug)]
pub struct DeployOutcome {
    pub key: ServiceKey,
    pub image: String,
}

/// One service's attempt failed. `restored` is None when no backup existed
/// (nothing had been mutated, or there was no datastore), Some(false) when a
/// restore was attempted and also failed.
#[derive(Debug)]
pub struct DeployFailure {
    pub key: ServiceKey,
    pub phase: DeployPhase,
    pub error: DeployError,
    pub restored: Option<bool>,
}

impl std::fmt::Display for DeployFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{} failed during {}: {}", self.key, self.phase, self.error)?;
        match self.restored {
            Some(true) => write!(f, " (datastore restored from backup)"),
            Some(false) => Ok(()),
            None => Ok(()),
        }
    }
}

/// Deploy one topology entry end to end: connect to its target, drive the
/// attempt, then release the transport.
#[allow(clippy::too_many_arguments)]
pub async fn deploy_entry(
    entry: ServiceEntry,
    env_file: Option<String>,
    context_dir: String,
    server: Arc<dyn ServerPlugin>,
    framework: Arc<dyn FrameworkPlugin>,
    topology: &Topology,
    exec_ctx: ExecutionContext,
    locks: &RolloutLocks,
    options: &DeployOptions,
    diagnostics: &Diagnostics,
    cancel: watch::Receiver<bool>,
) -> Result<DeployOutcome, DeployFailure> {
    let key = entry.key.clone();
    let target = entry.target.clone();
    let routing = render_routing(topology, &target);

    let exec = Gateway::connect(&target, exec_ctx)
        .await
        .map_err(|e| DeployFailure {
            key: key.clone(),
            phase: DeployPhase::Prepare,
            error: e.into(),
            restored: None,
        })?;

    let result = deploy_with(
        exec.as_ref(),
        entry,
        env_file,
        &context_dir,
        server.as_ref(),
        framework.as_ref(),
        &routing,
        locks,
        options,
        cancel,
    )
    .await;

    if let Err(e) = exec.disconnect().await {
        diagnostics.warn(Warning::ssh_disconnect(format!("{target}: {e}")));
    }

    result
}

/// Drive one attempt against an already connected executor.
///
/// Build runs outside the rollout lock; everything that can touch live state
/// on the target runs inside it, so concurrent deploys to one target queue
/// while distinct targets proceed in parallel.
#[allow(clippy::too_many_arguments)]
pub async fn deploy_with(
    exec: &dyn Execute,
    entry: ServiceEntry,
    env_file: Option<String>,
    context_dir: &str,
    server: &dyn ServerPlugin,
    framework: &dyn FrameworkPlugin,
    routing: &str,
    locks: &RolloutLocks,
    options: &DeployOptions,
    mut cancel: watch::Receiver<bool>,
) -> Result<DeployOutcome, DeployFailure> {
    let key = entry.key.clone();
    let target = entry.target.clone();
    let health_timeout = entry.health_timeout.unwrap_or(options.health_timeout);

    if let Err(e) = server.ensure_baseline(exec).await {
        return Err(DeployFailure {
            key,
            phase: DeployPhase::Prepare,
            error: e.into(),
            restored: None,
        });
    }

    let attempt = Attempt::new(entry, env_file);
    let built = match attempt.build(exec, context_dir).await {
        Ok(built) => built,
        Err((_, error)) => {
            return Err(DeployFailure {
                key,
                phase: DeployPhase::Build,
                error,
                restored: None,
            });
        }
    };

    let lock = locks.for_target(&target);
    let _guard = lock.lock().await;

    let backed_up = match built.backup(exec, framework).await {
        Ok(next) => next,
        // Backup failures never need a restore: nothing was mutated.
        Err((_, error)) => {
            return Err(DeployFailure {
                key,
                phase: DeployPhase::Backup,
                error,
                restored: None,
            });
        }
    };

    let migrated = match backed_up.migrate(exec, framework).await {
        Ok(next) => next,
        Err((failed, error)) => {
            return Err(fail_with_restore(
                exec,
                framework,
                failed.backup(),
                key,
                DeployPhase::Migrate,
                error,
            )
            .await);
        }
    };

    let rolled_out = match migrated.rollout(exec, server, routing).await {
        Ok(next) => next,
        Err((failed, error)) => {
            return Err(fail_with_restore(
                exec,
                framework,
                failed.backup(),
                key,
                DeployPhase::Rollout,
                error,
            )
            .await);
        }
    };

    let verified = match rolled_out
        .verify(exec, options.settle_delay, health_timeout, &mut cancel)
        .await
    {
        Ok(next) => next,
        Err((failed, error)) => {
            return Err(fail_with_restore(
                exec,
                framework,
                failed.backup(),
                key,
                DeployPhase::Verify,
                error,
            )
            .await);
        }
    };

    let image = verified.image().to_string();
    verified.finish(exec).await;

    Ok(DeployOutcome { key, image })
}

async fn fail_with_restore(
    exec: &dyn Execute,
    framework: &dyn FrameworkPlugin,
    backup: Option<&BackupHandle>,
    key: ServiceKey,
    phase: DeployPhase,
    error: DeployError,
) -> DeployFailure {
    let Some(backup) = backup else {
        return DeployFailure {
            key,
            phase,
            error,
            restored: None,
        };
    };

    match transitions::restore(exec, framework, backup).await {
        Ok(()) => DeployFailure {
            key,
            phase,
            error,
            restored: Some(true),
        },
        Err(restore_error) => DeployFailure {
            key,
            phase,
            error: DeployError::RestoreFailed {
                error: error.to_string(),
                restore_error,
                backup_path: backup.path.clone(),
            },
            restored: Some(false),
        },
    }
}
