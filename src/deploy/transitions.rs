// ABOUTME: State transition methods for deploy attempts.
// ABOUTME: Each method consumes self and returns the next state on success.

use std::time::Duration;

use chrono::Utc;
use tokio::sync::watch;

use crate::exec::Execute;
use crate::plugin::{FrameworkPlugin, ServerPlugin};
use crate::topology::ROUTING_PATH;

use super::Attempt;
use super::error::DeployError;
use super::state::{BackedUp, BackupHandle, Built, Migrated, Prepared, RolledOut, Verified};

/// Result type for transitions that may need restore on failure.
pub type TransitionResult<T, S> = Result<Attempt<T>, (Attempt<S>, DeployError)>;

/// Where datastore dumps land on the target.
pub const BACKUP_DIR: &str = "$HOME/.local/state/flotilla/backups";

/// Verify polling cadence and pass threshold.
const HEALTH_POLL_INTERVAL: Duration = Duration::from_secs(2);
const HEALTHY_PASSES: u32 = 3;

fn shell_quote(s: &str) -> String {
    format!("'{}'", s.replace('\'', "'\\''"))
}

/// A command run in a one-off container from the new image.
fn one_off(image: &str, env_file: Option<&str>, cmd: &str) -> String {
    let env_flag = match env_file {
        Some(f) => format!("--env-file {} ", shell_quote(f)),
        None => String::new(),
    };
    format!("docker run --rm {env_flag}{image} sh -c {}", shell_quote(cmd))
}

/// Sleep, waking early if the cancel channel flips to true.
async fn sleep_or_cancel(duration: Duration, cancel: &mut watch::Receiver<bool>) -> bool {
    tokio::select! {
        _ = tokio::time::sleep(duration) => false,
        res = cancel.changed() => res.is_ok() && *cancel.borrow(),
    }
}

// =============================================================================
// Prepared -> Built
// =============================================================================

impl Attempt<Prepared> {
    /// Build the service image on the target from its checkout directory.
    ///
    /// Read-only with respect to the live service; failure needs no restore.
    #[must_use = "attempt state must be used"]
    pub async fn build(
        self,
        exec: &dyn Execute,
        context_dir: &str,
    ) -> TransitionResult<Built, Prepared> {
        let cmd = format!(
            "docker build -t {} {}",
            self.image,
            shell_quote(context_dir)
        );
        tracing::info!(service = %self.key(), image = %self.image, "building image");

        match exec.exec(&cmd).await {
            Ok(output) if output.success() => Ok(Attempt {
                entry: self.entry,
                image: self.image,
                env_file: self.env_file,
                state: Built,
            }),
            Ok(output) => Err((self, DeployError::BuildFailed(output.stderr))),
            Err(e) => Err((self, DeployError::BuildFailed(e.to_string()))),
        }
    }
}

// =============================================================================
// Built -> BackedUp
// =============================================================================

impl Attempt<Built> {
    /// Dump the datastore before anything live is touched.
    ///
    /// Skipped when no schema changes are pending (there is nothing the
    /// migrate step could break), when no previous container exists, or when
    /// the framework manages no datastore. A backup failure is fatal here,
    /// before any mutation.
    #[must_use = "attempt state must be used"]
    pub async fn backup(
        self,
        exec: &dyn Execute,
        framework: &dyn FrameworkPlugin,
    ) -> TransitionResult<BackedUp, Built> {
        let pending = self.migrations_pending(exec, framework).await;
        if !pending {
            tracing::debug!(service = %self.key(), "no pending migrations, skipping backup");
            return Ok(self.into_backed_up(None, false));
        }

        let container = self.container_name();
        let first_deploy = !exec
            .probe(&format!("docker inspect {container} > /dev/null 2>&1"))
            .await;
        if first_deploy {
            tracing::debug!(service = %self.key(), "first deploy, nothing to back up");
            return Ok(self.into_backed_up(None, true));
        }

        let path = format!(
            "{}/{}-{}.dump",
            BACKUP_DIR,
            container,
            Utc::now().format("%Y%m%d%H%M%S")
        );
        let Some(backup_cmd) = framework.backup_cmd(&path) else {
            tracing::debug!(service = %self.key(), "framework has no datastore, skipping backup");
            return Ok(self.into_backed_up(None, true));
        };

        tracing::info!(service = %self.key(), path = %path, "backing up datastore");
        let cmd = format!("mkdir -p {BACKUP_DIR} && {backup_cmd}");
        match exec.exec(&cmd).await {
            Ok(output) if output.success() => {
                Ok(self.into_backed_up(Some(BackupHandle { path }), true))
            }
            Ok(output) => Err((self, DeployError::BackupFailed(output.stderr))),
            Err(e) => Err((self, DeployError::BackupFailed(e.to_string()))),
        }
    }

    /// Probe for pending schema changes in a one-off container. Probe errors
    /// count as pending so a flaky probe still gets a backup.
    async fn migrations_pending(
        &self,
        exec: &dyn Execute,
        framework: &dyn FrameworkPlugin,
    ) -> bool {
        let Some(cmd) = framework.pending_migrations_cmd() else {
            return framework.migrate_cmd().is_some();
        };

        let probe = one_off(&self.image, self.env_file.as_deref(), &cmd);
        match exec.exec(&probe).await {
            Ok(output) => output.success(),
            Err(_) => true,
        }
    }

    fn into_backed_up(
        self,
        backup: Option<BackupHandle>,
        migrations_pending: bool,
    ) -> Attempt<BackedUp> {
        Attempt {
            entry: self.entry,
            image: self.image,
            env_file: self.env_file,
            state: BackedUp {
                backup,
                migrations_pending,
            },
        }
    }
}

// =============================================================================
// BackedUp -> Migrated
// =============================================================================

impl Attempt<BackedUp> {
    /// Run schema migrations in a one-off container from the new image.
    /// Skipped when the backup step found no pending changes.
    #[must_use = "attempt state must be used"]
    pub async fn migrate(
        self,
        exec: &dyn Execute,
        framework: &dyn FrameworkPlugin,
    ) -> TransitionResult<Migrated, BackedUp> {
        if !self.state.migrations_pending {
            return Ok(self.into_migrated());
        }
        let Some(migrate_cmd) = framework.migrate_cmd() else {
            return Ok(self.into_migrated());
        };

        let cmd = one_off(&self.image, self.env_file.as_deref(), &migrate_cmd);

        tracing::info!(service = %self.key(), "running migrations");
        match exec.exec(&cmd).await {
            Ok(output) if output.success() => Ok(self.into_migrated()),
            Ok(output) => Err((self, DeployError::MigrateFailed(output.stderr))),
            Err(e) => Err((self, DeployError::MigrateFailed(e.to_string()))),
        }
    }

    fn into_migrated(self) -> Attempt<Migrated> {
        Attempt {
            entry: self.entry,
            image: self.image,
            env_file: self.env_file,
            state: Migrated {
                backup: self.state.backup,
            },
        }
    }
}

// =============================================================================
// Migrated -> RolledOut
// =============================================================================

impl Attempt<Migrated> {
    /// Replace the running container and regenerate routing.
    ///
    /// Callers hold the target's rollout lock across this transition and the
    /// verify that follows; `routing` is the full rendered definition for the
    /// target, not just this service's block.
    #[must_use = "attempt state must be used"]
    pub async fn rollout(
        self,
        exec: &dyn Execute,
        server: &dyn ServerPlugin,
        routing: &str,
    ) -> TransitionResult<RolledOut, Migrated> {
        let container = self.container_name();
        let port = self.entry.port;
        let env_flag = match &self.env_file {
            Some(f) => format!("--env-file {} ", shell_quote(f)),
            None => String::new(),
        };

        let steps = [
            format!("docker rm -f {container} > /dev/null 2>&1 || true"),
            format!(
                "docker run -d --name {container} --restart unless-stopped \
                 -p 127.0.0.1:{port}:{port} {env_flag}\
                 -l flotilla.managed=true -l {} -l {} {}",
                shell_quote(&format!("flotilla.service={}", self.key())),
                shell_quote(&format!(
                    "flotilla.deployed-by={}",
                    gethostname::gethostname().to_string_lossy()
                )),
                self.image
            ),
            format!(
                "printf '%s' {} | sudo tee {ROUTING_PATH} > /dev/null",
                shell_quote(routing)
            ),
            server.reload_proxy_cmd(),
        ];

        tracing::info!(service = %self.key(), port, "rolling out");
        for step in &steps {
            match exec.exec(step).await {
                Ok(output) if output.success() => {}
                Ok(output) => return Err((self, DeployError::RolloutFailed(output.stderr))),
                Err(e) => return Err((self, DeployError::RolloutFailed(e.to_string()))),
            }
        }

        Ok(Attempt {
            entry: self.entry,
            image: self.image,
            env_file: self.env_file,
            state: RolledOut {
                backup: self.state.backup,
            },
        })
    }
}

// =============================================================================
// RolledOut -> Verified
// =============================================================================

impl Attempt<RolledOut> {
    /// Health gate: wait for the container to settle, then require several
    /// consecutive running polls before the deadline.
    ///
    /// A restarting or exited container fails immediately, as does a
    /// cancellation; a cancelled verify counts as a failed one so the caller
    /// restores rather than leaving an unverified rollout live.
    #[must_use = "attempt state must be used"]
    pub async fn verify(
        self,
        exec: &dyn Execute,
        settle_delay: Duration,
        timeout: Duration,
        cancel: &mut watch::Receiver<bool>,
    ) -> TransitionResult<Verified, RolledOut> {
        if *cancel.borrow() {
            return Err((self, DeployError::Cancelled));
        }

        if sleep_or_cancel(settle_delay, cancel).await {
            return Err((self, DeployError::Cancelled));
        }

        let container = self.container_name();
        let status_cmd = format!("docker inspect -f '{{{{.State.Status}}}}' {container}");
        let deadline = tokio::time::Instant::now() + timeout;
        let mut consecutive = 0u32;

        while tokio::time::Instant::now() < deadline {
            let status = match exec.exec(&status_cmd).await {
                Ok(output) if output.success() => output.stdout.trim().to_string(),
                Ok(output) => {
                    return Err((self, DeployError::HealthCheckFailed(output.stderr)));
                }
                Err(e) => {
                    return Err((self, DeployError::HealthCheckFailed(e.to_string())));
                }
            };

            match status.as_str() {
                "running" => {
                    consecutive += 1;
                    if consecutive >= HEALTHY_PASSES {
                        tracing::info!(service = %self.key(), "healthy");
                        return Ok(Attempt {
                            entry: self.entry,
                            image: self.image,
                            env_file: self.env_file,
                            state: Verified {
                                backup: self.state.backup,
                            },
                        });
                    }
                }
                "restarting" | "exited" | "dead" => {
                    return Err((
                        self,
                        DeployError::HealthCheckFailed(format!("container is {status}")),
                    ));
                }
                // created, paused: keep waiting.
                _ => consecutive = 0,
            }

            if sleep_or_cancel(HEALTH_POLL_INTERVAL, cancel).await {
                return Err((self, DeployError::Cancelled));
            }
        }

        Err((self, DeployError::HealthCheckTimeout(timeout.as_secs())))
    }
}

// =============================================================================
// Verified - Terminal State
// =============================================================================

impl Attempt<Verified> {
    /// Delete the backup now that the rollout is proven good. Deletion is best
    /// effort; a leftover dump is noise, not a fault.
    pub async fn finish(self, exec: &dyn Execute) {
        if let Some(backup) = &self.state.backup
            && let Err(e) = exec.exec(&format!("rm -f {}", shell_quote(&backup.path))).await
        {
            tracing::warn!(service = %self.key(), "failed to delete backup: {}", e);
        }
    }
}

/// Restore the datastore from a backup after a failed attempt. The caller
/// escalates to `DeployError::RestoreFailed` when this also fails.
pub(super) async fn restore(
    exec: &dyn Execute,
    framework: &dyn FrameworkPlugin,
    backup: &BackupHandle,
) -> Result<(), String> {
    let Some(cmd) = framework.restore_cmd(&backup.path) else {
        return Err("framework provides no restore command".to_string());
    };

    tracing::warn!(path = %backup.path, "restoring datastore from backup");
    match exec.exec(&cmd).await {
        Ok(output) if output.success() => Ok(()),
        Ok(output) => Err(output.stderr),
        Err(e) => Err(e.to_string()),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn shell_quote_escapes_single_quotes() {
        assert_eq!(shell_quote("it's"), "'it'\\''s'");
        assert_eq!(shell_quote("plain"), "'plain'");
    }
}
