// ABOUTME: Remote execution gateway abstracting local and SSH command execution.
// ABOUTME: Callers run commands against a Target without branching on locality.

mod local;
mod target;

pub use local::LocalExecutor;
pub use target::{Target, TargetParseError};

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

use crate::ssh::{Session, SessionConfig};

/// Default timeout for probe-style commands (binary checks, reachability pings).
pub const PROBE_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Error)]
pub enum ExecError {
    #[error("connection to {target} failed: {reason}")]
    Connection { target: String, reason: String },

    #[error("command execution failed: {0}")]
    CommandFailed(String),

    #[error("command timed out after {0:?}")]
    Timeout(Duration),

    #[error("command exited with status {status}: {stderr}")]
    NonZeroExit { status: u32, stderr: String },

    #[error("SSH error: {0}")]
    Ssh(#[from] crate::ssh::Error),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, ExecError>;

/// Where the current process is executing, set once at the top of a run and
/// passed down explicitly. Never inferred from ambient process state.
#[derive(Debug, Clone, Copy, Default)]
pub struct ExecutionContext {
    /// True when the process is already running on the target host, in which
    /// case commands run as local subprocesses instead of over SSH.
    pub on_target: bool,
}

impl ExecutionContext {
    pub fn on_target() -> Self {
        Self { on_target: true }
    }

    pub fn remote() -> Self {
        Self { on_target: false }
    }
}

/// Output from a command execution, local or remote.
#[derive(Debug, Clone)]
pub struct CommandOutput {
    pub exit_code: u32,
    pub stdout: String,
    pub stderr: String,
}

impl CommandOutput {
    pub fn success(&self) -> bool {
        self.exit_code == 0
    }
}

/// Run commands against a target. Implementations capture output and report
/// typed failures; they never panic on command failure.
#[async_trait]
pub trait Execute: Send + Sync {
    async fn exec(&self, command: &str) -> Result<CommandOutput>;

    async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<CommandOutput>;

    /// Probe for a condition with a mandatory timeout. Timeouts and transport
    /// errors are reported as "not present", never propagated as fatal.
    async fn probe(&self, command: &str) -> bool {
        match self.exec_with_timeout(command, PROBE_TIMEOUT).await {
            Ok(output) => output.success(),
            Err(_) => false,
        }
    }

    /// Release the underlying transport once the caller is done. Local
    /// execution has nothing to close.
    async fn disconnect(&self) -> Result<()> {
        Ok(())
    }

    /// Install a prerequisite if its binary is absent. Check-then-install,
    /// never an unconditional reinstall.
    async fn ensure_installed(&self, binary: &str, install_command: &str) -> Result<()> {
        if self.probe(&format!("command -v {}", binary)).await {
            tracing::debug!("{} already present, skipping install", binary);
            return Ok(());
        }

        tracing::info!("installing {}", binary);
        let output = self.exec(install_command).await?;
        if !output.success() {
            return Err(ExecError::NonZeroExit {
                status: output.exit_code,
                stderr: output.stderr,
            });
        }
        Ok(())
    }
}

/// Gateway resolving a target plus execution context to a concrete executor.
pub struct Gateway;

impl Gateway {
    /// Connect to a target. When the execution context says the process is
    /// already on the target, commands run locally; the distinction is
    /// invisible to callers beyond latency.
    pub async fn connect(target: &Target, ctx: ExecutionContext) -> Result<Box<dyn Execute>> {
        match target {
            Target::Local => Ok(Box::new(LocalExecutor::new())),
            Target::Ssh { .. } if ctx.on_target => Ok(Box::new(LocalExecutor::new())),
            Target::Ssh {
                host,
                port,
                user,
                key_path,
            } => {
                let mut config = SessionConfig::new(host, user)
                    .port(*port)
                    .trust_on_first_use(true);
                if let Some(path) = key_path {
                    config = config.key_path(path);
                }

                let session =
                    Session::connect(config)
                        .await
                        .map_err(|e| ExecError::Connection {
                            target: target.to_string(),
                            reason: e.to_string(),
                        })?;
                Ok(Box::new(SshExecutor { session }))
            }
        }
    }
}

/// Executor backed by an SSH session.
pub struct SshExecutor {
    session: Session,
}

impl SshExecutor {
    pub fn new(session: Session) -> Self {
        Self { session }
    }
}

#[async_trait]
impl Execute for SshExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        Ok(self.session.exec(command).await?)
    }

    async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        match self.session.exec_with_timeout(command, timeout).await {
            Ok(output) => Ok(output),
            Err(crate::ssh::Error::CommandTimeout(d)) => Err(ExecError::Timeout(d)),
            Err(e) => Err(e.into()),
        }
    }

    async fn disconnect(&self) -> Result<()> {
        self.session.disconnect().await?;
        Ok(())
    }
}
