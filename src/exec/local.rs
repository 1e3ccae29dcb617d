// ABOUTME: Local subprocess executor for targets that are the current host.
// ABOUTME: Runs commands through `sh -c` with captured output and timeouts.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use tokio::process::Command;

use super::{CommandOutput, ExecError, Execute, Result};

/// Default timeout for local commands, matching the SSH session default.
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(300);

/// Runs commands as local subprocesses.
#[derive(Debug, Default)]
pub struct LocalExecutor;

impl LocalExecutor {
    pub fn new() -> Self {
        Self
    }

    async fn run(&self, command: &str) -> Result<CommandOutput> {
        let output = Command::new("sh")
            .arg("-c")
            .arg(command)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await
            .map_err(|e| ExecError::CommandFailed(e.to_string()))?;

        Ok(CommandOutput {
            exit_code: output.status.code().unwrap_or(1) as u32,
            stdout: String::from_utf8_lossy(&output.stdout).to_string(),
            stderr: String::from_utf8_lossy(&output.stderr).to_string(),
        })
    }
}

#[async_trait]
impl Execute for LocalExecutor {
    async fn exec(&self, command: &str) -> Result<CommandOutput> {
        self.exec_with_timeout(command, DEFAULT_TIMEOUT).await
    }

    async fn exec_with_timeout(&self, command: &str, timeout: Duration) -> Result<CommandOutput> {
        match tokio::time::timeout(timeout, self.run(command)).await {
            Ok(result) => result,
            Err(_) => Err(ExecError::Timeout(timeout)),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn captures_stdout_and_exit_code() {
        let exec = LocalExecutor::new();
        let output = exec.exec("echo hello").await.unwrap();
        assert!(output.success());
        assert_eq!(output.stdout.trim(), "hello");
    }

    #[tokio::test]
    async fn reports_nonzero_exit() {
        let exec = LocalExecutor::new();
        let output = exec.exec("exit 3").await.unwrap();
        assert!(!output.success());
        assert_eq!(output.exit_code, 3);
    }

    #[tokio::test]
    async fn probe_times_out_as_not_present() {
        let exec = LocalExecutor::new();
        assert!(!exec.probe("command -v this-binary-does-not-exist-zzz").await);
    }
}
