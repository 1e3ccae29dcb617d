// ABOUTME: Hooks system for deploy lifecycle events.
// ABOUTME: Discovers and executes shell scripts at pre-deploy, post-deploy, and on-error points.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::process::Stdio;
use tokio::process::Command;

use crate::types::ServiceKey;

/// Hook execution points in the deploy lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HookPoint {
    /// Before the deploy starts. Failure aborts the service's deploy.
    PreDeploy,
    /// After a verified deploy. Failure logs a warning.
    PostDeploy,
    /// On deploy failure. Failure logs a warning.
    OnError,
}

impl HookPoint {
    /// Get the hook filename for this point.
    pub fn filename(&self) -> &'static str {
        match self {
            HookPoint::PreDeploy => "pre-deploy",
            HookPoint::PostDeploy => "post-deploy",
            HookPoint::OnError => "on-error",
        }
    }

    /// Whether failure at this hook point should abort the deploy.
    pub fn is_fatal(&self) -> bool {
        matches!(self, HookPoint::PreDeploy)
    }
}

/// Context passed to hooks via environment variables.
#[derive(Debug, Clone)]
pub struct HookContext {
    pub service: ServiceKey,
    pub target: String,
    /// Set once an image has been built.
    pub image: Option<String>,
}

impl HookContext {
    /// Convert context to environment variables.
    pub fn to_env(&self) -> HashMap<String, String> {
        let mut env = HashMap::new();
        env.insert("FLOTILLA_SERVICE".to_string(), self.service.to_string());
        env.insert(
            "FLOTILLA_ENVIRONMENT".to_string(),
            self.service.environment().to_string(),
        );
        env.insert("FLOTILLA_TARGET".to_string(), self.target.clone());
        if let Some(ref image) = self.image {
            env.insert("FLOTILLA_IMAGE".to_string(), image.clone());
        }
        env
    }
}

/// Result of running a hook.
#[derive(Debug)]
pub struct HookResult {
    pub success: bool,
    pub exit_code: Option<i32>,
    pub stdout: String,
    pub stderr: String,
}

/// Discovers and runs hooks from a repository checkout.
pub struct HookRunner {
    hooks_dir: PathBuf,
}

impl HookRunner {
    /// Create a new hook runner looking for hooks in the given checkout.
    pub fn new(repo_root: &Path) -> Self {
        Self {
            hooks_dir: repo_root.join(".flotilla").join("hooks"),
        }
    }

    /// Check if a hook exists for the given point.
    pub fn hook_exists(&self, point: HookPoint) -> bool {
        self.hook_path(point).is_file()
    }

    /// Get the path to a hook script.
    fn hook_path(&self, point: HookPoint) -> PathBuf {
        self.hooks_dir.join(point.filename())
    }

    /// Run a hook if it exists.
    ///
    /// Returns None if the hook doesn't exist, or Some(HookResult) if it was run.
    pub async fn run(&self, point: HookPoint, context: &HookContext) -> Option<HookResult> {
        let hook_path = self.hook_path(point);

        if !hook_path.is_file() {
            return None;
        }

        tracing::info!("Running {} hook: {}", point.filename(), hook_path.display());

        let env_vars = context.to_env();

        let output = Command::new(&hook_path)
            .envs(&env_vars)
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .output()
            .await;

        match output {
            Ok(output) => {
                let result = HookResult {
                    success: output.status.success(),
                    exit_code: output.status.code(),
                    stdout: String::from_utf8_lossy(&output.stdout).to_string(),
                    stderr: String::from_utf8_lossy(&output.stderr).to_string(),
                };

                if result.success {
                    tracing::info!("{} hook completed successfully", point.filename());
                } else {
                    tracing::warn!(
                        "{} hook failed with exit code {:?}",
                        point.filename(),
                        result.exit_code
                    );
                }

                Some(result)
            }
            Err(e) => {
                tracing::error!("Failed to execute {} hook: {}", point.filename(), e);
                Some(HookResult {
                    success: false,
                    exit_code: None,
                    stdout: String::new(),
                    stderr: e.to_string(),
                })
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::RepoName;

    fn key() -> ServiceKey {
        ServiceKey::new(RepoName::new("api").unwrap(), "production")
    }

    #[test]
    fn hook_point_filenames() {
        assert_eq!(HookPoint::PreDeploy.filename(), "pre-deploy");
        assert_eq!(HookPoint::PostDeploy.filename(), "post-deploy");
        assert_eq!(HookPoint::OnError.filename(), "on-error");
    }

    #[test]
    fn pre_deploy_is_fatal() {
        assert!(HookPoint::PreDeploy.is_fatal());
        assert!(!HookPoint::PostDeploy.is_fatal());
        assert!(!HookPoint::OnError.is_fatal());
    }

    #[test]
    fn hook_context_to_env() {
        let context = HookContext {
            service: key(),
            target: "deploy@web1.example.com:22".to_string(),
            image: Some("flotilla/api-production:20260829120000".to_string()),
        };

        let env = context.to_env();
        assert_eq!(
            env.get("FLOTILLA_SERVICE"),
            Some(&"api/production".to_string())
        );
        assert_eq!(
            env.get("FLOTILLA_ENVIRONMENT"),
            Some(&"production".to_string())
        );
        assert_eq!(
            env.get("FLOTILLA_TARGET"),
            Some(&"deploy@web1.example.com:22".to_string())
        );
        assert!(env.contains_key("FLOTILLA_IMAGE"));
    }

    #[test]
    fn hook_context_without_image() {
        let context = HookContext {
            service: key(),
            target: "local".to_string(),
            image: None,
        };

        let env = context.to_env();
        assert!(!env.contains_key("FLOTILLA_IMAGE"));
    }

    #[test]
    fn hook_runner_checks_hooks_dir() {
        let runner = HookRunner::new(Path::new("/nonexistent"));
        assert!(!runner.hook_exists(HookPoint::PreDeploy));
    }
}
