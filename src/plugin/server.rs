// ABOUTME: Server plugins describe the host OS a target runs.
// ABOUTME: They own package install and service control command shapes.

use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;

use crate::exec::Execute;
use crate::fix::{Fix, FixContext, FixError, Severity, Stage};

use super::{Plugin, ResolveContext};

/// Host operating system family, used to scope OS-tagged fixes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Os {
    Ubuntu,
    Alpine,
}

impl fmt::Display for Os {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Os::Ubuntu => "ubuntu",
            Os::Alpine => "alpine",
        };
        write!(f, "{s}")
    }
}

#[async_trait]
pub trait ServerPlugin: Plugin {
    fn os(&self) -> Os;

    /// Shell command installing one package non-interactively.
    fn install_cmd(&self, package: &str) -> String;

    /// Shell command reloading the reverse proxy without dropping connections.
    fn reload_proxy_cmd(&self) -> String;

    /// (binary, package) pairs every deploy target must carry.
    fn baseline_packages(&self) -> &'static [(&'static str, &'static str)];

    /// Check-then-install the baseline tooling. Idempotent: present binaries
    /// are never reinstalled.
    async fn ensure_baseline(&self, exec: &dyn Execute) -> crate::exec::Result<()> {
        for (binary, package) in self.baseline_packages() {
            exec.ensure_installed(binary, &self.install_cmd(package))
                .await?;
        }
        Ok(())
    }
}

/// Default server plugin. Registered last as the catch-all; most deploy
/// targets are Ubuntu hosts.
pub struct UbuntuServer;

impl Plugin for UbuntuServer {
    fn id(&self) -> &'static str {
        "ubuntu"
    }

    fn should_load(&self, _ctx: &ResolveContext) -> bool {
        true
    }

    fn fixes(&self) -> Vec<Arc<dyn Fix>> {
        vec![Arc::new(AptListsCleaned)]
    }
}

impl ServerPlugin for UbuntuServer {
    fn os(&self) -> Os {
        Os::Ubuntu
    }

    fn install_cmd(&self, package: &str) -> String {
        format!("sudo DEBIAN_FRONTEND=noninteractive apt-get install -y {package}")
    }

    fn reload_proxy_cmd(&self) -> String {
        "sudo systemctl reload nginx".to_string()
    }

    fn baseline_packages(&self) -> &'static [(&'static str, &'static str)] {
        &[("docker", "docker.io"), ("git", "git"), ("curl", "curl")]
    }
}

/// Alpine hosts. Never auto-detected; opt in with `server_plugin: alpine`.
pub struct AlpineServer;

impl Plugin for AlpineServer {
    fn id(&self) -> &'static str {
        "alpine"
    }

    fn should_load(&self, _ctx: &ResolveContext) -> bool {
        false
    }
}

impl ServerPlugin for AlpineServer {
    fn os(&self) -> Os {
        Os::Alpine
    }

    fn install_cmd(&self, package: &str) -> String {
        format!("sudo apk add --no-cache {package}")
    }

    fn reload_proxy_cmd(&self) -> String {
        "sudo rc-service nginx reload".to_string()
    }

    fn baseline_packages(&self) -> &'static [(&'static str, &'static str)] {
        &[("docker", "docker"), ("git", "git"), ("curl", "curl")]
    }
}

/// Dockerfile installs apt packages without cleaning the package lists,
/// bloating every image built for this host.
struct AptListsCleaned;

impl Fix for AptListsCleaned {
    fn id(&self) -> &'static str {
        "apt-lists-cleaned"
    }

    fn stage(&self) -> Stage {
        Stage::Prod
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn description(&self) -> &'static str {
        "Dockerfile apt-get layers clean up /var/lib/apt/lists"
    }

    fn os(&self) -> Option<Os> {
        Some(Os::Ubuntu)
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        let dockerfile = ctx.root.join("Dockerfile");
        if !dockerfile.exists() {
            return Ok(false);
        }
        let content = std::fs::read_to_string(&dockerfile)?;
        Ok(content.contains("apt-get install") && !content.contains("/var/lib/apt/lists"))
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("append '&& rm -rf /var/lib/apt/lists/*' to apt-get install layers in the Dockerfile")
    }
}
