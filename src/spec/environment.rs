// ABOUTME: Per-environment deployment declaration within one repo's spec.
// ABOUTME: Raw deserialized form plus the validated form used by the merger.

use std::time::Duration;

use serde::Deserialize;

use crate::exec::Target;
use crate::types::{DomainName, PLACEHOLDER_MARKER, RepoName};

use super::SpecError;

pub(super) fn default_health_check() -> String {
    "/health".to_string()
}

fn default_server() -> Target {
    Target::Local
}

/// One environment as it appears on disk, before validation.
#[derive(Debug, Clone, Deserialize)]
pub(super) struct RawEnvironment {
    #[serde(default)]
    pub domain: Option<String>,

    #[serde(default)]
    pub port: Option<u32>,

    #[serde(default = "default_health_check")]
    pub health_check: String,

    #[serde(default)]
    pub depends_on: Vec<String>,

    #[serde(default)]
    pub env_file: Option<String>,

    #[serde(default = "default_server")]
    pub server: Target,

    #[serde(default, with = "humantime_serde")]
    pub health_timeout: Option<Duration>,

    #[serde(default)]
    pub server_plugin: Option<String>,

    #[serde(default)]
    pub pipeline_plugin: Option<String>,

    #[serde(default)]
    pub framework_plugin: Option<String>,
}

/// A validated environment declaration.
#[derive(Debug, Clone)]
pub struct EnvironmentConfig {
    /// Routing key for this environment. Environments without a domain do not
    /// receive routing and are skipped by the merger.
    pub domain: Option<DomainName>,
    /// Explicit port request; the merger assigns one when absent.
    pub port: Option<u16>,
    pub health_check: String,
    pub depends_on: Vec<RepoName>,
    pub env_file: Option<String>,
    pub server: Target,
    /// Per-environment override for the deploy health gate deadline.
    pub health_timeout: Option<Duration>,
    /// Optional plugin id pins. When absent, plugins detect applicability
    /// from the project tree.
    pub server_plugin: Option<String>,
    pub pipeline_plugin: Option<String>,
    pub framework_plugin: Option<String>,
}

impl RawEnvironment {
    /// Validate one environment. `env_name` scopes error messages so a fatal
    /// error names the exact field without consulting logs elsewhere.
    pub(super) fn validate(self, env_name: &str) -> Result<EnvironmentConfig, SpecError> {
        let domain = match self.domain {
            Some(raw) => {
                if raw.trim_start().starts_with(PLACEHOLDER_MARKER) {
                    return Err(SpecError::Placeholder {
                        field: format!("environments.{}.domain", env_name),
                        value: raw,
                    });
                }
                Some(DomainName::new(&raw).map_err(|e| {
                    SpecError::Invalid(format!("environments.{}.domain: {}", env_name, e))
                })?)
            }
            None => None,
        };

        let port = match self.port {
            Some(0) => {
                return Err(SpecError::Invalid(format!(
                    "environments.{}.port must be a positive integer",
                    env_name
                )));
            }
            Some(p) => Some(u16::try_from(p).map_err(|_| {
                SpecError::Invalid(format!(
                    "environments.{}.port {} is out of range",
                    env_name, p
                ))
            })?),
            None => None,
        };

        for (field, value) in [
            ("env_file", self.env_file.as_deref()),
            ("server_plugin", self.server_plugin.as_deref()),
            ("pipeline_plugin", self.pipeline_plugin.as_deref()),
            ("framework_plugin", self.framework_plugin.as_deref()),
        ] {
            if let Some(v) = value
                && v.trim_start().starts_with(PLACEHOLDER_MARKER)
            {
                return Err(SpecError::Placeholder {
                    field: format!("environments.{}.{}", env_name, field),
                    value: v.to_string(),
                });
            }
        }

        let depends_on = self
            .depends_on
            .iter()
            .map(|d| {
                RepoName::new(d).map_err(|e| {
                    SpecError::Invalid(format!(
                        "environments.{}.depends_on '{}': {}",
                        env_name, d, e
                    ))
                })
            })
            .collect::<Result<Vec<_>, _>>()?;

        Ok(EnvironmentConfig {
            domain,
            port,
            health_check: self.health_check,
            depends_on,
            env_file: self.env_file,
            server: self.server,
            health_timeout: self.health_timeout,
            server_plugin: self.server_plugin,
            pipeline_plugin: self.pipeline_plugin,
            framework_plugin: self.framework_plugin,
        })
    }
}
