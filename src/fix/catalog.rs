// ABOUTME: Core catalog of readiness fixes that apply to every repository.
// ABOUTME: Plugin-specific fixes live with their plugins, not here.

use std::path::Path;
use std::sync::Arc;

use crate::spec::EnvironmentSpec;
use crate::types::PLACEHOLDER_MARKER;

use super::{Fix, FixContext, FixError, FixOutcome, Severity, Stage};

/// Fixes that apply regardless of which plugins resolve.
pub fn core_fixes() -> Vec<Arc<dyn Fix>> {
    vec![
        Arc::new(EnvFileMissing),
        Arc::new(EnvFilesIgnored),
        Arc::new(EnvPlaceholders),
        Arc::new(SecretsSynced),
        Arc::new(StagingDomain),
        Arc::new(ProdDomain),
        Arc::new(ProdRemoteTarget),
    ]
}

/// Env file names declared across all environments, deduplicated in order.
fn declared_env_files(spec: &EnvironmentSpec) -> Vec<String> {
    let mut files = Vec::new();
    for (_, env) in spec.environments.iter() {
        if let Some(f) = &env.env_file
            && !files.contains(f)
        {
            files.push(f.clone());
        }
    }
    files
}

/// KEY=value pairs from an env file, comments and blanks skipped.
fn parse_env_lines(content: &str) -> Vec<(String, String)> {
    content
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty() && !l.starts_with('#'))
        .filter_map(|l| {
            l.split_once('=')
                .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        })
        .collect()
}

const SECRET_SUFFIXES: &[&str] = &["_SECRET", "_KEY", "_TOKEN", "_PASSWORD"];

fn looks_secret(key: &str) -> bool {
    SECRET_SUFFIXES.iter().any(|s| key.ends_with(s))
}

// ---------------------------------------------------------------------------
// dev stage
// ---------------------------------------------------------------------------

/// A declared env file does not exist in the checkout.
struct EnvFileMissing;

impl Fix for EnvFileMissing {
    fn id(&self) -> &'static str {
        "env-file-missing"
    }

    fn stage(&self) -> Stage {
        Stage::Dev
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &'static str {
        "every env file referenced by the spec exists in the checkout"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        Ok(declared_env_files(ctx.spec)
            .iter()
            .any(|f| !ctx.root.join(f).exists()))
    }

    fn auto_fixable(&self) -> bool {
        true
    }

    fn apply(&self, ctx: &FixContext) -> Result<FixOutcome, FixError> {
        let example = ctx.root.join(".env.example");
        let mut applied = false;

        for file in declared_env_files(ctx.spec) {
            let path = ctx.root.join(&file);
            if path.exists() {
                continue;
            }
            if example.exists() {
                std::fs::copy(&example, &path)?;
            } else {
                std::fs::write(&path, "# Created by flotilla fix; fill in values.\n")?;
            }
            applied = true;
        }

        Ok(if applied {
            FixOutcome::Applied
        } else {
            FixOutcome::AlreadyResolved
        })
    }
}

/// Declared env files are not covered by .gitignore.
struct EnvFilesIgnored;

impl EnvFilesIgnored {
    fn uncovered(root: &Path, files: &[String]) -> Result<Vec<String>, FixError> {
        let gitignore = root.join(".gitignore");
        let content = if gitignore.exists() {
            std::fs::read_to_string(&gitignore)?
        } else {
            String::new()
        };
        let lines: Vec<&str> = content.lines().map(str::trim).collect();

        Ok(files
            .iter()
            .filter(|f| !lines.contains(&f.as_str()) && !lines.contains(&".env*"))
            .cloned()
            .collect())
    }
}

impl Fix for EnvFilesIgnored {
    fn id(&self) -> &'static str {
        "env-files-gitignored"
    }

    fn stage(&self) -> Stage {
        Stage::Dev
    }

    fn severity(&self) -> Severity {
        Severity::Info
    }

    fn description(&self) -> &'static str {
        "env files referenced by the spec are excluded from version control"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        let files = declared_env_files(ctx.spec);
        if files.is_empty() {
            return Ok(false);
        }
        Ok(!Self::uncovered(ctx.root, &files)?.is_empty())
    }

    fn auto_fixable(&self) -> bool {
        true
    }

    fn apply(&self, ctx: &FixContext) -> Result<FixOutcome, FixError> {
        let files = declared_env_files(ctx.spec);
        let uncovered = Self::uncovered(ctx.root, &files)?;
        if uncovered.is_empty() {
            return Ok(FixOutcome::AlreadyResolved);
        }

        let gitignore = ctx.root.join(".gitignore");
        let mut content = if gitignore.exists() {
            std::fs::read_to_string(&gitignore)?
        } else {
            String::new()
        };
        if !content.is_empty() && !content.ends_with('\n') {
            content.push('\n');
        }
        for file in uncovered {
            content.push_str(&file);
            content.push('\n');
        }
        std::fs::write(&gitignore, content)?;

        Ok(FixOutcome::Applied)
    }
}

// ---------------------------------------------------------------------------
// secrets stage
// ---------------------------------------------------------------------------

/// An env file still carries unresolved placeholder values.
struct EnvPlaceholders;

impl Fix for EnvPlaceholders {
    fn id(&self) -> &'static str {
        "env-placeholders"
    }

    fn stage(&self) -> Stage {
        Stage::Secrets
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "no env file value still carries the placeholder marker"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        for file in declared_env_files(ctx.spec) {
            let path = ctx.root.join(&file);
            if !path.exists() {
                // The env-file-missing fix owns this condition.
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            if parse_env_lines(&content)
                .iter()
                .any(|(_, v)| v.starts_with(PLACEHOLDER_MARKER))
            {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("replace every CHANGEME value in the env files with a real value")
    }
}

/// Secret-like env keys are not present in the configured secret store.
struct SecretsSynced;

impl SecretsSynced {
    /// Secret-like keys and their values across the declared env files,
    /// deduplicated in order. Placeholder values are left out: uploading a
    /// CHANGEME would poison the store, and env-placeholders owns flagging
    /// them.
    fn secret_values(ctx: &FixContext) -> Result<Vec<(String, String)>, FixError> {
        let mut values: Vec<(String, String)> = Vec::new();
        for file in declared_env_files(ctx.spec) {
            let path = ctx.root.join(&file);
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            for (key, value) in parse_env_lines(&content) {
                if looks_secret(&key)
                    && !value.starts_with(PLACEHOLDER_MARKER)
                    && !values.iter().any(|(k, _)| k == &key)
                {
                    values.push((key, value));
                }
            }
        }
        Ok(values)
    }
}

impl Fix for SecretsSynced {
    fn id(&self) -> &'static str {
        "secrets-synced"
    }

    fn stage(&self) -> Stage {
        Stage::Secrets
    }

    fn severity(&self) -> Severity {
        // Missing secrets degrade the report but never block scanning.
        Severity::Warning
    }

    fn description(&self) -> &'static str {
        "secret-like env keys exist in the configured secret store"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        let Some(store) = ctx.secrets else {
            return Ok(false);
        };

        let values = Self::secret_values(ctx)?;
        if values.is_empty() {
            return Ok(false);
        }

        let names: Vec<String> = values.into_iter().map(|(k, _)| k).collect();
        let check = store.check_secrets(&names)?;
        Ok(!check.missing.is_empty())
    }

    fn auto_fixable(&self) -> bool {
        true
    }

    fn apply(&self, ctx: &FixContext) -> Result<FixOutcome, FixError> {
        let Some(store) = ctx.secrets else {
            return Ok(FixOutcome::AlreadyResolved);
        };

        let values = Self::secret_values(ctx)?;
        if values.is_empty() {
            return Ok(FixOutcome::AlreadyResolved);
        }

        let names: Vec<String> = values.iter().map(|(k, _)| k.clone()).collect();
        let check = store.check_secrets(&names)?;
        if check.missing.is_empty() {
            return Ok(FixOutcome::AlreadyResolved);
        }

        for name in &check.missing {
            if let Some((_, value)) = values.iter().find(|(k, _)| k == name) {
                store.upload_secret(name, value)?;
            }
        }
        Ok(FixOutcome::Applied)
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("upload the missing secrets with your store's CLI; flotilla never reads values back")
    }
}

// ---------------------------------------------------------------------------
// staging / prod stages
// ---------------------------------------------------------------------------

/// A staging environment is declared but receives no routing.
struct StagingDomain;

impl Fix for StagingDomain {
    fn id(&self) -> &'static str {
        "staging-domain"
    }

    fn stage(&self) -> Stage {
        Stage::Staging
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &'static str {
        "the staging environment declares a domain"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        Ok(ctx
            .spec
            .environments
            .iter()
            .any(|(name, env)| name == "staging" && env.domain.is_none()))
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("add a domain to the staging environment in flotilla.yml")
    }
}

/// No production environment with a domain exists.
struct ProdDomain;

impl Fix for ProdDomain {
    fn id(&self) -> &'static str {
        "prod-domain"
    }

    fn stage(&self) -> Stage {
        Stage::Prod
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "a production environment with a domain exists"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        Ok(!ctx
            .spec
            .environments
            .iter()
            .any(|(name, env)| {
                (name == "production" || name == "prod") && env.domain.is_some()
            }))
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("declare a production environment with a domain in flotilla.yml")
    }
}

/// The production environment deploys to the local host.
struct ProdRemoteTarget;

impl Fix for ProdRemoteTarget {
    fn id(&self) -> &'static str {
        "prod-remote-target"
    }

    fn stage(&self) -> Stage {
        Stage::Prod
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &'static str {
        "the production environment deploys to a remote target"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        Ok(ctx.spec.environments.iter().any(|(name, env)| {
            (name == "production" || name == "prod")
                && env.domain.is_some()
                && env.server.is_local()
        }))
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("point the production server field at an SSH target (user@host)")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn env_parsing_skips_comments_and_blanks() {
        let lines = parse_env_lines("# comment\n\nFOO=bar\nAPI_KEY = abc\n");
        assert_eq!(
            lines,
            vec![
                ("FOO".to_string(), "bar".to_string()),
                ("API_KEY".to_string(), "abc".to_string()),
            ]
        );
    }

    #[test]
    fn secret_suffixes_match() {
        assert!(looks_secret("DATABASE_PASSWORD"));
        assert!(looks_secret("STRIPE_KEY"));
        assert!(!looks_secret("LOG_LEVEL"));
    }
}
