// ABOUTME: Framework plugins own the app-level commands a deploy runs.
// ABOUTME: Backup, restore, and migrate shapes differ per framework stack.

use std::sync::Arc;

use crate::fix::{Fix, FixContext, FixError, Severity, Stage};

use super::{Plugin, ResolveContext};

pub trait FrameworkPlugin: Plugin {
    /// Shell command dumping the datastore to `path` on the target, or None
    /// when the framework manages no datastore.
    fn backup_cmd(&self, path: &str) -> Option<String>;

    /// Shell command restoring the datastore from `path` on the target.
    fn restore_cmd(&self, path: &str) -> Option<String>;

    /// Shell command running schema migrations inside the service container.
    fn migrate_cmd(&self) -> Option<String>;

    /// Shell command exiting zero when schema migrations are pending. Runs in
    /// a one-off container from the new image.
    fn pending_migrations_cmd(&self) -> Option<String>;
}

impl std::fmt::Debug for dyn FrameworkPlugin {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameworkPlugin")
            .field("id", &self.id())
            .finish()
    }
}

/// Node services, detected from a package.json at the repo root.
pub struct NodeFramework;

impl Plugin for NodeFramework {
    fn id(&self) -> &'static str {
        "node"
    }

    fn should_load(&self, ctx: &ResolveContext) -> bool {
        ctx.root.join("package.json").exists()
    }

    fn fixes(&self) -> Vec<Arc<dyn Fix>> {
        vec![Arc::new(NodeEnginePinned)]
    }
}

impl FrameworkPlugin for NodeFramework {
    fn backup_cmd(&self, path: &str) -> Option<String> {
        Some(format!("pg_dump \"$DATABASE_URL\" > {path}"))
    }

    fn restore_cmd(&self, path: &str) -> Option<String> {
        Some(format!("psql \"$DATABASE_URL\" < {path}"))
    }

    fn migrate_cmd(&self) -> Option<String> {
        Some("npm run migrate --if-present".to_string())
    }

    fn pending_migrations_cmd(&self) -> Option<String> {
        Some("npm run -s migrate:status --if-present | grep -qi pending".to_string())
    }
}

/// Laravel services, detected from the artisan entry point.
pub struct LaravelFramework;

impl Plugin for LaravelFramework {
    fn id(&self) -> &'static str {
        "laravel"
    }

    fn should_load(&self, ctx: &ResolveContext) -> bool {
        ctx.root.join("artisan").exists()
    }

    fn fixes(&self) -> Vec<Arc<dyn Fix>> {
        vec![Arc::new(LaravelAppKey)]
    }
}

impl FrameworkPlugin for LaravelFramework {
    fn backup_cmd(&self, path: &str) -> Option<String> {
        Some(format!(
            "mysqldump --single-transaction \"$DB_DATABASE\" > {path}"
        ))
    }

    fn restore_cmd(&self, path: &str) -> Option<String> {
        Some(format!("mysql \"$DB_DATABASE\" < {path}"))
    }

    fn migrate_cmd(&self) -> Option<String> {
        Some("php artisan migrate --force".to_string())
    }

    fn pending_migrations_cmd(&self) -> Option<String> {
        Some("php artisan migrate:status --pending | grep -q .".to_string())
    }
}

/// package.json pins no Node version, so images drift between builds.
struct NodeEnginePinned;

impl Fix for NodeEnginePinned {
    fn id(&self) -> &'static str {
        "node-engine-pinned"
    }

    fn stage(&self) -> Stage {
        Stage::Dev
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &'static str {
        "package.json pins a Node engine version"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        let path = ctx.root.join("package.json");
        if !path.exists() {
            return Ok(false);
        }
        let content = std::fs::read_to_string(&path)?;
        let parsed: serde_json::Value = serde_json::from_str(&content)
            .map_err(|e| FixError::Failed(format!("package.json is not valid JSON: {e}")))?;
        Ok(parsed.get("engines").and_then(|e| e.get("node")).is_none())
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("add an engines.node field to package.json")
    }
}

/// The Laravel app key is unset, which breaks session and cookie encryption
/// the moment the container starts.
struct LaravelAppKey;

impl Fix for LaravelAppKey {
    fn id(&self) -> &'static str {
        "laravel-app-key"
    }

    fn stage(&self) -> Stage {
        Stage::Secrets
    }

    fn severity(&self) -> Severity {
        Severity::Critical
    }

    fn description(&self) -> &'static str {
        "APP_KEY is set in the env file"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        for candidate in [".env", ".env.production"] {
            let path = ctx.root.join(candidate);
            if !path.exists() {
                continue;
            }
            let content = std::fs::read_to_string(&path)?;
            let unset = content.lines().map(str::trim).any(|l| {
                l.strip_prefix("APP_KEY=")
                    .is_some_and(|v| v.trim().is_empty())
            });
            if unset {
                return Ok(true);
            }
        }
        Ok(false)
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("run 'php artisan key:generate' and commit the key to your secret store")
    }
}
