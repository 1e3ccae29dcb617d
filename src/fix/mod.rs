// ABOUTME: Staged scan/fix engine for deployment readiness.
// ABOUTME: Runs every applicable Fix's detector and optionally its remediation.

mod catalog;

pub use catalog::core_fixes;

use std::path::Path;
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::exec::ExecutionContext;
use crate::plugin::{PluginError, Reachability, Registry, ResolveContext};
use crate::secrets::SecretStore;
use crate::spec::{EnvironmentConfig, EnvironmentSpec};

/// Readiness phase used to scope which fixes apply.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, clap::ValueEnum)]
#[serde(rename_all = "lowercase")]
pub enum Stage {
    Dev,
    Secrets,
    Staging,
    Prod,
}

impl std::fmt::Display for Stage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Stage::Dev => "dev",
            Stage::Secrets => "secrets",
            Stage::Staging => "staging",
            Stage::Prod => "prod",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    Info,
    Warning,
    Critical,
}

impl std::fmt::Display for Severity {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            Severity::Info => "info",
            Severity::Warning => "warning",
            Severity::Critical => "critical",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum FixError {
    #[error("{0}")]
    Failed(String),

    #[error("secret store error: {0}")]
    Secrets(#[from] crate::secrets::SecretError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Everything a fix may inspect. Fixes never reach outside this context.
pub struct FixContext<'a> {
    pub spec: &'a EnvironmentSpec,
    pub root: &'a Path,
    /// Present only when a secret backend is configured; fixes that need one
    /// self-guard and report "no problem" when it is absent.
    pub secrets: Option<&'a dyn SecretStore>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FixOutcome {
    Applied,
    /// The problem no longer exists; applying was a safe no-op.
    AlreadyResolved,
}

/// One checkable, fixable deployment-readiness issue.
///
/// `scan` must be safe to call repeatedly with no side effects. `apply` must
/// be idempotent: applying an already-resolved issue succeeds trivially.
/// Fixes are independent and never assume another fix ran first; a fix whose
/// precondition is unmet reports "no problem" so chains degrade gracefully.
pub trait Fix: Send + Sync {
    fn id(&self) -> &'static str;

    fn stage(&self) -> Stage;

    fn severity(&self) -> Severity;

    fn description(&self) -> &'static str;

    /// OS scope; fixes with a tag only run when the resolved server plugin's
    /// OS matches.
    fn os(&self) -> Option<crate::plugin::Os> {
        None
    }

    /// Whether the problem currently exists.
    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError>;

    fn auto_fixable(&self) -> bool {
        false
    }

    fn apply(&self, ctx: &FixContext) -> Result<FixOutcome, FixError> {
        let _ = ctx;
        Ok(FixOutcome::AlreadyResolved)
    }

    /// Human-readable fallback instructions when no automatic fix exists.
    fn manual_fix(&self) -> Option<&'static str> {
        None
    }
}

#[derive(Debug, Clone, Serialize)]
pub struct ReportEntry {
    pub fix_id: String,
    pub severity: Severity,
    pub problem_found: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fix_applied: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub manual_fix: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReportEntry {
    /// A problem that was neither fixed nor merely informational.
    pub fn unresolved(&self) -> bool {
        self.problem_found && self.fix_applied != Some(true)
    }
}

/// Ordered readiness report for one stage.
#[derive(Debug, Default, Serialize)]
pub struct Report {
    pub stage_entries: Vec<ReportEntry>,
}

impl Report {
    pub fn entries(&self) -> &[ReportEntry] {
        &self.stage_entries
    }

    pub fn has_unresolved_critical(&self) -> bool {
        self.stage_entries
            .iter()
            .any(|e| e.unresolved() && e.severity == Severity::Critical)
    }

    pub fn problems_found(&self) -> usize {
        self.stage_entries.iter().filter(|e| e.problem_found).count()
    }

    pub fn fixes_applied(&self) -> usize {
        self.stage_entries
            .iter()
            .filter(|e| e.fix_applied == Some(true))
            .count()
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct ScanOptions {
    pub apply_fixes: bool,
}

/// Run one readiness stage: collect the core catalog plus every fix
/// contributed by the resolved plugins, filter by stage and OS, scan each in
/// registration order, and optionally remediate. A pipeline that cannot act
/// for this stage from the current execution context leads the report as a
/// warning entry carrying its reason.
///
/// A failure inside a single fix is contained: the entry records "problem
/// exists, fix not applied" with the error, and the rest of the stage runs.
pub fn run_stage(
    registry: &Registry,
    stage: Stage,
    spec: &EnvironmentSpec,
    root: &Path,
    secrets: Option<&dyn SecretStore>,
    exec_ctx: ExecutionContext,
    options: ScanOptions,
) -> Result<Report, PluginError> {
    let (env_name, env) = environment_for_stage(spec, stage);
    let resolve_ctx = ResolveContext {
        root,
        spec,
        env,
    };
    tracing::debug!("scanning stage {} against environment {}", stage, env_name);

    // The server category always resolves (the registry carries a default);
    // its OS tag scopes OS-specific fixes.
    let server = registry.resolve_server(&resolve_ctx)?;
    let os = server.os();

    let mut fixes: Vec<Arc<dyn Fix>> = core_fixes();
    fixes.extend(server.fixes());
    // Pipeline and framework are required for deploys but tolerated here so
    // that a repo without a detectable stack can still be scanned.
    let mut pipeline_unreachable = None;
    if let Ok(pipeline) = registry.resolve_pipeline(&resolve_ctx) {
        if let Reachability::Unreachable { reason } = pipeline.reachability(stage, exec_ctx) {
            pipeline_unreachable = Some(reason);
        }
        fixes.extend(pipeline.fixes());
    }
    if let Ok(framework) = registry.resolve_framework(&resolve_ctx) {
        fixes.extend(framework.fixes());
    }
    for addon in registry.resolve_addons(&resolve_ctx) {
        fixes.extend(addon.fixes());
    }

    let ctx = FixContext {
        spec,
        root,
        secrets,
    };

    let mut report = Report::default();
    if let Some(reason) = pipeline_unreachable {
        report.stage_entries.push(ReportEntry {
            fix_id: "pipeline-reachable".to_string(),
            severity: Severity::Warning,
            problem_found: true,
            fix_applied: None,
            manual_fix: Some(reason),
            error: None,
        });
    }
    for fix in fixes {
        if fix.stage() != stage {
            continue;
        }
        if let Some(required_os) = fix.os()
            && os != required_os
        {
            continue;
        }

        report.stage_entries.push(run_fix(fix.as_ref(), &ctx, options));
    }

    Ok(report)
}

fn run_fix(fix: &dyn Fix, ctx: &FixContext, options: ScanOptions) -> ReportEntry {
    let mut entry = ReportEntry {
        fix_id: fix.id().to_string(),
        severity: fix.severity(),
        problem_found: false,
        fix_applied: None,
        manual_fix: None,
        error: None,
    };

    match fix.scan(ctx) {
        Ok(false) => return entry,
        Ok(true) => {
            entry.problem_found = true;
        }
        Err(e) => {
            // A broken detector is downgraded, never aborts the stage.
            tracing::warn!("fix {} scan failed: {}", fix.id(), e);
            entry.problem_found = true;
            entry.error = Some(e.to_string());
            return entry;
        }
    }

    if options.apply_fixes && fix.auto_fixable() {
        match fix.apply(ctx) {
            Ok(_) => entry.fix_applied = Some(true),
            Err(e) => {
                tracing::warn!("fix {} failed to apply: {}", fix.id(), e);
                entry.fix_applied = Some(false);
                entry.error = Some(e.to_string());
            }
        }
    } else {
        entry.manual_fix = fix.manual_fix().map(|s| s.to_string());
    }

    entry
}

/// Pick the environment a stage scans against: an environment whose name
/// matches the stage when one exists, otherwise the first declared.
fn environment_for_stage<'a>(
    spec: &'a EnvironmentSpec,
    stage: Stage,
) -> (&'a str, &'a EnvironmentConfig) {
    let preferred: &[&str] = match stage {
        Stage::Dev => &["dev", "development"],
        Stage::Secrets => &[],
        Stage::Staging => &["staging"],
        Stage::Prod => &["production", "prod"],
    };

    for name in preferred {
        if let Some(found) = spec
            .environments
            .iter()
            .find(|(env_name, _)| env_name == name)
        {
            return (&found.0, &found.1);
        }
    }

    let first = spec.environments.first();
    (&first.0, &first.1)
}
