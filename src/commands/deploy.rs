// ABOUTME: The deploy command: merge, fan out per service, report per-service results.
// ABOUTME: One failed service never aborts the others; failures aggregate at exit.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use tokio::sync::watch;

use crate::deploy::{DeployOptions, DeployOutcome, RolloutLocks, deploy_entry};
use crate::diagnostics::{Diagnostics, Warning, WarningKind};
use crate::error::{Error, Result};
use crate::exec::{ExecutionContext, Target};
use crate::hooks::{HookContext, HookPoint, HookRunner};
use crate::output::Output;
use crate::plugin::{FrameworkPlugin, Registry, ResolveContext, ServerPlugin};
use crate::spec::EnvironmentSpec;
use crate::topology::{MergeOptions, ServiceEntry, Topology, merge};

pub struct DeployArgs {
    pub strict_ports: bool,
    pub on_target: bool,
    pub health_timeout: Duration,
    pub workers: usize,
}

pub async fn deploy(paths: &[PathBuf], args: DeployArgs, output: &Output) -> Result<()> {
    let repos = super::load_specs(paths)?;
    let specs: Vec<EnvironmentSpec> = repos.iter().map(|(_, spec)| spec.clone()).collect();
    let merged = merge(
        &specs,
        MergeOptions {
            strict_ports: args.strict_ports,
        },
    )?;

    let diagnostics = Diagnostics::default();
    for warning in &merged.warnings {
        diagnostics.warn(Warning::merge(warning));
        output.warn(&warning.to_string());
    }

    let topology = merged.topology;
    if topology.is_empty() {
        return Err(Error::NothingToDeploy);
    }

    let by_repo: HashMap<_, _> = repos
        .iter()
        .map(|(root, spec)| (spec.name.clone(), (root, spec)))
        .collect();

    let registry = Registry::with_builtins();
    let locks = RolloutLocks::new();
    let options = DeployOptions {
        health_timeout: args.health_timeout,
        worker_limit: args.workers,
        ..Default::default()
    };
    let exec_ctx = if args.on_target {
        ExecutionContext::on_target()
    } else {
        ExecutionContext::remote()
    };

    let (cancel_tx, cancel_rx) = watch::channel(false);
    tokio::spawn(async move {
        if tokio::signal::ctrl_c().await.is_ok() {
            tracing::warn!("interrupt received, cancelling in-flight deploys");
            let _ = cancel_tx.send(true);
        }
    });

    // Resolve plugins for every entry up front so a bad pin fails the run
    // before anything touches a target.
    let mut jobs = Vec::new();
    for entry in topology.entries() {
        let (root, spec) = by_repo[entry.key.repo()];
        let env = spec
            .environment(entry.key.environment())
            .expect("topology entry comes from a loaded spec");
        let resolve_ctx = ResolveContext {
            root: root.as_path(),
            spec,
            env,
        };

        let server = registry.resolve_server(&resolve_ctx)?;
        let framework = registry.resolve_framework(&resolve_ctx)?;
        let context_dir = build_context_dir(root, entry);

        jobs.push(run_one(
            root.clone(),
            entry.clone(),
            env.env_file.clone(),
            context_dir,
            server,
            framework,
            &topology,
            exec_ctx,
            &locks,
            &options,
            &diagnostics,
            cancel_rx.clone(),
        ));
    }

    output.progress(&format!("deploying {} service(s)", jobs.len()));
    let results = futures::stream::iter(jobs)
        .buffer_unordered(options.worker_limit)
        .collect::<Vec<_>>()
        .await;

    let total = results.len();
    let mut failed = 0;
    for result in results {
        match result {
            Ok(outcome) => {
                output.progress(&format!("  deployed {} ({})", outcome.key, outcome.image));
            }
            Err(message) => {
                failed += 1;
                output.error(&message);
            }
        }
    }

    // Merge warnings were already printed before the fan-out.
    for warning in diagnostics.warnings() {
        if warning.kind != WarningKind::PortReassigned {
            output.warn(&warning.message);
        }
    }

    if failed > 0 {
        return Err(Error::DeploysFailed { failed, total });
    }
    output.success(&format!("deployed {total} service(s)"));
    Ok(())
}

/// One service's full lifecycle: pre-deploy hook, the state machine, then the
/// post-deploy or on-error hook. Only the pre-deploy hook is fatal; the rest
/// degrade into diagnostics warnings.
#[allow(clippy::too_many_arguments)]
async fn run_one(
    root: PathBuf,
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
) -> std::result::Result<DeployOutcome, String> {
    let hooks = HookRunner::new(&root);
    let mut hook_ctx = HookContext {
        service: entry.key.clone(),
        target: entry.target.to_string(),
        image: None,
    };

    if let Some(result) = hooks.run(HookPoint::PreDeploy, &hook_ctx).await
        && !result.success
    {
        return Err(format!(
            "{}: pre-deploy hook failed: {}",
            entry.key,
            result.stderr.trim()
        ));
    }

    match deploy_entry(
        entry, env_file, context_dir, server, framework, topology, exec_ctx, locks, options,
        diagnostics, cancel,
    )
    .await
    {
        Ok(outcome) => {
            hook_ctx.image = Some(outcome.image.clone());
            if let Some(result) = hooks.run(HookPoint::PostDeploy, &hook_ctx).await
                && !result.success
            {
                diagnostics.warn(Warning::hook_failure(format!(
                    "{}: post-deploy hook failed: {}",
                    outcome.key,
                    result.stderr.trim()
                )));
            }
            Ok(outcome)
        }
        Err(failure) => {
            if let Some(result) = hooks.run(HookPoint::OnError, &hook_ctx).await
                && !result.success
            {
                diagnostics.warn(Warning::hook_failure(format!(
                    "{}: on-error hook failed: {}",
                    hook_ctx.service,
                    result.stderr.trim()
                )));
            }
            Err(failure.to_string())
        }
    }
}

/// Where the image build runs. Local targets build from the local checkout;
/// remote targets build from the conventional checkout location on the host.
fn build_context_dir(root: &Path, entry: &ServiceEntry) -> String {
    match &entry.target {
        Target::Local => root.to_string_lossy().into_owned(),
        Target::Ssh { .. } => format!("$HOME/flotilla/src/{}", entry.key.repo()),
    }
}
