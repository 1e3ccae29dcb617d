// ABOUTME: Addon plugins layer optional capabilities onto a service.
// ABOUTME: Unlike the other categories, every matching addon loads.

use std::sync::Arc;

use crate::fix::{Fix, FixContext, FixError, Severity, Stage};

use super::{Plugin, ResolveContext};

pub trait AddonPlugin: Plugin {}

const QUEUE_MARKER: &str = ".flotilla/queue.yml";

/// Background queue worker, opted into with a committed marker file.
pub struct QueueWorkerAddon;

impl Plugin for QueueWorkerAddon {
    fn id(&self) -> &'static str {
        "queue-worker"
    }

    fn should_load(&self, ctx: &ResolveContext) -> bool {
        ctx.root.join(QUEUE_MARKER).exists()
    }

    fn fixes(&self) -> Vec<Arc<dyn Fix>> {
        vec![Arc::new(QueueConnectionSet)]
    }
}

impl AddonPlugin for QueueWorkerAddon {}

/// The repo opted into a queue worker but no env file names a queue backend.
struct QueueConnectionSet;

impl Fix for QueueConnectionSet {
    fn id(&self) -> &'static str {
        "queue-connection-set"
    }

    fn stage(&self) -> Stage {
        Stage::Dev
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &'static str {
        "an env file names the queue backend the worker will drain"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        if !ctx.root.join(QUEUE_MARKER).exists() {
            return Ok(false);
        }

        for (_, env) in ctx.spec.environments.iter() {
            let Some(file) = &env.env_file else { continue };
            let path = ctx.root.join(file);
            if !path.exists() {
                continue;
            }
            if std::fs::read_to_string(&path)?.contains("QUEUE_CONNECTION=") {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("set QUEUE_CONNECTION in the env file referenced by the spec")
    }
}
