// ABOUTME: Pipeline plugins model the CI/CD provider a repo deploys through.
// ABOUTME: Reachability says what the pipeline can do at each readiness stage.

use std::sync::Arc;

use crate::exec::ExecutionContext;
use crate::fix::{Fix, FixContext, FixError, Severity, Stage};

use super::{Plugin, ResolveContext};

/// The channel a reachable pipeline acts through.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Via {
    /// Commands run on the operator's machine, no provider involved.
    Local,
    /// The provider's API is usable (secret upload, status queries).
    Api,
    /// A committed workflow can run end to end.
    Workflow,
}

/// Whether the pipeline can act for a stage from where we are running.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Reachability {
    Reachable { via: Via },
    Unreachable { reason: String },
}

impl Reachability {
    pub fn is_reachable(&self) -> bool {
        matches!(self, Reachability::Reachable { .. })
    }
}

pub trait PipelinePlugin: Plugin {
    fn reachability(&self, stage: Stage, ctx: ExecutionContext) -> Reachability;
}

/// GitHub Actions, detected from a committed workflows directory.
pub struct GithubActionsPipeline;

const WORKFLOWS_DIR: &str = ".github/workflows";

impl Plugin for GithubActionsPipeline {
    fn id(&self) -> &'static str {
        "github-actions"
    }

    fn should_load(&self, ctx: &ResolveContext) -> bool {
        ctx.root.join(WORKFLOWS_DIR).is_dir()
    }

    fn fixes(&self) -> Vec<Arc<dyn Fix>> {
        vec![Arc::new(WorkflowDeployJob)]
    }
}

impl PipelinePlugin for GithubActionsPipeline {
    fn reachability(&self, stage: Stage, ctx: ExecutionContext) -> Reachability {
        match stage {
            // Dev checks run against the checkout, no provider involved.
            Stage::Dev => Reachability::Reachable { via: Via::Local },
            Stage::Secrets if ctx.on_target => Reachability::Unreachable {
                reason: "provider API credentials are not available on the deploy target"
                    .to_string(),
            },
            Stage::Secrets => Reachability::Reachable { via: Via::Api },
            Stage::Staging | Stage::Prod if ctx.on_target => Reachability::Unreachable {
                reason: "workflows cannot be triggered from the deploy target".to_string(),
            },
            Stage::Staging | Stage::Prod => Reachability::Reachable { via: Via::Workflow },
        }
    }
}

/// Catch-all: deploys run from the operator's machine with no provider.
pub struct LocalPipeline;

impl Plugin for LocalPipeline {
    fn id(&self) -> &'static str {
        "local"
    }

    fn should_load(&self, _ctx: &ResolveContext) -> bool {
        true
    }
}

impl PipelinePlugin for LocalPipeline {
    fn reachability(&self, _stage: Stage, _ctx: ExecutionContext) -> Reachability {
        Reachability::Reachable { via: Via::Local }
    }
}

/// No committed workflow mentions a deploy job, so staging and prod rollouts
/// would have nothing to run.
struct WorkflowDeployJob;

impl Fix for WorkflowDeployJob {
    fn id(&self) -> &'static str {
        "workflow-deploy-job"
    }

    fn stage(&self) -> Stage {
        Stage::Prod
    }

    fn severity(&self) -> Severity {
        Severity::Warning
    }

    fn description(&self) -> &'static str {
        "a committed workflow contains a deploy job"
    }

    fn scan(&self, ctx: &FixContext) -> Result<bool, FixError> {
        let dir = ctx.root.join(WORKFLOWS_DIR);
        if !dir.is_dir() {
            return Ok(false);
        }

        for entry in std::fs::read_dir(&dir)? {
            let path = entry?.path();
            let is_yaml = path
                .extension()
                .is_some_and(|e| e == "yml" || e == "yaml");
            if is_yaml && std::fs::read_to_string(&path)?.contains("deploy") {
                return Ok(false);
            }
        }
        Ok(true)
    }

    fn manual_fix(&self) -> Option<&'static str> {
        Some("add a deploy job to a workflow under .github/workflows")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn github_actions_loses_the_provider_on_the_target() {
        let pipeline = GithubActionsPipeline;
        assert_eq!(
            pipeline.reachability(Stage::Secrets, ExecutionContext::remote()),
            Reachability::Reachable { via: Via::Api },
        );
        assert_eq!(
            pipeline.reachability(Stage::Prod, ExecutionContext::remote()),
            Reachability::Reachable { via: Via::Workflow },
        );

        match pipeline.reachability(Stage::Prod, ExecutionContext::on_target()) {
            Reachability::Unreachable { reason } => assert!(reason.contains("workflow")),
            other => panic!("expected Unreachable, got {other:?}"),
        }
        assert!(
            !pipeline
                .reachability(Stage::Secrets, ExecutionContext::on_target())
                .is_reachable()
        );
    }

    #[test]
    fn local_pipeline_is_always_reachable() {
        for stage in [Stage::Dev, Stage::Secrets, Stage::Staging, Stage::Prod] {
            assert!(
                LocalPipeline
                    .reachability(stage, ExecutionContext::on_target())
                    .is_reachable()
            );
        }
    }
}
