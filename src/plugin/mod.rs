// ABOUTME: Plugin capability model: four categories resolved per repository.
// ABOUTME: Resolution walks registration order; the first matching plugin wins.

mod addon;
mod framework;
mod pipeline;
mod server;

pub use addon::{AddonPlugin, QueueWorkerAddon};
pub use framework::{FrameworkPlugin, LaravelFramework, NodeFramework};
pub use pipeline::{GithubActionsPipeline, LocalPipeline, PipelinePlugin, Reachability, Via};
pub use server::{AlpineServer, Os, ServerPlugin, UbuntuServer};

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use thiserror::Error;

use crate::fix::Fix;
use crate::spec::{EnvironmentConfig, EnvironmentSpec};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Category {
    Server,
    Pipeline,
    Framework,
    Addon,
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Category::Server => "server",
            Category::Pipeline => "pipeline",
            Category::Framework => "framework",
            Category::Addon => "addon",
        };
        write!(f, "{s}")
    }
}

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("no {category} plugin matched this project")]
    NoMatch { category: Category },

    #[error("unknown {category} plugin '{id}'")]
    Unknown { category: Category, id: String },
}

/// What a plugin may inspect when deciding whether it applies.
pub struct ResolveContext<'a> {
    pub root: &'a Path,
    pub spec: &'a EnvironmentSpec,
    pub env: &'a EnvironmentConfig,
}

/// Behavior shared by every plugin category.
pub trait Plugin: Send + Sync {
    fn id(&self) -> &'static str;

    /// Whether this plugin applies to the project under `ctx.root`. Called in
    /// registration order; must be cheap and side-effect free.
    fn should_load(&self, ctx: &ResolveContext) -> bool;

    /// Readiness fixes this plugin contributes to the scan engine.
    fn fixes(&self) -> Vec<Arc<dyn Fix>> {
        Vec::new()
    }
}

/// Shared resolution: an explicit pin wins, otherwise the first plugin whose
/// `should_load` matches. A macro rather than a generic because the category
/// trait objects share `Plugin` only as a supertrait.
macro_rules! resolve_one {
    ($category:expr, $plugins:expr, $pin:expr, $ctx:expr) => {
        if let Some(id) = $pin {
            $plugins
                .iter()
                .find(|p| p.id() == id)
                .cloned()
                .ok_or_else(|| PluginError::Unknown {
                    category: $category,
                    id: id.to_string(),
                })
        } else {
            $plugins
                .iter()
                .find(|p| p.should_load($ctx))
                .cloned()
                .ok_or(PluginError::NoMatch {
                    category: $category,
                })
        }
    };
}

/// All known plugins, in registration order. Resolution per category: an
/// explicit pin in the spec wins, otherwise the first plugin whose
/// `should_load` returns true.
pub struct Registry {
    servers: Vec<Arc<dyn ServerPlugin>>,
    pipelines: Vec<Arc<dyn PipelinePlugin>>,
    frameworks: Vec<Arc<dyn FrameworkPlugin>>,
    addons: Vec<Arc<dyn AddonPlugin>>,
}

impl Registry {
    pub fn empty() -> Self {
        Self {
            servers: Vec::new(),
            pipelines: Vec::new(),
            frameworks: Vec::new(),
            addons: Vec::new(),
        }
    }

    /// The built-in plugin set. Order matters: within a category, earlier
    /// registrations are preferred, so specific plugins precede catch-alls.
    pub fn with_builtins() -> Self {
        let mut registry = Self::empty();
        registry.register_server(Arc::new(AlpineServer));
        registry.register_server(Arc::new(UbuntuServer));
        registry.register_pipeline(Arc::new(GithubActionsPipeline));
        registry.register_pipeline(Arc::new(LocalPipeline));
        registry.register_framework(Arc::new(NodeFramework));
        registry.register_framework(Arc::new(LaravelFramework));
        registry.register_addon(Arc::new(QueueWorkerAddon));
        registry
    }

    pub fn register_server(&mut self, plugin: Arc<dyn ServerPlugin>) {
        self.servers.push(plugin);
    }

    pub fn register_pipeline(&mut self, plugin: Arc<dyn PipelinePlugin>) {
        self.pipelines.push(plugin);
    }

    pub fn register_framework(&mut self, plugin: Arc<dyn FrameworkPlugin>) {
        self.frameworks.push(plugin);
    }

    pub fn register_addon(&mut self, plugin: Arc<dyn AddonPlugin>) {
        self.addons.push(plugin);
    }

    pub fn resolve_server(
        &self,
        ctx: &ResolveContext,
    ) -> Result<Arc<dyn ServerPlugin>, PluginError> {
        resolve_one!(
            Category::Server,
            self.servers,
            ctx.env.server_plugin.as_deref(),
            ctx
        )
    }

    pub fn resolve_pipeline(
        &self,
        ctx: &ResolveContext,
    ) -> Result<Arc<dyn PipelinePlugin>, PluginError> {
        resolve_one!(
            Category::Pipeline,
            self.pipelines,
            ctx.env.pipeline_plugin.as_deref(),
            ctx
        )
    }

    pub fn resolve_framework(
        &self,
        ctx: &ResolveContext,
    ) -> Result<Arc<dyn FrameworkPlugin>, PluginError> {
        resolve_one!(
            Category::Framework,
            self.frameworks,
            ctx.env.framework_plugin.as_deref(),
            ctx
        )
    }

    /// Addons are additive: every matching addon loads, in registration order.
    pub fn resolve_addons(&self, ctx: &ResolveContext) -> Vec<Arc<dyn AddonPlugin>> {
        self.addons
            .iter()
            .filter(|a| a.should_load(ctx))
            .cloned()
            .collect()
    }
}
