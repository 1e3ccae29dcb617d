// ABOUTME: Application-wide error types for flotilla.
// ABOUTME: Uses thiserror for ergonomic error handling.

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error(transparent)]
    Spec(#[from] crate::spec::SpecError),

    #[error(transparent)]
    Merge(#[from] crate::topology::MergeError),

    #[error(transparent)]
    Plugin(#[from] crate::plugin::PluginError),

    #[error("{count} critical problem(s) remain unresolved")]
    UnresolvedCritical { count: usize },

    #[error("no environment in the merged topology declares a domain; nothing to deploy")]
    NothingToDeploy,

    #[error("{failed} of {total} deploy(s) failed")]
    DeploysFailed { failed: usize, total: usize },

    #[error("invalid target address: {0}")]
    Target(#[from] crate::exec::TargetParseError),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type Result<T> = std::result::Result<T, Error>;
