// ABOUTME: Command module aggregator for the flotilla CLI.
// ABOUTME: Re-exports init, scan, topology, and deploy command handlers.

mod deploy;
mod init;
mod scan;
mod topology;

pub use deploy::{DeployArgs, deploy};
pub use init::init;
pub use scan::scan;
pub use topology::topology;

use std::path::PathBuf;

use crate::error::Result;
use crate::spec::EnvironmentSpec;

/// Resolve the repository roots a command operates on. No explicit paths
/// means the current directory.
fn resolve_roots(paths: &[PathBuf]) -> Result<Vec<PathBuf>> {
    if paths.is_empty() {
        Ok(vec![std::env::current_dir()?])
    } else {
        Ok(paths.to_vec())
    }
}

/// Load every repository's spec, keeping the root alongside it.
fn load_specs(paths: &[PathBuf]) -> Result<Vec<(PathBuf, EnvironmentSpec)>> {
    resolve_roots(paths)?
        .into_iter()
        .map(|root| {
            let spec = EnvironmentSpec::discover(&root)?;
            Ok((root, spec))
        })
        .collect()
}
