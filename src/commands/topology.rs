// ABOUTME: The topology command: merge every spec and show the result.
// ABOUTME: Optionally renders the routing definition for one target.

use std::path::PathBuf;

use serde::Serialize;

use crate::error::Result;
use crate::exec::Target;
use crate::output::Output;
use crate::topology::{MergeOptions, merge, render_routing};

#[derive(Serialize)]
struct TopologyLine {
    service: String,
    domain: String,
    port: u16,
    target: String,
}

pub fn topology(
    paths: &[PathBuf],
    strict_ports: bool,
    routing: Option<&str>,
    output: &Output,
) -> Result<()> {
    let specs: Vec<_> = super::load_specs(paths)?
        .into_iter()
        .map(|(_, spec)| spec)
        .collect();

    let merged = merge(&specs, MergeOptions { strict_ports })?;
    for warning in &merged.warnings {
        output.warn(&warning.to_string());
    }

    if let Some(target) = routing {
        let target = Target::parse(target)?;
        print!("{}", render_routing(&merged.topology, &target));
        return Ok(());
    }

    for entry in merged.topology.entries() {
        if output.is_json() {
            output.emit_json(&TopologyLine {
                service: entry.key.to_string(),
                domain: entry.domain.to_string(),
                port: entry.port,
                target: entry.target.to_string(),
            });
        } else {
            println!(
                "{}  {} -> 127.0.0.1:{} on {}",
                entry.key, entry.domain, entry.port, entry.target
            );
        }
    }

    Ok(())
}
