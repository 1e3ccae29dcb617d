// ABOUTME: Command-line interface definition using clap derive macros.
// ABOUTME: Defines all subcommands and their arguments.

use std::path::PathBuf;

use clap::{Parser, Subcommand};

use crate::fix::Stage;

#[derive(Parser)]
#[command(name = "flotilla")]
#[command(about = "Deployment orchestrator for fleets of single-service repositories")]
#[command(version)]
pub struct Cli {
    /// Enable debug logging
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Minimal output for CI
    #[arg(short, long, global = true, conflicts_with = "json")]
    pub quiet: bool,

    /// Emit JSON lines instead of human-readable output
    #[arg(long, global = true)]
    pub json: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Write a starter flotilla.yml in the current directory
    Init {
        /// Repository name to seed the spec with
        #[arg(long)]
        name: Option<String>,

        /// Overwrite an existing spec
        #[arg(long)]
        force: bool,
    },

    /// Scan repositories for deployment readiness problems
    Scan {
        /// Readiness stage to scan
        #[arg(value_enum)]
        stage: Stage,

        /// Repository checkouts (default: current directory)
        paths: Vec<PathBuf>,

        /// The process is already running on the deploy target
        #[arg(long)]
        on_target: bool,
    },

    /// Scan repositories and apply automatic fixes
    Fix {
        /// Readiness stage to fix
        #[arg(value_enum)]
        stage: Stage,

        /// Repository checkouts (default: current directory)
        paths: Vec<PathBuf>,

        /// The process is already running on the deploy target
        #[arg(long)]
        on_target: bool,
    },

    /// Show the merged service topology across repositories
    Topology {
        /// Repository checkouts (default: current directory)
        paths: Vec<PathBuf>,

        /// Fail on explicit port collisions instead of reassigning
        #[arg(long)]
        strict_ports: bool,

        /// Render the routing definition for one target instead
        #[arg(long, value_name = "TARGET")]
        routing: Option<String>,
    },

    /// Deploy every routed environment in the merged topology
    Deploy {
        /// Repository checkouts (default: current directory)
        paths: Vec<PathBuf>,

        /// Fail on explicit port collisions instead of reassigning
        #[arg(long)]
        strict_ports: bool,

        /// The process is already running on the target host; skip SSH
        #[arg(long)]
        on_target: bool,

        /// Health gate deadline in seconds
        #[arg(long, default_value_t = 120)]
        health_timeout: u64,

        /// Concurrent deploys across distinct targets
        #[arg(long, default_value_t = 4)]
        workers: usize,
    },
}
