// ABOUTME: Entry point for the flotilla CLI application.
// ABOUTME: Parses arguments and dispatches to appropriate command handlers.

use std::time::Duration;

use clap::Parser;
use flotilla::cli::{Cli, Commands};
use flotilla::commands::{self, DeployArgs};
use flotilla::error::Result;
use flotilla::output::{Output, OutputMode};
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    // Initialize tracing subscriber based on verbose flag
    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .init();

    let mode = if cli.json {
        OutputMode::Json
    } else if cli.quiet {
        OutputMode::Quiet
    } else {
        OutputMode::Normal
    };
    let mut output = Output::new(mode);
    output.start_timer();

    if let Err(e) = run(cli, &output).await {
        output.error(&e.to_string());
        std::process::exit(1);
    }
}

async fn run(cli: Cli, output: &Output) -> Result<()> {
    match cli.command {
        Commands::Init { name, force } => commands::init(name.as_deref(), force, output),
        Commands::Scan {
            stage,
            paths,
            on_target,
        } => commands::scan(&paths, stage, false, on_target, output),
        Commands::Fix {
            stage,
            paths,
            on_target,
        } => commands::scan(&paths, stage, true, on_target, output),
        Commands::Topology {
            paths,
            strict_ports,
            routing,
        } => commands::topology(&paths, strict_ports, routing.as_deref(), output),
        Commands::Deploy {
            paths,
            strict_ports,
            on_target,
            health_timeout,
            workers,
        } => {
            let args = DeployArgs {
                strict_ports,
                on_target,
                health_timeout: Duration::from_secs(health_timeout),
                workers,
            };
            commands::deploy(&paths, args, output).await
        }
    }
}
