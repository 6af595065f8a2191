use clap::Parser;
use colored::*;
use phelix::cli::{Cli, Commands};
use std::process;
use tracing_subscriber::EnvFilter;

fn main() {
    let cli = Cli::parse();

    // Initialize logging with PHELIX_LOG environment variable support;
    // -v / -vv raise the default level when the variable is unset.
    let default_level = match cli.verbose {
        0 => "info",
        1 => "debug",
        _ => "trace",
    };
    let log_level = std::env::var("PHELIX_LOG").unwrap_or_else(|_| default_level.to_string());

    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&log_level)),
        )
        .init();

    if let Err(e) = run(cli) {
        eprintln!("{} {}", "Error:".red().bold(), e);

        // Use appropriate exit codes based on error type
        let exit_code = match e.downcast_ref::<phelix::PhelixError>() {
            Some(phelix::PhelixError::Config(_)) => 2,
            Some(phelix::PhelixError::Io(_)) => 3,
            Some(phelix::PhelixError::QueryInvalid(_))
            | Some(phelix::PhelixError::CursorInvalid(_)) => 4,
            Some(phelix::PhelixError::Parse(_)) => 5,
            _ => 1,
        };
        process::exit(exit_code);
    }
}

fn run(cli: Cli) -> anyhow::Result<()> {
    match cli.command {
        Commands::Build(args) => phelix::cli::commands::build::run(args),
        Commands::Query(args) => phelix::cli::commands::query::run(args),
        Commands::Info(args) => phelix::cli::commands::info::run(args),
    }
}
