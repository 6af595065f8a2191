pub mod commands;

use clap::{Parser, Subcommand};

#[derive(Parser)]
#[command(
    name = "phelix",
    version,
    about = "Block-compressed PheWAS association storage and region queries"
)]
pub struct Cli {
    /// Increase output verbosity
    #[arg(short, long, global = true, action = clap::ArgAction::Count)]
    pub verbose: u8,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Build a container and sidecar index from sorted association TSV
    Build(commands::build::BuildArgs),
    /// Run a region, variant, or gene query against a dataset
    Query(commands::query::QueryArgs),
    /// Show container and index details
    Info(commands::info::InfoArgs),
}
