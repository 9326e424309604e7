//! LexNet CLI - parameter sweeps over legal cross-reference networks.

mod commands;
mod config;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing::Level;

#[derive(Parser)]
#[command(name = "lexnet")]
#[command(author, version, about = "LexNet - Clustering and evolution of legal networks", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Verbose output
    #[arg(short, long, global = true)]
    verbose: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default lexnet.toml
    Init {
        /// Project directory (default: current directory)
        #[arg(short, long)]
        path: Option<String>,

        /// Print the default configuration instead of writing it
        #[arg(long)]
        print: bool,
    },

    /// Reduce raw graphs and add sequence and co-occurrence edges
    Preprocess,

    /// Cluster every preprocessed graph of the sweep
    Cluster,

    /// Build snapshot indexes from the snapshot tables
    EvolutionMappings,

    /// Link partitions across snapshots into evolution graphs
    Evolution,

    /// Decode a configuration filename
    Decode {
        /// Artifact filename, e.g. 2019_1-0_1-0_-1_a-infomap.json
        filename: String,
    },
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let level = if cli.verbose { Level::DEBUG } else { Level::INFO };
    tracing_subscriber::fmt()
        .with_max_level(level)
        .with_target(false)
        .init();

    match cli.command {
        Commands::Init { path, print } => commands::init::run(path, print),
        Commands::Preprocess => commands::preprocess::run(),
        Commands::Cluster => commands::cluster::run(),
        Commands::EvolutionMappings => commands::evolution_mappings::run(),
        Commands::Evolution => commands::evolution::run(),
        Commands::Decode { filename } => commands::decode::run(&filename),
    }
}
