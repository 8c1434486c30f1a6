//! Monosplit CLI entry point

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt};

mod commands;

#[derive(Parser)]
#[command(name = "monosplit")]
#[command(about = "Propose microservice boundaries for a monolith from its dependency graph", long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Pipeline config (defaults to ./monosplit.toml when present)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Partition the graph and print migration guidance
    Analyze {
        /// Fact bundle (.json, .yaml or .yml)
        bundle: PathBuf,

        /// Partition level to analyze
        #[arg(short, long)]
        level: Option<usize>,

        /// Remove a node before partitioning (repeatable)
        #[arg(long = "remove", value_name = "ID")]
        remove: Vec<String>,

        /// Fold one entity into another before partitioning (repeatable)
        #[arg(long = "merge", value_name = "ALIAS=CANONICAL")]
        merge: Vec<String>,

        /// Drop nodes without edges before partitioning
        #[arg(long)]
        prune_isolated: bool,

        /// Write the report here instead of stdout
        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Print the first partition levels
    Levels {
        bundle: PathBuf,

        /// Number of levels to compute
        #[arg(short, long)]
        max: Option<usize>,
    },
    /// Export the weighted graph
    Export {
        bundle: PathBuf,

        #[arg(short, long)]
        output: Option<PathBuf>,
    },
    /// Show version
    Version,
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::registry()
        .with(tracing_subscriber::EnvFilter::new(format!(
            "monosplit={level},monosplit_core={level},monosplit_facts={level}",
            level = log_level
        )))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();

    match cli.command {
        Commands::Analyze { bundle, level, remove, merge, prune_isolated, output } => {
            let mut config = commands::config(cli.config.as_deref())?;
            if let Some(level) = level {
                config.level = level;
            }
            config.prune_isolated |= prune_isolated;
            let refinements = commands::refinements(&remove, &merge)?;
            commands::analyze(&bundle, config, refinements, output.as_deref())
        }
        Commands::Levels { bundle, max } => {
            let mut config = commands::config(cli.config.as_deref())?;
            if let Some(max) = max {
                config.max_levels = max;
            }
            commands::levels(&bundle, config)
        }
        Commands::Export { bundle, output } => {
            let config = commands::config(cli.config.as_deref())?;
            commands::export(&bundle, config, output.as_deref())
        }
        Commands::Version => {
            println!("Monosplit v{}", env!("CARGO_PKG_VERSION"));
            Ok(())
        }
    }
}
