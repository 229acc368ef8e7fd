//! Scenecheck CLI - Main Entry Point

use clap::{Parser, Subcommand};

use scenecheck_cli::commands::{self, assets, run, HarnessArgs};
use scenecheck_cli::output;

/// Scenecheck - declarative scene verification for canvas-rendered clients
#[derive(Parser)]
#[command(name = "scenecheck")]
#[command(author, version, about, long_about = None)]
#[command(propagate_version = true)]
struct Cli {
    #[command(flatten)]
    harness: HarnessArgs,

    /// Output format
    #[arg(long, default_value = "table", global = true)]
    format: output::OutputFormat,

    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Run one scenario
    Run(run::RunArgs),

    /// Run every scenario, optionally filtered by tag
    RunAll(run::RunAllArgs),

    /// List available scenarios
    List(run::ListArgs),

    /// Check that every sprite-sheet manifest entry exists on disk
    ValidateAssets(assets::ValidateAssetsArgs),

    /// Show version information
    Version,
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let log_level = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(log_level)),
        )
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();

    match cli.command {
        Commands::Run(args) => run::run(args, &cli.harness, cli.format).await?,
        Commands::RunAll(args) => run::run_all(args, &cli.harness, cli.format).await?,
        Commands::List(args) => run::list(args, cli.format)?,
        Commands::ValidateAssets(args) => assets::execute(args, cli.format)?,
        Commands::Version => {
            println!("scenecheck v{}", env!("CARGO_PKG_VERSION"));
            println!("Default config file: {}", commands::DEFAULT_CONFIG_FILE);
        }
    }

    Ok(())
}
