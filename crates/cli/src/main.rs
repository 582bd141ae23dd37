//! ToF CLI: the main entry point.
//!
//! Commands:
//! - `init`: Write the default config
//! - `status`: Show the effective configuration
//! - `doctor`: Check config, index and embedders
//! - `check`: Register, validate and optionally recover contexts from a file

use clap::{Parser, Subcommand};
use std::path::PathBuf;

mod commands;

#[derive(Parser)]
#[command(
    name = "tof",
    about = "Test-or-Forget: context validation and recovery",
    version,
    author
)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Enable verbose logging
    #[arg(short, long, global = true)]
    verbose: bool,

    /// Use this config file instead of ~/.tof/config.toml
    #[arg(short, long, global = true, env = "TOF_CONFIG")]
    config: Option<PathBuf>,
}

#[derive(Subcommand)]
enum Commands {
    /// Write a default config to ~/.tof/config.toml
    Init,

    /// Show the effective configuration
    Status,

    /// Diagnose config, index and embedding health
    Doctor,

    /// Validate the contexts listed in a JSON file
    Check {
        /// JSON array of {id, type, data, tags?, parent_id?}
        file: PathBuf,

        /// Try to recover every context that fails validation
        #[arg(short, long)]
        recover: bool,
    },
}

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // Initialize tracing
    let filter = if cli.verbose { "debug" } else { "info" };
    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new(filter)),
        )
        .with_target(false)
        .init();

    let config_path = cli.config.as_deref();
    match cli.command {
        Commands::Init => commands::init::run().await?,
        Commands::Status => commands::status::run(config_path).await?,
        Commands::Doctor => commands::doctor::run(config_path).await?,
        Commands::Check { file, recover } => commands::check::run(config_path, &file, recover).await?,
    }

    Ok(())
}
