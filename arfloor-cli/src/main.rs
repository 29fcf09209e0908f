//! arfloor CLI - capability checks and trace replay for AR floor placement

use anyhow::Result;
use clap::{Parser, Subcommand};
use std::path::PathBuf;
use tracing_subscriber::EnvFilter;

mod commands;
mod config;

use commands::replay::ReplayOptions;

#[derive(Parser)]
#[command(name = "arfloor")]
#[command(about = "Surface-anchored AR session tools", long_about = None)]
#[command(version)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Path to configuration file
    #[arg(long, global = true, env = "ARFLOOR_CONFIG")]
    config: Option<PathBuf>,

    /// Enable debug output
    #[arg(long, global = true)]
    debug: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the AR capability check against a simulated device
    Check {
        /// Simulate a device without immersive AR
        #[arg(long)]
        unsupported: bool,
    },

    /// Replay a recorded session trace
    Replay {
        /// Path to the trace (JSON)
        trace: PathBuf,

        /// Content to place (overrides the config)
        #[arg(long)]
        content: Option<String>,

        /// Scale applied to placed content
        #[arg(long)]
        scale: Option<f32>,

        /// Print every dispatched event
        #[arg(short, long)]
        verbose: bool,
    },

    /// Show the effective configuration
    Config {
        /// Also write it to this path
        #[arg(long)]
        save: Option<PathBuf>,
    },
}

#[tokio::main(flavor = "current_thread")]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    // Initialize logging
    let default_level = if cli.debug { "debug" } else { "warn" };
    tracing_subscriber::fmt()
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level)),
        )
        .with_target(false)
        .init();

    // Load configuration
    let config = config::load_config(cli.config)?;

    match cli.command {
        Commands::Check { unsupported } => {
            if !commands::check::check(unsupported, &config).await? {
                std::process::exit(1);
            }
        }

        Commands::Replay {
            trace,
            content,
            scale,
            verbose,
        } => {
            let options = ReplayOptions {
                content,
                scale,
                verbose,
            };
            let summary = commands::replay::replay(&trace, options, &config).await?;
            if summary.start_error.is_some() {
                std::process::exit(2);
            }
        }

        Commands::Config { save } => {
            commands::config::show(&config, save.as_deref())?;
        }
    }

    Ok(())
}
