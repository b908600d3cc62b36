//! Conduit - telemetry collection agent
//!
//! # Usage
//!
//! ```bash
//! # Run pipelines from a config directory
//! conduit serve --config-dir configs/
//!
//! # Bounded demo run: serve, then drain and exit
//! conduit serve --config-dir configs/ --duration 30
//!
//! # Validate configs without running
//! conduit check --config-dir configs/
//! ```

mod loader;
mod runtime;

use std::path::PathBuf;
use std::time::Duration;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::runtime::{AgentRuntime, RuntimeOptions};

/// Conduit - telemetry collection agent
#[derive(Parser, Debug)]
#[command(name = "conduit")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Log level (trace, debug, info, warn, error)
    #[arg(short, long, default_value = "info", global = true)]
    log_level: String,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run the agent
    Serve(ServeArgs),

    /// Validate pipeline configs and exit
    Check(CheckArgs),
}

#[derive(clap::Args, Debug)]
struct ServeArgs {
    /// Directory of pipeline config files (one JSON object per file)
    #[arg(short, long, default_value = "configs")]
    config_dir: PathBuf,

    /// Stop after this many seconds instead of running until killed
    #[arg(long)]
    duration: Option<u64>,

    /// Processor worker threads
    #[arg(long, default_value_t = 2)]
    processor_threads: usize,

    /// Sender worker threads
    #[arg(long, default_value_t = 2)]
    sender_threads: usize,
}

#[derive(clap::Args, Debug)]
struct CheckArgs {
    /// Directory of pipeline config files
    #[arg(short, long, default_value = "configs")]
    config_dir: PathBuf,
}

fn main() -> Result<()> {
    let cli = Cli::parse();
    init_logging(&cli.log_level)?;

    match cli.command {
        Command::Serve(args) => serve(args),
        Command::Check(args) => check(args),
    }
}

fn serve(args: ServeArgs) -> Result<()> {
    let configs = loader::load_config_dir(&args.config_dir)?;
    if configs.is_empty() {
        anyhow::bail!("no valid configs under {}", args.config_dir.display());
    }

    let runtime = AgentRuntime::new(RuntimeOptions {
        processor_threads: args.processor_threads,
        sender_threads: args.sender_threads,
        ..Default::default()
    });
    runtime.start();
    runtime.apply_configs(configs);

    match args.duration {
        Some(secs) => {
            tracing::info!(secs, "bounded run");
            std::thread::sleep(Duration::from_secs(secs));
        }
        None => loop {
            std::thread::sleep(Duration::from_secs(1));
        },
    }

    runtime.shutdown();
    Ok(())
}

fn check(args: CheckArgs) -> Result<()> {
    let configs = loader::load_config_dir(&args.config_dir)?;
    for config in &configs {
        println!("{}: ok", config.name);
    }
    if configs.is_empty() {
        anyhow::bail!("no valid configs under {}", args.config_dir.display());
    }
    Ok(())
}

/// Initialize the tracing subscriber for logging
fn init_logging(level: &str) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    tracing_subscriber::registry()
        .with(fmt::layer().with_target(true).with_thread_ids(false))
        .with(filter)
        .init();

    Ok(())
}
