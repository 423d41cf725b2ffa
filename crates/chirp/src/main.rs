//! Chirp - capture a live status stream into hourly gzip files
//!
//! # Usage
//!
//! ```bash
//! # Filtered stream, records echoed to stdout
//! stream-client filter --track rust | chirp filter -t "rust,tokio" captures/
//!
//! # Bounding box (min_lon,min_lat,max_lon,max_lat)
//! chirp filter -l "-122.75,36.8,-121.75,37.8" --input replay.jsonl captures/
//!
//! # Random sample, quiet
//! stream-client sample | chirp sample captures/
//! ```

mod cmd;

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chirp_config::{Config, LogFormat};
use clap::{Parser, Subcommand};
use tracing_subscriber::{EnvFilter, fmt, prelude::*};

/// Chirp - capture a live status stream into hourly gzip files
#[derive(Parser, Debug)]
#[command(name = "chirp")]
#[command(version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Command,

    /// Path to configuration file (error if specified but not found)
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error). Overrides config file.
    #[arg(long, global = true)]
    log_level: Option<String>,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Capture the filtered stream (keywords and/or locations)
    Filter(cmd::filter::FilterArgs),

    /// Capture the random sample stream
    Sample(cmd::sample::SampleArgs),
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let config = load_config(cli.config.as_deref())?;
    let log_level = resolve_log_level(cli.log_level.as_deref(), &config);
    init_logging(&log_level, config.log.format)?;

    let result = match cli.command {
        Command::Filter(args) => cmd::filter::run(args, &config).await,
        Command::Sample(args) => cmd::sample::run(args, &config).await,
    };

    // Output is closed by now. Exit without waiting on the runtime, whose
    // blocking stdin reader cannot be cancelled after a signal.
    match result {
        Ok(()) => std::process::exit(0),
        Err(e) => {
            eprintln!("Error: {e:?}");
            std::process::exit(1)
        }
    }
}

/// Load the config file if one was given, defaults otherwise
fn load_config(path: Option<&Path>) -> Result<Config> {
    let Some(path) = path else {
        return Ok(Config::default());
    };
    if !path.exists() {
        anyhow::bail!("config file not found: {}", path.display());
    }
    Config::from_file(path)
        .with_context(|| format!("failed to load configuration from {}", path.display()))
}

/// Resolve log level: CLI flag > config file > default "info"
fn resolve_log_level(cli_level: Option<&str>, config: &Config) -> String {
    match cli_level {
        Some(level) => level.to_string(),
        None => config.log.level.as_str().to_string(),
    }
}

/// Initialize the tracing subscriber for logging
///
/// Logs go to stderr; stdout carries echoed records and rotation summaries.
fn init_logging(level: &str, format: LogFormat) -> Result<()> {
    let filter = EnvFilter::try_new(level)
        .or_else(|_| EnvFilter::try_new("info"))
        .map_err(|e| anyhow::anyhow!("invalid log level: {}", e))?;

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Console => registry
            .with(
                fmt::layer()
                    .with_writer(std::io::stderr)
                    .with_target(true)
                    .with_thread_ids(false),
            )
            .init(),
        LogFormat::Json => registry
            .with(fmt::layer().json().with_writer(std::io::stderr))
            .init(),
    }

    Ok(())
}
