//! Shared capture plumbing for the `filter` and `sample` commands
//!
//! Resolves settings (CLI flag > config file > mode default), builds the
//! pipeline and runs it until the input ends or a shutdown signal arrives.

use std::path::PathBuf;

use anyhow::{Context, Result};
use chirp_config::{CaptureConfig, Compression as ConfigCompression, Config};
use chirp_sinks::{Compression, RotatingConfig};
use chirp_stream::{LineStream, Mode, Pipeline, PipelineConfig, SubscriptionRequest};
use clap::Args;
use tokio::io::BufReader;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};

/// Arguments common to every capture mode
#[derive(Args, Debug)]
pub struct CaptureArgs {
    /// Directory the hourly files are written to (created if missing)
    pub output_dir: PathBuf,

    /// Language requested from the stream (default from config, "en")
    #[arg(long, value_parser = parse_language)]
    pub language: Option<String>,

    /// Echo every captured record to stdout
    #[arg(long, overrides_with = "no_echo")]
    pub echo: bool,

    /// Do not echo captured records
    #[arg(long, overrides_with = "echo")]
    pub no_echo: bool,

    /// Read stream messages from a file instead of stdin
    #[arg(short, long)]
    pub input: Option<PathBuf>,
}

/// Reject blank languages, as config validation does for `[capture] language`
fn parse_language(value: &str) -> Result<String, String> {
    let language = value.trim();
    if language.is_empty() {
        return Err("language must not be empty".to_string());
    }
    Ok(language.to_string())
}

impl CaptureArgs {
    /// Language for the request
    pub fn language(&self, capture: &CaptureConfig) -> String {
        self.language
            .clone()
            .unwrap_or_else(|| capture.language.clone())
    }

    /// Echo setting: flag, then config file, then the mode's default
    pub fn echo(&self, capture: &CaptureConfig, mode: Mode) -> bool {
        if self.echo {
            true
        } else if self.no_echo {
            false
        } else {
            capture.echo.unwrap_or_else(|| mode.default_echo())
        }
    }

    /// Sink settings for this run
    pub fn sink_config(&self, capture: &CaptureConfig, mode: Mode) -> RotatingConfig {
        let compression = match capture.compression {
            ConfigCompression::Gzip => Compression::Gzip {
                level: capture.gzip_level,
            },
            ConfigCompression::None => Compression::None,
        };

        let mut sink = RotatingConfig {
            path: self.output_dir.clone(),
            compression,
            buffer_size: capture.buffer_size,
            echo: self.echo(capture, mode),
            flush_interval: None,
        };
        if let Some(interval) = capture.flush_interval {
            sink = sink.with_flush_interval(interval);
        }
        sink
    }
}

/// Run a capture for `request` until the input ends or a signal arrives
pub async fn run(args: CaptureArgs, request: SubscriptionRequest, config: &Config) -> Result<()> {
    let mode = request.mode();
    let sink = args.sink_config(&config.capture, mode);

    info!(
        version = env!("CARGO_PKG_VERSION"),
        mode = mode.as_str(),
        output = %sink.path.display(),
        echo = sink.echo,
        "chirp starting"
    );

    let pipeline = Pipeline::new(
        PipelineConfig::new(sink, request).with_queue_size(config.capture.queue_size),
    );

    let cancel = CancellationToken::new();
    let shutdown = cancel.clone();
    tokio::spawn(async move {
        wait_for_shutdown().await;
        info!("shutdown signal received, closing output");
        shutdown.cancel();
    });

    let result = match &args.input {
        Some(path) => {
            let file = tokio::fs::File::open(path)
                .await
                .with_context(|| format!("failed to open input {}", path.display()))?;
            pipeline.run(LineStream::new(BufReader::new(file)), cancel).await
        }
        None => {
            pipeline
                .run(LineStream::new(BufReader::new(tokio::io::stdin())), cancel)
                .await
        }
    };

    let report = match result {
        Ok(report) => report,
        Err(e) => {
            error!(error = %e, "capture failed");
            return Err(e).context("capture failed");
        }
    };

    info!(
        statuses = report.adapter.statuses,
        written = report.sink.records_written,
        rotations = report.sink.rotations,
        "chirp shutdown complete"
    );
    Ok(())
}

/// Wait for SIGINT or SIGTERM
async fn wait_for_shutdown() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            error!(error = %e, "failed to install Ctrl+C handler");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sig) => {
                sig.recv().await;
            }
            Err(e) => {
                error!(error = %e, "failed to install SIGTERM handler");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }
}
