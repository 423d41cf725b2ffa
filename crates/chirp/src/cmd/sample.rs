//! Sample command - capture the random sample stream

use anyhow::Result;
use chirp_config::Config;
use chirp_stream::SubscriptionRequest;
use clap::Args;

use super::capture::{self, CaptureArgs};

/// Sample command arguments
#[derive(Args, Debug)]
pub struct SampleArgs {
    #[command(flatten)]
    pub capture: CaptureArgs,
}

/// Run the sample command
pub async fn run(args: SampleArgs, config: &Config) -> Result<()> {
    let request = SubscriptionRequest::Sample {
        language: args.capture.language(&config.capture),
    };
    capture::run(args.capture, request, config).await
}
