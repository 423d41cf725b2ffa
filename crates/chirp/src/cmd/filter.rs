//! Filter command - capture statuses matching keywords and/or locations

use anyhow::Result;
use chirp_config::Config;
use chirp_stream::{BoundingBox, FilterQuery, SubscriptionRequest, TrackList};
use clap::Args;

use super::capture::{self, CaptureArgs};

/// Filter command arguments
#[derive(Args, Debug)]
pub struct FilterArgs {
    /// Comma-separated keyword phrases to track
    #[arg(short, long)]
    pub track: Option<TrackList>,

    /// Bounding box min_lon,min_lat,max_lon,max_lat (repeatable)
    #[arg(short, long, allow_hyphen_values = true)]
    pub locations: Vec<BoundingBox>,

    #[command(flatten)]
    pub capture: CaptureArgs,
}

impl FilterArgs {
    pub fn request(&self, config: &Config) -> SubscriptionRequest {
        SubscriptionRequest::Filter(FilterQuery {
            track: self.track.clone(),
            locations: self.locations.clone(),
            language: self.capture.language(&config.capture),
        })
    }
}

/// Run the filter command
pub async fn run(args: FilterArgs, config: &Config) -> Result<()> {
    let request = args.request(config);
    capture::run(args.capture, request, config).await
}
