//! Subscription requests
//!
//! What the stream client is asked to deliver: a filtered stream (keyword
//! phrases and/or bounding boxes, one language) or the random sample.

use std::fmt;
use std::str::FromStr;

use crate::error::StreamError;

pub use chirp_config::DEFAULT_LANGUAGE;

/// Geographic bounding box, south-west corner first
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct BoundingBox {
    pub min_lon: f64,
    pub min_lat: f64,
    pub max_lon: f64,
    pub max_lat: f64,
}

impl BoundingBox {
    /// `[[min_lon, min_lat], [max_lon, max_lat]]`
    pub fn corners(&self) -> [[f64; 2]; 2] {
        [[self.min_lon, self.min_lat], [self.max_lon, self.max_lat]]
    }
}

impl FromStr for BoundingBox {
    type Err = StreamError;

    /// Parse `min_lon,min_lat,max_lon,max_lat`
    ///
    /// The input is split into at most four fields, so anything after a
    /// fourth comma stays in the last field and fails the number parse.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let fields: Vec<&str> = s.splitn(4, ',').map(str::trim).collect();
        if fields.len() < 4 {
            return Err(StreamError::invalid_locations(
                s,
                format!(
                    "expected min_lon,min_lat,max_lon,max_lat, got {} field(s)",
                    fields.len()
                ),
            ));
        }

        let mut values = [0.0_f64; 4];
        for (value, field) in values.iter_mut().zip(&fields) {
            *value = field.parse().map_err(|_| {
                StreamError::invalid_locations(s, format!("'{field}' is not a number"))
            })?;
        }

        let [min_lon, min_lat, max_lon, max_lat] = values;
        Ok(Self {
            min_lon,
            min_lat,
            max_lon,
            max_lat,
        })
    }
}

impl fmt::Display for BoundingBox {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{},{},{},{}",
            self.min_lon, self.min_lat, self.max_lon, self.max_lat
        )
    }
}

/// Keyword phrases for a filtered stream, never empty
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TrackList(Vec<String>);

impl TrackList {
    pub fn phrases(&self) -> &[String] {
        &self.0
    }
}

impl FromStr for TrackList {
    type Err = StreamError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let phrases: Vec<String> = s
            .split(',')
            .map(str::trim)
            .filter(|p| !p.is_empty())
            .map(str::to_owned)
            .collect();
        if phrases.is_empty() {
            return Err(StreamError::EmptyTrack);
        }
        Ok(Self(phrases))
    }
}

impl fmt::Display for TrackList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0.join(","))
    }
}

/// Which stream to subscribe to
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Mode {
    Filter,
    Sample,
}

impl Mode {
    /// Whether written records are mirrored to stdout unless configured
    pub fn default_echo(self) -> bool {
        match self {
            Self::Filter => true,
            Self::Sample => false,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Filter => "filter",
            Self::Sample => "sample",
        }
    }
}

/// Parameters of a filtered stream
#[derive(Debug, Clone, PartialEq)]
pub struct FilterQuery {
    pub track: Option<TrackList>,
    pub locations: Vec<BoundingBox>,
    pub language: String,
}

impl Default for FilterQuery {
    fn default() -> Self {
        Self {
            track: None,
            locations: Vec::new(),
            language: DEFAULT_LANGUAGE.to_owned(),
        }
    }
}

impl FilterQuery {
    /// True when neither keywords nor locations narrow the stream
    pub fn is_unbounded(&self) -> bool {
        self.track.is_none() && self.locations.is_empty()
    }
}

/// A subscription the stream client is asked to deliver
#[derive(Debug, Clone, PartialEq)]
pub enum SubscriptionRequest {
    Filter(FilterQuery),
    Sample { language: String },
}

impl SubscriptionRequest {
    /// Random sample in the default language
    pub fn sample() -> Self {
        Self::Sample {
            language: DEFAULT_LANGUAGE.to_owned(),
        }
    }

    pub fn mode(&self) -> Mode {
        match self {
            Self::Filter(_) => Mode::Filter,
            Self::Sample { .. } => Mode::Sample,
        }
    }

    /// Stream resource the request is sent to
    pub fn endpoint(&self) -> &'static str {
        match self {
            Self::Filter(_) => "statuses/filter",
            Self::Sample { .. } => "statuses/sample",
        }
    }

    /// Request parameters in the order they are sent
    pub fn params(&self) -> Vec<(&'static str, String)> {
        match self {
            Self::Filter(query) => {
                let mut params = Vec::with_capacity(3);
                if let Some(track) = &query.track {
                    params.push(("track", track.to_string()));
                }
                if !query.locations.is_empty() {
                    let locations = query
                        .locations
                        .iter()
                        .map(ToString::to_string)
                        .collect::<Vec<_>>()
                        .join(",");
                    params.push(("locations", locations));
                }
                params.push(("language", query.language.clone()));
                params
            }
            Self::Sample { language } => vec![("language", language.clone())],
        }
    }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod request_test;
