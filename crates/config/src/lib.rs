//! Chirp Configuration
//!
//! TOML-based configuration loading with sensible defaults. The config file
//! is optional; the command line alone is enough to run a capture.
//!
//! # Parsing
//!
//! Use the `FromStr` trait to parse configuration:
//!
//! ```
//! use chirp_config::Config;
//! use std::str::FromStr;
//!
//! let config = Config::from_str("[capture]\ngzip_level = 9").unwrap();
//! assert_eq!(config.capture.gzip_level, 9);
//! ```
//!
//! # Example Config
//!
//! ```toml
//! [log]
//! level = "info"
//! format = "console"
//!
//! [capture]
//! compression = "gzip"
//! language = "en"
//! flush_interval = "5s"
//! ```

mod capture;
mod error;
mod logging;
mod validation;

use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::Deserialize;

pub use capture::{CaptureConfig, Compression, DEFAULT_LANGUAGE};
pub use error::{ConfigError, Result};
pub use logging::{LogConfig, LogFormat, LogLevel};

/// Main configuration structure
///
/// All sections are optional with sensible defaults.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Logging configuration
    pub log: LogConfig,

    /// Output settings for captured records
    pub capture: CaptureConfig,
}

impl Config {
    /// Load configuration from a TOML file
    ///
    /// # Errors
    ///
    /// Returns error if file cannot be read, contains invalid TOML, or fails
    /// validation.
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();
        let contents = fs::read_to_string(path).map_err(|e| ConfigError::IoError {
            path: path.display().to_string(),
            source: e,
        })?;

        Self::from_str(&contents)
    }

    fn parse(s: &str) -> Result<Self> {
        let config: Config = toml::from_str(s).map_err(ConfigError::ParseError)?;
        validation::validate_config(&config)?;
        Ok(config)
    }
}

impl FromStr for Config {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self> {
        Self::parse(s)
    }
}
