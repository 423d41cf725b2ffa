//! Configuration validation
//!
//! Serde already rejects unknown enum values; this checks ranges that the
//! type system does not.

use crate::Config;
use crate::error::{ConfigError, Result};

/// Highest gzip level
const MAX_GZIP_LEVEL: u32 = 9;

/// Validate the entire configuration
pub fn validate_config(config: &Config) -> Result<()> {
    let capture = &config.capture;

    if capture.gzip_level > MAX_GZIP_LEVEL {
        return Err(ConfigError::invalid_value(
            "capture",
            "gzip_level",
            format!("{} is not between 0 and {MAX_GZIP_LEVEL}", capture.gzip_level),
        ));
    }

    if capture.buffer_size == 0 {
        return Err(ConfigError::invalid_value(
            "capture",
            "buffer_size",
            "must be greater than 0",
        ));
    }

    if capture.queue_size == 0 {
        return Err(ConfigError::invalid_value(
            "capture",
            "queue_size",
            "must be greater than 0",
        ));
    }

    if capture.language.trim().is_empty() {
        return Err(ConfigError::invalid_value(
            "capture",
            "language",
            "must not be empty",
        ));
    }

    if capture.flush_interval.is_some_and(|d| d.is_zero()) {
        return Err(ConfigError::invalid_value(
            "capture",
            "flush_interval",
            "must be greater than 0",
        ));
    }

    Ok(())
}
