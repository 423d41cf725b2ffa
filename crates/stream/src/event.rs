//! Stream notifications
//!
//! The streaming client pushes one of these per message it receives. Only
//! [`StreamEvent::Status`] carries data that gets persisted; the rest are
//! connection-level notices.
//!
//! # Wire messages
//!
//! Messages arrive as newline-delimited JSON. Control messages are objects
//! with a single well-known key; anything carrying `id_str` or `text` is a
//! status and is kept byte-for-byte as received.
//!
//! ```text
//! {"delete":{"status":{"id":1,"user_id":3}}}         → Deletion
//! {"limit":{"track":1234}}                           → TrackLimitation
//! {"scrub_geo":{"user_id":1,"up_to_status_id":9}}    → ScrubGeo
//! {"warning":{"code":"FALLING_BEHIND",...}}          → StallWarning
//! {"disconnect":{"code":7,"reason":"..."}}           → Exception
//! {"id_str":"1","text":"hello",...}                  → Status
//! ```

use serde::Deserialize;
use serde_json::Value;

/// A notification from the stream client
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StreamEvent {
    /// A status, as the raw JSON text received
    Status(String),

    /// A status was deleted upstream
    Deletion { status_id: u64, user_id: u64 },

    /// The filter matched more statuses than the stream delivers
    TrackLimitation { limited: u64 },

    /// Location data should be removed for a user's statuses
    ScrubGeo { user_id: u64, up_to_status_id: u64 },

    /// The client is falling behind and may be disconnected
    StallWarning {
        code: String,
        message: String,
        percent_full: Option<u32>,
    },

    /// Transport or protocol failure reported by the client
    Exception(String),
}

impl StreamEvent {
    /// Short name for logs and metrics
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Status(_) => "status",
            Self::Deletion { .. } => "deletion",
            Self::TrackLimitation { .. } => "track_limitation",
            Self::ScrubGeo { .. } => "scrub_geo",
            Self::StallWarning { .. } => "stall_warning",
            Self::Exception(_) => "exception",
        }
    }

    /// Classify one wire message
    ///
    /// Returns `None` for blank keep-alive lines.
    pub fn from_line(line: &str) -> Option<Self> {
        let line = line.trim_end_matches(['\r', '\n']);
        if line.trim().is_empty() {
            return None;
        }

        let value: Value = match serde_json::from_str(line) {
            Ok(value) => value,
            Err(e) => return Some(Self::Exception(format!("malformed stream message: {e}"))),
        };

        let Value::Object(map) = value else {
            return Some(Self::Exception(
                "stream message is not a JSON object".into(),
            ));
        };

        if map.contains_key("id_str") || map.contains_key("text") {
            return Some(Self::Status(line.to_owned()));
        }

        let event = match serde_json::from_value::<Control>(Value::Object(map)) {
            Ok(control) => control.into(),
            Err(_) => Self::Exception("unrecognized stream message".into()),
        };
        Some(event)
    }
}

#[derive(Deserialize)]
#[serde(rename_all = "snake_case")]
enum Control {
    Delete {
        status: DeletedStatus,
    },
    Limit {
        track: u64,
    },
    ScrubGeo {
        user_id: u64,
        up_to_status_id: u64,
    },
    Warning {
        code: String,
        message: String,
        #[serde(default)]
        percent_full: Option<u32>,
    },
    Disconnect {
        code: u32,
        #[serde(default)]
        reason: String,
    },
}

#[derive(Deserialize)]
struct DeletedStatus {
    id: u64,
    user_id: u64,
}

impl From<Control> for StreamEvent {
    fn from(control: Control) -> Self {
        match control {
            Control::Delete { status } => Self::Deletion {
                status_id: status.id,
                user_id: status.user_id,
            },
            Control::Limit { track } => Self::TrackLimitation { limited: track },
            Control::ScrubGeo {
                user_id,
                up_to_status_id,
            } => Self::ScrubGeo {
                user_id,
                up_to_status_id,
            },
            Control::Warning {
                code,
                message,
                percent_full,
            } => Self::StallWarning {
                code,
                message,
                percent_full,
            },
            Control::Disconnect { code, reason } => {
                Self::Exception(format!("disconnected by server (code {code}): {reason}"))
            }
        }
    }
}

#[cfg(test)]
#[path = "event_test.rs"]
mod event_test;
