//! Wall-clock sources for bucket selection
//!
//! The rotating sink asks a [`Clock`] for "now" on every record. Production
//! code uses [`SystemClock`]; tests drive bucket changes with [`ManualClock`].

use chrono::{DateTime, Duration, Local};
use parking_lot::RwLock;

/// Source of local wall-clock time
pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Local>;
}

/// Reads the system clock
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Local> {
        Local::now()
    }
}

/// Clock that only moves when told to
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<DateTime<Local>>,
}

impl ManualClock {
    pub fn with_time(time: DateTime<Local>) -> Self {
        Self {
            now: RwLock::new(time),
        }
    }

    pub fn new() -> Self {
        Self::with_time(Local::now())
    }

    pub fn advance(&self, duration: Duration) {
        let mut now = self.now.write();
        *now += duration;
    }

    pub fn set_time(&self, time: DateTime<Local>) {
        *self.now.write() = time;
    }
}

impl Default for ManualClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Local> {
        *self.now.read()
    }
}
