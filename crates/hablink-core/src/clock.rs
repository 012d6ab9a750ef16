//! Wall-clock source for the hourly session heuristic.
//!
//! Vendor sessions silently expire after roughly an hour, so the poll
//! machine renews them whenever the local hour changes. The hour comes
//! from a [`Clock`] so tests can move it without waiting.

use std::sync::Arc;
use std::sync::atomic::{AtomicU32, Ordering};

use chrono::Timelike;

/// Source of the current local hour (0-23).
pub trait Clock: Send + Sync + 'static {
    fn hour(&self) -> u32;
}

/// The system's local time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn hour(&self) -> u32 {
        chrono::Local::now().hour()
    }
}

/// A clock whose hour is set by hand. Clones share the same hour.
#[derive(Debug, Clone, Default)]
pub struct ManualClock {
    hour: Arc<AtomicU32>,
}

impl ManualClock {
    pub fn new(hour: u32) -> Self {
        Self {
            hour: Arc::new(AtomicU32::new(hour % 24)),
        }
    }

    pub fn set_hour(&self, hour: u32) {
        self.hour.store(hour % 24, Ordering::Release);
    }

    /// Move to the next hour, wrapping at midnight.
    pub fn advance_hour(&self) {
        let next = (self.hour() + 1) % 24;
        self.set_hour(next);
    }
}

impl Clock for ManualClock {
    fn hour(&self) -> u32 {
        self.hour.load(Ordering::Acquire)
    }
}
