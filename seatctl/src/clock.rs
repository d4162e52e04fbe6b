//! Time source used by the reservation protocol.
//!
//! Reservation timestamps drive the re-booking cooldown, so they are stamped by the application
//! rather than by the database. Tests swap in a manual clock to step over the cooldown window.

use chrono::{DateTime, Utc};

pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Wall-clock time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}
