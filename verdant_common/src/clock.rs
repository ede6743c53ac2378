//! Wall-clock abstraction.
//!
//! Recipe playback runs in whole minutes since the Unix epoch. Production
//! code uses [`SystemClock`]; tests drive time by hand with [`ManualClock`].

use chrono::{DateTime, Duration, Utc};
use parking_lot::Mutex;

pub trait Clock: Send + Sync {
    fn now(&self) -> DateTime<Utc>;

    /// Whole minutes since the Unix epoch.
    fn now_minutes(&self) -> i64 {
        self.now().timestamp().div_euclid(60)
    }
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<DateTime<Utc>>,
}

impl ManualClock {
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Clock positioned at a whole minute since the epoch.
    pub fn at_minute(minute: i64) -> Self {
        Self::new(DateTime::<Utc>::UNIX_EPOCH + Duration::minutes(minute))
    }

    pub fn set(&self, now: DateTime<Utc>) {
        *self.now.lock() = now;
    }

    pub fn advance(&self, by: Duration) {
        *self.now.lock() += by;
    }

    pub fn advance_minutes(&self, minutes: i64) {
        self.advance(Duration::minutes(minutes));
    }
}

impl Clock for ManualClock {
    fn now(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

/// Format whole epoch minutes as `%Y-%m-%d %H:%M:%S UTC`.
pub fn format_minutes(minutes: i64) -> String {
    match DateTime::<Utc>::from_timestamp(minutes.saturating_mul(60), 0) {
        Some(at) => at.format("%Y-%m-%d %H:%M:%S UTC").to_string(),
        None => format!("minute {minutes}"),
    }
}
