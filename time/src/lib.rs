use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::ops::Sub;
use thiserror::Error;

pub const MS_PER_SEC: f64 = 1000.0;

pub mod prelude {
    pub use crate::{Clock, ManualClock, SteppingClock, TimeErrors, Timestamp};
}

#[derive(Debug, Clone, Copy, PartialEq, Error)]
pub enum TimeErrors {
    #[error("timestamp {0} ms is outside the representable calendar range")]
    OutOfRange(i64),
}

/// Integer milliseconds since the Unix epoch.
/// Flight software clocks are monotonic, so consumers may rely on
/// successive reads never decreasing.
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Deserialize, Serialize,
)]
pub struct Timestamp(i64);

impl Timestamp {
    pub const EPOCH: Self = Self(0);

    pub const fn from_millis(ms: i64) -> Self {
        Self(ms)
    }

    pub const fn millis(&self) -> i64 {
        self.0
    }

    pub fn from_datetime(datetime: DateTime<Utc>) -> Self {
        Self(datetime.timestamp_millis())
    }

    pub fn to_datetime(&self) -> Result<DateTime<Utc>, TimeErrors> {
        DateTime::<Utc>::from_timestamp_millis(self.0).ok_or(TimeErrors::OutOfRange(self.0))
    }

    /// Elapsed seconds from `earlier` to `self`, negative if `earlier` is later.
    pub fn seconds_since(&self, earlier: Timestamp) -> f64 {
        (*self - earlier) as f64 / MS_PER_SEC
    }

    pub const fn add_millis(&self, ms: i64) -> Self {
        Self(self.0 + ms)
    }
}

impl Sub<Timestamp> for Timestamp {
    type Output = i64;

    /// Difference in milliseconds.
    fn sub(self, rhs: Timestamp) -> i64 {
        self.0 - rhs.0
    }
}

/// Source of the current time for a periodic task.
pub trait Clock {
    fn now(&mut self) -> Timestamp;
}

impl<T: Clock + ?Sized> Clock for &mut T {
    fn now(&mut self) -> Timestamp {
        (**self).now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct ManualClock {
    current: Timestamp,
}

impl ManualClock {
    pub fn new(start: Timestamp) -> Self {
        Self { current: start }
    }

    pub fn set(&mut self, t: Timestamp) {
        self.current = t;
    }

    pub fn advance(&mut self, ms: i64) {
        self.current = self.current.add_millis(ms);
    }
}

impl Clock for ManualClock {
    fn now(&mut self) -> Timestamp {
        self.current
    }
}

/// Clock that returns its current time and then advances by a fixed step,
/// mimicking a scheduler with a constant tick period.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SteppingClock {
    next: Timestamp,
    step_ms: i64,
}

impl SteppingClock {
    pub fn new(start: Timestamp, step_ms: i64) -> Self {
        Self { next: start, step_ms }
    }
}

impl Clock for SteppingClock {
    fn now(&mut self) -> Timestamp {
        let t = self.next;
        self.next = self.next.add_millis(self.step_ms);
        t
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_abs_diff_eq;
    use chrono::TimeZone;

    #[test]
    fn test_seconds_since() {
        let t0 = Timestamp::from_millis(1_000);
        let t1 = Timestamp::from_millis(3_500);
        assert_abs_diff_eq!(t1.seconds_since(t0), 2.5);
        assert_abs_diff_eq!(t0.seconds_since(t1), -2.5);
        assert_eq!(t1 - t0, 2_500);
    }

    #[test]
    fn test_datetime_conversion() {
        let dt = Utc.with_ymd_and_hms(2024, 3, 1, 12, 0, 0).unwrap();
        let t = Timestamp::from_datetime(dt);
        assert_eq!(t.millis(), 1_709_294_400_000);
        assert_eq!(t.to_datetime().unwrap(), dt);

        let bad = Timestamp::from_millis(i64::MAX);
        assert_eq!(bad.to_datetime(), Err(TimeErrors::OutOfRange(i64::MAX)));
    }

    #[test]
    fn test_stepping_clock() {
        let mut clock = SteppingClock::new(Timestamp::from_millis(10), 5);
        assert_eq!(clock.now(), Timestamp::from_millis(10));
        assert_eq!(clock.now(), Timestamp::from_millis(15));
        assert_eq!(clock.now(), Timestamp::from_millis(20));
    }

    #[test]
    fn test_manual_clock() {
        let mut clock = ManualClock::new(Timestamp::EPOCH);
        clock.advance(250);
        assert_eq!(clock.now(), Timestamp::from_millis(250));
        clock.set(Timestamp::from_millis(100));
        assert_eq!(clock.now(), Timestamp::from_millis(100));
    }
}
