//! Time source abstraction for the fixed broadcast timezone.
//!
//! The core never reads the system clock directly. Everything that depends on
//! "today" or on the current hour/minute goes through [`TimeSource`], which
//! keeps day rollover and poll window logic testable.

use chrono::{DateTime, FixedOffset, NaiveDate, Timelike, Utc};
use parking_lot::RwLock;
use serde::Serialize;

/// Wall-clock reading in the configured timezone.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LocalTime {
    /// Local calendar date.
    pub date: NaiveDate,
    /// Hour of day (0-23).
    pub hour: u32,
    /// Minute of hour (0-59).
    pub minute: u32,
}

impl LocalTime {
    /// Creates a reading from its parts.
    #[must_use]
    pub fn new(date: NaiveDate, hour: u32, minute: u32) -> Self {
        Self { date, hour, minute }
    }

    /// Converts an instant into the local reading for `offset`.
    #[must_use]
    pub fn at(instant: DateTime<Utc>, offset: FixedOffset) -> Self {
        let local = instant.with_timezone(&offset);
        Self {
            date: local.date_naive(),
            hour: local.hour(),
            minute: local.minute(),
        }
    }

    /// Minutes elapsed since local midnight.
    #[must_use]
    pub fn minutes_of_day(&self) -> i32 {
        crate::slots::minutes_since_midnight(self.hour, self.minute)
    }
}

/// Supplies the current local date and time in a fixed timezone.
///
/// Implementations must be side-effect free.
pub trait TimeSource: Send + Sync {
    /// Returns the current local reading.
    fn now(&self) -> LocalTime;

    /// Returns the fixed UTC offset readings are expressed in.
    fn offset(&self) -> FixedOffset;
}

/// Returns the local calendar date of `instant` in `offset`.
#[must_use]
pub fn local_date(instant: DateTime<Utc>, offset: FixedOffset) -> NaiveDate {
    instant.with_timezone(&offset).date_naive()
}

/// Builds a fixed offset from minutes east of UTC.
///
/// Returns `None` for offsets of a day or more.
#[must_use]
pub fn offset_from_minutes(minutes: i32) -> Option<FixedOffset> {
    FixedOffset::east_opt(minutes.checked_mul(60)?)
}

/// System clock shifted to a fixed UTC offset.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    offset: FixedOffset,
}

impl SystemClock {
    /// Creates a clock for the given offset.
    #[must_use]
    pub fn new(offset: FixedOffset) -> Self {
        Self { offset }
    }
}

impl TimeSource for SystemClock {
    fn now(&self) -> LocalTime {
        LocalTime::at(Utc::now(), self.offset)
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

/// Settable clock for tests and embedders that drive time themselves.
#[derive(Debug)]
pub struct ManualClock {
    now: RwLock<LocalTime>,
    offset: FixedOffset,
}

impl ManualClock {
    /// Creates a clock frozen at `now`, expressed in `offset`.
    #[must_use]
    pub fn new(now: LocalTime, offset: FixedOffset) -> Self {
        Self {
            now: RwLock::new(now),
            offset,
        }
    }

    /// Moves the clock to a new reading.
    pub fn set(&self, now: LocalTime) {
        *self.now.write() = now;
    }

    /// Moves the clock to `hour:minute` on the current date.
    pub fn set_time(&self, hour: u32, minute: u32) {
        let mut guard = self.now.write();
        guard.hour = hour;
        guard.minute = minute;
    }
}

impl TimeSource for ManualClock {
    fn now(&self) -> LocalTime {
        *self.now.read()
    }

    fn offset(&self) -> FixedOffset {
        self.offset
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn date(y: i32, m: u32, d: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(y, m, d).unwrap()
    }

    #[test]
    fn minutes_of_day_counts_from_midnight() {
        assert_eq!(LocalTime::new(date(2026, 10, 16), 0, 0).minutes_of_day(), 0);
        assert_eq!(
            LocalTime::new(date(2026, 10, 16), 8, 25).minutes_of_day(),
            505
        );
        assert_eq!(
            LocalTime::new(date(2026, 10, 16), 23, 59).minutes_of_day(),
            1439
        );
    }

    #[test]
    fn out_of_range_reading_does_not_overflow() {
        let reading = LocalTime::new(date(2026, 10, 16), u32::MAX, u32::MAX);
        assert_eq!(reading.minutes_of_day(), i32::MAX);
    }

    #[test]
    fn local_time_applies_offset_across_midnight() {
        let offset = offset_from_minutes(9 * 60).unwrap();
        let instant = Utc.with_ymd_and_hms(2026, 10, 15, 23, 30, 0).unwrap();

        let local = LocalTime::at(instant, offset);
        assert_eq!(local.date, date(2026, 10, 16));
        assert_eq!((local.hour, local.minute), (8, 30));
        assert_eq!(local_date(instant, offset), date(2026, 10, 16));
    }

    #[test]
    fn offset_from_minutes_rejects_whole_days() {
        assert!(offset_from_minutes(-5 * 60).is_some());
        assert!(offset_from_minutes(24 * 60).is_none());
        assert!(offset_from_minutes(i32::MAX).is_none());
    }

    #[test]
    fn manual_clock_can_be_moved() {
        let offset = offset_from_minutes(0).unwrap();
        let clock = ManualClock::new(LocalTime::new(date(2026, 10, 16), 12, 0), offset);

        clock.set_time(13, 5);
        assert_eq!(clock.now(), LocalTime::new(date(2026, 10, 16), 13, 5));

        clock.set(LocalTime::new(date(2026, 10, 17), 0, 1));
        assert_eq!(clock.now().date, date(2026, 10, 17));
        assert_eq!(clock.offset(), offset);
    }
}
