//! Tick-based date, time and duration values.
//!
//! A tick is 100 nanoseconds. Timestamps count ticks since midnight, January 1 of year 1.

use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Number of ticks in one second.
pub const TICKS_PER_SECOND: i64 = 10_000_000;

/// Ticks between year 1 and the Unix epoch.
pub const UNIX_EPOCH_TICKS: i64 = 621_355_968_000_000_000;

const NANOS_PER_TICK: u128 = 100;

/// Time zone interpretation of a [`Timestamp`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub enum TimestampKind {
    /// No time zone information.
    #[default]
    Unspecified,

    /// Coordinated universal time.
    Utc,

    /// The local time zone of the writer.
    Local,
}

/// A point in time with its [`TimestampKind`].
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Timestamp {
    pub ticks: i64,
    pub kind: TimestampKind,
}

impl Timestamp {
    /// Creates a [`Timestamp`].
    #[inline]
    #[must_use]
    pub const fn new(ticks: i64, kind: TimestampKind) -> Self {
        Self { ticks, kind }
    }

    /// Returns the current UTC time.
    ///
    /// # Examples
    ///
    /// ```
    /// use stripekv::{Timestamp, TimestampKind};
    ///
    /// let now = Timestamp::now();
    /// assert_eq!(now.kind, TimestampKind::Utc);
    /// assert!(now.to_system_time().is_some());
    /// ```
    #[must_use]
    pub fn now() -> Self {
        Self::from(SystemTime::now())
    }

    /// Converts the [`Timestamp`] into a [`SystemTime`], ignoring its kind.
    ///
    /// Returns `None` if the platform cannot represent the time.
    #[must_use]
    pub fn to_system_time(&self) -> Option<SystemTime> {
        let since_epoch = i128::from(self.ticks) - i128::from(UNIX_EPOCH_TICKS);
        let nanos = since_epoch.unsigned_abs() * NANOS_PER_TICK;
        let offset = Duration::new(
            u64::try_from(nanos / 1_000_000_000).ok()?,
            u32::try_from(nanos % 1_000_000_000).ok()?,
        );
        if since_epoch >= 0 {
            UNIX_EPOCH.checked_add(offset)
        } else {
            UNIX_EPOCH.checked_sub(offset)
        }
    }
}

impl From<SystemTime> for Timestamp {
    fn from(time: SystemTime) -> Self {
        let ticks = match time.duration_since(UNIX_EPOCH) {
            Ok(after) => UNIX_EPOCH_TICKS.saturating_add(duration_ticks(after)),
            Err(before) => UNIX_EPOCH_TICKS.saturating_sub(duration_ticks(before.duration())),
        };
        Self::new(ticks, TimestampKind::Utc)
    }
}

/// A signed duration in ticks.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, Ord, PartialEq, PartialOrd)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct TimeSpan(pub i64);

impl TimeSpan {
    /// Returns the number of ticks.
    #[inline]
    #[must_use]
    pub const fn ticks(self) -> i64 {
        self.0
    }

    /// Converts a non-negative [`TimeSpan`] into a [`Duration`].
    #[must_use]
    pub fn to_duration(self) -> Option<Duration> {
        let ticks = u64::try_from(self.0).ok()?;
        let seconds = ticks / TICKS_PER_SECOND.unsigned_abs();
        let nanos = (ticks % TICKS_PER_SECOND.unsigned_abs()) * 100;
        Some(Duration::new(seconds, u32::try_from(nanos).ok()?))
    }
}

impl From<Duration> for TimeSpan {
    #[inline]
    fn from(duration: Duration) -> Self {
        Self(duration_ticks(duration))
    }
}

/// A local time paired with its offset from UTC.
#[derive(Clone, Copy, Debug, Default, Eq, Hash, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct OffsetTimestamp {
    pub ticks: i64,
    pub offset_ticks: i64,
}

impl OffsetTimestamp {
    /// Creates an [`OffsetTimestamp`].
    #[inline]
    #[must_use]
    pub const fn new(ticks: i64, offset: TimeSpan) -> Self {
        Self {
            ticks,
            offset_ticks: offset.0,
        }
    }

    /// Returns the offset from UTC.
    #[inline]
    #[must_use]
    pub const fn offset(&self) -> TimeSpan {
        TimeSpan(self.offset_ticks)
    }

    /// Returns the same instant as a UTC [`Timestamp`].
    #[must_use]
    pub const fn to_utc(&self) -> Timestamp {
        Timestamp::new(
            self.ticks.saturating_sub(self.offset_ticks),
            TimestampKind::Utc,
        )
    }
}

fn duration_ticks(duration: Duration) -> i64 {
    i64::try_from(duration.as_nanos() / NANOS_PER_TICK).unwrap_or(i64::MAX)
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn unix_epoch() {
        let epoch = Timestamp::from(UNIX_EPOCH);
        assert_eq!(epoch.ticks, UNIX_EPOCH_TICKS);
        assert_eq!(epoch.to_system_time(), Some(UNIX_EPOCH));

        let later = UNIX_EPOCH + Duration::from_millis(1500);
        assert_eq!(Timestamp::from(later).to_system_time(), Some(later));
    }

    #[test]
    fn time_span() {
        let span = TimeSpan::from(Duration::from_micros(2_500_001));
        assert_eq!(span.ticks(), 25_000_010);
        assert_eq!(span.to_duration(), Some(Duration::from_micros(2_500_001)));
        assert!(TimeSpan(-1).to_duration().is_none());
    }

    #[test]
    fn offset() {
        let hour = TimeSpan(3600 * TICKS_PER_SECOND);
        let local = OffsetTimestamp::new(UNIX_EPOCH_TICKS + hour.ticks(), hour);
        assert_eq!(local.to_utc().ticks, UNIX_EPOCH_TICKS);
        assert_eq!(local.offset(), hour);
    }
}
