use chrono::{DateTime, Duration, Utc};

/// A simple clock abstraction for deterministic time in services and tests.
#[derive(Debug, Clone, Copy, Default)]
pub enum Clock {
    #[default]
    Default,
    Fixed(DateTime<Utc>),
}

impl Clock {
    /// Returns a clock that uses the current system time.
    #[must_use]
    pub fn default_clock() -> Self {
        Self::Default
    }

    /// Returns a clock fixed at the given timestamp.
    #[must_use]
    pub fn fixed(at: DateTime<Utc>) -> Self {
        Self::Fixed(at)
    }

    /// Returns the current time according to the clock.
    #[must_use]
    pub fn now(&self) -> DateTime<Utc> {
        match self {
            Clock::Default => Utc::now(),
            Clock::Fixed(t) => *t,
        }
    }

    /// If this is a fixed clock, advance it by the given duration.
    ///
    /// Has no effect on `Clock::Default`.
    pub fn advance(&mut self, delta: Duration) {
        if let Clock::Fixed(t) = self {
            *t += delta;
        }
    }

    /// Returns a copy of this clock advanced by `delta` (fixed clocks only).
    #[must_use]
    pub fn advanced(mut self, delta: Duration) -> Self {
        self.advance(delta);
        self
    }
}

/// Whole seconds elapsed between `since` and `now`, rounded down.
///
/// A `now` earlier than `since` (clock skew) counts as zero elapsed.
#[must_use]
pub fn whole_seconds_between(since: DateTime<Utc>, now: DateTime<Utc>) -> u64 {
    let millis = (now - since).num_milliseconds();
    u64::try_from(millis).map_or(0, |ms| ms / 1000)
}

/// Epoch milliseconds, the unit the persisted session record uses.
#[must_use]
pub fn to_epoch_ms(at: DateTime<Utc>) -> i64 {
    at.timestamp_millis()
}

/// Inverse of [`to_epoch_ms`]; `None` if the value is out of range.
#[must_use]
pub fn from_epoch_ms(ms: i64) -> Option<DateTime<Utc>> {
    DateTime::<Utc>::from_timestamp_millis(ms)
}

/// Formats a remaining-time budget as `mm:ss` (minutes may exceed 59).
#[must_use]
pub fn format_remaining(secs: u32) -> String {
    format!("{:02}:{:02}", secs / 60, secs % 60)
}

/// Deterministic timestamp for tests and examples (2023-11-14T22:13:20Z).
pub const FIXED_TEST_TIMESTAMP: i64 = 1_700_000_000;

/// Returns a deterministic `DateTime<Utc>` for tests and doc examples.
///
/// # Panics
///
/// Panics if the fixed timestamp cannot be represented.
#[must_use]
pub fn fixed_now() -> DateTime<Utc> {
    DateTime::<Utc>::from_timestamp(FIXED_TEST_TIMESTAMP, 0)
        .expect("fixed timestamp should be valid")
}

/// Returns a `Clock` fixed at the deterministic test timestamp.
#[must_use]
pub fn fixed_clock() -> Clock {
    Clock::fixed(fixed_now())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn whole_seconds_round_down() {
        let start = fixed_now();
        let now = start + Duration::milliseconds(2_999);
        assert_eq!(whole_seconds_between(start, now), 2);
    }

    #[test]
    fn clock_skew_counts_as_zero() {
        let start = fixed_now();
        let now = start - Duration::seconds(5);
        assert_eq!(whole_seconds_between(start, now), 0);
    }

    #[test]
    fn epoch_ms_round_trip_keeps_millis() {
        let at = fixed_now() + Duration::milliseconds(123);
        assert_eq!(from_epoch_ms(to_epoch_ms(at)), Some(at));
    }

    #[test]
    fn remaining_is_formatted_as_minutes_and_seconds() {
        assert_eq!(format_remaining(120), "02:00");
        assert_eq!(format_remaining(59), "00:59");
        assert_eq!(format_remaining(3_725), "62:05");
    }

    #[test]
    fn advanced_leaves_default_clock_alone() {
        let clock = Clock::default_clock().advanced(Duration::seconds(10));
        assert!(matches!(clock, Clock::Default));
        let fixed = fixed_clock().advanced(Duration::seconds(10));
        assert_eq!(fixed.now(), fixed_now() + Duration::seconds(10));
    }
}
