//! Date and time values.
//!
//! Values are instants counted from 1970-01-01 UTC, the same way the
//! driver API exposes them, rendered with the hybrid Julian/Gregorian
//! calendar. Server values are converted by [`TimestampUtils`].
//!
//! Unbounded server values (`infinity`, `-infinity`) are represented by
//! reserved out of range millisecond values and survive a round trip in
//! both text and binary form.
use std::fmt;

pub mod calendar;
mod zone;
mod utils;

pub use zone::Zone;
pub use utils::TimestampUtils;
pub use calendar::{to_java_secs, to_pg_secs};

/// Millisecond value of the positive infinity sentinel.
pub const DATE_POSITIVE_INFINITY: i64 = 9_223_372_036_825_200_000;
/// Millisecond value of the negative infinity sentinel.
pub const DATE_NEGATIVE_INFINITY: i64 = -9_223_372_036_832_400_000;
/// Dates at or after this millisecond value are read as positive infinity.
pub const DATE_POSITIVE_SMALLER_INFINITY: i64 = 185_543_533_774_800_000;
/// Dates at or before this millisecond value are read as negative infinity.
pub const DATE_NEGATIVE_SMALLER_INFINITY: i64 = -185_543_533_774_800_000;

/// An instant with nanosecond precision.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Timestamp {
    secs: i64,
    nanos: u32,
}

impl Timestamp {
    pub const INFINITY: Timestamp = Timestamp { secs: DATE_POSITIVE_INFINITY / 1000, nanos: 0 };
    pub const NEG_INFINITY: Timestamp = Timestamp { secs: DATE_NEGATIVE_INFINITY / 1000, nanos: 0 };

    /// Create timestamp from seconds since 1970-01-01 UTC and nanoseconds.
    ///
    /// Nanoseconds above one second carry into `secs`.
    pub const fn new(secs: i64, nanos: u32) -> Timestamp {
        Timestamp {
            secs: secs + (nanos / 1_000_000_000) as i64,
            nanos: nanos % 1_000_000_000,
        }
    }

    pub const fn from_millis(millis: i64) -> Timestamp {
        Timestamp {
            secs: millis.div_euclid(1000),
            nanos: (millis.rem_euclid(1000) * 1_000_000) as u32,
        }
    }

    pub const fn secs(&self) -> i64 {
        self.secs
    }

    pub const fn nanos(&self) -> u32 {
        self.nanos
    }

    /// Milliseconds since 1970-01-01 UTC.
    pub const fn millis(&self) -> i64 {
        self.secs * 1000 + (self.nanos / 1_000_000) as i64
    }

    pub const fn is_infinity(&self) -> bool {
        self.secs == Self::INFINITY.secs && self.nanos == 0
    }

    pub const fn is_neg_infinity(&self) -> bool {
        self.secs == Self::NEG_INFINITY.secs && self.nanos == 0
    }

    pub const fn is_finite(&self) -> bool {
        !self.is_infinity() && !self.is_neg_infinity()
    }
}

impl fmt::Debug for Timestamp {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (self.is_infinity(), self.is_neg_infinity()) {
            (true, _) => f.write_str("Timestamp(infinity)"),
            (_, true) => f.write_str("Timestamp(-infinity)"),
            _ => f.write_str(&TimestampUtils::default().timestamp_to_string(Some(&Zone::UTC), self)),
        }
    }
}

/// A calendar date, stored as the instant of its local midnight.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Date {
    millis: i64,
}

impl Date {
    pub const INFINITY: Date = Date { millis: DATE_POSITIVE_INFINITY };
    pub const NEG_INFINITY: Date = Date { millis: DATE_NEGATIVE_INFINITY };

    pub const fn from_millis(millis: i64) -> Date {
        Date { millis }
    }

    pub const fn millis(&self) -> i64 {
        self.millis
    }

    pub const fn is_finite(&self) -> bool {
        self.millis != DATE_POSITIVE_INFINITY && self.millis != DATE_NEGATIVE_INFINITY
    }
}

impl fmt::Debug for Date {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Date({})", TimestampUtils::default().date_to_string(Some(&Zone::UTC), self))
    }
}

/// A time of day, stored as an instant on 1970-01-01.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Time {
    millis: i64,
}

impl Time {
    pub const fn from_millis(millis: i64) -> Time {
        Time { millis }
    }

    pub const fn millis(&self) -> i64 {
        self.millis
    }
}

impl fmt::Debug for Time {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Time({})", TimestampUtils::default().time_to_string(Some(&Zone::UTC), self))
    }
}
