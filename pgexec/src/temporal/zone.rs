use chrono::{DateTime, NaiveDateTime, Offset, TimeZone, offset::LocalResult};
use chrono_tz::Tz;
use std::{fmt, str::FromStr};

use super::calendar::SECS_PER_DAY;

/// Time zone used to render and read local date time values.
///
/// Fixed offsets take the fast path of a plain subtraction. Named zones
/// carry daylight saving rules, converting a local value back to an
/// instant have to look at the offset in effect at that wall clock time.
#[derive(Clone, Copy, PartialEq, Eq)]
pub enum Zone {
    /// Offset in seconds east of UTC.
    Fixed(i32),
    /// IANA time zone.
    Named(Tz),
}

impl Zone {
    pub const UTC: Zone = Zone::Fixed(0);

    /// Parse zone name.
    ///
    /// Accepts `UTC`, `GMT`, `Z`, numeric offsets (`+05:30`, `-08`,
    /// `GMT+01:00`) and IANA names (`Europe/Berlin`).
    pub fn parse(name: &str) -> Option<Zone> {
        let name = name.trim();
        match name {
            "UTC" | "GMT" | "Z" | "Etc/UTC" | "Etc/GMT" => return Some(Zone::UTC),
            _ => {}
        }
        let offset = name
            .strip_prefix("GMT")
            .or_else(|| name.strip_prefix("UTC"))
            .unwrap_or(name);
        if let Some(secs) = parse_offset(offset) {
            return Some(Zone::Fixed(secs));
        }
        Tz::from_str(name).ok().map(Zone::Named)
    }

    /// Returns `true` if zone has no daylight saving rules.
    pub fn is_fixed(&self) -> bool {
        matches!(self, Zone::Fixed(_))
    }

    /// Offset in seconds at the given instant.
    pub fn offset_at(&self, utc_secs: i64) -> i32 {
        match self {
            Zone::Fixed(offset) => *offset,
            Zone::Named(tz) => match naive(utc_secs) {
                Some(dt) => tz.offset_from_utc_datetime(&dt).fix().local_minus_utc(),
                None => 0,
            },
        }
    }

    /// Instant which shows the given local seconds when rendered in this zone.
    ///
    /// Ambiguous wall clock times (clock turned back) resolve to the later,
    /// standard time instant. Skipped wall clock times (clock turned forward)
    /// use the offset in effect before the transition, moving them forward.
    pub fn local_to_utc(&self, local_secs: i64) -> i64 {
        let tz = match self {
            Zone::Fixed(offset) => return local_secs - *offset as i64,
            Zone::Named(tz) => tz,
        };
        let Some(local) = naive(local_secs) else {
            return local_secs;
        };
        let offset = match tz.from_local_datetime(&local) {
            LocalResult::Single(dt) => dt.offset().fix().local_minus_utc(),
            LocalResult::Ambiguous(_, latest) => latest.offset().fix().local_minus_utc(),
            LocalResult::None => self.offset_at(local_secs - SECS_PER_DAY),
        };
        local_secs - offset as i64
    }

    /// Local seconds shown by the instant in this zone.
    pub fn utc_to_local(&self, utc_secs: i64) -> i64 {
        utc_secs + self.offset_at(utc_secs) as i64
    }
}

fn naive(secs: i64) -> Option<NaiveDateTime> {
    DateTime::from_timestamp(secs, 0).map(|dt| dt.naive_utc())
}

/// Parse `±hh[:mm[:ss]]` or `±hhmm`.
fn parse_offset(s: &str) -> Option<i32> {
    let (sign, rest) = match s.as_bytes().first()? {
        b'+' => (1, &s[1..]),
        b'-' => (-1, &s[1..]),
        _ => return None,
    };
    let mut parts = rest.split(':');
    let first = parts.next()?;
    let (hour, minute) = match (first.len(), parts.clone().next()) {
        (4, None) => (first[..2].parse::<i32>().ok()?, first[2..].parse::<i32>().ok()?),
        _ => (first.parse::<i32>().ok()?, parts.next().map_or(Some(0), |m| m.parse().ok())?),
    };
    let second = match parts.next() {
        Some(s) => s.parse::<i32>().ok()?,
        None => 0,
    };
    if hour > 15 || minute > 59 || second > 59 {
        return None;
    }
    Some(sign * (hour * 3600 + minute * 60 + second))
}

impl Default for Zone {
    fn default() -> Self {
        Zone::UTC
    }
}

impl FromStr for Zone {
    type Err = crate::error::ParseError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Zone::parse(s).ok_or_else(|| crate::error::ParseError::new(format!("unknown time zone {s:?}")))
    }
}

impl fmt::Display for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Zone::Fixed(0) => f.write_str("UTC"),
            Zone::Fixed(offset) => {
                let sign = if *offset < 0 { '-' } else { '+' };
                let abs = offset.unsigned_abs();
                write!(f, "GMT{sign}{:02}:{:02}", abs / 3600, abs / 60 % 60)?;
                match abs % 60 {
                    0 => Ok(()),
                    secs => write!(f, ":{secs:02}"),
                }
            }
            Zone::Named(tz) => f.write_str(tz.name()),
        }
    }
}

impl fmt::Debug for Zone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("Zone").field(&format_args!("{self}")).finish()
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn parse_names() {
        assert_eq!(Zone::parse("UTC"), Some(Zone::UTC));
        assert_eq!(Zone::parse("+05:30"), Some(Zone::Fixed(19_800)));
        assert_eq!(Zone::parse("GMT-08"), Some(Zone::Fixed(-28_800)));
        assert_eq!(Zone::parse("-0330"), Some(Zone::Fixed(-12_600)));
        assert_eq!(Zone::parse("Europe/Berlin"), Some(Zone::Named(Tz::Europe__Berlin)));
        assert_eq!(Zone::parse("Nowhere/Special"), None);
        assert_eq!(Zone::Fixed(19_800).to_string(), "GMT+05:30");
    }

    #[test]
    fn named_zone_dst_aware() {
        let zone = Zone::Named(Tz::America__New_York);
        // 2024-01-15 12:00:00 UTC, EST
        assert_eq!(zone.offset_at(1_705_320_000), -5 * 3600);
        // 2024-07-15 12:00:00 UTC, EDT
        assert_eq!(zone.offset_at(1_721_044_800), -4 * 3600);
        // 2024-07-15 08:00:00 local is 12:00:00 UTC
        assert_eq!(zone.local_to_utc(1_721_030_400), 1_721_044_800);
    }

    #[test]
    fn gap_and_overlap() {
        let zone = Zone::Named(Tz::America__New_York);
        // 2024-03-10 02:30 local does not exist, read as 03:30 EDT
        let local = 1_710_037_800;
        assert_eq!(zone.local_to_utc(local), local + 5 * 3600);
        // 2024-11-03 01:30 local happens twice, the standard time one wins
        let local = 1_730_597_400;
        assert_eq!(zone.local_to_utc(local), local + 5 * 3600);
    }
}
