use super::{
    Date, Time, Timestamp, Zone,
    DATE_NEGATIVE_INFINITY, DATE_NEGATIVE_SMALLER_INFINITY, DATE_POSITIVE_INFINITY,
    DATE_POSITIVE_SMALLER_INFINITY,
    calendar::{self, CivilDate, Fields, MILLIS_PER_DAY, SECS_PER_DAY},
};
use crate::{Error, Result, ext::SliceExt};

/// Session scoped temporal codec.
///
/// Server capabilities decide two details of the wire format: whether
/// offsets carry seconds (`min82`) and whether binary temporal values
/// are floating point seconds instead of integer microseconds
/// (`uses_double`).
#[derive(Debug, Clone)]
pub struct TimestampUtils {
    min82: bool,
    uses_double: bool,
    default_zone: Zone,
}

impl Default for TimestampUtils {
    fn default() -> Self {
        Self { min82: true, uses_double: false, default_zone: Zone::UTC }
    }
}

/// Largest year the server accepts in timestamp text.
const MAX_YEAR: i64 = 294_276;

#[derive(Debug, Default)]
struct Parsed {
    has_date: bool,
    bc: bool,
    year: i64,
    month: u32,
    day: u32,
    has_time: bool,
    hour: u32,
    minute: u32,
    second: u32,
    nanos: u32,
    zone: Option<Zone>,
}

impl Parsed {
    fn date(&self) -> CivilDate {
        match self.has_date {
            true if self.bc => CivilDate::new(1 - self.year, self.month, self.day),
            true => CivilDate::new(self.year, self.month, self.day),
            false => CivilDate::new(1970, 1, 1),
        }
    }

    fn local_secs(&self) -> i64 {
        Fields {
            date: self.date(),
            hour: self.hour,
            minute: self.minute,
            second: self.second,
            nanos: self.nanos,
        }
        .local_secs()
    }

    fn time_millis(&self) -> i64 {
        (self.hour as i64 * 3600 + self.minute as i64 * 60 + self.second as i64) * 1000
            + ((self.nanos + 500_000) / 1_000_000) as i64
    }
}

/// Instant of the given local milliseconds in `zone`.
fn instant_millis(zone: &Zone, local_millis: i64) -> i64 {
    zone.local_to_utc(local_millis.div_euclid(1000)) * 1000 + local_millis.rem_euclid(1000)
}

fn local_millis(zone: &Zone, millis: i64) -> i64 {
    zone.utc_to_local(millis.div_euclid(1000)) * 1000 + millis.rem_euclid(1000)
}

struct Scanner<'a> {
    s: &'a [u8],
    pos: usize,
}

impl Scanner<'_> {
    fn peek(&self) -> u8 {
        self.s.get(self.pos).copied().unwrap_or(b'\0')
    }

    fn skip_whitespace(&mut self) {
        while self.peek().is_ascii_whitespace() {
            self.pos += 1;
        }
    }

    fn number(&mut self) -> Option<i64> {
        let start = self.pos;
        let mut n = 0i64;
        while self.peek().is_ascii_digit() {
            n = n.checked_mul(10)?.checked_add((self.peek() - b'0') as i64)?;
            self.pos += 1;
        }
        (self.pos > start).then_some(n)
    }

    fn expect(&mut self, sep: u8) -> Option<()> {
        (self.peek() == sep).then(|| self.pos += 1)
    }

    /// Returns `true` if the next number is followed by a dash.
    fn at_date(&self) -> bool {
        let rest = &self.s[self.pos..];
        let digits = rest.iter().take_while(|b| b.is_ascii_digit()).count();
        rest.get(digits) == Some(&b'-')
    }
}

impl TimestampUtils {
    pub fn new(min82: bool, uses_double: bool, default_zone: Zone) -> Self {
        Self { min82, uses_double, default_zone }
    }

    pub fn uses_double(&self) -> bool {
        self.uses_double
    }

    pub fn default_zone(&self) -> &Zone {
        &self.default_zone
    }

    fn zone<'a>(&'a self, zone: Option<&'a Zone>) -> &'a Zone {
        zone.unwrap_or(&self.default_zone)
    }

    /// Walk `[date] [time[.frac]] [±hh[:mm[:ss]]] [AD|BC]`.
    fn load(&self, s: &str, ty: &str) -> Result<Parsed> {
        self.load_inner(s)
            .ok_or_else(|| Error::parse(format!("Bad value for type {ty} : {s}")))
    }

    fn load_inner(&self, s: &str) -> Option<Parsed> {
        let mut p = Parsed { month: 1, day: 1, year: 1970, ..Default::default() };
        let mut sc = Scanner { s: s.as_bytes(), pos: 0 };

        sc.skip_whitespace();

        if sc.at_date() {
            p.has_date = true;
            p.year = sc.number().filter(|&y| y <= MAX_YEAR)?;
            sc.expect(b'-')?;
            p.month = u32::try_from(sc.number()?).ok()?;
            sc.expect(b'-')?;
            p.day = u32::try_from(sc.number()?).ok()?;
            sc.skip_whitespace();
        }

        if sc.peek().is_ascii_digit() {
            p.has_time = true;
            p.hour = u32::try_from(sc.number()?).ok()?;
            sc.expect(b':')?;
            p.minute = u32::try_from(sc.number()?).ok()?;
            sc.expect(b':')?;
            p.second = u32::try_from(sc.number()?).ok()?;

            if sc.peek() == b'.' {
                sc.pos += 1;
                let start = sc.pos;
                while sc.peek().is_ascii_digit() {
                    sc.pos += 1;
                }
                let digits = &s[start..sc.pos];
                if digits.is_empty() {
                    return None;
                }
                // pad or cut to nanosecond precision
                p.nanos = digits
                    .bytes()
                    .chain(std::iter::repeat(b'0'))
                    .take(9)
                    .fold(0, |n, b| n * 10 + (b - b'0') as u32);
            }

            sc.skip_whitespace();
        }

        if matches!(sc.peek(), b'+' | b'-') {
            let sign = if sc.peek() == b'-' { -1 } else { 1 };
            sc.pos += 1;
            let hour = sc.number()?;
            let mut minute = 0;
            let mut second = 0;
            if sc.peek() == b':' {
                sc.pos += 1;
                minute = sc.number()?;
            }
            if self.min82 && sc.peek() == b':' {
                sc.pos += 1;
                second = sc.number()?;
            }
            let offset = hour
                .checked_mul(3600)
                .and_then(|h| h.checked_add(minute.checked_mul(60)?))
                .and_then(|o| o.checked_add(second))
                .and_then(|o| i32::try_from(o).ok())?;
            p.zone = Some(Zone::Fixed(sign * offset));
            sc.skip_whitespace();
        }

        if p.has_date && sc.pos < sc.s.len() {
            match &sc.s[sc.pos..] {
                rest if rest.starts_with(b"AD") => sc.pos += 2,
                rest if rest.starts_with(b"BC") => {
                    p.bc = true;
                    sc.pos += 2;
                }
                _ => {}
            }
        }

        if sc.pos < sc.s.len() || (!p.has_date && !p.has_time) {
            return None;
        }

        Some(p)
    }

    /// Parse a server timestamp text.
    ///
    /// Values without explicit offset are read in `zone`.
    pub fn to_timestamp(&self, zone: Option<&Zone>, s: &str) -> Result<Timestamp> {
        match s {
            "infinity" => return Ok(Timestamp::INFINITY),
            "-infinity" => return Ok(Timestamp::NEG_INFINITY),
            _ => {}
        }
        let p = self.load(s, "timestamp")?;
        let zone = p.zone.as_ref().unwrap_or(self.zone(zone));
        Ok(Timestamp::new(zone.local_to_utc(p.local_secs()), p.nanos))
    }

    /// Parse a server time text, the result is an instant on 1970-01-01.
    pub fn to_time(&self, zone: Option<&Zone>, s: &str) -> Result<Time> {
        if matches!(s, "infinity" | "-infinity") {
            return Err(Error::range(
                "Infinite value found for timestamp/date. This cannot be represented as time.",
            ));
        }
        let p = self.load(s, "time")?;
        let requested = self.zone(zone);
        let zone = p.zone.as_ref().unwrap_or(requested);

        if !p.has_date {
            return Ok(Time::from_millis(instant_millis(zone, p.time_millis())));
        }

        // rotate into the requested zone before dropping the date
        let days = calendar::hybrid_days(p.date());
        let instant = instant_millis(zone, days * MILLIS_PER_DAY + p.time_millis());
        let tod = local_millis(requested, instant).rem_euclid(MILLIS_PER_DAY);
        Ok(Time::from_millis(instant_millis(requested, tod)))
    }

    /// Parse a server date text, the result is the instant of local midnight.
    pub fn to_date(&self, zone: Option<&Zone>, s: &str) -> Result<Date> {
        match s {
            "infinity" => return Ok(Date::INFINITY),
            "-infinity" => return Ok(Date::NEG_INFINITY),
            _ => {}
        }
        let p = self.load(s, "date")?;
        let requested = self.zone(zone);
        let zone = p.zone.as_ref().unwrap_or(requested);
        let days = calendar::hybrid_days(p.date());

        if !p.has_time {
            return Ok(Date::from_millis(zone.local_to_utc(days * SECS_PER_DAY) * 1000));
        }

        // rotate into the requested zone before dropping the time
        let instant = instant_millis(zone, days * MILLIS_PER_DAY + p.time_millis());
        let day = local_millis(requested, instant).div_euclid(MILLIS_PER_DAY);
        Ok(Date::from_millis(requested.local_to_utc(day * SECS_PER_DAY) * 1000))
    }

    /// Render timestamp as `yyyy-mm-dd hh:mm:ss.ffffff ±hh:mm[:ss][ BC]`.
    pub fn timestamp_to_string(&self, zone: Option<&Zone>, ts: &Timestamp) -> String {
        if ts.millis() == DATE_POSITIVE_INFINITY {
            return "infinity".into();
        }
        if ts.millis() == DATE_NEGATIVE_INFINITY {
            return "-infinity".into();
        }
        let zone = self.zone(zone);
        let fields = Fields::from_local_secs(zone.utc_to_local(ts.secs()), ts.nanos());

        let mut out = String::with_capacity(40);
        append_date(&mut out, &fields.date);
        out.push(' ');
        append_time(&mut out, &fields);
        self.append_zone(&mut out, zone.offset_at(ts.secs()));
        append_era(&mut out, &fields.date);
        out
    }

    /// Render date as `yyyy-mm-dd[ BC] ±hh:mm[:ss]`.
    pub fn date_to_string(&self, zone: Option<&Zone>, date: &Date) -> String {
        match date.millis() {
            DATE_POSITIVE_INFINITY => return "infinity".into(),
            DATE_NEGATIVE_INFINITY => return "-infinity".into(),
            _ => {}
        }
        let zone = self.zone(zone);
        let secs = date.millis().div_euclid(1000);
        let fields = Fields::from_local_secs(zone.utc_to_local(secs), 0);

        let mut out = String::with_capacity(24);
        append_date(&mut out, &fields.date);
        append_era(&mut out, &fields.date);
        self.append_zone(&mut out, zone.offset_at(secs));
        out
    }

    /// Render time as `hh:mm:ss.ffffff ±hh:mm[:ss]`.
    pub fn time_to_string(&self, zone: Option<&Zone>, time: &Time) -> String {
        let zone = self.zone(zone);
        let secs = time.millis().div_euclid(1000);
        let nanos = (time.millis().rem_euclid(1000) * 1_000_000) as u32;
        let fields = Fields::from_local_secs(zone.utc_to_local(secs), nanos);

        let mut out = String::with_capacity(24);
        append_time(&mut out, &fields);
        self.append_zone(&mut out, zone.offset_at(secs));
        out
    }

    fn append_zone(&self, out: &mut String, offset: i32) {
        use std::fmt::Write;
        let abs = offset.unsigned_abs();
        let sign = if offset >= 0 { '+' } else { '-' };
        let _ = write!(out, " {sign}{:02}:{:02}", abs / 3600, abs / 60 % 60);
        if self.min82 {
            let _ = write!(out, ":{:02}", abs % 60);
        }
    }

    /// Decode binary `date`, a 4 byte day count since 2000-01-01.
    pub fn to_date_bin(&self, zone: Option<&Zone>, bytes: &[u8]) -> Result<Date> {
        if bytes.len() != 4 {
            return Err(Error::parse("Unsupported binary encoding of date."));
        }
        let days = bytes.be_i32(0)?;
        match days {
            i32::MAX => return Ok(Date::INFINITY),
            i32::MIN => return Ok(Date::NEG_INFINITY),
            _ => {}
        }
        let secs = calendar::to_java_secs(days as i64 * SECS_PER_DAY);
        let millis = secs * 1000;
        if millis <= DATE_NEGATIVE_SMALLER_INFINITY {
            return Ok(Date::NEG_INFINITY);
        }
        if millis >= DATE_POSITIVE_SMALLER_INFINITY {
            return Ok(Date::INFINITY);
        }
        Ok(Date::from_millis(self.zone(zone).local_to_utc(secs) * 1000))
    }

    /// Decode binary `time` (8 bytes) or `timetz` (12 bytes, trailing
    /// offset in seconds west of UTC).
    pub fn to_time_bin(&self, zone: Option<&Zone>, bytes: &[u8]) -> Result<Time> {
        if bytes.len() != 8 && bytes.len() != 12 {
            return Err(Error::parse("Unsupported binary encoding of time."));
        }
        let millis = match self.uses_double {
            true => (bytes.be_f64(0)? * 1000.0) as i64,
            false => bytes.be_i64(0)? / 1000,
        };
        if bytes.len() == 12 {
            let offset = -(bytes.be_i32(8)? as i64) * 1000;
            return Ok(Time::from_millis(millis - offset));
        }
        Ok(Time::from_millis(instant_millis(self.zone(zone), millis)))
    }

    /// Decode binary `timestamp` or `timestamptz`.
    ///
    /// `timestamptz` values are already UTC, plain `timestamp` values are
    /// read as wall clock time in `zone`.
    pub fn to_timestamp_bin(&self, zone: Option<&Zone>, bytes: &[u8], timestamptz: bool) -> Result<Timestamp> {
        if bytes.len() != 8 {
            return Err(Error::parse("Unsupported binary encoding of timestamp."));
        }

        let (secs, nanos) = match self.uses_double {
            true => {
                let time = bytes.be_f64(0)?;
                if time == f64::INFINITY {
                    return Ok(Timestamp::INFINITY);
                }
                if time == f64::NEG_INFINITY {
                    return Ok(Timestamp::NEG_INFINITY);
                }
                let secs = time.floor();
                let micros = (((time - secs) * 1_000_000.0).round() as u32).min(999_999);
                (secs as i64, micros * 1000)
            }
            false => {
                let time = bytes.be_i64(0)?;
                match time {
                    i64::MAX => return Ok(Timestamp::INFINITY),
                    i64::MIN => return Ok(Timestamp::NEG_INFINITY),
                    _ => {}
                }
                (time.div_euclid(1_000_000), time.rem_euclid(1_000_000) as u32 * 1000)
            }
        };

        let secs = calendar::to_java_secs(secs);
        let secs = match timestamptz {
            true => secs,
            false => self.zone(zone).local_to_utc(secs),
        };
        Ok(Timestamp::new(secs, nanos))
    }

    /// Encode binary `date`.
    pub fn to_bin_date(&self, zone: Option<&Zone>, date: &Date) -> Result<[u8; 4]> {
        let days = match date.millis() {
            DATE_POSITIVE_INFINITY => i32::MAX,
            DATE_NEGATIVE_INFINITY => i32::MIN,
            millis => {
                let local = self.zone(zone).utc_to_local(millis.div_euclid(1000));
                let days = calendar::to_pg_secs(local).div_euclid(SECS_PER_DAY);
                i32::try_from(days).map_err(|_| Error::range("date out of range"))?
            }
        };
        Ok(days.to_be_bytes())
    }

    /// Encode binary `timestamp` or `timestamptz`.
    pub fn to_bin_timestamp(&self, zone: Option<&Zone>, ts: &Timestamp, timestamptz: bool) -> Result<[u8; 8]> {
        if ts.is_infinity() || ts.is_neg_infinity() {
            return Ok(match (self.uses_double, ts.is_infinity()) {
                (true, true) => f64::INFINITY.to_be_bytes(),
                (true, false) => f64::NEG_INFINITY.to_be_bytes(),
                (false, true) => i64::MAX.to_be_bytes(),
                (false, false) => i64::MIN.to_be_bytes(),
            });
        }
        let secs = match timestamptz {
            true => ts.secs(),
            false => self.zone(zone).utc_to_local(ts.secs()),
        };
        let secs = calendar::to_pg_secs(secs);
        let micros = (ts.nanos() / 1000) as i64;

        if self.uses_double {
            return Ok((secs as f64 + micros as f64 / 1_000_000.0).to_be_bytes());
        }
        secs.checked_mul(1_000_000)
            .and_then(|s| s.checked_add(micros))
            .map(i64::to_be_bytes)
            .ok_or_else(|| Error::range("timestamp out of range"))
    }

    /// Date part of a timestamp, truncated at local midnight in `zone`.
    pub fn convert_to_date(&self, ts: &Timestamp, zone: Option<&Zone>) -> Date {
        let millis = ts.millis();
        if millis <= DATE_NEGATIVE_INFINITY || millis >= DATE_POSITIVE_INFINITY {
            return Date::from_millis(millis);
        }
        let zone = self.zone(zone);
        let day = local_millis(zone, millis).div_euclid(MILLIS_PER_DAY);
        Date::from_millis(zone.local_to_utc(day * SECS_PER_DAY) * 1000)
    }

    /// Time part of a timestamp as shown in `zone`, moved to 1970-01-01.
    pub fn convert_to_time(&self, ts: &Timestamp, zone: Option<&Zone>) -> Result<Time> {
        if !ts.is_finite() {
            return Err(Error::range(
                "Infinite value found for timestamp/date. This cannot be represented as time.",
            ));
        }
        let zone = self.zone(zone);
        let tod = local_millis(zone, ts.millis()).rem_euclid(MILLIS_PER_DAY);
        Ok(Time::from_millis(instant_millis(zone, tod)))
    }
}

fn append_date(out: &mut String, date: &CivilDate) {
    use std::fmt::Write;
    let (_, year) = date.era_year();
    let _ = write!(out, "{year:04}-{:02}-{:02}", date.month, date.day);
}

fn append_time(out: &mut String, fields: &Fields) {
    use std::fmt::Write;
    let _ = write!(
        out,
        "{:02}:{:02}:{:02}.{:06}",
        fields.hour,
        fields.minute,
        fields.second,
        fields.nanos / 1000,
    );
}

fn append_era(out: &mut String, date: &CivilDate) {
    if date.era_year().0 {
        out.push_str(" BC");
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use chrono_tz::Tz;

    fn utils() -> TimestampUtils {
        TimestampUtils::default()
    }

    #[test]
    fn text_timestamp_with_offset() {
        let ts = utils().to_timestamp(None, "2024-07-15 12:34:56.123456+02").unwrap();
        assert_eq!(ts.secs(), 1_721_039_696);
        assert_eq!(ts.nanos(), 123_456_000);
        assert_eq!(
            utils().timestamp_to_string(None, &ts),
            "2024-07-15 10:34:56.123456 +00:00:00"
        );
    }

    #[test]
    fn text_infinity_round_trip() {
        let u = utils();
        let ts = u.to_timestamp(None, "infinity").unwrap();
        assert_eq!(ts, Timestamp::INFINITY);
        assert_eq!(ts.millis(), DATE_POSITIVE_INFINITY);
        assert_eq!(u.timestamp_to_string(None, &ts), "infinity");

        let ts = u.to_timestamp(None, "-infinity").unwrap();
        assert_eq!(ts.millis(), DATE_NEGATIVE_INFINITY);
        assert_eq!(u.timestamp_to_string(None, &ts), "-infinity");

        let date = u.to_date(None, "infinity").unwrap();
        assert_eq!(u.date_to_string(None, &date), "infinity");
        assert!(u.to_time(None, "-infinity").is_err());
    }

    #[test]
    fn text_bc_round_trip() {
        let u = utils();
        let text = "0044-03-15 00:00:00.000000 +00:00:00 BC";
        let ts = u.to_timestamp(None, text).unwrap();
        assert_eq!(u.timestamp_to_string(None, &ts), text);
    }

    #[test]
    fn text_offset_seconds_need_min82() {
        let old = TimestampUtils::new(false, false, Zone::UTC);
        assert!(old.to_timestamp(None, "2024-01-01 00:00:00+01:00:30").is_err());
        let new = utils();
        let ts = new.to_timestamp(None, "2024-01-01 00:00:00+01:00:30").unwrap();
        assert_eq!(ts.secs(), 1_704_067_200 - 3630);
    }

    #[test]
    fn text_bad_values() {
        let u = utils();
        for bad in ["", "hello", "2024-13", "2024-01-01 junk", "12:30", "2024-01-01 12:00:00 BC BC"] {
            let err = u.to_timestamp(None, bad).unwrap_err();
            assert!(matches!(err.kind(), crate::error::ErrorKind::Parse(_)), "{bad}");
        }
        let err = u.to_timestamp(None, "hello").unwrap_err();
        assert!(err.to_string().contains("Bad value for type timestamp : hello"));
    }

    #[test]
    fn text_out_of_range_fields() {
        let u = utils();
        for bad in [
            "999999999999-01-01 00:00:00",
            "294277-01-01",
            "2024-01-01 00:00:00+9999999999999999",
        ] {
            let err = u.to_timestamp(None, bad).unwrap_err();
            assert!(matches!(err.kind(), crate::error::ErrorKind::Parse(_)), "{bad}");
        }
        let err = u.to_date(None, "999999999999-01-01").unwrap_err();
        assert!(err.to_string().contains("Bad value for type date : 999999999999-01-01"));
        assert!(u.to_timestamp(None, "294276-12-31 23:59:59").is_ok());
    }

    #[test]
    fn text_time_and_date() {
        let u = utils();
        assert_eq!(u.to_time(None, "12:34:56").unwrap().millis(), 45_296_000);
        assert_eq!(u.to_time(None, "12:34:56+01").unwrap().millis(), 41_696_000);
        assert_eq!(u.to_time(None, "00:00:00.0005").unwrap().millis(), 1);
        // 1999-12-31 23:00 -01 is 2000-01-01 00:00 UTC
        let date = u.to_date(None, "1999-12-31 23:00:00-01").unwrap();
        assert_eq!(date.millis(), 946_684_800_000);
        assert_eq!(u.to_date(None, "1999-12-31").unwrap().millis(), 946_598_400_000);
    }

    #[test]
    fn plain_timestamp_follows_dst() {
        let zone = Zone::Named(Tz::America__New_York);
        let ts = utils().to_timestamp(Some(&zone), "2024-03-10 02:30:00").unwrap();
        assert_eq!(ts.secs(), 1_710_055_800);
    }

    #[test]
    fn binary_timestamp_vectors() {
        let u = utils();
        let ts = u.to_timestamp_bin(None, &0i64.to_be_bytes(), true).unwrap();
        assert_eq!(ts.secs(), 946_684_800);

        // 1582-10-04 12:00:00 on both sides of the cutover
        let micros = (-13_166_928_000i64 + 43_200) * 1_000_000;
        let ts = u.to_timestamp_bin(None, &micros.to_be_bytes(), true).unwrap();
        assert_eq!(ts.secs(), -12_219_379_200 + 43_200);
        assert_eq!(u.to_bin_timestamp(None, &ts, true).unwrap(), micros.to_be_bytes());

        assert_eq!(u.to_timestamp_bin(None, &i64::MAX.to_be_bytes(), true).unwrap(), Timestamp::INFINITY);
        assert_eq!(u.to_bin_timestamp(None, &Timestamp::NEG_INFINITY, true).unwrap(), i64::MIN.to_be_bytes());
        assert!(u.to_timestamp_bin(None, &[0; 4], true).is_err());
    }

    #[test]
    fn binary_timestamp_round_trip() {
        let zone = Zone::Named(Tz::Europe__Berlin);
        let values = [
            Timestamp::new(1_721_039_696, 123_456_000),
            Timestamp::new(0, 0),
            Timestamp::new(-12_219_292_800, 1_000),
            Timestamp::new(-17_972_409_600 + 45_296, 999_999_000),
            Timestamp::new(-63_000_000_000, 0),
        ];
        for double in [false, true] {
            let u = TimestampUtils::new(true, double, zone);
            // floating point seconds lose microseconds far from 2000-01-01
            let values = values.iter().filter(|ts| !double || ts.nanos() == 0 || ts.secs().abs() < 2_000_000_000);
            for &ts in values {
                for tz in [false, true] {
                    let bin = u.to_bin_timestamp(None, &ts, tz).unwrap();
                    assert_eq!(u.to_timestamp_bin(None, &bin, tz).unwrap(), ts, "{ts:?} {tz} {double}");
                }
            }
        }
    }

    #[test]
    fn binary_date() {
        let u = utils();
        assert_eq!(u.to_date_bin(None, &0i32.to_be_bytes()).unwrap().millis(), 946_684_800_000);
        assert_eq!(u.to_date_bin(None, &i32::MAX.to_be_bytes()).unwrap(), Date::INFINITY);
        assert_eq!(u.to_date_bin(None, &i32::MIN.to_be_bytes()).unwrap(), Date::NEG_INFINITY);
        assert_eq!(u.to_bin_date(None, &Date::INFINITY).unwrap(), i32::MAX.to_be_bytes());

        let zone = Zone::Fixed(-8 * 3600);
        let date = u.to_date(Some(&zone), "1400-06-15").unwrap();
        let bin = u.to_bin_date(Some(&zone), &date).unwrap();
        assert_eq!(u.to_date_bin(Some(&zone), &bin).unwrap(), date);
    }

    #[test]
    fn binary_time() {
        let u = utils();
        let micros = 45_296_000_000i64;
        assert_eq!(u.to_time_bin(None, &micros.to_be_bytes()).unwrap().millis(), 45_296_000);

        // 12:34:56-01, the server sends the offset west of UTC
        let mut bytes = micros.to_be_bytes().to_vec();
        bytes.extend_from_slice(&3600i32.to_be_bytes());
        assert_eq!(u.to_time_bin(None, &bytes).unwrap().millis(), 45_296_000 + 3_600_000);
    }

    #[test]
    fn convert_uses_target_zone() {
        let u = utils();
        let ts = Timestamp::new(1_721_086_200, 0);
        let zone = Zone::Fixed(2 * 3600);
        assert_eq!(u.convert_to_date(&ts, Some(&zone)).millis(), 1_721_080_800_000);
        // 01:30 local
        let time = u.convert_to_time(&ts, Some(&zone)).unwrap();
        assert_eq!(time.millis(), 5_400_000 - 7_200_000);
        assert!(u.convert_to_time(&Timestamp::INFINITY, None).is_err());
        assert_eq!(u.convert_to_date(&Timestamp::INFINITY, None), Date::INFINITY);
    }
}
