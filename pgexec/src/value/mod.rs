//! Decoded column values.
//!
//! A column is decoded once by the codec selected for its [`Type`] and
//! [`PgFormat`][crate::postgres::PgFormat], see [`decoder`]. The resulting
//! [`Value`] then converts to the scalar the caller asked for, with the
//! same leniency the driver getters have: text numerals are trimmed,
//! integers read from fractional text are truncated, narrowing is range
//! checked.
use bytes::Bytes;
use std::fmt;

use crate::{
    Error, Result,
    temporal::{Date, Time, Timestamp, TimestampUtils, Zone},
};

mod codec;
mod numeric;

pub(crate) use codec::{DecodeFn, decoder, parse_bool};
pub(crate) use codec::{date_in, time_in, timestamp_in};

/// A decoded column value.
#[derive(Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int2(i16),
    Int4(i32),
    Int8(i64),
    Float4(f32),
    Float8(f64),
    /// Exact decimal text, `NaN` included.
    Numeric(String),
    Money(f64),
    Text(String),
    Bytes(Bytes),
    Date(Date),
    Time(Time),
    Timestamp(Timestamp),
    /// Binary payload of a type the codec does not know.
    Other(Bytes),
}

impl Value {
    /// Returns `true` if value is `NULL`.
    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    /// Name of the variant, used in conversion errors.
    pub fn kind(&self) -> &'static str {
        match self {
            Value::Null => "null",
            Value::Bool(_) => "boolean",
            Value::Int2(_) => "smallint",
            Value::Int4(_) => "integer",
            Value::Int8(_) => "bigint",
            Value::Float4(_) => "real",
            Value::Float8(_) => "double precision",
            Value::Numeric(_) => "numeric",
            Value::Money(_) => "money",
            Value::Text(_) => "text",
            Value::Bytes(_) => "bytea",
            Value::Date(_) => "date",
            Value::Time(_) => "time",
            Value::Timestamp(_) => "timestamp",
            Value::Other(_) => "other",
        }
    }

    fn mismatch(&self, target: &str) -> Error {
        Error::mismatch(format!(
            "Cannot convert the column of type {} to requested type {target}.",
            self.kind()
        ))
    }

    pub fn to_bool(&self) -> Result<bool> {
        let int = match self {
            Value::Bool(b) => return Ok(*b),
            Value::Text(s) | Value::Numeric(s) => {
                return parse_bool(s)
                    .ok_or_else(|| Error::parse(format!("Cannot cast to boolean: \"{s}\"")));
            }
            Value::Int2(n) => *n as f64,
            Value::Int4(n) => *n as f64,
            Value::Int8(n) => *n as f64,
            Value::Float4(n) => *n as f64,
            Value::Float8(n) | Value::Money(n) => *n,
            _ => return Err(self.mismatch("boolean")),
        };
        if int == 1.0 {
            Ok(true)
        } else if int == 0.0 {
            Ok(false)
        } else {
            Err(Error::parse(format!("Cannot cast to boolean: \"{int}\"")))
        }
    }

    pub fn to_i16(&self) -> Result<i16> {
        let n = self.to_i64_named("smallint")?;
        i16::try_from(n).map_err(|_| out_of_range("smallint", n))
    }

    pub fn to_i32(&self) -> Result<i32> {
        let n = self.to_i64_named("int")?;
        i32::try_from(n).map_err(|_| out_of_range("int", n))
    }

    pub fn to_i64(&self) -> Result<i64> {
        self.to_i64_named("long")
    }

    fn to_i64_named(&self, ty: &str) -> Result<i64> {
        match self {
            Value::Bool(b) => Ok(*b as i64),
            Value::Int2(n) => Ok(*n as i64),
            Value::Int4(n) => Ok(*n as i64),
            Value::Int8(n) => Ok(*n),
            Value::Float4(n) => float_to_i64(*n as f64, ty),
            Value::Float8(n) | Value::Money(n) => float_to_i64(*n, ty),
            Value::Text(s) | Value::Numeric(s) => parse_integer(s, ty),
            _ => Err(self.mismatch(ty)),
        }
    }

    pub fn to_f32(&self) -> Result<f32> {
        match self {
            Value::Float4(n) => Ok(*n),
            _ => self.to_f64_named("float").map(|n| n as f32),
        }
    }

    pub fn to_f64(&self) -> Result<f64> {
        self.to_f64_named("double")
    }

    fn to_f64_named(&self, ty: &str) -> Result<f64> {
        match self {
            Value::Bool(b) => Ok(*b as i64 as f64),
            Value::Int2(n) => Ok(*n as f64),
            Value::Int4(n) => Ok(*n as f64),
            Value::Int8(n) => Ok(*n as f64),
            Value::Float4(n) => Ok(*n as f64),
            Value::Float8(n) | Value::Money(n) => Ok(*n),
            Value::Text(s) | Value::Numeric(s) => parse_float(s, ty),
            _ => Err(self.mismatch(ty)),
        }
    }

    /// Exact decimal text of a numeric value.
    pub fn to_numeric(&self) -> Result<String> {
        match self {
            Value::Numeric(s) => Ok(s.clone()),
            Value::Int2(n) => Ok(itoa::Buffer::new().format(*n).to_owned()),
            Value::Int4(n) => Ok(itoa::Buffer::new().format(*n).to_owned()),
            Value::Int8(n) => Ok(itoa::Buffer::new().format(*n).to_owned()),
            Value::Float4(n) => Ok(n.to_string()),
            Value::Float8(n) | Value::Money(n) => Ok(n.to_string()),
            Value::Text(s) => {
                let s = s.trim();
                parse_float(s, "BigDecimal")?;
                Ok(s.to_owned())
            }
            _ => Err(self.mismatch("numeric")),
        }
    }

    /// Text form of the value, temporal values are rendered in UTC.
    pub fn to_text(&self) -> Result<String> {
        self.render(&TimestampUtils::default(), None)
    }

    /// Text form of the value, temporal values are rendered in `zone`.
    pub fn render(&self, utils: &TimestampUtils, zone: Option<&Zone>) -> Result<String> {
        Ok(match self {
            Value::Null => return Err(crate::row::DecodeError::Null.into()),
            Value::Bool(true) => "t".into(),
            Value::Bool(false) => "f".into(),
            Value::Int2(n) => itoa::Buffer::new().format(*n).to_owned(),
            Value::Int4(n) => itoa::Buffer::new().format(*n).to_owned(),
            Value::Int8(n) => itoa::Buffer::new().format(*n).to_owned(),
            Value::Float4(n) => n.to_string(),
            Value::Float8(n) => n.to_string(),
            Value::Money(n) => format!("{n:.2}"),
            Value::Numeric(s) | Value::Text(s) => s.clone(),
            Value::Bytes(b) | Value::Other(b) => codec::hex(b),
            Value::Date(d) => utils.date_to_string(zone, d),
            Value::Time(t) => utils.time_to_string(zone, t),
            Value::Timestamp(t) => utils.timestamp_to_string(zone, t),
        })
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>> {
        match self {
            Value::Bytes(b) | Value::Other(b) => Ok(b.to_vec()),
            Value::Text(s) => Ok(s.as_bytes().to_vec()),
            _ => Err(self.mismatch("bytea")),
        }
    }

    /// Convert to timestamp, text values without offset are read in `zone`.
    pub fn to_timestamp(&self, utils: &TimestampUtils, zone: Option<&Zone>) -> Result<Timestamp> {
        match self {
            Value::Timestamp(ts) => Ok(*ts),
            Value::Date(d) => Ok(Timestamp::from_millis(d.millis())),
            Value::Time(t) => Ok(Timestamp::from_millis(t.millis())),
            Value::Text(s) => utils.to_timestamp(zone, s),
            _ => Err(self.mismatch("timestamp")),
        }
    }

    /// Convert to date, timestamps are truncated at midnight of `zone`.
    pub fn to_date(&self, utils: &TimestampUtils, zone: Option<&Zone>) -> Result<Date> {
        match self {
            Value::Date(d) => Ok(*d),
            Value::Timestamp(ts) => Ok(utils.convert_to_date(ts, zone)),
            Value::Text(s) => utils.to_date(zone, s),
            _ => Err(self.mismatch("date")),
        }
    }

    /// Convert to time, timestamps keep the time of day shown in `zone`.
    pub fn to_time(&self, utils: &TimestampUtils, zone: Option<&Zone>) -> Result<Time> {
        match self {
            Value::Time(t) => Ok(*t),
            Value::Timestamp(ts) => utils.convert_to_time(ts, zone),
            Value::Text(s) => utils.to_time(zone, s),
            _ => Err(self.mismatch("time")),
        }
    }
}

fn out_of_range(ty: &str, n: impl fmt::Display) -> Error {
    Error::range(format!("Bad value for type {ty} : {n}"))
}

fn float_to_i64(n: f64, ty: &str) -> Result<i64> {
    // 2^63 is exact in f64, the lower bound is inclusive
    if n.is_finite() && n >= -9_223_372_036_854_775_808.0 && n < 9_223_372_036_854_775_808.0 {
        Ok(n as i64)
    } else {
        Err(out_of_range(ty, n))
    }
}

/// Parse integer text, a fraction or exponent is accepted and truncated.
fn parse_integer(s: &str, ty: &str) -> Result<i64> {
    use std::num::IntErrorKind;

    let t = s.trim();
    if let Ok(n) = t.parse::<i64>() {
        return Ok(n);
    }

    let (int, frac) = t.split_once('.').unwrap_or((t, ""));
    if frac.bytes().all(|b| b.is_ascii_digit()) {
        let int = match int {
            "" | "-" | "+" => "0",
            int => int,
        };
        match int.parse::<i64>() {
            Ok(n) => return Ok(n),
            Err(e) if matches!(e.kind(), IntErrorKind::PosOverflow | IntErrorKind::NegOverflow) => {
                return Err(out_of_range(ty, t));
            }
            Err(_) => {}
        }
    }

    match t.parse::<f64>() {
        Ok(n) if n.is_finite() => float_to_i64(n.trunc(), ty),
        _ => Err(Error::parse(format!("Bad value for type {ty} : {s}"))),
    }
}

fn parse_float(s: &str, ty: &str) -> Result<f64> {
    let t = s.trim();
    match t {
        "NaN" => Ok(f64::NAN),
        "Infinity" => Ok(f64::INFINITY),
        "-Infinity" => Ok(f64::NEG_INFINITY),
        _ => t.parse().map_err(|_| Error::parse(format!("Bad value for type {ty} : {s}"))),
    }
}

impl fmt::Debug for Value {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        use crate::ext::FmtExt;
        match self {
            Value::Null => f.write_str("NULL"),
            Value::Bool(v) => write!(f, "{v}"),
            Value::Int2(v) => write!(f, "{v}i16"),
            Value::Int4(v) => write!(f, "{v}i32"),
            Value::Int8(v) => write!(f, "{v}i64"),
            Value::Float4(v) => write!(f, "{v}f32"),
            Value::Float8(v) => write!(f, "{v}f64"),
            Value::Numeric(v) => write!(f, "Numeric({v})"),
            Value::Money(v) => write!(f, "Money({v:.2})"),
            Value::Text(v) => write!(f, "{v:?}"),
            Value::Bytes(v) | Value::Other(v) => write!(f, "{:?}", v.lossy()),
            Value::Date(v) => v.fmt(f),
            Value::Time(v) => v.fmt(f),
            Value::Timestamp(v) => v.fmt(f),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::error::ErrorKind;

    #[test]
    fn integer_narrowing() {
        assert_eq!(Value::Int8(1200).to_i16().unwrap(), 1200);
        let err = Value::Int4(70000).to_i16().unwrap_err();
        assert!(matches!(err.kind(), ErrorKind::Range(_)));
        assert_eq!(Value::Text(" 42 ".into()).to_i32().unwrap(), 42);
        assert_eq!(Value::Text("1.0".into()).to_i32().unwrap(), 1);
        assert_eq!(Value::Numeric("-12.75".into()).to_i64().unwrap(), -12);
        assert_eq!(Value::Text("1e3".into()).to_i64().unwrap(), 1000);
        assert!(matches!(
            Value::Text("99999999999999999999".into()).to_i64().unwrap_err().kind(),
            ErrorKind::Range(_)
        ));
        assert!(matches!(
            Value::Text("abc".into()).to_i32().unwrap_err().kind(),
            ErrorKind::Parse(_)
        ));
        assert_eq!(Value::Float8(3.9).to_i32().unwrap(), 3);
    }

    #[test]
    fn boolean_from_numbers() {
        assert!(Value::Int4(1).to_bool().unwrap());
        assert!(!Value::Float8(0.0).to_bool().unwrap());
        assert!(Value::Int4(2).to_bool().is_err());
        assert!(Value::Text("on".into()).to_bool().unwrap());
        assert!(Value::Date(Date::from_millis(0)).to_bool().is_err());
    }

    #[test]
    fn text_rendering() {
        assert_eq!(Value::Bool(true).to_text().unwrap(), "t");
        assert_eq!(Value::Int8(-5).to_text().unwrap(), "-5");
        assert_eq!(Value::Bytes(Bytes::from_static(b"\x01\xab")).to_text().unwrap(), "\\x01ab");
        assert_eq!(
            Value::Timestamp(Timestamp::new(0, 0)).to_text().unwrap(),
            "1970-01-01 00:00:00.000000 +00:00:00"
        );
        assert!(Value::Null.to_text().is_err());
    }

    #[test]
    fn temporal_conversion() {
        let utils = TimestampUtils::default();
        let ts = Value::Text("2024-07-15 10:34:56+00".into());
        let ts = ts.to_timestamp(&utils, None).unwrap();
        assert_eq!(ts.secs(), 1_721_039_696);
        let date = Value::Timestamp(ts).to_date(&utils, None).unwrap();
        assert_eq!(date.millis(), 1_721_001_600_000);
        let time = Value::Timestamp(ts).to_time(&utils, None).unwrap();
        assert_eq!(time.millis(), 38_096_000);
        assert!(Value::Int4(1).to_timestamp(&utils, None).is_err());
    }
}
