use bytes::Bytes;

use super::{Value, numeric};
use crate::{
    Result,
    ext::SliceExt,
    postgres::{PgFormat, Type},
    row::DecodeError,
    temporal::{Date, Time, Timestamp, TimestampUtils, Zone},
};

/// Decode one non null column payload.
pub(crate) type DecodeFn = fn(&[u8], &TimestampUtils) -> Result<Value, DecodeError>;

/// Returns the codec for a column type and transfer format.
pub(crate) fn decoder(ty: Type, format: PgFormat) -> DecodeFn {
    match format {
        PgFormat::Text => match ty {
            Type::Bool => text_bool,
            Type::Int2 => text_int2,
            Type::Int4 => text_int4,
            Type::Int8 | Type::Oid => text_int8,
            Type::Float4 => text_float4,
            Type::Float8 => text_float8,
            Type::Numeric => text_numeric,
            Type::Money => text_money,
            Type::Bytea => text_bytea,
            Type::Date => text_date,
            Type::Time | Type::Timetz => text_time,
            Type::Timestamp | Type::Timestamptz => text_timestamp,
            Type::Void => void,
            _ => text,
        },
        PgFormat::Binary => match ty {
            Type::Bool => bin_bool,
            Type::Int2 => bin_int2,
            Type::Int4 => bin_int4,
            Type::Int8 => bin_int8,
            Type::Oid => bin_oid,
            Type::Float4 => bin_float4,
            Type::Float8 => bin_float8,
            Type::Numeric => bin_numeric,
            Type::Money => bin_money,
            Type::Bytea => bin_bytea,
            Type::Date => bin_date,
            Type::Time | Type::Timetz => bin_time,
            Type::Timestamp => bin_timestamp,
            Type::Timestamptz => bin_timestamptz,
            Type::Uuid => bin_uuid,
            Type::Jsonb => bin_jsonb,
            Type::Text
            | Type::Varchar
            | Type::Bpchar
            | Type::Name
            | Type::Char
            | Type::Json
            | Type::Unknown => text,
            Type::Void => void,
            Type::Other(_) => other,
        },
    }
}

/// Boolean text vocabulary, trimmed and ascii case insensitive.
pub(crate) fn parse_bool(s: &str) -> Option<bool> {
    const TRUE: [&str; 6] = ["true", "t", "yes", "y", "on", "1"];
    const FALSE: [&str; 6] = ["false", "f", "no", "n", "off", "0"];

    let s = s.trim();
    if TRUE.iter().any(|t| t.eq_ignore_ascii_case(s)) {
        Some(true)
    } else if FALSE.iter().any(|f| f.eq_ignore_ascii_case(s)) {
        Some(false)
    } else {
        None
    }
}

/// Render bytes in the `bytea` hex output format.
pub(crate) fn hex(bytes: &[u8]) -> String {
    const HEX: &[u8; 16] = b"0123456789abcdef";
    let mut out = String::with_capacity(2 + bytes.len() * 2);
    out.push_str("\\x");
    for b in bytes {
        out.push(HEX[(b >> 4) as usize] as char);
        out.push(HEX[(b & 0xf) as usize] as char);
    }
    out
}

// ===== Temporal with explicit zone =====

fn utf8(bytes: &[u8]) -> Result<&str> {
    Ok(std::str::from_utf8(bytes)?)
}

/// Read a column as timestamp, values without offset are read in `zone`.
pub(crate) fn timestamp_in(
    ty: Type,
    format: PgFormat,
    bytes: &[u8],
    utils: &TimestampUtils,
    zone: Option<&Zone>,
) -> Result<Timestamp> {
    match (format, ty) {
        (PgFormat::Binary, Type::Timestamp | Type::Timestamptz) => {
            utils.to_timestamp_bin(zone, bytes, ty == Type::Timestamptz)
        }
        (PgFormat::Binary, Type::Date) => {
            utils.to_date_bin(zone, bytes).map(|d| Timestamp::from_millis(d.millis()))
        }
        (PgFormat::Binary, Type::Time | Type::Timetz) => {
            utils.to_time_bin(zone, bytes).map(|t| Timestamp::from_millis(t.millis()))
        }
        (PgFormat::Text, _) => utils.to_timestamp(zone, utf8(bytes)?),
        _ => decoder(ty, format)(bytes, utils)?.to_timestamp(utils, zone),
    }
}

/// Read a column as date, timestamps are truncated at midnight of `zone`.
pub(crate) fn date_in(
    ty: Type,
    format: PgFormat,
    bytes: &[u8],
    utils: &TimestampUtils,
    zone: Option<&Zone>,
) -> Result<Date> {
    match (format, ty) {
        (PgFormat::Binary, Type::Date) => utils.to_date_bin(zone, bytes),
        (PgFormat::Binary, Type::Timestamp | Type::Timestamptz) => {
            let ts = utils.to_timestamp_bin(zone, bytes, ty == Type::Timestamptz)?;
            Ok(utils.convert_to_date(&ts, zone))
        }
        (PgFormat::Text, _) => utils.to_date(zone, utf8(bytes)?),
        _ => decoder(ty, format)(bytes, utils)?.to_date(utils, zone),
    }
}

/// Read a column as time of day shown in `zone`.
pub(crate) fn time_in(
    ty: Type,
    format: PgFormat,
    bytes: &[u8],
    utils: &TimestampUtils,
    zone: Option<&Zone>,
) -> Result<Time> {
    match (format, ty) {
        (PgFormat::Binary, Type::Time | Type::Timetz) => utils.to_time_bin(zone, bytes),
        (PgFormat::Binary, Type::Timestamp | Type::Timestamptz) => {
            let ts = utils.to_timestamp_bin(zone, bytes, ty == Type::Timestamptz)?;
            utils.convert_to_time(&ts, zone)
        }
        (PgFormat::Text, _) => utils.to_time(zone, utf8(bytes)?),
        _ => decoder(ty, format)(bytes, utils)?.to_time(utils, zone),
    }
}

// ===== Text =====

fn text(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Text(std::str::from_utf8(b)?.to_owned()))
}

fn void(_: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Null)
}

fn text_bool(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    parse_bool(std::str::from_utf8(b)?)
        .map(Value::Bool)
        .ok_or_else(|| DecodeError::invalid("boolean", b))
}

macro_rules! text_number {
    ($name:ident, $ty:ty, $variant:ident, $pg:literal) => {
        fn $name(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
            std::str::from_utf8(b)?
                .trim()
                .parse::<$ty>()
                .map(Value::$variant)
                .map_err(|_| DecodeError::invalid($pg, b))
        }
    };
}

text_number!(text_int2, i16, Int2, "smallint");
text_number!(text_int4, i32, Int4, "integer");
text_number!(text_int8, i64, Int8, "bigint");

fn text_float4(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    match std::str::from_utf8(b)?.trim() {
        "NaN" => Ok(Value::Float4(f32::NAN)),
        "Infinity" => Ok(Value::Float4(f32::INFINITY)),
        "-Infinity" => Ok(Value::Float4(f32::NEG_INFINITY)),
        s => s.parse().map(Value::Float4).map_err(|_| DecodeError::invalid("real", b)),
    }
}

fn text_float8(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    match std::str::from_utf8(b)?.trim() {
        "NaN" => Ok(Value::Float8(f64::NAN)),
        "Infinity" => Ok(Value::Float8(f64::INFINITY)),
        "-Infinity" => Ok(Value::Float8(f64::NEG_INFINITY)),
        s => s.parse().map(Value::Float8).map_err(|_| DecodeError::invalid("double", b)),
    }
}

fn text_numeric(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Numeric(std::str::from_utf8(b)?.trim().to_owned()))
}

/// Money text carries a currency symbol, group separators, and negative
/// values in parentheses or with a leading sign.
fn text_money(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    let s = std::str::from_utf8(b)?.trim();
    let (parens, s) = match s.strip_prefix('(').and_then(|s| s.strip_suffix(')')) {
        Some(inner) => (true, inner),
        None => (false, s),
    };
    let digits: String = s.chars().filter(|c| !matches!(c, '$' | ',')).collect();
    let (sign, digits) = match digits.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, digits.as_str()),
    };
    match digits.parse::<f64>() {
        Ok(n) if parens != sign => Ok(Value::Money(-n)),
        Ok(n) => Ok(Value::Money(n)),
        Err(_) => Err(DecodeError::invalid("money", b)),
    }
}

/// Both `\x` hex and the legacy escape output format.
fn text_bytea(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    if let Some(hex) = b.strip_prefix(b"\\x") {
        let nibble = |c: u8| match c {
            b'0'..=b'9' => Some(c - b'0'),
            b'a'..=b'f' => Some(c - b'a' + 10),
            b'A'..=b'F' => Some(c - b'A' + 10),
            _ => None,
        };
        if hex.len() % 2 != 0 {
            return Err(DecodeError::invalid("bytea", b));
        }
        return hex
            .chunks_exact(2)
            .map(|pair| Some(nibble(pair[0])? << 4 | nibble(pair[1])?))
            .collect::<Option<Vec<u8>>>()
            .map(|v| Value::Bytes(v.into()))
            .ok_or_else(|| DecodeError::invalid("bytea", b));
    }

    let mut out = Vec::with_capacity(b.len());
    let mut i = 0;
    while i < b.len() {
        if b[i] != b'\\' {
            out.push(b[i]);
            i += 1;
            continue;
        }
        match b.get(i + 1..i + 4) {
            _ if b.get(i + 1) == Some(&b'\\') => {
                out.push(b'\\');
                i += 2;
            }
            Some(&[d0 @ b'0'..=b'3', d1 @ b'0'..=b'7', d2 @ b'0'..=b'7']) => {
                out.push((d0 - b'0') << 6 | (d1 - b'0') << 3 | (d2 - b'0'));
                i += 4;
            }
            _ => return Err(DecodeError::invalid("bytea", b)),
        }
    }
    Ok(Value::Bytes(out.into()))
}

fn text_date(b: &[u8], utils: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Date(utils.to_date(None, std::str::from_utf8(b)?)?))
}

fn text_time(b: &[u8], utils: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Time(utils.to_time(None, std::str::from_utf8(b)?)?))
}

fn text_timestamp(b: &[u8], utils: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Timestamp(utils.to_timestamp(None, std::str::from_utf8(b)?)?))
}

// ===== Binary =====

fn exact<const N: usize>(b: &[u8]) -> Result<[u8; N], DecodeError> {
    match b.len() == N {
        true => b.be_array(0),
        false => Err(DecodeError::Length { expected: N, actual: b.len() }),
    }
}

fn bin_bool(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    let [byte] = exact::<1>(b)?;
    Ok(Value::Bool(byte == 1 || byte == b't'))
}

fn bin_int2(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    exact(b).map(i16::from_be_bytes).map(Value::Int2)
}

fn bin_int4(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    exact(b).map(i32::from_be_bytes).map(Value::Int4)
}

fn bin_int8(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    exact(b).map(i64::from_be_bytes).map(Value::Int8)
}

fn bin_oid(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    exact(b).map(u32::from_be_bytes).map(|oid| Value::Int8(oid as i64))
}

fn bin_float4(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    exact(b).map(f32::from_be_bytes).map(Value::Float4)
}

fn bin_float8(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    exact(b).map(f64::from_be_bytes).map(Value::Float8)
}

fn bin_numeric(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    numeric::decode(b).map(Value::Numeric)
}

/// Binary money is a count of cents.
fn bin_money(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    exact(b).map(i64::from_be_bytes).map(|cents| Value::Money(cents as f64 / 100.0))
}

fn bin_bytea(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Bytes(Bytes::copy_from_slice(b)))
}

fn other(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Other(Bytes::copy_from_slice(b)))
}

fn bin_date(b: &[u8], utils: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Date(utils.to_date_bin(None, b)?))
}

fn bin_time(b: &[u8], utils: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Time(utils.to_time_bin(None, b)?))
}

fn bin_timestamp(b: &[u8], utils: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Timestamp(utils.to_timestamp_bin(None, b, false)?))
}

fn bin_timestamptz(b: &[u8], utils: &TimestampUtils) -> Result<Value, DecodeError> {
    Ok(Value::Timestamp(utils.to_timestamp_bin(None, b, true)?))
}

fn bin_uuid(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    use std::fmt::Write;
    let uuid = exact::<16>(b)?;
    let mut out = String::with_capacity(36);
    for (i, byte) in uuid.iter().enumerate() {
        if matches!(i, 4 | 6 | 8 | 10) {
            out.push('-');
        }
        let _ = write!(out, "{byte:02x}");
    }
    Ok(Value::Text(out))
}

/// Binary jsonb is the json text behind a version byte.
fn bin_jsonb(b: &[u8], _: &TimestampUtils) -> Result<Value, DecodeError> {
    match b.split_first() {
        Some((1, json)) => Ok(Value::Text(std::str::from_utf8(json)?.to_owned())),
        _ => Err(DecodeError::Invalid("unsupported jsonb version".into())),
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn decode(ty: Type, format: PgFormat, b: &[u8]) -> Result<Value, DecodeError> {
        decoder(ty, format)(b, &TimestampUtils::default())
    }

    #[test]
    fn boolean_vocabulary() {
        assert_eq!(decode(Type::Bool, PgFormat::Text, b" T ").unwrap(), Value::Bool(true));
        assert_eq!(decode(Type::Bool, PgFormat::Text, b"0").unwrap(), Value::Bool(false));
        assert_eq!(decode(Type::Bool, PgFormat::Text, b"Off").unwrap(), Value::Bool(false));
        assert_eq!(decode(Type::Bool, PgFormat::Binary, &[0x74]).unwrap(), Value::Bool(true));
        assert_eq!(decode(Type::Bool, PgFormat::Binary, &[1]).unwrap(), Value::Bool(true));
        assert_eq!(decode(Type::Bool, PgFormat::Binary, &[0]).unwrap(), Value::Bool(false));
        assert!(decode(Type::Bool, PgFormat::Text, b"maybe").is_err());
    }

    #[test]
    fn fixed_width_binary() {
        assert_eq!(decode(Type::Int2, PgFormat::Binary, &[0xff, 0xfe]).unwrap(), Value::Int2(-2));
        assert_eq!(
            decode(Type::Int8, PgFormat::Binary, &300i64.to_be_bytes()).unwrap(),
            Value::Int8(300)
        );
        assert_eq!(
            decode(Type::Float8, PgFormat::Binary, &1.5f64.to_be_bytes()).unwrap(),
            Value::Float8(1.5)
        );
        assert!(matches!(
            decode(Type::Int4, PgFormat::Binary, &[0, 1]),
            Err(DecodeError::Length { expected: 4, actual: 2 })
        ));
    }

    #[test]
    fn money() {
        assert_eq!(decode(Type::Money, PgFormat::Text, b"$1,234.50").unwrap(), Value::Money(1234.5));
        assert_eq!(decode(Type::Money, PgFormat::Text, b"($12.00)").unwrap(), Value::Money(-12.0));
        assert_eq!(decode(Type::Money, PgFormat::Text, b"-$3.25").unwrap(), Value::Money(-3.25));
        assert_eq!(
            decode(Type::Money, PgFormat::Binary, &(-1250i64).to_be_bytes()).unwrap(),
            Value::Money(-12.5)
        );
    }

    #[test]
    fn bytea_formats() {
        assert_eq!(
            decode(Type::Bytea, PgFormat::Text, b"\\x00ff10").unwrap(),
            Value::Bytes(Bytes::from_static(&[0, 0xff, 0x10]))
        );
        assert_eq!(
            decode(Type::Bytea, PgFormat::Text, b"a\\\\b\\001").unwrap(),
            Value::Bytes(Bytes::from_static(b"a\\b\x01"))
        );
        assert!(decode(Type::Bytea, PgFormat::Text, b"\\x0").is_err());
        assert!(decode(Type::Bytea, PgFormat::Text, b"\\9").is_err());
    }

    #[test]
    fn uuid_and_jsonb() {
        let uuid = [
            0x55, 0x0e, 0x84, 0x00, 0xe2, 0x9b, 0x41, 0xd4, 0xa7, 0x16, 0x44, 0x66, 0x55, 0x44,
            0x00, 0x00,
        ];
        assert_eq!(
            decode(Type::Uuid, PgFormat::Binary, &uuid).unwrap(),
            Value::Text("550e8400-e29b-41d4-a716-446655440000".into())
        );
        assert_eq!(
            decode(Type::Jsonb, PgFormat::Binary, b"\x01{\"a\":1}").unwrap(),
            Value::Text("{\"a\":1}".into())
        );
    }

    #[test]
    fn unknown_types() {
        assert_eq!(
            decode(Type::Other(600), PgFormat::Text, b"(1,2)").unwrap(),
            Value::Text("(1,2)".into())
        );
        assert_eq!(
            decode(Type::Other(600), PgFormat::Binary, &[1, 2]).unwrap(),
            Value::Other(Bytes::from_static(&[1, 2]))
        );
    }

    #[test]
    fn temporal_with_zone() {
        let utils = TimestampUtils::default();
        let berlin = Zone::parse("Europe/Berlin").unwrap();
        // 2024-07-15 12:00:00 read in Berlin is 10:00:00 UTC
        let ts = timestamp_in(Type::Timestamp, PgFormat::Text, b"2024-07-15 12:00:00", &utils, Some(&berlin))
            .unwrap();
        assert_eq!(ts.secs(), 1_721_037_600);
        let date = date_in(Type::Timestamptz, PgFormat::Text, b"2024-07-15 23:30:00+00", &utils, Some(&berlin))
            .unwrap();
        // midnight of 2024-07-16 in Berlin
        assert_eq!(date.millis(), 1_721_080_800_000);
    }
}
