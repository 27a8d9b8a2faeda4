//! Binary `numeric`.
//!
//! The payload is a header of four `int2` (ndigits, weight, sign, dscale)
//! followed by `ndigits` base 10000 digits. `weight` is the power of 10000
//! of the first digit, `dscale` the count of decimal digits after the point.
use std::fmt::Write;

use crate::{ext::SliceExt, row::DecodeError};

const POS: u16 = 0x0000;
const NEG: u16 = 0x4000;
const NAN: u16 = 0xC000;
const PINF: u16 = 0xD000;
const NINF: u16 = 0xF000;
const DSCALE_MASK: u16 = 0x3FFF;

/// Decode to exact decimal text.
pub(crate) fn decode(b: &[u8]) -> Result<String, DecodeError> {
    let ndigits = b.be_i16(0)?;
    let weight = b.be_i16(2)? as i32;
    let sign = b.be_i16(4)? as u16;
    let dscale = b.be_i16(6)? as u16;

    match sign {
        NAN => return Ok("NaN".into()),
        PINF => return Ok("Infinity".into()),
        NINF => return Ok("-Infinity".into()),
        POS | NEG => {}
        _ => return Err(DecodeError::Invalid("invalid sign in \"numeric\" value".into())),
    }
    if dscale & DSCALE_MASK != dscale || ndigits < 0 {
        return Err(DecodeError::Invalid("invalid header in \"numeric\" value".into()));
    }

    let digits = (0..ndigits as usize)
        .map(|i| b.be_i16(8 + i * 2))
        .collect::<Result<Vec<i16>, _>>()?;
    if digits.iter().any(|d| !(0..10000).contains(d)) {
        return Err(DecodeError::Invalid("invalid digit in \"numeric\" value".into()));
    }

    // digit at index `k` has weight `weight - k`
    let digit = |k: i32| match usize::try_from(k) {
        Ok(k) => digits.get(k).copied().unwrap_or(0),
        Err(_) => 0,
    };

    let mut out = String::with_capacity(digits.len() * 4 + 4);
    if sign == NEG {
        out.push('-');
    }

    if weight < 0 {
        out.push('0');
    } else {
        for k in 0..=weight {
            let _ = match k {
                0 => write!(out, "{}", digit(k)),
                _ => write!(out, "{:04}", digit(k)),
            };
        }
    }

    if dscale > 0 {
        out.push('.');
        let start = out.len();
        let mut k = weight + 1;
        while out.len() - start < dscale as usize {
            let _ = write!(out, "{:04}", digit(k));
            k += 1;
        }
        out.truncate(start + dscale as usize);
    }

    // "-0" for a zero with negative sign is not a server output
    if out.bytes().all(|c| matches!(c, b'-' | b'0' | b'.')) && out.starts_with('-') {
        out.remove(0);
    }

    Ok(out)
}
