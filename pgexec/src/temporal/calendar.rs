//! Hybrid Julian/Gregorian calendar arithmetic.
//!
//! Local values are counted in seconds since 1970-01-01 and rendered with
//! the Julian calendar before 1582-10-15 and the Gregorian calendar from
//! that day on. The server counts seconds since 2000-01-01 on the proleptic
//! Gregorian calendar. [`to_java_secs`] and [`to_pg_secs`] map one onto the
//! other so that both show the same year, month and day.

pub const SECS_PER_DAY: i64 = 86_400;
pub const MILLIS_PER_DAY: i64 = SECS_PER_DAY * 1000;

/// Seconds between 1970-01-01 and the server epoch 2000-01-01.
pub const PG_EPOCH_SECS: i64 = 946_684_800;

/// Epoch day of 1582-10-15, the first Gregorian day.
pub const CUTOVER_DAY: i64 = -141_427;

/// Broken down calendar date, `year` uses astronomical numbering
/// (year `0` is 1 BC).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub struct CivilDate {
    pub year: i64,
    pub month: u32,
    pub day: u32,
}

impl CivilDate {
    pub const fn new(year: i64, month: u32, day: u32) -> Self {
        Self { year, month, day }
    }

    /// Returns `(is_bc, year_of_era)`.
    pub const fn era_year(&self) -> (bool, i64) {
        match self.year <= 0 {
            true => (true, 1 - self.year),
            false => (false, self.year),
        }
    }
}

const fn day_of_year(month: u32, day: u32) -> i64 {
    let mp = (if month > 2 { month - 3 } else { month + 9 }) as i64;
    (153 * mp + 2) / 5 + day as i64 - 1
}

/// Epoch day of a proleptic Gregorian date.
pub const fn gregorian_days(date: CivilDate) -> i64 {
    let y = if date.month <= 2 { date.year - 1 } else { date.year };
    let era = y.div_euclid(400);
    let yoe = y - era * 400;
    let doe = yoe * 365 + yoe / 4 - yoe / 100 + day_of_year(date.month, date.day);
    era * 146_097 + doe - 719_468
}

/// Epoch day of a proleptic Julian date.
pub const fn julian_days(date: CivilDate) -> i64 {
    let y = if date.month <= 2 { date.year - 1 } else { date.year };
    let era = y.div_euclid(4);
    let yoe = y - era * 4;
    let doe = yoe * 365 + day_of_year(date.month, date.day);
    era * 1461 + doe - 719_470
}

const fn from_march_based(year: i64, doy: i64) -> CivilDate {
    let mp = (5 * doy + 2) / 153;
    let day = (doy - (153 * mp + 2) / 5 + 1) as u32;
    let month = (if mp < 10 { mp + 3 } else { mp - 9 }) as u32;
    let year = if month <= 2 { year + 1 } else { year };
    CivilDate { year, month, day }
}

/// Proleptic Gregorian date of an epoch day.
pub const fn gregorian_date(days: i64) -> CivilDate {
    let z = days + 719_468;
    let era = z.div_euclid(146_097);
    let doe = z - era * 146_097;
    let yoe = (doe - doe / 1460 + doe / 36_524 - doe / 146_096) / 365;
    let doy = doe - (365 * yoe + yoe / 4 - yoe / 100);
    from_march_based(yoe + era * 400, doy)
}

/// Proleptic Julian date of an epoch day.
pub const fn julian_date(days: i64) -> CivilDate {
    let z = days + 719_470;
    let era = z.div_euclid(1461);
    let doe = z - era * 1461;
    let yoe = if doe / 365 > 3 { 3 } else { doe / 365 };
    let doy = doe - 365 * yoe;
    from_march_based(yoe + era * 4, doy)
}

/// Epoch day of a date in the hybrid calendar.
///
/// Dates before 1582-10-15 are read as Julian, so the ten skipped days
/// continue the Julian count as a lenient calendar does.
pub const fn hybrid_days(date: CivilDate) -> i64 {
    let gregorian = date.year > 1582
        || (date.year == 1582 && (date.month > 10 || (date.month == 10 && date.day >= 15)));
    match gregorian {
        true => gregorian_days(date),
        false => julian_days(date),
    }
}

/// Hybrid calendar date of an epoch day.
pub const fn hybrid_date(days: i64) -> CivilDate {
    match days >= CUTOVER_DAY {
        true => gregorian_date(days),
        false => julian_date(days),
    }
}

/// Broken down local date time, `nanos` is the sub second part.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Fields {
    pub date: CivilDate,
    pub hour: u32,
    pub minute: u32,
    pub second: u32,
    pub nanos: u32,
}

impl Fields {
    /// Decompose local epoch seconds.
    pub const fn from_local_secs(secs: i64, nanos: u32) -> Fields {
        let days = secs.div_euclid(SECS_PER_DAY);
        let tod = secs.rem_euclid(SECS_PER_DAY);
        Fields {
            date: hybrid_date(days),
            hour: (tod / 3600) as u32,
            minute: (tod / 60 % 60) as u32,
            second: (tod % 60) as u32,
            nanos,
        }
    }

    /// Compose local epoch seconds, out of range time fields overflow
    /// into the next unit like a lenient calendar.
    pub const fn local_secs(&self) -> i64 {
        hybrid_days(self.date) * SECS_PER_DAY
            + self.hour as i64 * 3600
            + self.minute as i64 * 60
            + self.second as i64
    }
}

/// Converts server seconds (since 2000-01-01, proleptic Gregorian) to
/// local seconds (since 1970-01-01, hybrid calendar) showing the same
/// calendar fields.
pub const fn to_java_secs(secs: i64) -> i64 {
    let secs = secs + PG_EPOCH_SECS;
    let days = secs.div_euclid(SECS_PER_DAY);
    if days >= CUTOVER_DAY {
        return secs;
    }
    let tod = secs.rem_euclid(SECS_PER_DAY);
    julian_days(gregorian_date(days)) * SECS_PER_DAY + tod
}

/// Converts local seconds back to server seconds, inverse of [`to_java_secs`].
///
/// Julian only leap days (February 29 of 1500, 1400, 1300, ...) have no
/// Gregorian counterpart and map to the following March 1.
pub const fn to_pg_secs(secs: i64) -> i64 {
    let days = secs.div_euclid(SECS_PER_DAY);
    let secs = match days >= CUTOVER_DAY {
        true => secs,
        false => {
            let tod = secs.rem_euclid(SECS_PER_DAY);
            gregorian_days(julian_date(days)) * SECS_PER_DAY + tod
        }
    };
    secs - PG_EPOCH_SECS
}
