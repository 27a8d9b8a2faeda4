use time::{OffsetDateTime, PrimitiveDateTime};

use crate::{
    Decode, DecodeError, Error,
    row::Column,
    temporal::Timestamp,
};

impl TryFrom<Timestamp> for OffsetDateTime {
    type Error = Error;

    /// Infinity sentinels have no `time` counterpart and fail with a range error.
    fn try_from(ts: Timestamp) -> Result<Self, Self::Error> {
        if !ts.is_finite() {
            return Err(Error::range("infinite timestamp cannot be represented"));
        }
        let nanos = ts.secs() as i128 * 1_000_000_000 + ts.nanos() as i128;
        OffsetDateTime::from_unix_timestamp_nanos(nanos)
            .map_err(|e| Error::range(format!("timestamp out of range: {e}")))
    }
}

impl TryFrom<Timestamp> for PrimitiveDateTime {
    type Error = Error;

    /// Date and time shown in UTC.
    fn try_from(ts: Timestamp) -> Result<Self, Self::Error> {
        let utc = OffsetDateTime::try_from(ts)?;
        Ok(PrimitiveDateTime::new(utc.date(), utc.time()))
    }
}

impl From<OffsetDateTime> for Timestamp {
    fn from(value: OffsetDateTime) -> Self {
        Timestamp::new(value.unix_timestamp(), value.nanosecond())
    }
}

impl From<PrimitiveDateTime> for Timestamp {
    /// Date and time are read as UTC.
    fn from(value: PrimitiveDateTime) -> Self {
        value.assume_utc().into()
    }
}

impl Decode for OffsetDateTime {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        Ok(Timestamp::decode(column)?.try_into()?)
    }
}

impl Decode for PrimitiveDateTime {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        Ok(Timestamp::decode(column)?.try_into()?)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use time::Month;

    #[test]
    fn instant_conversion() {
        let ts = Timestamp::new(1_721_039_696, 500_000_000);
        let odt = OffsetDateTime::try_from(ts).unwrap();
        assert_eq!((odt.year(), odt.month(), odt.day()), (2024, Month::July, 15));
        assert_eq!((odt.hour(), odt.minute(), odt.second()), (10, 34, 56));
        assert_eq!(odt.millisecond(), 500);
        assert_eq!(Timestamp::from(odt), ts);

        let pdt = PrimitiveDateTime::try_from(ts).unwrap();
        assert_eq!(pdt.date(), odt.date());
        assert_eq!(pdt.time(), odt.time());
        assert_eq!(Timestamp::from(pdt), ts);

        assert!(OffsetDateTime::try_from(Timestamp::INFINITY).is_err());
    }
}
