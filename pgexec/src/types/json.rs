use serde::{Deserialize, Serialize, de::DeserializeOwned};

use crate::{
    Decode, DecodeError,
    postgres::{PgFormat, Type},
    row::Column,
};

/// Decode postgres `json` and `jsonb` value with [`serde_json`].
#[derive(Debug)]
pub struct Json<T>(pub T);

impl<T> Decode for Json<T>
where
    T: DeserializeOwned,
{
    fn decode(column: Column) -> Result<Self, DecodeError> {
        let ty = column.field().ty();
        if !matches!(ty, Type::Json | Type::Jsonb | Type::Text | Type::Varchar) {
            return Err(DecodeError::OidMissmatch);
        }
        let binary_jsonb = ty == Type::Jsonb && column.format() == PgFormat::Binary;
        let value = column.try_into_value()?;
        let json = match binary_jsonb {
            true => match value.split_first() {
                Some((1, json)) => json,
                _ => return Err(DecodeError::Invalid("unsupported jsonb version".into())),
            },
            false => &value[..],
        };
        serde_json::from_slice(json).map(Json).map_err(Into::into)
    }
}

impl<T: Serialize> Json<T> {
    /// Serialize to json text, for use as a parameter value.
    pub fn to_text(&self) -> crate::Result<String> {
        serde_json::to_string(&self.0)
            .map_err(|e| crate::Error::parse(format!("failed to serialize json: {e}")))
    }
}

impl<T: Serialize> Serialize for Json<T> {
    fn serialize<S>(&self, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        self.0.serialize(serializer)
    }
}

impl<'de, T: Deserialize<'de>> Deserialize<'de> for Json<T> {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        Ok(Self(T::deserialize(deserializer)?))
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{row::Field, temporal::TimestampUtils};
    use bytes::Bytes;

    #[derive(serde::Deserialize, Debug, PartialEq)]
    struct Point {
        x: i32,
    }

    #[test]
    fn jsonb_binary_and_json_text() {
        let utils = TimestampUtils::default();
        let field = Field::new("doc", Type::Jsonb.oid(), PgFormat::Binary);
        let column = Column::new(&field, Some(Bytes::from_static(b"\x01{\"x\":3}")), &utils);
        let Json(point) = column.decode::<Json<Point>>().unwrap();
        assert_eq!(point, Point { x: 3 });

        let field = Field::new("doc", Type::Json.oid(), PgFormat::Text);
        let column = Column::new(&field, Some(Bytes::from_static(b"{\"x\":4}")), &utils);
        assert_eq!(column.decode::<Json<Point>>().unwrap().0, Point { x: 4 });

        let field = Field::new("n", Type::Int4.oid(), PgFormat::Text);
        let column = Column::new(&field, Some(Bytes::from_static(b"1")), &utils);
        assert!(column.decode::<Json<Point>>().is_err());
    }
}
