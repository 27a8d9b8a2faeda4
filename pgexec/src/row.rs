//! Postgres row operation.
//!
//! - [`Field`]
//! - [`Row`]
//! - [`Column`]
//! - [`FromRow`]
//! - [`Decode`]
//!
//! - [`Index`]
//! - [`DecodeError`]
use bytes::Bytes;
use std::{borrow::Cow, fmt, str::Utf8Error, string::FromUtf8Error, sync::Arc};

use crate::{
    ext::FmtExt,
    postgres::{Oid, PgFormat, Type},
    temporal::{Date, Time, Timestamp, TimestampUtils},
    value::{self, DecodeFn, Value},
};

/// Raw column values of one row, `None` is `NULL`.
pub type Tuple = Vec<Option<Bytes>>;

/// Result column description.
#[derive(Clone)]
pub struct Field {
    name: String,
    base_name: Option<String>,
    table_oid: Oid,
    column_id: i16,
    ty: Type,
    format: PgFormat,
    decode: DecodeFn,
}

impl Field {
    /// Create field from its label, type oid and transfer format.
    ///
    /// The value decoder is resolved once here.
    pub fn new(name: impl Into<String>, type_oid: Oid, format: PgFormat) -> Field {
        let ty = Type::from_oid(type_oid);
        Field {
            name: name.into(),
            base_name: None,
            table_oid: 0,
            column_id: 0,
            ty,
            format,
            decode: value::decoder(ty, format),
        }
    }

    /// Set the originating table column.
    pub fn with_table(mut self, table_oid: Oid, column_id: i16) -> Field {
        self.table_oid = table_oid;
        self.column_id = column_id;
        self
    }

    /// Set the underlying column name when the label is an alias.
    pub fn with_base_name(mut self, base_name: impl Into<String>) -> Field {
        self.base_name = Some(base_name.into());
        self
    }

    /// Returns the column label.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Returns the table column name, or the label if unknown.
    pub fn base_name(&self) -> &str {
        self.base_name.as_deref().unwrap_or(&self.name)
    }

    pub fn table_oid(&self) -> Oid {
        self.table_oid
    }

    pub fn column_id(&self) -> i16 {
        self.column_id
    }

    pub fn ty(&self) -> Type {
        self.ty
    }

    pub fn oid(&self) -> Oid {
        self.ty.oid()
    }

    pub fn format(&self) -> PgFormat {
        self.format
    }

    pub(crate) fn decode(&self, bytes: &[u8], utils: &TimestampUtils) -> Result<Value, DecodeError> {
        (self.decode)(bytes, utils)
    }
}

impl fmt::Debug for Field {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Field")
            .field("name", &self.name)
            .field("type", &self.ty)
            .field("format", &self.format)
            .finish()
    }
}

impl PartialEq for Field {
    fn eq(&self, other: &Self) -> bool {
        self.name == other.name
            && self.base_name == other.base_name
            && self.table_oid == other.table_oid
            && self.column_id == other.column_id
            && self.ty == other.ty
            && self.format == other.format
    }
}

/// Postgres row.
#[derive(Clone)]
pub struct Row {
    fields: Arc<[Field]>,
    values: Tuple,
    utils: Arc<TimestampUtils>,
}

impl Row {
    pub(crate) fn new(fields: Arc<[Field]>, values: Tuple, utils: Arc<TimestampUtils>) -> Self {
        Self { fields, values, utils }
    }

    /// Returns `true` if row contains no columns.
    pub fn is_empty(&self) -> bool {
        self.fields.is_empty()
    }

    /// Returns the number of fields/column.
    pub fn len(&self) -> usize {
        self.fields.len()
    }

    pub fn fields(&self) -> &[Field] {
        &self.fields
    }

    /// Try get and decode column, `idx` is zero based.
    pub fn try_get<I: Index, R: Decode>(&self, idx: I) -> Result<R, DecodeError> {
        let nth = idx.position(&self.fields)?;
        R::decode(self.column(nth))
    }

    /// Try decode type using [`FromRow`] implementation.
    pub fn decode<D: FromRow>(self) -> Result<D, DecodeError> {
        D::from_row(self)
    }

    /// Iterate over columns.
    pub fn columns(&self) -> impl ExactSizeIterator<Item = Column<'_>> {
        (0..self.fields.len()).map(|nth| self.column(nth))
    }

    fn column(&self, nth: usize) -> Column<'_> {
        Column {
            field: &self.fields[nth],
            value: self.values.get(nth).cloned().flatten(),
            utils: &self.utils,
        }
    }
}

impl fmt::Debug for Row {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let mut dbg = f.debug_map();
        for (field, value) in self.fields.iter().zip(&self.values) {
            dbg.key(&field.name());
            match value {
                None => dbg.value(&format_args!("NULL")),
                Some(v) => dbg.value(&v.lossy()),
            };
        }
        dbg.finish()
    }
}

/// Postgres column.
#[derive(Clone)]
pub struct Column<'a> {
    field: &'a Field,
    value: Option<Bytes>,
    utils: &'a TimestampUtils,
}

impl<'a> Column<'a> {
    pub(crate) fn new(field: &'a Field, value: Option<Bytes>, utils: &'a TimestampUtils) -> Self {
        Self { field, value, utils }
    }

    /// Returns column [`Oid`].
    pub fn oid(&self) -> Oid {
        self.field.oid()
    }

    /// Returns column name.
    pub fn name(&self) -> &str {
        self.field.name()
    }

    pub fn field(&self) -> &Field {
        self.field
    }

    pub fn format(&self) -> PgFormat {
        self.field.format()
    }

    /// Return `true` if value is NULL.
    pub fn is_null(&self) -> bool {
        self.value.is_none()
    }

    /// Extract the inner bytes as slice.
    ///
    /// Returns [`None`] if value is `NULL`.
    pub fn as_slice(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }

    /// Consume self into the inner [`Bytes`].
    ///
    /// Returns [`None`] if value is `NULL`.
    pub fn into_value(self) -> Option<Bytes> {
        self.value
    }

    /// Try consume self into the inner [`Bytes`].
    ///
    /// Return [`DecodeError::Null`] if value is `NULL`.
    pub fn try_into_value(self) -> Result<Bytes, DecodeError> {
        self.value.ok_or(DecodeError::Null)
    }

    /// Decode the column with the codec of its type and format.
    pub fn to_value(&self) -> Result<Value, DecodeError> {
        match &self.value {
            Some(bytes) => self.field.decode(bytes, self.utils),
            None => Ok(Value::Null),
        }
    }

    /// Try decode type using [`Decode`] implementation.
    pub fn decode<D: Decode>(self) -> Result<D, DecodeError> {
        D::decode(self)
    }

    fn non_null(&self) -> Result<Value, DecodeError> {
        match self.to_value()? {
            Value::Null => Err(DecodeError::Null),
            value => Ok(value),
        }
    }
}

impl fmt::Debug for Column<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Column")
            .field("name", &self.name())
            .field("type", &self.field.ty())
            .field("value", &self.value.as_deref().map(FmtExt::lossy))
            .finish()
    }
}

// ===== Traits =====

/// Type that can be constructed from a row.
pub trait FromRow: Sized {
    /// Construct self from row.
    fn from_row(row: Row) -> Result<Self, DecodeError>;
}

impl FromRow for Row {
    fn from_row(row: Row) -> Result<Self, DecodeError> {
        Ok(row)
    }
}

impl FromRow for () {
    fn from_row(_: Row) -> Result<Self, DecodeError> {
        Ok(())
    }
}

macro_rules! from_row_tuple {
    ($($t:ident $i:literal),*) => {
        impl<$($t),*> FromRow for ($($t),*,)
        where
            $($t: Decode),*
        {
            fn from_row(row: Row) -> Result<Self, DecodeError> {
                Ok((
                    $(row.try_get($i)?),*,
                ))
            }
        }
    };
}

from_row_tuple!(T0 0);
from_row_tuple!(T0 0, T1 1);
from_row_tuple!(T0 0, T1 1, T2 2);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4);
from_row_tuple!(T0 0, T1 1, T2 2, T3 3, T4 4, T5 5);

/// A type that can be constructed from [`Column`].
pub trait Decode: Sized {
    /// Try decode self from column.
    fn decode(column: Column<'_>) -> Result<Self, DecodeError>;
}

impl<T: Decode> Decode for Option<T> {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        match column.is_null() {
            true => Ok(None),
            false => column.decode().map(Some),
        }
    }
}

impl Decode for () {
    fn decode(_: Column<'_>) -> Result<Self, DecodeError> {
        Ok(())
    }
}

impl Decode for Value {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        column.to_value()
    }
}

impl Decode for Bytes {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        match column.non_null()? {
            Value::Bytes(b) => Ok(b),
            _ => Err(DecodeError::OidMissmatch),
        }
    }
}

macro_rules! decode {
    ($ty:ty, $conv:ident) => {
        impl Decode for $ty {
            fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
                Ok(column.non_null()?.$conv()?)
            }
        }
    };
}

decode!(bool, to_bool);
decode!(i16, to_i16);
decode!(i32, to_i32);
decode!(i64, to_i64);
decode!(f32, to_f32);
decode!(f64, to_f64);
decode!(Vec<u8>, to_bytes);

impl Decode for String {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        Ok(column.non_null()?.render(column.utils, None)?)
    }
}

impl Decode for Timestamp {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        Ok(column.non_null()?.to_timestamp(column.utils, None)?)
    }
}

impl Decode for Date {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        Ok(column.non_null()?.to_date(column.utils, None)?)
    }
}

impl Decode for Time {
    fn decode(column: Column<'_>) -> Result<Self, DecodeError> {
        Ok(column.non_null()?.to_time(column.utils, None)?)
    }
}

/// Type that can be used for indexing column.
///
/// `usize` index is zero based, `&str` matches the first column label
/// ignoring ascii case.
pub trait Index: Sized + sealed::Sealed {
    /// Returns the nth column.
    fn position(self, fields: &[Field]) -> Result<usize, DecodeError>;
}

impl Index for usize {
    fn position(self, fields: &[Field]) -> Result<usize, DecodeError> {
        match self < fields.len() {
            true => Ok(self),
            false => Err(DecodeError::IndexOutOfBounds(self)),
        }
    }
}

impl Index for &str {
    fn position(self, fields: &[Field]) -> Result<usize, DecodeError> {
        fields
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(self))
            .ok_or_else(|| DecodeError::ColumnNotFound(String::from(self).into()))
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for DecodeError {
            fn from($pat: $ty) -> Self {
                $body
            }
        }
    };
}

/// An error when decoding row value.
pub enum DecodeError {
    /// Postgres return non utf8 string.
    Utf8(Utf8Error),
    /// Column requested not found.
    ColumnNotFound(Cow<'static,str>),
    /// Index requested is out of bounds.
    IndexOutOfBounds(usize),
    /// Oid requested missmatch.
    OidMissmatch,
    /// Row is null.
    Null,
    /// Binary value is shorter than its type requires.
    Length { expected: usize, actual: usize },
    /// Text value does not match the type textual form.
    Invalid(Cow<'static,str>),
    /// Value cannot be converted to the requested type.
    Convert(Box<crate::Error>),
    /// Failed to deserialize using `serde_json`.
    #[cfg(feature = "json")]
    Json(serde_json::error::Error),
}

impl DecodeError {
    pub(crate) fn invalid(ty: &str, value: &[u8]) -> Self {
        Self::Invalid(format!("Bad value for type {ty} : {}", value.lossy()).into())
    }
}

impl fmt::Display for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("failed to decode value, ")?;
        match self {
            Self::Utf8(e) => write!(f, "{e}"),
            Self::ColumnNotFound(name) => write!(f, "column not found: {name:?}"),
            Self::IndexOutOfBounds(u) => write!(f, "index out of bounds: {u:?}"),
            Self::OidMissmatch => write!(f, "data type missmatch"),
            Self::Null => write!(f, "unexpected NULL value"),
            Self::Length { expected, actual } => {
                write!(f, "expected {expected} bytes, got {actual}")
            }
            Self::Invalid(msg) => f.write_str(msg),
            Self::Convert(e) => write!(f, "{e}"),
            #[cfg(feature = "json")]
            Self::Json(e) => write!(f, "{e}"),
        }
    }
}

from!(<Utf8Error>e => Self::Utf8(e));
from!(<FromUtf8Error>e => Self::Utf8(e.utf8_error()));
from!(<crate::Error>e => Self::Convert(Box::new(e)));
#[cfg(feature = "json")]
from!(<serde_json::error::Error>e => Self::Json(e));

impl std::error::Error for DecodeError { }

impl fmt::Debug for DecodeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn row() -> Row {
        let fields: Arc<[Field]> = Arc::from(vec![
            Field::new("id", Type::Int4.oid(), PgFormat::Binary),
            Field::new("Name", Type::Text.oid(), PgFormat::Text),
            Field::new("score", Type::Float8.oid(), PgFormat::Text),
        ]);
        let values = vec![
            Some(Bytes::copy_from_slice(&7i32.to_be_bytes())),
            Some(Bytes::from_static(b"foo")),
            None,
        ];
        Row::new(fields, values, Arc::default())
    }

    #[test]
    fn try_get_by_index_and_label() {
        let row = row();
        assert_eq!(row.try_get::<_, i32>(0).unwrap(), 7);
        assert_eq!(row.try_get::<_, i64>("ID").unwrap(), 7);
        assert_eq!(row.try_get::<_, String>("name").unwrap(), "foo");
        assert_eq!(row.try_get::<_, Option<f64>>(2).unwrap(), None);
        assert!(matches!(row.try_get::<_, f64>(2), Err(DecodeError::Null)));
        assert!(matches!(row.try_get::<_, i32>(3), Err(DecodeError::IndexOutOfBounds(3))));
        assert!(matches!(row.try_get::<_, i32>("nope"), Err(DecodeError::ColumnNotFound(_))));
    }

    #[test]
    fn from_row_tuple() {
        let (id, name) = row().decode::<(i32, String)>().unwrap();
        assert_eq!(id, 7);
        assert_eq!(name, "foo");
        assert!(row().decode::<(i32, i32)>().is_err());
    }
}
