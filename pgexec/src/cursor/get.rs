//! Column getters of the current row.
//!
//! Getters of primitives return a default for `NULL` and set
//! [`was_null`][Cursor::was_null], the others return [`None`].
use bytes::Bytes;
use std::sync::Arc;

use super::Cursor;
use crate::{
    Error, Result,
    executor::Executor,
    postgres::PgFormat,
    registry::CustomValue,
    row::{Column, Decode, Field, FromRow, Row},
    temporal::{Date, Time, Timestamp, TimestampUtils, Zone},
    value::{self, Value},
};

/// A column reference: a 1-based `usize` or a column label.
///
/// Labels match the first column ignoring ascii case.
pub trait ColumnIndex: Copy + sealed::Sealed {
    /// Zero based position of the column.
    fn column(self, fields: &[Field]) -> Result<usize>;
}

impl ColumnIndex for usize {
    fn column(self, fields: &[Field]) -> Result<usize> {
        match self >= 1 && self <= fields.len() {
            true => Ok(self - 1),
            false => Err(Error::range(format!(
                "The column index is out of range: {self}, number of columns: {}.",
                fields.len(),
            ))),
        }
    }
}

impl ColumnIndex for &str {
    fn column(self, fields: &[Field]) -> Result<usize> {
        fields
            .iter()
            .position(|f| f.name().eq_ignore_ascii_case(self))
            .ok_or_else(|| Error::range(format!("The column name {self} was not found in this ResultSet.")))
    }
}

mod sealed {
    pub trait Sealed { }
    impl Sealed for usize { }
    impl Sealed for &str { }
}

impl<E: Executor> Cursor<E> {
    /// 1-based index of the column labeled `label`.
    pub fn find_column(&self, label: &str) -> Result<usize> {
        self.check_closed()?;
        label.column(&self.fields).map(|i| i + 1)
    }

    /// Returns `true` if the last column read was `NULL`.
    pub fn was_null(&self) -> bool {
        self.was_null
    }

    pub(super) fn utils(&self) -> Arc<TimestampUtils> {
        self.session.timestamp_utils().clone()
    }

    /// Raw bytes of a column of the current row.
    fn cell(&mut self, index: impl ColumnIndex) -> Result<(usize, Option<Bytes>)> {
        self.check_closed()?;
        let tuple = self.current_tuple()?;
        let column = index.column(&self.fields)?;
        let bytes = tuple.get(column).cloned().flatten();
        self.was_null = bytes.is_none();
        Ok((column, bytes))
    }

    /// Decoded value of a column, [`Value::Null`] for `NULL`.
    pub fn get_value(&mut self, index: impl ColumnIndex) -> Result<Value> {
        let (column, bytes) = self.cell(index)?;
        let Some(bytes) = bytes else {
            return Ok(Value::Null);
        };
        Ok(self.fields[column].decode(&bytes, &self.utils())?)
    }

    pub fn get_bool(&mut self, index: impl ColumnIndex) -> Result<bool> {
        match self.get_value(index)? {
            Value::Null => Ok(false),
            value => value.to_bool(),
        }
    }

    pub fn get_i16(&mut self, index: impl ColumnIndex) -> Result<i16> {
        match self.get_value(index)? {
            Value::Null => Ok(0),
            value => value.to_i16(),
        }
    }

    pub fn get_i32(&mut self, index: impl ColumnIndex) -> Result<i32> {
        match self.get_value(index)? {
            Value::Null => Ok(0),
            value => value.to_i32(),
        }
    }

    pub fn get_i64(&mut self, index: impl ColumnIndex) -> Result<i64> {
        match self.get_value(index)? {
            Value::Null => Ok(0),
            value => value.to_i64(),
        }
    }

    pub fn get_f32(&mut self, index: impl ColumnIndex) -> Result<f32> {
        match self.get_value(index)? {
            Value::Null => Ok(0.0),
            value => value.to_f32(),
        }
    }

    pub fn get_f64(&mut self, index: impl ColumnIndex) -> Result<f64> {
        match self.get_value(index)? {
            Value::Null => Ok(0.0),
            value => value.to_f64(),
        }
    }

    /// Exact decimal text of a numeric column.
    pub fn get_numeric(&mut self, index: impl ColumnIndex) -> Result<Option<String>> {
        match self.get_value(index)? {
            Value::Null => Ok(None),
            value => value.to_numeric().map(Some),
        }
    }

    /// Text form of a column, temporal values are shown in UTC.
    pub fn get_str(&mut self, index: impl ColumnIndex) -> Result<Option<String>> {
        match self.get_value(index)? {
            Value::Null => Ok(None),
            value => value.render(&self.utils(), None).map(Some),
        }
    }

    pub fn get_bytes(&mut self, index: impl ColumnIndex) -> Result<Option<Vec<u8>>> {
        match self.get_value(index)? {
            Value::Null => Ok(None),
            value => value.to_bytes().map(Some),
        }
    }

    /// Read a date, values without offset are read in `zone`.
    pub fn get_date(&mut self, index: impl ColumnIndex, zone: Option<&Zone>) -> Result<Option<Date>> {
        let (column, bytes) = self.cell(index)?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let field = &self.fields[column];
        value::date_in(field.ty(), field.format(), &bytes, &self.utils(), zone).map(Some)
    }

    pub fn get_time(&mut self, index: impl ColumnIndex, zone: Option<&Zone>) -> Result<Option<Time>> {
        let (column, bytes) = self.cell(index)?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let field = &self.fields[column];
        value::time_in(field.ty(), field.format(), &bytes, &self.utils(), zone).map(Some)
    }

    pub fn get_timestamp(&mut self, index: impl ColumnIndex, zone: Option<&Zone>) -> Result<Option<Timestamp>> {
        let (column, bytes) = self.cell(index)?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let field = &self.fields[column];
        value::timestamp_in(field.ty(), field.format(), &bytes, &self.utils(), zone).map(Some)
    }

    /// Construct a column with the handler registered for its type.
    pub fn get_custom(&mut self, index: impl ColumnIndex) -> Result<Option<Box<dyn CustomValue>>> {
        let (column, bytes) = self.cell(index)?;
        let Some(bytes) = bytes else {
            return Ok(None);
        };
        let field = &self.fields[column];
        let text = match field.format() {
            PgFormat::Text => std::str::from_utf8(&bytes)?.to_owned(),
            PgFormat::Binary => field.decode(&bytes, &self.utils())?.render(&self.utils(), None)?,
        };
        self.session.registry().construct(field.oid(), &text).map(Some)
    }

    /// Decode a column with its [`Decode`] implementation.
    pub fn get<T: Decode>(&mut self, index: impl ColumnIndex) -> Result<T> {
        let (column, bytes) = self.cell(index)?;
        let utils = self.utils();
        Ok(Column::new(&self.fields[column], bytes, &utils).decode()?)
    }

    /// The current row, detached from the cursor.
    pub fn row(&self) -> Result<Row> {
        self.check_closed()?;
        let tuple = self.current_tuple()?.clone();
        Ok(Row::new(self.fields.clone(), tuple, self.utils()))
    }

    /// Decode the current row with its [`FromRow`] implementation.
    pub fn decode<T: FromRow>(&self) -> Result<T> {
        Ok(self.row()?.decode()?)
    }
}
