//! Bound query parameters.
use bytes::Bytes;
use std::{fmt, sync::Arc};

use crate::{
    Error, Result,
    ext::FmtExt,
    postgres::{Oid, PgFormat, SqlType, Type},
    temporal::{Date, Time, Timestamp, TimestampUtils, Zone},
    value::Value,
};

/// One bound parameter.
#[derive(Clone, PartialEq)]
pub struct Param {
    oid: Oid,
    format: PgFormat,
    value: Option<Bytes>,
}

impl Param {
    /// Type oid, [`Type::UNSPECIFIED`] lets the server infer it.
    pub fn oid(&self) -> Oid {
        self.oid
    }

    pub fn format(&self) -> PgFormat {
        self.format
    }

    /// Encoded value, [`None`] is `NULL`.
    pub fn value(&self) -> Option<&[u8]> {
        self.value.as_deref()
    }
}

impl fmt::Debug for Param {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Param")
            .field("oid", &self.oid)
            .field("format", &self.format)
            .field("value", &self.value.as_deref().map(FmtExt::lossy))
            .finish()
    }
}

/// Parameters of one execution, indexed from 1.
///
/// Integers and floats are sent in binary when binary transfer is on,
/// everything else in text.
#[derive(Clone)]
pub struct ParameterList {
    params: Vec<Option<Param>>,
    out: Vec<Option<SqlType>>,
    binary: bool,
    utils: Arc<TimestampUtils>,
}

impl ParameterList {
    pub fn new(count: usize, binary: bool, utils: Arc<TimestampUtils>) -> ParameterList {
        ParameterList { params: vec![None; count], out: vec![None; count], binary, utils }
    }

    /// An empty list, for queries without placeholders.
    pub fn empty() -> ParameterList {
        ParameterList::new(0, false, Arc::default())
    }

    /// Number of placeholders.
    pub fn len(&self) -> usize {
        self.params.len()
    }

    pub fn is_empty(&self) -> bool {
        self.params.is_empty()
    }

    /// Parameter at 1-based `index`, [`None`] if unset.
    pub fn get(&self, index: usize) -> Option<&Param> {
        self.params.get(index.checked_sub(1)?)?.as_ref()
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = Option<&Param>> {
        self.params.iter().map(Option::as_ref)
    }

    /// Declared parameter types, in placeholder order.
    pub fn type_oids(&self) -> Vec<Oid> {
        self.params.iter().map(|p| p.as_ref().map_or(Type::UNSPECIFIED, |p| p.oid)).collect()
    }

    fn slot(&mut self, index: usize) -> Result<&mut Option<Param>> {
        let len = self.params.len();
        match index.checked_sub(1).and_then(|i| self.params.get_mut(i)) {
            Some(slot) => Ok(slot),
            None => Err(Error::range(format!(
                "The column index is out of range: {index}, number of columns: {len}."
            ))),
        }
    }

    fn bind(&mut self, index: usize, oid: Oid, format: PgFormat, value: Option<Bytes>) -> Result<()> {
        *self.slot(index)? = Some(Param { oid, format, value });
        Ok(())
    }

    fn bind_text(&mut self, index: usize, oid: Oid, text: String) -> Result<()> {
        self.bind(index, oid, PgFormat::Text, Some(Bytes::from(text)))
    }

    fn bind_number<const N: usize>(&mut self, index: usize, ty: Type, be: [u8; N], text: impl FnOnce() -> String) -> Result<()> {
        match self.binary {
            true => self.bind(index, ty.oid(), PgFormat::Binary, Some(Bytes::copy_from_slice(&be))),
            false => self.bind_text(index, ty.oid(), text()),
        }
    }

    pub fn set_null(&mut self, index: usize, oid: Oid) -> Result<()> {
        self.bind(index, oid, PgFormat::Text, None)
    }

    pub fn set_bool(&mut self, index: usize, value: bool) -> Result<()> {
        let text = if value { "TRUE" } else { "FALSE" };
        self.bind_text(index, Type::Bool.oid(), text.into())
    }

    pub fn set_i16(&mut self, index: usize, value: i16) -> Result<()> {
        self.bind_number(index, Type::Int2, value.to_be_bytes(), || value.to_string())
    }

    pub fn set_i32(&mut self, index: usize, value: i32) -> Result<()> {
        self.bind_number(index, Type::Int4, value.to_be_bytes(), || value.to_string())
    }

    pub fn set_i64(&mut self, index: usize, value: i64) -> Result<()> {
        self.bind_number(index, Type::Int8, value.to_be_bytes(), || value.to_string())
    }

    pub fn set_f32(&mut self, index: usize, value: f32) -> Result<()> {
        self.bind_number(index, Type::Float4, value.to_be_bytes(), || value.to_string())
    }

    pub fn set_f64(&mut self, index: usize, value: f64) -> Result<()> {
        self.bind_number(index, Type::Float8, value.to_be_bytes(), || value.to_string())
    }

    /// Bind decimal text, validated before it is sent.
    pub fn set_numeric(&mut self, index: usize, value: &str) -> Result<()> {
        let value = value.trim();
        if value != "NaN" && value.parse::<f64>().is_err() {
            return Err(Error::parse(format!("Bad value for type numeric : {value}")));
        }
        self.bind_text(index, Type::Numeric.oid(), value.into())
    }

    pub fn set_str(&mut self, index: usize, value: &str) -> Result<()> {
        self.bind_text(index, Type::Varchar.oid(), value.into())
    }

    pub fn set_bytes(&mut self, index: usize, value: &[u8]) -> Result<()> {
        self.bind(index, Type::Bytea.oid(), PgFormat::Binary, Some(Bytes::copy_from_slice(value)))
    }

    /// Bind a date rendered in `zone`, the session zone when [`None`].
    pub fn set_date(&mut self, index: usize, value: &Date, zone: Option<&Zone>) -> Result<()> {
        let text = self.utils.date_to_string(zone, value);
        self.bind_text(index, Type::UNSPECIFIED, text)
    }

    pub fn set_time(&mut self, index: usize, value: &Time, zone: Option<&Zone>) -> Result<()> {
        let text = self.utils.time_to_string(zone, value);
        self.bind_text(index, Type::Time.oid(), text)
    }

    /// Bind a timestamp, the server decides between `timestamp` and
    /// `timestamptz` from the context.
    pub fn set_timestamp(&mut self, index: usize, value: &Timestamp, zone: Option<&Zone>) -> Result<()> {
        let text = self.utils.timestamp_to_string(zone, value);
        self.bind_text(index, Type::UNSPECIFIED, text)
    }

    /// Bind a decoded value with the setter of its kind.
    pub fn set_value(&mut self, index: usize, value: &Value) -> Result<()> {
        match value {
            Value::Null => self.set_null(index, Type::UNSPECIFIED),
            Value::Bool(v) => self.set_bool(index, *v),
            Value::Int2(v) => self.set_i16(index, *v),
            Value::Int4(v) => self.set_i32(index, *v),
            Value::Int8(v) => self.set_i64(index, *v),
            Value::Float4(v) => self.set_f32(index, *v),
            Value::Float8(v) => self.set_f64(index, *v),
            Value::Numeric(v) => self.set_numeric(index, v),
            Value::Money(v) => self.set_f64(index, *v),
            Value::Text(v) => self.set_str(index, v),
            Value::Bytes(v) => self.set_bytes(index, v),
            Value::Date(v) => self.set_date(index, v, None),
            Value::Time(v) => self.set_time(index, v, None),
            Value::Timestamp(v) => self.set_timestamp(index, v, None),
            Value::Other(v) => self.bind(index, Type::UNSPECIFIED, PgFormat::Binary, Some(v.clone())),
        }
    }

    /// Register an out parameter.
    ///
    /// An out only parameter is sent as a `void` `NULL`.
    pub fn register_out(&mut self, index: usize, ty: SqlType) -> Result<()> {
        let slot = self.slot(index)?;
        if slot.is_none() {
            *slot = Some(Param { oid: Type::Void.oid(), format: PgFormat::Text, value: None });
        }
        self.out[index - 1] = Some(ty.normalized());
        Ok(())
    }

    /// Registered out types, indexed like the parameters.
    pub fn out_types(&self) -> &[Option<SqlType>] {
        &self.out
    }

    /// Number of registered out parameters.
    pub fn out_count(&self) -> usize {
        self.out.iter().flatten().count()
    }

    /// Check that every placeholder has a value.
    pub fn check_all_set(&self) -> Result<()> {
        match self.params.iter().position(Option::is_none) {
            Some(i) => Err(Error::range(format!("No value specified for parameter {}.", i + 1))),
            None => Ok(()),
        }
    }

    /// Unset every value, out registrations are kept.
    pub fn clear(&mut self) {
        for (param, out) in self.params.iter_mut().zip(&self.out) {
            *param = out.map(|_| Param { oid: Type::Void.oid(), format: PgFormat::Text, value: None });
        }
    }
}

impl fmt::Debug for ParameterList {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_list().entries(&self.params).finish()
    }
}
