//! `pgexec` error types.
use std::{backtrace::Backtrace, fmt, str::Utf8Error};

use crate::{
    common::{message_error, unit_error},
    executor::DatabaseError,
    row::DecodeError,
    statement::BatchError,
};

/// A specialized [`Result`] type for `pgexec` operation.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// All possible error from `pgexec` library.
pub struct Error {
    context: String,
    backtrace: Backtrace,
    kind: ErrorKind,
}

impl Error {
    pub fn kind(&self) -> &ErrorKind {
        &self.kind
    }

    pub fn into_kind(self) -> ErrorKind {
        self.kind
    }

    pub fn backtrace(&self) -> &Backtrace {
        &self.backtrace
    }

    /// Attach context message, displayed before the error kind.
    pub fn context(mut self, context: impl Into<String>) -> Self {
        self.context = context.into();
        self
    }

    /// Returns the five character SQLSTATE class this error belongs to.
    pub fn sql_state(&self) -> &str {
        self.kind.sql_state()
    }

    /// Returns `true` if this error is an interrupted query.
    pub fn is_cancelled(&self) -> bool {
        match &self.kind {
            ErrorKind::Cancelled(_) => true,
            ErrorKind::Batch(e) => e.cause().is_cancelled(),
            _ => false,
        }
    }

    pub(crate) fn parse(message: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        ParseError::new(message).into()
    }

    pub(crate) fn state(message: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        StateError::new(message).into()
    }

    pub(crate) fn range(message: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        RangeError::new(message).into()
    }

    pub(crate) fn mismatch(message: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        TypeMismatch::new(message).into()
    }

    pub(crate) fn no_data(message: impl Into<std::borrow::Cow<'static, str>>) -> Self {
        NoData::new(message).into()
    }
}

/// All possible error kind from `pgexec` library.
pub enum ErrorKind {
    /// Malformed escape, call or temporal syntax.
    Parse(ParseError),
    /// Operation not allowed in the current statement or cursor state.
    State(StateError),
    /// Declared type does not match the actual type.
    TypeMismatch(TypeMismatch),
    /// Value or setting out of its accepted range.
    Range(RangeError),
    /// Batch stopped at the first failing entry.
    Batch(BatchError),
    /// Query interrupted by cancel request or timeout.
    Cancelled(Cancelled),
    /// Operation is not implemented.
    Unsupported(Unsupported),
    /// Error reported by the server.
    Database(DatabaseError),
    /// Failed to decode a column value.
    Decode(DecodeError),
    /// Expected result is missing.
    NoData(NoData),
    Utf8(Utf8Error),
}

impl ErrorKind {
    fn sql_state(&self) -> &str {
        match self {
            Self::Parse(_) => "42601",
            Self::State(_) => "24000",
            Self::TypeMismatch(_) => "42821",
            Self::Range(_) => "22023",
            Self::Batch(e) => e.cause().sql_state(),
            Self::Cancelled(_) => "57014",
            Self::Unsupported(_) => "0A000",
            Self::Database(e) => e.code(),
            Self::Decode(_) => "22000",
            Self::NoData(_) => "02000",
            Self::Utf8(_) => "22021",
        }
    }
}

message_error! {
    /// Malformed sql or value text.
    pub struct ParseError("parse error");
}

message_error! {
    /// Operation not allowed in current state.
    pub struct StateError("invalid state");
}

message_error! {
    /// Value out of accepted range.
    pub struct RangeError("out of range");
}

message_error! {
    /// Declared type does not match actual type.
    pub struct TypeMismatch("data type mismatch");
}

message_error! {
    /// Expected result is missing.
    pub struct NoData("no data");
}

unit_error! {
    /// Query was cancelled by explicit user request.
    pub struct UserCancelled("canceling statement due to user request");
}

/// Query interrupted by cancel request or statement timeout.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Cancelled {
    pub(crate) timed_out: bool,
}

impl Cancelled {
    /// Returns `true` if the cancel was triggered by the query timeout.
    pub fn timed_out(&self) -> bool {
        self.timed_out
    }
}

impl std::error::Error for Cancelled { }

impl fmt::Display for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.timed_out {
            true => f.write_str("canceling statement due to statement timeout"),
            false => fmt::Display::fmt(&UserCancelled, f),
        }
    }
}

impl fmt::Debug for Cancelled {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

/// Operation is not implemented.
#[derive(Clone, Copy, PartialEq, Eq)]
pub struct Unsupported(pub &'static str);

impl std::error::Error for Unsupported { }

impl fmt::Display for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "method {} is not yet implemented", self.0)
    }
}

impl fmt::Debug for Unsupported {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

macro_rules! from {
    (<$ty:ty>$pat:pat => $body:expr) => {
        impl From<$ty> for Error {
            fn from($pat: $ty) -> Self {
                let backtrace = std::backtrace::Backtrace::capture();
                Self { context: String::new(), backtrace, kind: $body }
            }
        }
    };
}

from!(<ErrorKind>e => e);
from!(<ParseError>e => ErrorKind::Parse(e));
from!(<StateError>e => ErrorKind::State(e));
from!(<TypeMismatch>e => ErrorKind::TypeMismatch(e));
from!(<RangeError>e => ErrorKind::Range(e));
from!(<BatchError>e => ErrorKind::Batch(e));
from!(<Cancelled>e => ErrorKind::Cancelled(e));
from!(<Unsupported>e => ErrorKind::Unsupported(e));
from!(<DatabaseError>e => ErrorKind::Database(e));
from!(<DecodeError>e => ErrorKind::Decode(e));
from!(<NoData>e => ErrorKind::NoData(e));
from!(<Utf8Error>e => ErrorKind::Utf8(e));

impl std::error::Error for Error { }

impl fmt::Display for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if !self.context.is_empty() {
            write!(f, "{}: ", self.context)?;
        }

        fmt::Display::fmt(&self.kind, f)?;

        if let std::backtrace::BacktraceStatus::Captured = self.backtrace.status() {
            let mut backtrace = self.backtrace.to_string();
            write!(f, "\n\n")?;
            writeln!(f, "Stack backtrace:")?;
            backtrace.truncate(backtrace.trim_end().len());
            write!(f, "{}", backtrace)?;
        }

        Ok(())
    }
}

impl fmt::Debug for Error {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl std::error::Error for ErrorKind { }

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Parse(e) => e.fmt(f),
            Self::State(e) => e.fmt(f),
            Self::TypeMismatch(e) => e.fmt(f),
            Self::Range(e) => e.fmt(f),
            Self::Batch(e) => e.fmt(f),
            Self::Cancelled(e) => e.fmt(f),
            Self::Unsupported(e) => e.fmt(f),
            Self::Database(e) => e.fmt(f),
            Self::Decode(e) => e.fmt(f),
            Self::NoData(e) => e.fmt(f),
            Self::Utf8(e) => e.fmt(f),
        }
    }
}

impl fmt::Debug for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
