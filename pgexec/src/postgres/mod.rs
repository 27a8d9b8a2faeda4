//! Postgres wire level type information.
//!
//! ## [`Format`][PgFormat] and Format Codes
//!
//! Data of a particular data type might be transmitted in any of several different formats.
//! As of PostgreSQL 7.4 the only supported formats are “text” and “binary”. Text has format
//! code zero, and Binary has format code one.
//!
//! Every column of a result carries its own format code, the value codec
//! dispatch on the pair of column [`Type`] and [`PgFormat`].
//!
//! <https://www.postgresql.org/docs/17/protocol-overview.html>

mod pg_type;
mod pg_format;

pub use pg_type::{Oid, PgType, SqlType, Type};
pub use pg_format::PgFormat;
