//! Postgres statement execution engine
//!
//! Everything between the application and the wire protocol: escape
//! rewriting, parameter binding, the value codec, the query cache and
//! server side preparation, result cursors, updatable cursors and query
//! cancellation. The wire protocol itself is behind the [`Executor`]
//! trait.
//!
//! # Examples
//!
//! ```no_run
//! use pgexec::{Executor, SessionFactory};
//!
//! # async fn app<E: Executor>(executor: E) -> pgexec::Result<()> {
//! let session = SessionFactory::from_env().open(executor);
//!
//! let mut ps = session.prepare_statement("SELECT id, name FROM users WHERE id > ?")?;
//! ps.set_i32(1, 10)?;
//!
//! let cursor = ps.execute_query().await?;
//! while cursor.next().await? {
//!     let (id, name) = cursor.decode::<(i32, String)>()?;
//!     println!("{id}: {name}");
//! }
//! ps.close();
//! # Ok(())
//! # }
//! ```
//!
//! Escapes and function calls:
//!
//! ```no_run
//! use pgexec::{Executor, Session, postgres::SqlType};
//!
//! # async fn app<E: Executor>(session: Session<E>) -> pgexec::Result<()> {
//! let mut stmt = session.create_statement();
//! stmt.execute_update("DELETE FROM log WHERE at < {d '2001-10-09'}").await?;
//!
//! let mut call = session.prepare_call("{? = call add_one(?)}")?;
//! call.register_out_parameter(1, SqlType::Integer)?;
//! call.set_i32(2, 41)?;
//! call.execute().await?;
//! assert_eq!(call.get_i32(1)?, 42);
//! # Ok(())
//! # }
//! ```

mod common;
mod ext;

// Types
pub mod postgres;
pub mod temporal;
pub mod value;
pub mod row;
pub mod registry;
pub mod types;

// Sql
pub mod escape;
pub mod parser;
pub mod flags;
pub mod query;
pub mod params;

// Execution
pub mod executor;
pub mod cancel;
mod config;
mod session;
pub mod statement;
pub mod cursor;

pub mod error;

#[cfg(test)]
mod mock;

pub use row::{Decode, DecodeError, FromRow, Row};
pub use value::Value;

pub use config::Config;
pub use session::{IsolationLevel, Session, SessionFactory};
pub use executor::{CancelSender, Executor, ResultHandler};
pub use statement::{CallableStatement, PreparedStatement, ResultKind, Statement};
pub use cursor::Cursor;
pub use error::{Error, ErrorKind, Result};

#[cfg(feature = "macros")]
pub use pgexec_macros::{Decode, FromRow};
