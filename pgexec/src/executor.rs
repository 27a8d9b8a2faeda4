//! The [`Executor`] trait.
//!
//! An executor owns the wire protocol: message framing, the portal and
//! statement lifecycle on the server, and the side channel used to send
//! cancel requests. The engine only decides *what* to run and with which
//! [`QueryFlags`], results are pushed back through a [`ResultHandler`].
use std::{fmt, sync::Arc};

use crate::{
    Result,
    flags::QueryFlags,
    params::ParameterList,
    postgres::Oid,
    query::{PortalName, QueryHandle, StatementName},
    row::{Field, Tuple},
};

/// Wire protocol collaborator of a session.
///
/// All round trips of one session are serialized, the session holds the
/// executor behind an async mutex.
pub trait Executor: Send + 'static {
    /// Side channel used to interrupt a running query.
    type Cancel: CancelSender;

    /// Execute `query` with `params`.
    ///
    /// When [`QueryFlags::ONESHOT`] is not set and the handle carries a
    /// [`StatementName`], the statement is parsed once under that name and
    /// reused afterwards. With [`QueryFlags::FORWARD_CURSOR`] at most
    /// `fetch_size` rows are returned and a [`CursorHandle`] is given when
    /// more rows remain. `max_rows` of zero means unlimited.
    fn execute(
        &mut self,
        query: &QueryHandle,
        params: &ParameterList,
        handler: &mut dyn ResultHandler,
        max_rows: usize,
        fetch_size: usize,
        flags: QueryFlags,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Execute every entry of a batch, in order, stopping at the first error.
    ///
    /// The default executes them one by one.
    fn execute_batch(
        &mut self,
        batch: &[(&QueryHandle, &ParameterList)],
        handler: &mut dyn ResultHandler,
        flags: QueryFlags,
    ) -> impl Future<Output = Result<()>> + Send {
        async move {
            for (query, params) in batch {
                self.execute(query, params, handler, 0, 0, flags).await?;
            }
            Ok(())
        }
    }

    /// Fetch the next `rows` rows of an open server cursor, zero means all.
    ///
    /// The handler receives a [`CursorHandle`] again if rows remain,
    /// otherwise the portal is exhausted and closed by the executor.
    fn fetch(
        &mut self,
        cursor: &CursorHandle,
        handler: &mut dyn ResultHandler,
        rows: usize,
    ) -> impl Future<Output = Result<()>> + Send;

    /// Close a named server prepared statement.
    fn close_statement(&mut self, name: &StatementName) -> impl Future<Output = Result<()>> + Send;

    /// Close an open portal.
    fn close_portal(&mut self, name: &PortalName) -> impl Future<Output = Result<()>> + Send;

    /// Candidate keys of a table, primary key first.
    ///
    /// Each key lists its column names. Only keys whose columns are all
    /// `NOT NULL` should be returned.
    fn primary_keys(
        &mut self,
        schema: Option<&str>,
        table: &str,
    ) -> impl Future<Output = Result<Vec<Vec<String>>>> + Send;

    /// Returns a handle that can interrupt the running query.
    fn cancel_sender(&self) -> Self::Cancel;

    /// Returns `true` if the server version is at least `major.minor`.
    fn server_version_at_least(&self, major: u32, minor: u32) -> bool;

    /// Server `standard_conforming_strings` setting.
    fn standard_conforming_strings(&self) -> bool;

    /// Server `integer_datetimes` setting.
    fn integer_datetimes(&self) -> bool;
}

/// Send a cancel request over a separate connection.
pub trait CancelSender: Clone + Send + Sync + 'static {
    fn send_cancel_request(&self) -> impl Future<Output = Result<()>> + Send;
}

/// Receiver of execution results.
///
/// Results are delivered in the order the server produced them.
pub trait ResultHandler: Send {
    /// A row set. `cursor` is given when the portal is suspended and more
    /// rows can be fetched.
    fn handle_result_rows(&mut self, fields: Arc<[Field]>, tuples: Vec<Tuple>, cursor: Option<CursorHandle>);

    /// Completion of a command, `status` is the command tag.
    fn handle_command_status(&mut self, status: &str, count: u64, oid: Oid);

    /// A server notice.
    fn handle_warning(&mut self, warning: String);
}

/// An open server side cursor.
#[derive(Clone, PartialEq, Eq)]
pub struct CursorHandle {
    portal: PortalName,
}

impl CursorHandle {
    pub fn new(portal: PortalName) -> CursorHandle {
        CursorHandle { portal }
    }

    pub fn portal(&self) -> &PortalName {
        &self.portal
    }
}

impl fmt::Debug for CursorHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_tuple("CursorHandle").field(&self.portal.as_str()).finish()
    }
}

/// Error reported by the server.
#[derive(Clone, PartialEq, Eq)]
pub struct DatabaseError {
    code: String,
    message: String,
}

impl DatabaseError {
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> DatabaseError {
        DatabaseError { code: code.into(), message: message.into() }
    }

    /// Five character SQLSTATE code.
    pub fn code(&self) -> &str {
        &self.code
    }

    pub fn message(&self) -> &str {
        &self.message
    }

    /// Returns `true` for `query_canceled`.
    pub fn is_query_canceled(&self) -> bool {
        self.code == "57014"
    }
}

impl std::error::Error for DatabaseError { }

impl fmt::Display for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "database error [{}]: {}", self.code, self.message)
    }
}

impl fmt::Debug for DatabaseError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}
