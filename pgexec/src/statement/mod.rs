//! Statement execution.
//!
//! A [`Statement`] runs ad hoc sql, a [`PreparedStatement`] owns one
//! cached [`QueryHandle`] and its parameters, a [`CallableStatement`]
//! additionally unpacks out parameters.
//!
//! Every execution composes [`QueryFlags`] the same way:
//!
//! 1. previous results are closed
//! 2. a forward cursor is requested when paging is possible
//! 3. generated keys ask for rows and status together
//! 4. the handle stays one-shot until its prepare threshold is passed
//! 5. the implicit `BEGIN` is suppressed in auto commit mode
//! 6. updatable results are transferred as text
use std::{collections::VecDeque, time::Duration};

use crate::{
    Error, ErrorKind, Result, Session,
    cancel::Canceller,
    common::verbose,
    cursor::{Cursor, CursorOptions},
    error::Cancelled,
    executor::Executor,
    flags::QueryFlags,
    params::ParameterList,
    postgres::Oid,
    query::{CacheKey, QueryHandle},
};

/// Expose the settings and result chain of an inner [`Statement`].
macro_rules! forward_statement {
    ($ty:ident, $($field:ident).+) => {
        impl<E: Executor> $ty<E> {
            pub fn session(&self) -> &crate::Session<E> {
                self.$($field).+.session()
            }

            pub fn result_kind(&self) -> super::ResultKind {
                self.$($field).+.result_kind()
            }

            /// See [`Statement::set_fetch_size`][super::Statement::set_fetch_size].
            pub fn set_fetch_size(&mut self, rows: i32) -> Result<()> {
                self.$($field).+.set_fetch_size(rows)
            }

            pub fn fetch_size(&self) -> usize {
                self.$($field).+.fetch_size()
            }

            pub fn set_max_rows(&mut self, rows: i32) -> Result<()> {
                self.$($field).+.set_max_rows(rows)
            }

            pub fn max_rows(&self) -> usize {
                self.$($field).+.max_rows()
            }

            pub fn set_query_timeout(&mut self, seconds: i32) -> Result<()> {
                self.$($field).+.set_query_timeout(seconds)
            }

            pub fn query_timeout(&self) -> Option<std::time::Duration> {
                self.$($field).+.query_timeout()
            }

            pub fn set_prepare_threshold(&mut self, threshold: i32) {
                self.$($field).+.set_prepare_threshold(threshold)
            }

            pub fn prepare_threshold(&self) -> i32 {
                self.$($field).+.prepare_threshold()
            }

            pub fn result_set(&mut self) -> Option<&mut crate::cursor::Cursor<E>> {
                self.$($field).+.result_set()
            }

            pub fn take_result_set(&mut self) -> Option<crate::cursor::Cursor<E>> {
                self.$($field).+.take_result_set()
            }

            pub fn update_count(&self) -> Option<u64> {
                self.$($field).+.update_count()
            }

            pub fn last_oid(&self) -> Option<crate::postgres::Oid> {
                self.$($field).+.last_oid()
            }

            pub fn more_results(&mut self) -> bool {
                self.$($field).+.more_results()
            }

            pub fn generated_keys(&mut self) -> Option<&mut crate::cursor::Cursor<E>> {
                self.$($field).+.generated_keys()
            }

            pub fn take_generated_keys(&mut self) -> Option<crate::cursor::Cursor<E>> {
                self.$($field).+.take_generated_keys()
            }

            pub fn warnings(&self) -> &[String] {
                self.$($field).+.warnings()
            }

            pub fn clear_warnings(&mut self) {
                self.$($field).+.clear_warnings()
            }

            pub async fn cancel(&self) -> bool {
                self.$($field).+.cancel().await
            }

            pub fn canceller(&self) -> crate::cancel::Canceller<E::Cancel> {
                self.$($field).+.canceller()
            }

            pub fn is_closed(&self) -> bool {
                self.$($field).+.is_closed()
            }
        }
    };
}

/// Bind setters forwarded to a [`ParameterList`].
macro_rules! forward_params {
    ($ty:ident, $($field:ident).+) => {
        impl<E: Executor> $ty<E> {
            pub fn set_null(&mut self, index: usize, oid: crate::postgres::Oid) -> Result<()> {
                self.$($field).+.set_null(index, oid)
            }

            pub fn set_bool(&mut self, index: usize, value: bool) -> Result<()> {
                self.$($field).+.set_bool(index, value)
            }

            pub fn set_i16(&mut self, index: usize, value: i16) -> Result<()> {
                self.$($field).+.set_i16(index, value)
            }

            pub fn set_i32(&mut self, index: usize, value: i32) -> Result<()> {
                self.$($field).+.set_i32(index, value)
            }

            pub fn set_i64(&mut self, index: usize, value: i64) -> Result<()> {
                self.$($field).+.set_i64(index, value)
            }

            pub fn set_f32(&mut self, index: usize, value: f32) -> Result<()> {
                self.$($field).+.set_f32(index, value)
            }

            pub fn set_f64(&mut self, index: usize, value: f64) -> Result<()> {
                self.$($field).+.set_f64(index, value)
            }

            /// Bind exact decimal text.
            pub fn set_numeric(&mut self, index: usize, value: &str) -> Result<()> {
                self.$($field).+.set_numeric(index, value)
            }

            pub fn set_str(&mut self, index: usize, value: &str) -> Result<()> {
                self.$($field).+.set_str(index, value)
            }

            pub fn set_bytes(&mut self, index: usize, value: &[u8]) -> Result<()> {
                self.$($field).+.set_bytes(index, value)
            }

            pub fn set_date(&mut self, index: usize, value: &crate::temporal::Date, zone: Option<&crate::temporal::Zone>) -> Result<()> {
                self.$($field).+.set_date(index, value, zone)
            }

            pub fn set_time(&mut self, index: usize, value: &crate::temporal::Time, zone: Option<&crate::temporal::Zone>) -> Result<()> {
                self.$($field).+.set_time(index, value, zone)
            }

            pub fn set_timestamp(&mut self, index: usize, value: &crate::temporal::Timestamp, zone: Option<&crate::temporal::Zone>) -> Result<()> {
                self.$($field).+.set_timestamp(index, value, zone)
            }

            pub fn set_value(&mut self, index: usize, value: &crate::value::Value) -> Result<()> {
                self.$($field).+.set_value(index, value)
            }

            /// Unset every parameter value.
            pub fn clear_parameters(&mut self) {
                self.$($field).+.clear()
            }

            pub fn parameters(&self) -> &ParameterList {
                &self.$($field).+
            }
        }
    };
}

mod handler;
mod batch;
mod prepared;
mod callable;

pub(crate) use handler::PageHandler;
pub use batch::BatchError;
pub use prepared::PreparedStatement;
pub use callable::CallableStatement;

use handler::{RawResult, StatementHandler};

/// Cursor scrollability.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Scroll {
    #[default]
    ForwardOnly,
    /// Random access over rows read once.
    Insensitive,
}

/// Cursor concurrency.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum Concurrency {
    #[default]
    ReadOnly,
    Updatable,
}

/// Shape of the cursors a statement produces.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct ResultKind {
    pub scroll: Scroll,
    pub concurrency: Concurrency,
    /// Keep the cursor open across commits.
    pub holdable: bool,
}

impl ResultKind {
    pub const fn new(scroll: Scroll, concurrency: Concurrency) -> ResultKind {
        ResultKind { scroll, concurrency, holdable: false }
    }

    /// Scrollable and updatable.
    pub const fn updatable() -> ResultKind {
        ResultKind::new(Scroll::Insensitive, Concurrency::Updatable)
    }

    pub const fn holdable(mut self, holdable: bool) -> ResultKind {
        self.holdable = holdable;
        self
    }

    pub fn is_scrollable(&self) -> bool {
        self.scroll != Scroll::ForwardOnly
    }

    pub fn is_updatable(&self) -> bool {
        self.concurrency == Concurrency::Updatable
    }
}

/// One entry of the result chain.
pub enum StatementResult<E: Executor> {
    Rows(Cursor<E>),
    Count { count: u64, oid: Oid },
}

impl<E: Executor> std::fmt::Debug for StatementResult<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Rows(cursor) => f.debug_tuple("Rows").field(cursor).finish(),
            Self::Count { count, oid } => f.debug_struct("Count").field("count", count).field("oid", oid).finish(),
        }
    }
}

/// Executes ad hoc sql.
pub struct Statement<E: Executor> {
    pub(crate) session: Session<E>,
    kind: ResultKind,
    canceller: Canceller<E::Cancel>,
    fetch_size: usize,
    max_rows: usize,
    timeout: Option<Duration>,
    prepare_threshold: i32,
    escape: bool,
    wants_keys: bool,
    results: VecDeque<StatementResult<E>>,
    generated_keys: Option<Cursor<E>>,
    warnings: Vec<String>,
    batch: Vec<String>,
    closed: bool,
}

impl<E: Executor> Statement<E> {
    pub(crate) fn new(session: Session<E>, kind: ResultKind) -> Statement<E> {
        let config = session.config();
        Statement {
            kind,
            canceller: session.canceller(),
            fetch_size: config.default_fetch_size,
            max_rows: 0,
            timeout: None,
            prepare_threshold: config.prepare_threshold,
            escape: config.escape_processing,
            wants_keys: false,
            results: VecDeque::new(),
            generated_keys: None,
            warnings: Vec::new(),
            batch: Vec::new(),
            closed: false,
            session,
        }
    }

    pub fn session(&self) -> &Session<E> {
        &self.session
    }

    pub fn result_kind(&self) -> ResultKind {
        self.kind
    }

    // ===== Settings =====

    /// Rows per page of a forward cursor, zero reads everything at once.
    pub fn set_fetch_size(&mut self, rows: i32) -> Result<()> {
        self.check_closed()?;
        self.fetch_size = usize::try_from(rows)
            .map_err(|_| Error::range("Fetch size must be a value greater to or equal to 0."))?;
        Ok(())
    }

    pub fn fetch_size(&self) -> usize {
        self.fetch_size
    }

    /// Cap the rows of every result, zero is unlimited.
    pub fn set_max_rows(&mut self, rows: i32) -> Result<()> {
        self.check_closed()?;
        self.max_rows = usize::try_from(rows)
            .map_err(|_| Error::range("Maximum number of rows must be a value grater than or equal to 0."))?;
        Ok(())
    }

    pub fn max_rows(&self) -> usize {
        self.max_rows
    }

    /// Cancel queries running longer than `seconds`, zero disables.
    pub fn set_query_timeout(&mut self, seconds: i32) -> Result<()> {
        self.check_closed()?;
        let seconds = u64::try_from(seconds)
            .map_err(|_| Error::range("Query timeout must be a value greater than or equals to 0."))?;
        self.timeout = (seconds > 0).then(|| Duration::from_secs(seconds));
        Ok(())
    }

    pub fn query_timeout(&self) -> Option<Duration> {
        self.timeout
    }

    /// Executions before a query is prepared by name.
    ///
    /// Zero never prepares, a negative value prepares immediately and
    /// forces binary transfer.
    pub fn set_prepare_threshold(&mut self, threshold: i32) {
        self.prepare_threshold = threshold;
    }

    pub fn prepare_threshold(&self) -> i32 {
        self.prepare_threshold
    }

    /// Toggle `{...}` escape rewriting of ad hoc sql.
    pub fn set_escape_processing(&mut self, enable: bool) {
        self.escape = enable;
    }

    fn force_binary(&self) -> bool {
        self.prepare_threshold < 0
    }

    // ===== Execution =====

    /// Execute `sql`, returns `true` if the first result is a row set.
    pub async fn execute(&mut self, sql: &str) -> Result<bool> {
        self.execute_with_flags(sql, QueryFlags::empty()).await?;
        Ok(self.first_is_rows())
    }

    /// Execute a query that returns exactly one row set.
    pub async fn execute_query(&mut self, sql: &str) -> Result<&mut Cursor<E>> {
        self.execute_with_flags(sql, QueryFlags::empty()).await?;
        self.single_result_set()
    }

    /// Execute a command, returns its update count.
    pub async fn execute_update(&mut self, sql: &str) -> Result<u64> {
        self.execute_with_flags(sql, QueryFlags::NO_RESULTS).await?;
        self.check_no_result_update()
    }

    /// Execute a command returning generated `columns`, all when empty.
    ///
    /// The keys are available from [`generated_keys`][Self::generated_keys].
    pub async fn execute_update_returning(&mut self, sql: &str, columns: &[&str]) -> Result<u64> {
        self.check_closed()?;
        let columns = columns.iter().map(|&c| c.to_owned()).collect();
        let key = CacheKey::returning(sql, self.escape, columns);
        self.wants_keys = true;
        let result = self.execute_adhoc(key, QueryFlags::NO_RESULTS).await;
        self.wants_keys = false;
        result?;
        self.check_no_result_update()
    }

    pub(crate) async fn execute_with_flags(&mut self, sql: &str, flags: QueryFlags) -> Result<()> {
        self.check_closed()?;
        self.execute_adhoc(self.cache_key(sql), flags).await
    }

    async fn execute_adhoc(&mut self, key: CacheKey, flags: QueryFlags) -> Result<()> {
        let session = self.session.clone();
        let mut handle = session.borrow_query(key)?;
        let result = self
            .execute_internal(&mut handle, &ParameterList::empty(), flags | QueryFlags::ONESHOT)
            .await;
        session.release_query(handle);
        result
    }

    pub(crate) fn cache_key(&self, sql: &str) -> CacheKey {
        CacheKey::new(sql, self.escape)
    }

    /// Compose flags, dispatch and install the result chain.
    pub(crate) async fn execute_internal(
        &mut self,
        handle: &mut QueryHandle,
        params: &ParameterList,
        mut flags: QueryFlags,
    ) -> Result<()> {
        self.close_results();
        let session = self.session.clone();
        let auto_commit = session.auto_commit();

        if self.fetch_size > 0 && !self.kind.is_scrollable() && !self.kind.holdable && !auto_commit {
            flags |= QueryFlags::FORWARD_CURSOR;
        }

        if self.wants_keys {
            flags |= QueryFlags::BOTH_ROWS_AND_STATUS;
            flags.remove(QueryFlags::NO_RESULTS);
        }

        if self.is_oneshot(handle) || flags.contains(QueryFlags::ONESHOT) {
            flags |= QueryFlags::ONESHOT;
        } else if let Some(old) = handle.prepare_named(params.type_oids(), || session.names().statement()) {
            session.close_statement_later(old);
        }

        if auto_commit || handle.is_empty() {
            flags |= QueryFlags::SUPPRESS_BEGIN;
        }

        if self.kind.is_updatable() || !session.config().binary_transfer {
            flags |= QueryFlags::NO_BINARY_TRANSFER;
        }

        let mut exec = session.lock().await?;

        if self.force_binary() && !handle.is_described() {
            describe(&mut *exec, handle, params, flags).await?;
        }

        verbose!(sql = handle.key().sql(), ?flags, "execute");
        let mut handler = StatementHandler::default();
        self.canceller.start(self.timeout);
        let result = exec
            .execute(handle, params, &mut handler, self.max_rows, self.fetch_size, flags)
            .await;
        self.canceller.finish().await;
        drop(exec);

        self.warnings.append(&mut handler.warnings);
        result.map_err(|err| self.map_cancel(err))?;
        self.install(handler, handle);
        Ok(())
    }

    /// Count the execution, `true` while the handle stays unnamed.
    pub(crate) fn is_oneshot(&self, handle: &mut QueryHandle) -> bool {
        let prior = i64::from(handle.execute_count());
        handle.increase_execute_count();
        let threshold = i64::from(self.prepare_threshold);
        (threshold == 0 || prior < threshold) && !self.force_binary()
    }

    pub(crate) fn map_cancel(&self, err: Error) -> Error {
        match err.kind() {
            ErrorKind::Database(db) if db.is_query_canceled() => {
                Cancelled { timed_out: self.canceller.timed_out() }.into()
            }
            _ => err,
        }
    }

    pub(crate) fn cursor_options(&self, origin: Option<String>) -> CursorOptions {
        CursorOptions { kind: self.kind, fetch_size: self.fetch_size, max_rows: self.max_rows, origin }
    }

    fn install(&mut self, handler: StatementHandler, handle: &QueryHandle) {
        let origin = handle.queries().first().map(|q| q.sql().to_owned());
        let mut results: VecDeque<_> = handler
            .results
            .into_iter()
            .map(|raw| match raw {
                RawResult::Rows { fields, tuples, cursor } => StatementResult::Rows(Cursor::new(
                    self.session.clone(),
                    fields,
                    tuples,
                    cursor,
                    self.cursor_options(origin.clone()),
                )),
                RawResult::Status { count, oid } => StatementResult::Count { count, oid },
            })
            .collect();

        if self.wants_keys && matches!(results.front(), Some(StatementResult::Rows(_))) {
            if let Some(StatementResult::Rows(keys)) = results.pop_front() {
                self.generated_keys = Some(keys);
            }
        }
        self.results = results;
    }

    // ===== Results =====

    fn first_is_rows(&self) -> bool {
        matches!(self.results.front(), Some(StatementResult::Rows(_)))
    }

    pub(crate) fn single_result_set(&mut self) -> Result<&mut Cursor<E>> {
        if self.results.len() > 1 {
            return Err(Error::state("Multiple ResultSets were returned by the query."));
        }
        match self.results.front_mut() {
            Some(StatementResult::Rows(cursor)) => Ok(cursor),
            _ => Err(Error::no_data("No results were returned by the query.")),
        }
    }

    pub(crate) fn check_no_result_update(&self) -> Result<u64> {
        if self.results.iter().any(|r| matches!(r, StatementResult::Rows(_))) {
            return Err(Error::no_data("A result was returned when none was expected."));
        }
        Ok(self.update_count().unwrap_or(0))
    }

    /// Current result, if it is a row set.
    pub fn result_set(&mut self) -> Option<&mut Cursor<E>> {
        match self.results.front_mut() {
            Some(StatementResult::Rows(cursor)) => Some(cursor),
            _ => None,
        }
    }

    /// Take ownership of the current row set, the chain moves on.
    pub fn take_result_set(&mut self) -> Option<Cursor<E>> {
        match self.results.front() {
            Some(StatementResult::Rows(_)) => match self.results.pop_front() {
                Some(StatementResult::Rows(cursor)) => Some(cursor),
                _ => None,
            },
            _ => None,
        }
    }

    /// Current result, if it is an update count.
    pub fn update_count(&self) -> Option<u64> {
        match self.results.front() {
            Some(StatementResult::Count { count, .. }) => Some(*count),
            _ => None,
        }
    }

    /// Oid of the row inserted by the current result.
    pub fn last_oid(&self) -> Option<Oid> {
        match self.results.front() {
            Some(StatementResult::Count { oid, .. }) => Some(*oid),
            _ => None,
        }
    }

    /// Close the current result and move to the next one.
    ///
    /// Returns `true` if the next result is a row set.
    pub fn more_results(&mut self) -> bool {
        if let Some(StatementResult::Rows(mut cursor)) = self.results.pop_front() {
            cursor.close();
        }
        self.first_is_rows()
    }

    /// Keys generated by the last execution.
    pub fn generated_keys(&mut self) -> Option<&mut Cursor<E>> {
        self.generated_keys.as_mut()
    }

    pub fn take_generated_keys(&mut self) -> Option<Cursor<E>> {
        self.generated_keys.take()
    }

    /// Server notices of the last executions.
    pub fn warnings(&self) -> &[String] {
        &self.warnings
    }

    pub fn clear_warnings(&mut self) {
        self.warnings.clear();
    }

    pub(crate) fn close_results(&mut self) {
        for result in self.results.drain(..) {
            if let StatementResult::Rows(mut cursor) = result {
                cursor.close();
            }
        }
        if let Some(mut keys) = self.generated_keys.take() {
            keys.close();
        }
    }

    // ===== Lifecycle =====

    /// Interrupt the running query of this statement.
    pub async fn cancel(&self) -> bool {
        self.canceller.cancel().await
    }

    /// Handle that can cancel this statement from another task.
    pub fn canceller(&self) -> Canceller<E::Cancel> {
        self.canceller.clone()
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    pub(crate) fn check_closed(&self) -> Result<()> {
        match self.closed {
            true => Err(Error::state("This statement has been closed.")),
            false => Ok(()),
        }
    }

    /// Close open results, the statement cannot be used afterwards.
    pub fn close(&mut self) {
        if self.closed {
            return;
        }
        self.closed = true;
        self.close_results();
        self.batch.clear();
        self.canceller.stop_timer();
    }
}

impl<E: Executor> Drop for Statement<E> {
    fn drop(&mut self) {
        self.canceller.stop_timer();
    }
}

impl<E: Executor> std::fmt::Debug for Statement<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Statement")
            .field("kind", &self.kind)
            .field("fetch_size", &self.fetch_size)
            .field("max_rows", &self.max_rows)
            .field("results", &self.results.len())
            .field("closed", &self.closed)
            .finish()
    }
}

/// Parse and describe only, so the columns are known before execution.
pub(crate) async fn describe<E: Executor>(
    exec: &mut E,
    handle: &mut QueryHandle,
    params: &ParameterList,
    flags: QueryFlags,
) -> Result<()> {
    verbose!(sql = handle.key().sql(), "describe");
    let mut handler = StatementHandler::default();
    exec.execute(handle, params, &mut handler, 0, 0, flags | QueryFlags::DESCRIBE_ONLY).await?;
    if let Some(fields) = handler.first_fields() {
        handle.set_described(fields);
    }
    Ok(())
}

#[cfg(test)]
mod test {
    use super::*;
    use crate::{
        SessionFactory,
        mock::{MockExecutor, Script},
    };

    #[tokio::test]
    async fn execute_reports_first_result() {
        let mock = MockExecutor::new()
            .script(Script::rows("select 1", &["a"], &[&["1"]]))
            .script(Script::command("delete from t", "DELETE", 4));
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = session.create_statement();

        assert!(stmt.execute("select 1").await.unwrap());
        assert!(stmt.result_set().is_some());
        assert_eq!(stmt.update_count(), None);
        assert!(!stmt.more_results());
        assert!(stmt.result_set().is_none());

        assert!(!stmt.execute("delete from t").await.unwrap());
        assert_eq!(stmt.update_count(), Some(4));
        assert!(log.last().flags.contains(QueryFlags::ONESHOT | QueryFlags::SUPPRESS_BEGIN));
        assert_eq!(log.last().statement, None);

        assert_eq!(stmt.execute_update("delete from t").await.unwrap(), 4);
        assert!(log.last().flags.contains(QueryFlags::NO_RESULTS));
    }

    #[tokio::test]
    async fn query_and_update_check_result_shape() {
        let mock = MockExecutor::new()
            .script(Script::rows("select 1", &["a"], &[&["1"]]))
            .script(Script::command("delete from t", "DELETE", 0));
        let session = SessionFactory::default().open(mock);
        let mut stmt = session.create_statement();

        let err = stmt.execute_query("delete from t").await.unwrap_err();
        assert!(err.to_string().contains("No results were returned by the query."));

        let err = stmt.execute_query("select 1; select 1").await.unwrap_err();
        assert!(err.to_string().contains("Multiple ResultSets were returned by the query."));

        let err = stmt.execute_update("select 1").await.unwrap_err();
        assert!(err.to_string().contains("A result was returned when none was expected."));
    }

    #[tokio::test]
    async fn settings_reject_negatives() {
        let session = SessionFactory::default().open(MockExecutor::new());
        let mut stmt = session.create_statement();
        assert!(matches!(stmt.set_fetch_size(-1).unwrap_err().kind(), ErrorKind::Range(_)));
        assert!(stmt.set_max_rows(-1).is_err());
        assert!(stmt.set_query_timeout(-1).is_err());
        stmt.set_query_timeout(3).unwrap();
        assert_eq!(stmt.query_timeout(), Some(Duration::from_secs(3)));
        stmt.set_query_timeout(0).unwrap();
        assert_eq!(stmt.query_timeout(), None);

        stmt.close();
        assert!(stmt.is_closed());
        assert!(matches!(stmt.execute("select 1").await.unwrap_err().kind(), ErrorKind::State(_)));
    }

    #[tokio::test]
    async fn forward_cursor_outside_auto_commit() {
        let mock = MockExecutor::new().script(Script::rows("select a from t", &["a"], &[&["1"], &["2"], &["3"]]));
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = session.create_statement();
        stmt.set_fetch_size(2).unwrap();

        stmt.execute("select a from t").await.unwrap();
        assert!(!log.last().flags.contains(QueryFlags::FORWARD_CURSOR));

        session.set_auto_commit(false);
        stmt.execute("select a from t").await.unwrap();
        let last = log.last();
        assert!(last.flags.contains(QueryFlags::FORWARD_CURSOR));
        assert!(!last.flags.contains(QueryFlags::SUPPRESS_BEGIN));
        assert_eq!(last.fetch_size, 2);

        let mut scroll = session.create_statement_with(ResultKind::new(Scroll::Insensitive, Concurrency::ReadOnly));
        scroll.set_fetch_size(2).unwrap();
        scroll.execute("select a from t").await.unwrap();
        assert!(!log.last().flags.contains(QueryFlags::FORWARD_CURSOR));
    }

    #[tokio::test]
    async fn generated_keys_are_detached() {
        let mock = MockExecutor::new().script(
            Script::rows("insert into t(a) values (1)\nRETURNING *", &["id", "a"], &[&["7", "1"]])
                .with_status("INSERT", 1),
        );
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = session.create_statement();

        let count = stmt.execute_update_returning("insert into t(a) values (1)", &[]).await.unwrap();
        assert_eq!(count, 1);
        let flags = log.last().flags;
        assert!(flags.contains(QueryFlags::BOTH_ROWS_AND_STATUS));
        assert!(!flags.contains(QueryFlags::NO_RESULTS));

        let keys = stmt.generated_keys().unwrap();
        assert!(keys.next().await.unwrap());
        assert_eq!(keys.get_str("id").unwrap().as_deref(), Some("7"));
    }

    #[tokio::test(start_paused = true)]
    async fn timeout_surfaces_as_cancelled() {
        let mock = MockExecutor::new().script(Script::rows("select pg_sleep(10)", &["a"], &[]).blocking());
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = session.create_statement();
        stmt.set_query_timeout(1).unwrap();

        let err = stmt.execute("select pg_sleep(10)").await.unwrap_err();
        let ErrorKind::Cancelled(cancelled) = err.kind() else {
            panic!("expected cancel, got {err}");
        };
        assert!(cancelled.timed_out());
        assert_eq!(log.cancels(), 1);
        assert_eq!(stmt.canceller().state(), crate::cancel::CancelState::Idle);
    }

    #[tokio::test]
    async fn explicit_cancel_from_another_task() {
        let mock = MockExecutor::new().script(Script::rows("select pg_sleep(10)", &["a"], &[]).blocking());
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = session.create_statement();

        // nothing running yet
        assert!(!stmt.cancel().await);
        assert_eq!(log.cancels(), 0);

        let canceller = stmt.canceller();
        let task = tokio::spawn(async move {
            while !canceller.cancel().await {
                tokio::task::yield_now().await;
            }
        });
        let err = stmt.execute("select pg_sleep(10)").await.unwrap_err();
        task.await.unwrap();
        assert!(err.is_cancelled());
        assert!(!err.to_string().contains("timeout"));
        assert_eq!(log.cancels(), 1);
    }
}
