use std::{fmt, sync::Arc};

use super::{Statement, handler::BatchHandler};
use crate::{
    Error, Result,
    common::verbose,
    cursor::Cursor,
    executor::Executor,
    flags::QueryFlags,
    params::ParameterList,
    query::QueryHandle,
};

/// A batch stopped at its first failing entry.
///
/// Update counts of the entries that completed before are kept.
pub struct BatchError {
    counts: Vec<u64>,
    cause: Box<Error>,
}

impl BatchError {
    pub(crate) fn new(counts: Vec<u64>, cause: Error) -> BatchError {
        BatchError { counts, cause: Box::new(cause) }
    }

    /// Update counts of the completed entries, in batch order.
    pub fn counts(&self) -> &[u64] {
        &self.counts
    }

    /// The error that aborted the batch.
    pub fn cause(&self) -> &Error {
        &self.cause
    }

    pub fn into_cause(self) -> Error {
        *self.cause
    }
}

impl std::error::Error for BatchError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        Some(&*self.cause)
    }
}

impl fmt::Display for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "Batch entry {} was aborted: {}", self.counts.len(), self.cause)
    }
}

impl fmt::Debug for BatchError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "\"{self}\"")
    }
}

impl<E: Executor> Statement<E> {
    /// Flags shared by every batch.
    pub(crate) fn batch_flags(&self, keys: bool) -> QueryFlags {
        let mut flags = match keys {
            true => QueryFlags::BOTH_ROWS_AND_STATUS | QueryFlags::NO_BINARY_TRANSFER,
            false => QueryFlags::NO_RESULTS,
        };
        if self.session.auto_commit() {
            flags |= QueryFlags::SUPPRESS_BEGIN;
        }
        flags
    }

    /// Send a composed batch and collect its update counts.
    pub(crate) async fn dispatch_batch(
        &mut self,
        batch: &[(&QueryHandle, &ParameterList)],
        flags: QueryFlags,
        keys: bool,
    ) -> Result<Vec<u64>> {
        self.close_results();
        let session = self.session.clone();
        let mut handler = BatchHandler::new(keys);

        let result = match session.lock().await {
            Ok(mut exec) => {
                verbose!(entries = batch.len(), ?flags, "execute batch");
                self.canceller.start(self.timeout);
                let result = exec.execute_batch(batch, &mut handler, flags).await;
                self.canceller.finish().await;
                result
            }
            Err(err) => Err(err),
        };

        self.warnings.append(&mut handler.warnings);
        let result = match (result, handler.error.take()) {
            (Err(err), _) => Err(self.map_cancel(err)),
            (Ok(()), Some(err)) => Err(err),
            (Ok(()), None) => Ok(()),
        };

        // keys of the completed entries are kept on failure too
        if let Some((fields, rows)) = handler.keys {
            self.generated_keys = Some(self.detached_cursor(fields, rows));
        }
        match result {
            Ok(()) => Ok(handler.counts),
            Err(cause) => Err(BatchError::new(handler.counts, cause).into()),
        }
    }

    fn detached_cursor(&self, fields: Arc<[crate::row::Field]>, rows: Vec<crate::row::Tuple>) -> Cursor<E> {
        Cursor::new(self.session.clone(), fields, rows, None, self.cursor_options(None))
    }

    /// Queue `sql` for [`execute_batch`][Statement::execute_batch].
    pub fn add_batch(&mut self, sql: &str) -> Result<()> {
        self.check_closed()?;
        self.batch.push(sql.to_owned());
        Ok(())
    }

    pub fn clear_batch(&mut self) {
        self.batch.clear();
    }

    /// Execute every queued sql, in order, as one-shot queries.
    ///
    /// On failure the error is a [`BatchError`] carrying the counts of the
    /// completed entries.
    pub async fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.check_closed()?;
        let sqls = std::mem::take(&mut self.batch);
        if sqls.is_empty() {
            return Ok(Vec::new());
        }

        let session = self.session.clone();
        let mut handles = Vec::with_capacity(sqls.len());
        for sql in &sqls {
            match session.borrow_query(self.cache_key(sql)) {
                Ok(handle) => handles.push(handle),
                Err(err) => {
                    handles.into_iter().for_each(|h| session.release_query(h));
                    return Err(err);
                }
            }
        }

        let params = ParameterList::empty();
        let batch: Vec<_> = handles.iter().map(|h| (h, &params)).collect();
        let flags = self.batch_flags(false) | QueryFlags::ONESHOT;
        let result = self.dispatch_batch(&batch, flags, false).await;

        drop(batch);
        handles.into_iter().for_each(|h| session.release_query(h));
        result
    }
}

#[cfg(test)]
mod test {
    use crate::{
        ErrorKind, SessionFactory,
        flags::QueryFlags,
        mock::{MockExecutor, Script},
    };

    #[tokio::test]
    async fn batch_keeps_completed_counts() {
        let mock = MockExecutor::new()
            .script(Script::command("insert into t values (1)", "INSERT", 1))
            .script(Script::command("update t set a = 2", "UPDATE", 3))
            .script(Script::error("insert into t values (1, 2)", "42601", "syntax error"));
        let log = mock.log();
        let session = SessionFactory::default().open(mock);
        let mut stmt = session.create_statement();

        stmt.add_batch("insert into t values (1)").unwrap();
        stmt.add_batch("update t set a = 2").unwrap();
        assert_eq!(stmt.execute_batch().await.unwrap(), [1, 3]);
        assert!(log.last().flags.contains(QueryFlags::ONESHOT | QueryFlags::NO_RESULTS | QueryFlags::SUPPRESS_BEGIN));

        stmt.add_batch("insert into t values (1)").unwrap();
        stmt.add_batch("insert into t values (1, 2)").unwrap();
        stmt.add_batch("update t set a = 2").unwrap();
        let err = stmt.execute_batch().await.unwrap_err();
        let ErrorKind::Batch(batch) = err.kind() else {
            panic!("expected batch error, got {err}");
        };
        assert_eq!(batch.counts(), [1]);
        assert_eq!(batch.cause().sql_state(), "42601");
        assert_eq!(err.sql_state(), "42601");

        // batch is consumed either way
        assert!(stmt.execute_batch().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn batch_rejects_rows() {
        let mock = MockExecutor::new().script(Script::rows("select 1", &["?column?"], &[&["1"]]));
        let session = SessionFactory::default().open(mock);
        let mut stmt = session.create_statement();
        stmt.add_batch("select 1").unwrap();
        let err = stmt.execute_batch().await.unwrap_err();
        assert!(err.to_string().contains("A result was returned when none was expected."));
    }
}
