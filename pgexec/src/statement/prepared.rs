use super::{BatchError, ResultKind, Statement, describe};
use crate::{
    Error, Result, Session,
    common::log_warn,
    cursor::Cursor,
    executor::Executor,
    flags::QueryFlags,
    params::ParameterList,
    query::{CacheKey, QueryHandle},
};

/// A parsed query executed with bound parameters.
///
/// The query handle is borrowed from the session cache for the lifetime
/// of the statement. Executions are counted on the handle, past the
/// prepare threshold the query runs as a named server statement.
pub struct PreparedStatement<E: Executor> {
    pub(super) inner: Statement<E>,
    pub(super) handle: Option<QueryHandle>,
    pub(super) params: ParameterList,
    batch: Vec<ParameterList>,
}

forward_statement!(PreparedStatement, inner);
forward_params!(PreparedStatement, params);

impl<E: Executor> PreparedStatement<E> {
    pub(crate) fn new(session: Session<E>, key: CacheKey, kind: ResultKind, wants_keys: bool) -> Result<Self> {
        let handle = session.borrow_query(key)?;
        let params = ParameterList::new(
            handle.bind_count(),
            session.config().binary_transfer,
            session.timestamp_utils().clone(),
        );
        let mut inner = Statement::new(session, kind);
        inner.wants_keys = wants_keys;
        Ok(PreparedStatement { inner, handle: Some(handle), params, batch: Vec::new() })
    }

    /// The cached query, [`None`] once closed.
    pub fn query(&self) -> Option<&QueryHandle> {
        self.handle.as_ref()
    }

    pub(super) async fn execute_with_flags(&mut self, flags: QueryFlags) -> Result<()> {
        self.inner.check_closed()?;
        self.params.check_all_set()?;
        let Some(handle) = self.handle.as_mut() else {
            return Err(Error::state("This statement has been closed."));
        };
        self.inner.execute_internal(handle, &self.params, flags).await
    }

    /// Execute, returns `true` if the first result is a row set.
    pub async fn execute(&mut self) -> Result<bool> {
        self.execute_with_flags(QueryFlags::empty()).await?;
        Ok(self.inner.first_is_rows())
    }

    /// Execute a query that returns exactly one row set.
    pub async fn execute_query(&mut self) -> Result<&mut Cursor<E>> {
        self.execute_with_flags(QueryFlags::empty()).await?;
        self.inner.single_result_set()
    }

    /// Execute a command, returns its update count.
    pub async fn execute_update(&mut self) -> Result<u64> {
        self.execute_with_flags(QueryFlags::NO_RESULTS).await?;
        self.inner.check_no_result_update()
    }

    /// Queue the current parameters as one batch entry.
    pub fn add_batch(&mut self) -> Result<()> {
        self.inner.check_closed()?;
        self.params.check_all_set()?;
        self.batch.push(self.params.clone());
        Ok(())
    }

    pub fn clear_batch(&mut self) {
        self.batch.clear();
    }

    /// Execute every queued parameter set.
    ///
    /// More than one entry prepares the query by name once, the columns
    /// are described up front.
    pub async fn execute_batch(&mut self) -> Result<Vec<u64>> {
        self.inner.check_closed()?;
        let entries = std::mem::take(&mut self.batch);
        let Some(first) = entries.first() else {
            return Ok(Vec::new());
        };

        let session = self.inner.session.clone();
        let keys = self.inner.wants_keys;
        let mut flags = self.inner.batch_flags(keys);
        let Some(handle) = self.handle.as_mut() else {
            return Err(Error::state("This statement has been closed."));
        };

        let same_query_ahead = entries.len() > 1;
        if !same_query_ahead || self.inner.is_oneshot(handle) {
            flags |= QueryFlags::ONESHOT;
        } else {
            if let Some(old) = handle.prepare_named(first.type_oids(), || session.names().statement()) {
                session.close_statement_later(old);
            }
            flags |= QueryFlags::FORCE_DESCRIBE_PORTAL;
            if !handle.is_described() {
                let described = match session.lock().await {
                    Ok(mut exec) => describe(&mut *exec, handle, first, flags).await,
                    Err(err) => Err(err),
                };
                if let Err(cause) = described {
                    return Err(BatchError::new(Vec::new(), self.inner.map_cancel(cause)).into());
                }
            }
        }

        let handle = &*handle;
        let batch: Vec<_> = entries.iter().map(|params| (handle, params)).collect();
        self.inner.dispatch_batch(&batch, flags, keys).await
    }

    /// Close open results and return the query to the session cache.
    pub fn close(&mut self) {
        self.inner.close();
        self.batch.clear();
        if let Some(handle) = self.handle.take() {
            self.inner.session.release_query(handle);
        }
    }
}

impl<E: Executor> Drop for PreparedStatement<E> {
    fn drop(&mut self) {
        if let Some(handle) = self.handle.take() {
            log_warn!("prepared statement dropped without close: {}", handle.key().sql());
            self.inner.session.release_query(handle);
        }
    }
}

impl<E: Executor> std::fmt::Debug for PreparedStatement<E> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PreparedStatement")
            .field("query", &self.handle.as_ref().map(|h| h.key().sql()))
            .field("params", &self.params)
            .field("statement", &self.inner)
            .finish()
    }
}
