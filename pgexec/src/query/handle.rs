use std::sync::Arc;

use super::name::StatementName;
use crate::{
    Result,
    escape::replace_processing,
    parser::{CallInfo, NativeQuery, modify_call, parse_sql},
    postgres::Oid,
    row::Field,
};

/// Cache key of a query handle.
///
/// Callable text is keyed separately from the same text executed as a
/// plain query, the two parse differently.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct CacheKey {
    sql: String,
    callable: bool,
    escape: bool,
    returning: Option<Vec<String>>,
}

impl CacheKey {
    pub fn new(sql: impl Into<String>, escape: bool) -> CacheKey {
        CacheKey { sql: sql.into(), callable: false, escape, returning: None }
    }

    pub fn callable(sql: impl Into<String>, escape: bool) -> CacheKey {
        CacheKey { sql: sql.into(), callable: true, escape, returning: None }
    }

    /// Key of a query that returns generated `columns`, empty means all.
    pub fn returning(sql: impl Into<String>, escape: bool, columns: Vec<String>) -> CacheKey {
        CacheKey { sql: sql.into(), callable: false, escape, returning: Some(columns) }
    }

    pub fn sql(&self) -> &str {
        &self.sql
    }

    pub fn is_callable(&self) -> bool {
        self.callable
    }

    fn size(&self) -> usize {
        self.sql.len() * 2
            + self.returning.as_ref().map_or(0, |c| c.iter().map(String::len).sum())
    }
}

/// Parse options that depend on the server.
#[derive(Debug, Clone, Copy)]
pub struct ParseContext {
    pub std_strings: bool,
    /// Server supports `select * from f(...)` for function calls.
    pub select_from_call: bool,
}

/// A parsed query and its server side state.
///
/// Handles live in the query cache and are borrowed by one statement at a
/// time. The execution counter only grows; once the prepare threshold is
/// passed the handle executes as a named statement.
#[derive(Debug)]
pub struct QueryHandle {
    key: CacheKey,
    queries: Vec<NativeQuery>,
    call: Option<CallInfo>,
    execute_count: u32,
    statement: Option<StatementName>,
    param_types: Vec<Oid>,
    described: Option<Arc<[Field]>>,
}

impl QueryHandle {
    /// Parse the key sql: escapes, call syntax, placeholders.
    pub fn parse(key: CacheKey, cx: ParseContext) -> Result<QueryHandle> {
        let mut sql = match key.escape {
            true => replace_processing(&key.sql, cx.std_strings)?,
            false => key.sql.clone(),
        };

        let call = match key.callable {
            true => {
                let info = modify_call(&sql, cx.std_strings, cx.select_from_call)?;
                sql.clone_from(&info.sql);
                Some(info)
            }
            false => None,
        };

        let mut queries = parse_sql(&sql, cx.std_strings, true, true);
        if let (Some(columns), [query]) = (&key.returning, queries.as_mut_slice()) {
            let columns: Vec<&str> = columns.iter().map(String::as_str).collect();
            query.add_returning(&columns);
        }

        crate::common::verbose!(sql = %key.sql, queries = queries.len(), "query parsed");

        Ok(QueryHandle {
            key,
            queries,
            call,
            execute_count: 0,
            statement: None,
            param_types: Vec::new(),
            described: None,
        })
    }

    pub fn key(&self) -> &CacheKey {
        &self.key
    }

    /// Native queries, in execution order.
    pub fn queries(&self) -> &[NativeQuery] {
        &self.queries
    }

    /// Returns `true` if there is nothing to send.
    pub fn is_empty(&self) -> bool {
        self.queries.is_empty()
    }

    /// Total placeholder count of all queries.
    pub fn bind_count(&self) -> usize {
        self.queries.iter().map(NativeQuery::bind_count).sum()
    }

    /// Returns `true` if the query is a function or procedure call.
    pub fn is_function(&self) -> bool {
        self.call.as_ref().is_some_and(|c| c.is_function)
    }

    /// Returns `true` for `{? = call ...}`.
    pub fn out_param_before_func(&self) -> bool {
        self.call.as_ref().is_some_and(|c| c.out_param_before_func)
    }

    pub fn execute_count(&self) -> u32 {
        self.execute_count
    }

    /// Name of the server prepared statement, [`None`] for unnamed execution.
    pub fn statement_name(&self) -> Option<&StatementName> {
        self.statement.as_ref()
    }

    /// Parameter types the named statement was prepared with.
    pub fn param_types(&self) -> &[Oid] {
        &self.param_types
    }

    /// Returns `true` if result columns are known without executing.
    pub fn is_described(&self) -> bool {
        self.described.is_some()
    }

    pub fn described_fields(&self) -> Option<&Arc<[Field]>> {
        self.described.as_ref()
    }

    pub(crate) fn increase_execute_count(&mut self) -> u32 {
        self.execute_count = self.execute_count.saturating_add(1);
        self.execute_count
    }

    /// Name the statement for `types`.
    ///
    /// Returns the previous name when parameter types changed, that
    /// statement must be closed.
    pub(crate) fn prepare_named(
        &mut self,
        types: Vec<Oid>,
        next: impl FnOnce() -> StatementName,
    ) -> Option<StatementName> {
        if self.statement.is_some() && self.param_types == types {
            return None;
        }
        let old = self.statement.replace(next());
        self.param_types = types;
        if old.is_some() {
            self.described = None;
        }
        old
    }

    pub(crate) fn set_described(&mut self, fields: Arc<[Field]>) {
        self.described = Some(fields);
    }

    /// Forget server side state, returns the statement to close.
    pub(crate) fn unprepare(&mut self) -> Option<StatementName> {
        self.described = None;
        self.param_types.clear();
        self.statement.take()
    }

    /// Approximate memory used, for the cache bound.
    pub(crate) fn size(&self) -> usize {
        self.key.size() + self.queries.iter().map(|q| q.sql().len()).sum::<usize>() + 64
    }
}
