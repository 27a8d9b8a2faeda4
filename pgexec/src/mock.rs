//! Scripted in memory executor for tests.
use bytes::Bytes;
use std::{
    collections::{HashMap, VecDeque},
    sync::{
        Arc, Mutex, MutexGuard,
        atomic::{AtomicUsize, Ordering},
    },
};
use tokio::sync::Notify;

use crate::{
    Result,
    executor::{CancelSender, CursorHandle, DatabaseError, Executor, ResultHandler},
    flags::QueryFlags,
    params::ParameterList,
    postgres::{PgFormat, Type},
    query::{NameGenerator, PortalName, QueryHandle, StatementName},
    row::{Field, Tuple},
};

/// Text tuple, `None` is `NULL`.
pub fn tuple(values: &[Option<&str>]) -> Tuple {
    values.iter().map(|v| v.map(|v| Bytes::copy_from_slice(v.as_bytes()))).collect()
}

/// Response to one native query.
#[derive(Clone, Default)]
pub struct Script {
    sql: String,
    fields: Vec<Field>,
    rows: Vec<Tuple>,
    tag: Option<(String, u64)>,
    error: Option<DatabaseError>,
    block: bool,
    suspend_full: bool,
    fail_after: Option<(usize, DatabaseError)>,
}

impl Script {
    /// A row set of text columns.
    pub fn rows(sql: &str, columns: &[&str], rows: &[&[&str]]) -> Script {
        let fields = columns.iter().map(|c| Field::new(*c, Type::Text.oid(), PgFormat::Text)).collect();
        let rows = rows.iter().map(|r| r.iter().map(|v| Some(Bytes::copy_from_slice(v.as_bytes()))).collect()).collect();
        Script { sql: sql.into(), fields, rows, ..Default::default() }
    }

    pub fn typed(sql: &str, fields: Vec<Field>, rows: Vec<Tuple>) -> Script {
        Script { sql: sql.into(), fields, rows, ..Default::default() }
    }

    /// A command without rows.
    pub fn command(sql: &str, tag: &str, count: u64) -> Script {
        Script { sql: sql.into(), tag: Some((tag.into(), count)), ..Default::default() }
    }

    pub fn error(sql: &str, code: &str, message: &str) -> Script {
        Script { sql: sql.into(), error: Some(DatabaseError::new(code, message)), ..Default::default() }
    }

    /// Add a command status to a row set, reported with
    /// [`QueryFlags::BOTH_ROWS_AND_STATUS`].
    pub fn with_status(mut self, tag: &str, count: u64) -> Script {
        self.tag = Some((tag.into(), count));
        self
    }

    /// Run until a cancel request arrives.
    pub fn blocking(mut self) -> Script {
        self.block = true;
        self
    }

    /// Succeed `runs` times, then fail every later execution.
    pub fn fail_after(mut self, runs: usize, code: &str, message: &str) -> Script {
        self.fail_after = Some((runs, DatabaseError::new(code, message)));
        self
    }

    /// Keep the portal suspended after an exactly full page, even when no
    /// rows remain, so the next fetch returns an empty page.
    pub fn suspend_on_full_page(mut self) -> Script {
        self.suspend_full = true;
        self
    }
}

/// One recorded execution.
#[derive(Debug, Clone)]
pub struct Dispatch {
    pub sql: String,
    pub flags: QueryFlags,
    pub statement: Option<StatementName>,
    pub max_rows: usize,
    pub fetch_size: usize,
    pub params: ParameterList,
}

#[derive(Default)]
struct State {
    scripts: Vec<Script>,
    dispatches: Vec<Dispatch>,
    /// Remaining rows and whether a full page suspends the portal.
    portals: HashMap<PortalName, (VecDeque<Tuple>, bool)>,
    fetches: usize,
    closed_statements: Vec<StatementName>,
    closed_portals: Vec<PortalName>,
    keys: HashMap<String, Vec<Vec<String>>>,
    runs: HashMap<String, usize>,
}

#[derive(Default)]
struct Shared {
    state: Mutex<State>,
    cancel: Notify,
    cancels: AtomicUsize,
}

/// Inspection handle, shared with the executor.
#[derive(Clone, Default)]
pub struct MockLog {
    shared: Arc<Shared>,
}

impl MockLog {
    fn state(&self) -> MutexGuard<'_, State> {
        self.shared.state.lock().unwrap_or_else(std::sync::PoisonError::into_inner)
    }

    /// Add a script, later scripts take precedence.
    pub fn script(&self, script: Script) {
        self.state().scripts.push(script);
    }

    pub fn dispatches(&self) -> Vec<Dispatch> {
        self.state().dispatches.clone()
    }

    pub fn last(&self) -> Dispatch {
        self.state().dispatches.last().cloned().expect("nothing dispatched")
    }

    pub fn fetches(&self) -> usize {
        self.state().fetches
    }

    pub fn closed_statements(&self) -> Vec<StatementName> {
        self.state().closed_statements.clone()
    }

    pub fn closed_portals(&self) -> Vec<PortalName> {
        self.state().closed_portals.clone()
    }

    /// Forget every open portal, later fetches fail.
    pub fn drop_portals(&self) {
        self.state().portals.clear();
    }

    pub fn cancels(&self) -> usize {
        self.shared.cancels.load(Ordering::SeqCst)
    }
}

pub struct MockExecutor {
    log: MockLog,
    names: NameGenerator,
    version: (u32, u32),
}

impl MockExecutor {
    pub fn new() -> MockExecutor {
        MockExecutor { log: MockLog::default(), names: NameGenerator::default(), version: (16, 0) }
    }

    pub fn script(self, script: Script) -> MockExecutor {
        self.log.script(script);
        self
    }

    pub fn primary_key(self, table: &str, columns: &[&str]) -> MockExecutor {
        self.log
            .state()
            .keys
            .entry(table.into())
            .or_default()
            .push(columns.iter().map(|&c| c.into()).collect());
        self
    }

    pub fn version(mut self, major: u32, minor: u32) -> MockExecutor {
        self.version = (major, minor);
        self
    }

    pub fn log(&self) -> MockLog {
        self.log.clone()
    }

    fn find(&self, sql: &str) -> Option<Script> {
        self.log.state().scripts.iter().rev().find(|s| s.sql == sql).cloned()
    }

    fn page(&self, rows: &mut VecDeque<Tuple>, size: usize) -> Vec<Tuple> {
        let take = if size == 0 { rows.len() } else { size.min(rows.len()) };
        rows.drain(..take).collect()
    }
}

impl Executor for MockExecutor {
    type Cancel = MockCancel;

    async fn execute(
        &mut self,
        query: &QueryHandle,
        params: &ParameterList,
        handler: &mut dyn ResultHandler,
        max_rows: usize,
        fetch_size: usize,
        flags: QueryFlags,
    ) -> Result<()> {
        for native in query.queries() {
            self.log.state().dispatches.push(Dispatch {
                sql: native.sql().into(),
                flags,
                statement: query.statement_name().cloned(),
                max_rows,
                fetch_size,
                params: params.clone(),
            });

            let Some(script) = self.find(native.sql()) else {
                let tag = native.sql().split_whitespace().next().unwrap_or_default().to_uppercase();
                handler.handle_command_status(&tag, 0, 0);
                continue;
            };

            if script.block {
                self.log.shared.cancel.notified().await;
                return Err(DatabaseError::new("57014", "canceling statement due to user request").into());
            }
            if let Some(err) = script.error {
                return Err(err.into());
            }
            if let Some((limit, err)) = &script.fail_after {
                if !flags.contains(QueryFlags::DESCRIBE_ONLY) {
                    let failed = {
                        let mut state = self.log.state();
                        let runs = state.runs.entry(script.sql.clone()).or_default();
                        *runs += 1;
                        *runs > *limit
                    };
                    if failed {
                        return Err(err.clone().into());
                    }
                }
            }

            if flags.contains(QueryFlags::DESCRIBE_ONLY) {
                if !script.fields.is_empty() {
                    handler.handle_result_rows(script.fields.into(), Vec::new(), None);
                }
                continue;
            }

            if !script.fields.is_empty() {
                let mut rows: VecDeque<Tuple> = script.rows.into();
                if max_rows > 0 {
                    rows.truncate(max_rows);
                }
                if flags.contains(QueryFlags::NO_RESULTS) {
                    rows.clear();
                }

                let paged = flags.contains(QueryFlags::FORWARD_CURSOR) && fetch_size > 0;
                let page = self.page(&mut rows, if paged { fetch_size } else { 0 });
                let full = paged && script.suspend_full && page.len() == fetch_size;
                let cursor = match rows.is_empty() && !full {
                    true => None,
                    false => {
                        let portal = self.names.portal();
                        self.log.state().portals.insert(portal.clone(), (rows, script.suspend_full));
                        Some(CursorHandle::new(portal))
                    }
                };
                handler.handle_result_rows(script.fields.into(), page, cursor);

                if !flags.contains(QueryFlags::BOTH_ROWS_AND_STATUS) {
                    continue;
                }
            }

            if let Some((tag, count)) = script.tag {
                handler.handle_command_status(&tag, count, 0);
            }
        }
        Ok(())
    }

    async fn fetch(&mut self, cursor: &CursorHandle, handler: &mut dyn ResultHandler, rows: usize) -> Result<()> {
        let (page, more) = {
            let mut state = self.log.state();
            state.fetches += 1;
            let Some((mut remaining, suspend_full)) = state.portals.remove(cursor.portal()) else {
                return Err(DatabaseError::new("34000", "portal does not exist").into());
            };
            let page = self.page(&mut remaining, rows);
            let full = suspend_full && rows > 0 && page.len() == rows;
            let more = !remaining.is_empty() || full;
            if more {
                state.portals.insert(cursor.portal().clone(), (remaining, suspend_full));
            }
            (page, more)
        };
        handler.handle_result_rows(Arc::from(Vec::new()), page, more.then(|| cursor.clone()));
        Ok(())
    }

    async fn close_statement(&mut self, name: &StatementName) -> Result<()> {
        self.log.state().closed_statements.push(name.clone());
        Ok(())
    }

    async fn close_portal(&mut self, name: &PortalName) -> Result<()> {
        let mut state = self.log.state();
        state.portals.remove(name);
        state.closed_portals.push(name.clone());
        Ok(())
    }

    async fn primary_keys(&mut self, _: Option<&str>, table: &str) -> Result<Vec<Vec<String>>> {
        Ok(self.log.state().keys.get(table).cloned().unwrap_or_default())
    }

    fn cancel_sender(&self) -> MockCancel {
        MockCancel { shared: self.log.shared.clone() }
    }

    fn server_version_at_least(&self, major: u32, minor: u32) -> bool {
        self.version >= (major, minor)
    }

    fn standard_conforming_strings(&self) -> bool {
        true
    }

    fn integer_datetimes(&self) -> bool {
        true
    }
}

#[derive(Clone)]
pub struct MockCancel {
    shared: Arc<Shared>,
}

impl CancelSender for MockCancel {
    async fn send_cancel_request(&self) -> Result<()> {
        self.shared.cancels.fetch_add(1, Ordering::SeqCst);
        self.shared.cancel.notify_one();
        Ok(())
    }
}
